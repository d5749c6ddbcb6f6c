//! YAML model declarations.
//!
//! ```yaml
//! nodes:
//!   - name: Person
//!     fields:
//!       - { name: name, type: string }
//!     relationships:
//!       - { name: groups, target: Group, graph: membership, cardinality: list }
//! edges:
//!   - name: MemberOf
//!     from: [Person]
//!     to: [Group]
//! graphs:
//!   - { name: membership, edges: [MemberOf] }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::kind::{EntityKind, KindConfig, KindTag};
use crate::error::ConfigurationError;
use crate::schema::SchemaAssembler;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDeclaration {
    pub nodes: Vec<KindDeclaration>,
    pub edges: Vec<KindDeclaration>,
    pub graphs: Vec<GraphDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindDeclaration {
    pub name: String,
    #[serde(flatten)]
    pub config: KindConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDeclaration {
    pub name: String,
    pub edges: Vec<String>,
}

impl ModelDeclaration {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigurationError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigurationError::Declaration(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::Declaration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn kinds(&self) -> impl Iterator<Item = EntityKind> + '_ {
        let nodes = self.nodes.iter().map(|d| d.to_kind(KindTag::Node));
        let edges = self.edges.iter().map(|d| d.to_kind(KindTag::Edge));
        nodes.chain(edges)
    }

    /// Register every declared kind, then declare the graphs.
    pub fn apply(&self, assembler: &SchemaAssembler) -> Result<(), ConfigurationError> {
        for kind in self.kinds() {
            assembler.register_kind(kind)?;
        }
        for graph in &self.graphs {
            for edge in &graph.edges {
                let kind = assembler.registry().lookup(edge)?;
                if !kind.is_edge() {
                    return Err(ConfigurationError::NotAnEdge(edge.clone()));
                }
            }
            assembler.declare_graph(&graph.name, graph.edges.iter().cloned());
        }
        Ok(())
    }
}

impl KindDeclaration {
    fn to_kind(&self, tag: KindTag) -> EntityKind {
        EntityKind::from_config(&self.name, tag, self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cardinality, FieldType};
    use crate::query::{Depth, Direction};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    const MODEL: &str = r#"
nodes:
  - name: Person
    fields:
      - { name: name, type: string }
      - { name: email, type: email }
    indexes:
      - { fields: [email], unique: true }
    relationships:
      - name: groups
        target: Group
        graph: membership
        direction: OUTBOUND
        cardinality: list
        extras:
          - { name: role, type: string }
  - name: Group
    fields:
      - { name: title }
edges:
  - name: MemberOf
    from: [Person]
    to: [Group]
    fields:
      - { name: role }
graphs:
  - { name: membership, edges: [MemberOf] }
"#;

    #[test]
    fn test_parse_model() {
        let model = ModelDeclaration::from_yaml_str(MODEL).unwrap();
        assert_eq!(model.nodes.len(), 2);
        assert_eq!(model.edges[0].config.endpoints.from, vec!["Person".to_string()]);

        let person = &model.nodes[0].config;
        assert_eq!(person.fields[1].field_type, FieldType::Email);
        assert!(person.indexes[0].unique);

        let groups = &person.relationships[0];
        assert_eq!(groups.direction, Direction::Outbound);
        assert_eq!(groups.depth, Depth::Exact(1));
        assert_eq!(groups.cardinality, Cardinality::List);
        assert_eq!(groups.extras[0].source_path(), "e.role");

        assert_eq!(model.nodes[1].config.fields[0].field_type, FieldType::String);
    }

    #[test]
    fn test_apply_registers_kinds_and_graphs() {
        let assembler = SchemaAssembler::default();
        ModelDeclaration::from_yaml_str(MODEL)
            .unwrap()
            .apply(&assembler)
            .unwrap();

        assert_eq!(assembler.registry().len(), 3);
        assert!(assembler.registry().lookup("MemberOf").unwrap().is_edge());
        assert_eq!(assembler.registry().lookup("Person").unwrap().collection(), "people");
    }

    #[test]
    fn test_graph_over_node_is_rejected() {
        let yaml = "nodes: [{ name: Person }]\ngraphs: [{ name: g, edges: [Person] }]";
        let result = ModelDeclaration::from_yaml_str(yaml)
            .unwrap()
            .apply(&SchemaAssembler::default());
        assert_matches!(result, Err(ConfigurationError::NotAnEdge(name)) if name == "Person");
    }

    #[test]
    fn test_malformed_yaml() {
        assert_matches!(
            ModelDeclaration::from_yaml_str("nodes: 3"),
            Err(ConfigurationError::Declaration(_))
        );
    }

    #[test]
    fn test_relationship_depth_bounds() {
        let with_depth = |depth: &str| {
            format!(
                "nodes:\n  - name: Person\n    relationships:\n      \
                 - {{ name: friends, target: Person, graph: g, depth: {depth} }}\n"
            )
        };
        let model = ModelDeclaration::from_yaml_str(&with_depth("[3, 1]")).unwrap();
        assert_eq!(model.nodes[0].config.relationships[0].depth, Depth::Range(1, 3));

        assert_matches!(
            ModelDeclaration::from_yaml_str(&with_depth("[1, 2, 3]")),
            Err(ConfigurationError::Declaration(msg)) if msg.contains("one or two bounds")
        );
    }
}
