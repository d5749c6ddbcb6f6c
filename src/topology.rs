//! Named graph topologies built from edge kinds.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigurationError;
use crate::model::{EntityKind, Registry};

/// One row of a graph's edge-definition table, in the store's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub collection: String,
    pub from: Vec<String>,
    pub to: Vec<String>,
}

/// Edge definitions of one named graph plus the node kinds they touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphTopology {
    name: String,
    edge_definitions: Vec<EdgeDefinition>,
    /// Edge kind names, parallel to `edge_definitions`.
    edges: Vec<String>,
    /// Participating node kind names, deduplicated, first reference wins.
    nodes: Vec<String>,
}

impl GraphTopology {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            edge_definitions: Vec::new(),
            edges: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn edge_definitions(&self) -> &[EdgeDefinition] {
        &self.edge_definitions
    }

    pub fn edges(&self) -> &[String] {
        &self.edges
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn contains_edge(&self, kind: &str) -> bool {
        self.edges.iter().any(|e| e == kind)
    }

    pub fn contains_node(&self, kind: &str) -> bool {
        self.nodes.iter().any(|n| n == kind)
    }

    /// Append an edge definition for `edge`. Returns `false` when the edge
    /// kind is already part of this topology.
    pub fn add_edge(
        &mut self,
        edge: &EntityKind,
        registry: &Registry,
    ) -> Result<bool, ConfigurationError> {
        if !edge.is_edge() {
            return Err(ConfigurationError::NotAnEdge(edge.name().to_string()));
        }
        if self.contains_edge(edge.name()) {
            return Ok(false);
        }

        let endpoints = edge.endpoints();
        let from = resolve_collections(edge, endpoints.from_kinds(), registry)?;
        let to = resolve_collections(edge, endpoints.to_kinds(), registry)?;

        for kind in endpoints.all_kinds() {
            if !self.contains_node(kind) {
                self.nodes.push(kind.to_string());
            }
        }

        debug!(
            graph = %self.name,
            edge = %edge.name(),
            from = ?from,
            to = ?to,
            "Added edge definition"
        );
        self.edges.push(edge.name().to_string());
        self.edge_definitions.push(EdgeDefinition {
            collection: edge.collection().to_string(),
            from,
            to,
        });
        Ok(true)
    }
}

fn resolve_collections<'a>(
    edge: &EntityKind,
    kinds: impl Iterator<Item = &'a str>,
    registry: &Registry,
) -> Result<Vec<String>, ConfigurationError> {
    let mut collections: Vec<String> = Vec::new();
    for name in kinds {
        let kind = registry
            .get(name)
            .filter(|k| !k.is_edge())
            .ok_or_else(|| ConfigurationError::UnknownEndpoint {
                edge: edge.name().to_string(),
                target: name.to_string(),
            })?;
        if !collections.iter().any(|c| c == kind.collection()) {
            collections.push(kind.collection().to_string());
        }
    }
    Ok(collections)
}

/// Build the topology of graph `name` from `edge_kinds`, in the given order.
pub fn build_topology(
    name: impl Into<String>,
    edge_kinds: &[Arc<EntityKind>],
    registry: &Registry,
) -> Result<GraphTopology, ConfigurationError> {
    let mut topology = GraphTopology::new(name);
    for edge in edge_kinds {
        topology.add_edge(edge, registry)?;
    }
    Ok(topology)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn registry() -> Registry {
        let registry = Registry::new();
        registry.register(EntityKind::node("Author")).unwrap();
        registry.register(EntityKind::node("Book")).unwrap();
        registry
    }

    #[test]
    fn test_any_endpoint_feeds_both_sides_and_nodes_dedupe() {
        let registry = registry();
        let a = registry
            .register(EntityKind::edge("Wrote").from_kinds(["Author"]).to_kinds(["Book"]))
            .unwrap();
        let b = registry
            .register(EntityKind::edge("Cites").any_kinds(["Book"]))
            .unwrap();

        let topology = build_topology("library", &[a, b], &registry).unwrap();
        assert_eq!(topology.nodes(), &["Author".to_string(), "Book".to_string()]);
        assert_eq!(
            topology.edge_definitions()[1],
            EdgeDefinition {
                collection: "cites".into(),
                from: vec!["books".into()],
                to: vec!["books".into()],
            }
        );
    }

    #[test]
    fn test_unconstrained_edge_is_permitted() {
        let registry = registry();
        let loose = registry.register(EntityKind::edge("Related")).unwrap();
        let topology = build_topology("g", &[loose], &registry).unwrap();
        assert!(topology.nodes().is_empty());
        assert!(topology.edge_definitions()[0].from.is_empty());
        assert!(topology.edge_definitions()[0].to.is_empty());
    }

    #[test]
    fn test_readding_edge_is_noop() {
        let registry = registry();
        let wrote = registry
            .register(EntityKind::edge("Wrote").from_kinds(["Author"]).to_kinds(["Book"]))
            .unwrap();
        let mut topology = build_topology("g", &[wrote.clone()], &registry).unwrap();
        let before = topology.clone();
        assert!(!topology.add_edge(&wrote, &registry).unwrap());
        assert_eq!(topology, before);
    }

    #[test]
    fn test_unknown_endpoint_rejected() {
        let registry = registry();
        let bad = registry
            .register(EntityKind::edge("Owns").from_kinds(["Ghost"]))
            .unwrap();
        assert_matches!(
            build_topology("g", &[bad], &registry),
            Err(ConfigurationError::UnknownEndpoint { target, .. }) if target == "Ghost"
        );
    }

    #[test]
    fn test_serializes_edge_definitions() {
        let registry = registry();
        let wrote = registry
            .register(EntityKind::edge("Wrote").from_kinds(["Author"]).to_kinds(["Book"]))
            .unwrap();
        let topology = build_topology("g", &[wrote], &registry).unwrap();
        let json = serde_json::to_value(&topology).unwrap();
        assert_eq!(
            json["edgeDefinitions"],
            serde_json::json!([{"collection": "wrote", "from": ["authors"], "to": ["books"]}])
        );
    }
}
