//! Declarative description of node and edge kinds.

use serde::{Deserialize, Serialize};

use super::naming;
use crate::query::{Depth, Direction, SortOrder};

/// Fields every stored document carries, managed by the store or by this crate.
pub const SYSTEM_FIELDS: &[&str] = &["id", "_id", "_key", "_rev", "_created", "_updated"];

/// Endpoint fields carried by edge documents.
pub const EDGE_FIELDS: &[&str] = &["_from", "_to"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KindTag {
    Node,
    Edge,
}

/// Scalar type of a declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Date,
    DateTime,
    Time,
    Email,
    Password,
    Id,
    Int,
    Float,
    Boolean,
    Enum(Vec<String>),
}

impl FieldType {
    /// GraphQL type name used when this field is exposed.
    pub fn graphql_name(&self) -> &'static str {
        match self {
            FieldType::String | FieldType::Enum(_) => "String",
            FieldType::Date => "Date",
            FieldType::DateTime => "DateTime",
            FieldType::Time => "Time",
            FieldType::Email => "Email",
            FieldType::Password => "Password",
            FieldType::Id => "ID",
            FieldType::Int => "Int",
            FieldType::Float => "Float",
            FieldType::Boolean => "Boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: FieldType,
}

fn default_field_type() -> FieldType {
    FieldType::String
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    #[default]
    Hash,
    Skiplist,
    Persistent,
    Fulltext,
    Geo,
    Ttl,
}

/// Index spec, serialized in the store's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    pub fields: Vec<String>,
    #[serde(rename = "type", default)]
    pub index_type: IndexType,
    #[serde(default = "default_true")]
    pub unique: bool,
    #[serde(default)]
    pub sparse: bool,
}

fn default_true() -> bool {
    true
}

impl Index {
    /// Unique, non-sparse hash index over `fields`.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            index_type: IndexType::Hash,
            unique: true,
            sparse: false,
        }
    }

    pub fn index_type(mut self, index_type: IndexType) -> Self {
        self.index_type = index_type;
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }
}

/// Which node kinds an edge kind may connect.
///
/// An `any` entry is allowed at both endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConstraints {
    pub from: Vec<String>,
    pub to: Vec<String>,
    pub any: Vec<String>,
}

impl EndpointConstraints {
    pub fn is_empty(&self) -> bool {
        self.from.is_empty() && self.to.is_empty() && self.any.is_empty()
    }

    /// Kinds allowed at `_from`: `any` first, then `from`.
    pub fn from_kinds(&self) -> impl Iterator<Item = &str> {
        self.any.iter().chain(self.from.iter()).map(String::as_str)
    }

    /// Kinds allowed at `_to`: `any` first, then `to`.
    pub fn to_kinds(&self) -> impl Iterator<Item = &str> {
        self.any.iter().chain(self.to.iter()).map(String::as_str)
    }

    /// Every referenced kind, in declaration order, possibly repeated.
    pub fn all_kinds(&self) -> impl Iterator<Item = &str> {
        self.any
            .iter()
            .chain(self.from.iter())
            .chain(self.to.iter())
            .map(String::as_str)
    }
}

/// How many related entities a relationship yields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    Single,
    List,
    Paginated,
}

/// Attribute carried by the traversed edge and surfaced next to the target entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraAttribute {
    pub name: String,
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: FieldType,
    /// Path read from the traversal row; defaults to `e.<name>`.
    #[serde(default)]
    pub source: Option<String>,
}

impl ExtraAttribute {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            source: None,
        }
    }

    pub fn from_path(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn source_path(&self) -> String {
        self.source
            .clone()
            .unwrap_or_else(|| format!("e.{}", self.name))
    }
}

/// Declaration of a relationship field on a kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipSpec {
    pub name: String,
    pub target: String,
    pub graph: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub depth: Depth,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub extras: Vec<ExtraAttribute>,
}

impl RelationshipSpec {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        graph: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            graph: graph.into(),
            direction: Direction::Any,
            depth: Depth::default(),
            cardinality,
            extras: Vec::new(),
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn depth(mut self, depth: Depth) -> Self {
        self.depth = depth;
        self
    }

    pub fn extra(mut self, extra: ExtraAttribute) -> Self {
        self.extras.push(extra);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

/// Static configuration attached to a kind at registration time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindConfig {
    pub fields: Vec<FieldDef>,
    pub indexes: Vec<Index>,
    #[serde(flatten)]
    pub endpoints: EndpointConstraints,
    pub relationships: Vec<RelationshipSpec>,
    pub plural: Option<String>,
    pub default_sort: Option<SortSpec>,
}

/// A named node or edge shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityKind {
    name: String,
    tag: KindTag,
    collection: String,
    config: KindConfig,
}

impl EntityKind {
    pub fn node(name: impl Into<String>) -> Self {
        Self::from_config(name, KindTag::Node, KindConfig::default())
    }

    pub fn edge(name: impl Into<String>) -> Self {
        Self::from_config(name, KindTag::Edge, KindConfig::default())
    }

    pub fn from_config(name: impl Into<String>, tag: KindTag, config: KindConfig) -> Self {
        let name = name.into();
        let collection = naming::collection_name(&name, tag, config.plural.as_deref());
        Self {
            name,
            tag,
            collection,
            config,
        }
    }

    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.config.fields.push(FieldDef {
            name: name.into(),
            field_type,
        });
        self
    }

    pub fn index(mut self, index: Index) -> Self {
        self.config.indexes.push(index);
        self
    }

    pub fn from_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.endpoints.from.extend(kinds.into_iter().map(Into::into));
        self
    }

    pub fn to_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.endpoints.to.extend(kinds.into_iter().map(Into::into));
        self
    }

    pub fn any_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.endpoints.any.extend(kinds.into_iter().map(Into::into));
        self
    }

    pub fn relationship(mut self, spec: RelationshipSpec) -> Self {
        self.config.relationships.push(spec);
        self
    }

    pub fn plural(mut self, plural: impl Into<String>) -> Self {
        self.config.plural = Some(plural.into());
        self.collection =
            naming::collection_name(&self.name, self.tag, self.config.plural.as_deref());
        self
    }

    pub fn default_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.config.default_sort = Some(SortSpec {
            field: field.into(),
            order,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> KindTag {
        self.tag
    }

    pub fn is_edge(&self) -> bool {
        self.tag == KindTag::Edge
    }

    /// Physical collection name, fixed when the kind is built.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.config.fields
    }

    pub fn field_type(&self, name: &str) -> Option<&FieldType> {
        self.config
            .fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.field_type)
    }

    pub fn indexes(&self) -> &[Index] {
        &self.config.indexes
    }

    pub fn endpoints(&self) -> &EndpointConstraints {
        &self.config.endpoints
    }

    pub fn relationships(&self) -> &[RelationshipSpec] {
        &self.config.relationships
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.config.default_sort.as_ref()
    }

    /// Whether `name` may appear in an index on this kind.
    pub fn is_indexable(&self, name: &str) -> bool {
        self.field_type(name).is_some()
            || matches!(name, "_key" | "_created" | "_updated")
            || (self.is_edge() && EDGE_FIELDS.contains(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_fixed_at_construction() {
        let person = EntityKind::node("Person").field("name", FieldType::String);
        assert_eq!(person.collection(), "people");

        let member_of = EntityKind::edge("MemberOf").from_kinds(["Person"]).to_kinds(["Group"]);
        assert_eq!(member_of.collection(), "member_of");
        assert!(member_of.is_edge());
    }

    #[test]
    fn test_plural_override_recomputes_collection() {
        let info = EntityKind::node("Info").plural("Infos");
        assert_eq!(info.collection(), "infos");
    }

    #[test]
    fn test_index_defaults() {
        let index = Index::new(["email"]);
        assert!(index.unique);
        assert!(!index.sparse);
        assert_eq!(index.index_type, IndexType::Hash);

        let json = serde_json::to_value(&index).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "fields": ["email"],
                "type": "hash",
                "unique": true,
                "sparse": false
            })
        );
    }

    #[test]
    fn test_any_endpoint_feeds_both_sides() {
        let belongs_to = EntityKind::edge("BelongsTo")
            .any_kinds(["Group", "Department"])
            .to_kinds(["Person"]);
        let from: Vec<_> = belongs_to.endpoints().from_kinds().collect();
        let to: Vec<_> = belongs_to.endpoints().to_kinds().collect();
        assert_eq!(from, vec!["Group", "Department"]);
        assert_eq!(to, vec!["Group", "Department", "Person"]);
    }

    #[test]
    fn test_edge_endpoints_are_indexable() {
        let edge = EntityKind::edge("Knows").field("status", FieldType::String);
        assert!(edge.is_indexable("_from"));
        assert!(edge.is_indexable("status"));
        assert!(!edge.is_indexable("missing"));
        assert!(!EntityKind::node("Person").is_indexable("_from"));
    }
}
