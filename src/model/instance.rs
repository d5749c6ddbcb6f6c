//! Stored documents and the entity instances built from them.

use serde_json::Value;

/// A document as returned by the store: field name to scalar (or null).
pub type Document = serde_json::Map<String, Value>;

/// A document bound to the kind it was read as.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInstance {
    kind: String,
    document: Document,
}

impl EntityInstance {
    pub fn new(kind: impl Into<String>, document: Document) -> Self {
        Self {
            kind: kind.into(),
            document,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        if field == "id" {
            return None;
        }
        self.document.get(field).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Document handle (`collection/key`).
    pub fn handle(&self) -> Option<&str> {
        self.get_str("_id")
    }

    /// Public identifier: `_key`, or the last segment of `_id`.
    pub fn id(&self) -> Option<&str> {
        self.get_str("_key")
            .or_else(|| self.handle().and_then(|h| h.rsplit('/').next()))
    }
}

/// A target entity reached through a relationship, with the edge-carried
/// attributes split off from the entity's own fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedEntity {
    pub node: EntityInstance,
    pub extras: Document,
}

impl RelatedEntity {
    /// Split `extra_names` out of a merged traversal document.
    pub fn from_merged(kind: &str, mut document: Document, extra_names: &[String]) -> Self {
        let mut extras = Document::new();
        for name in extra_names {
            if let Some(value) = document.remove(name) {
                extras.insert(name.clone(), value);
            }
        }
        Self {
            node: EntityInstance::new(kind, document),
            extras,
        }
    }

    /// Field lookup with extras shadowing the node's own fields.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.extras
            .get(field)
            .filter(|v| !v.is_null())
            .or_else(|| self.node.get(field))
    }
}
