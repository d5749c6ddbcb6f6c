//! Kind registry owned by one schema assembler.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::kind::{EDGE_FIELDS, EntityKind, KindTag, SYSTEM_FIELDS};
use crate::error::ConfigurationError;

#[derive(Default)]
struct Inner {
    kinds: Vec<Arc<EntityKind>>,
    by_name: HashMap<String, usize>,
    by_collection: HashMap<String, usize>,
}

/// Registered node and edge kinds, in registration order.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.kinds().iter().map(|k| k.name().to_string()).collect();
        f.debug_struct("Registry").field("kinds", &names).finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind. Re-registering an identical definition is a no-op.
    pub fn register(&self, kind: EntityKind) -> Result<Arc<EntityKind>, ConfigurationError> {
        validate(&kind)?;

        let mut inner = self.inner.write();
        if let Some(&idx) = inner.by_name.get(kind.name()) {
            let existing = inner.kinds[idx].clone();
            if *existing == kind {
                return Ok(existing);
            }
            return Err(ConfigurationError::DuplicateKind(kind.name().to_string()));
        }
        if inner.by_collection.contains_key(kind.collection()) {
            return Err(ConfigurationError::DuplicateKind(kind.name().to_string()));
        }

        debug!(kind = %kind.name(), collection = %kind.collection(), "Registered kind");
        let kind = Arc::new(kind);
        let idx = inner.kinds.len();
        inner.by_name.insert(kind.name().to_string(), idx);
        inner.by_collection.insert(kind.collection().to_string(), idx);
        inner.kinds.push(kind.clone());
        Ok(kind)
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<EntityKind>, ConfigurationError> {
        self.get(name)
            .ok_or_else(|| ConfigurationError::UnknownKind(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<Arc<EntityKind>> {
        let inner = self.inner.read();
        inner.by_name.get(name).map(|&idx| inner.kinds[idx].clone())
    }

    pub fn lookup_collection(&self, collection: &str) -> Option<Arc<EntityKind>> {
        let inner = self.inner.read();
        inner
            .by_collection
            .get(collection)
            .map(|&idx| inner.kinds[idx].clone())
    }

    pub fn kinds(&self) -> Vec<Arc<EntityKind>> {
        self.inner.read().kinds.clone()
    }

    pub fn nodes(&self) -> Vec<Arc<EntityKind>> {
        self.kinds_tagged(KindTag::Node)
    }

    pub fn edges(&self) -> Vec<Arc<EntityKind>> {
        self.kinds_tagged(KindTag::Edge)
    }

    fn kinds_tagged(&self, tag: KindTag) -> Vec<Arc<EntityKind>> {
        self.inner
            .read()
            .kinds
            .iter()
            .filter(|k| k.tag() == tag)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn validate(kind: &EntityKind) -> Result<(), ConfigurationError> {
    let name = kind.name();
    if name.trim().is_empty() {
        return Err(ConfigurationError::EmptyKindName);
    }

    for field in kind.fields() {
        let field_name = field.name.as_str();
        if SYSTEM_FIELDS.contains(&field_name) || EDGE_FIELDS.contains(&field_name) {
            return Err(ConfigurationError::ReservedField {
                kind: name.to_string(),
                field: field.name.clone(),
            });
        }
    }

    for rel in kind.relationships() {
        if kind.field_type(&rel.name).is_some() || SYSTEM_FIELDS.contains(&rel.name.as_str()) {
            return Err(ConfigurationError::DuplicateField {
                kind: name.to_string(),
                field: rel.name.clone(),
            });
        }
    }

    for index in kind.indexes() {
        if index.fields.is_empty() {
            return Err(ConfigurationError::EmptyIndex {
                kind: name.to_string(),
            });
        }
        if let Some(field) = index.fields.iter().find(|f| !kind.is_indexable(f)) {
            return Err(ConfigurationError::UnknownIndexField {
                kind: name.to_string(),
                field: field.clone(),
            });
        }
    }

    if !kind.is_edge() && !kind.endpoints().is_empty() {
        return Err(ConfigurationError::ConstraintsOnNode {
            kind: name.to_string(),
        });
    }

    Ok(())
}
