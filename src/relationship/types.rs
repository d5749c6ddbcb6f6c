//! Generated result types and the cache that owns them.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::debug;

use crate::model::{Cardinality, ExtraAttribute};

/// Shape of a relationship's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultShape {
    Single,
    List,
    Paginated,
}

impl From<Cardinality> for ResultShape {
    fn from(cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::Single => ResultShape::Single,
            Cardinality::List => ResultShape::List,
            Cardinality::Paginated => ResultShape::Paginated,
        }
    }
}

/// The target kind's shape combined with edge-carried attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedType {
    name: String,
    shape: ResultShape,
    node_type: String,
    extras: Vec<ExtraAttribute>,
}

impl GeneratedType {
    pub fn new(
        name: impl Into<String>,
        shape: ResultShape,
        node_type: impl Into<String>,
        extras: Vec<ExtraAttribute>,
    ) -> Self {
        Self {
            name: name.into(),
            shape,
            node_type: node_type.into(),
            extras,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> ResultShape {
        self.shape
    }

    /// Type name of the target kind.
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn extras(&self) -> &[ExtraAttribute] {
        &self.extras
    }

    /// Whether items need their own object type rather than the target's.
    pub fn has_item_type(&self) -> bool {
        self.shape != ResultShape::Single || !self.extras.is_empty()
    }

    /// Type of one returned item.
    pub fn item_type_name(&self) -> &str {
        if self.has_item_type() {
            &self.name
        } else {
            &self.node_type
        }
    }

    pub fn connection_type_name(&self) -> String {
        format!("{}Connection", self.name)
    }

    pub fn edge_type_name(&self) -> String {
        format!("{}Edge", self.name)
    }
}

type Slot = Arc<OnceCell<Arc<GeneratedType>>>;

/// Process-lifetime registry of generated types, keyed by type name.
///
/// Creation is exclusive per key: concurrent first requests for the same
/// name run one initializer and all observe its result. Lookups of
/// published types take only the read lock.
#[derive(Debug, Default)]
pub struct TypeCache {
    slots: RwLock<HashMap<String, Slot>>,
    created: AtomicUsize,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create<F>(&self, name: &str, init: F) -> Arc<GeneratedType>
    where
        F: FnOnce() -> GeneratedType,
    {
        if let Some(existing) = self.get(name) {
            return existing;
        }

        let slot = {
            let mut slots = self.slots.write();
            slots.entry(name.to_string()).or_default().clone()
        };

        slot.get_or_init(|| {
            self.created.fetch_add(1, Ordering::SeqCst);
            debug!(type_name = name, "Materialized result type");
            Arc::new(init())
        })
        .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<GeneratedType>> {
        self.slots.read().get(name).and_then(|slot| slot.get().cloned())
    }

    /// Number of types created so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Published type names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.get().is_some())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn person_groups() -> GeneratedType {
        GeneratedType::new("PersonGroup", ResultShape::List, "Group", Vec::new())
    }

    #[test]
    fn test_create_once_per_name() {
        let cache = TypeCache::new();
        let a = cache.get_or_create("PersonGroup", person_groups);
        let b = cache.get_or_create("PersonGroup", || unreachable!("already created"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.created(), 1);
        assert_eq!(cache.names(), vec!["PersonGroup".to_string()]);
    }

    #[test]
    fn test_concurrent_first_use_creates_one_type() {
        let cache = Arc::new(TypeCache::new());
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || cache.get_or_create("PersonGroup", person_groups))
            })
            .collect();
        let types: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(types.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.created(), 1);
    }

    #[test]
    fn test_item_type_names() {
        let single = GeneratedType::new("PersonEmployer", ResultShape::Single, "Group", Vec::new());
        assert!(!single.has_item_type());
        assert_eq!(single.item_type_name(), "Group");

        let paged =
            GeneratedType::new("PersonFriend", ResultShape::Paginated, "Person", Vec::new());
        assert_eq!(paged.item_type_name(), "PersonFriend");
        assert_eq!(paged.connection_type_name(), "PersonFriendConnection");
        assert_eq!(paged.edge_type_name(), "PersonFriendEdge");
    }
}
