//! Relationship fields: lazily typed, resolved by graph traversal.

mod field;
mod pagination;
mod types;

use std::sync::Arc;

pub use field::{RelationshipField, Resolved, generated_type_name};
pub use pagination::{Connection, Edge, PageInfo, PageRequest, decode_cursor, encode_cursor};
pub use types::{GeneratedType, ResultShape, TypeCache};

use crate::schema::SchemaSettings;
use crate::store::StorageClient;

/// Everything a resolution needs at read time.
#[derive(Clone)]
pub struct ServingContext {
    pub storage: Arc<dyn StorageClient>,
    pub types: Arc<TypeCache>,
    pub settings: SchemaSettings,
}

impl ServingContext {
    pub fn new(
        storage: Arc<dyn StorageClient>,
        types: Arc<TypeCache>,
        settings: SchemaSettings,
    ) -> Self {
        Self {
            storage,
            types,
            settings,
        }
    }
}

impl std::fmt::Debug for ServingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServingContext")
            .field("types", &self.types)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
