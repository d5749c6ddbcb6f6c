//! Schema assembly: storage provisioning and the exposed operation set.

mod assembler;
mod graphql;
mod operations;

pub use assembler::{MaterializedSchema, SchemaAssembler};
pub use operations::{EntityOperations, Locator};

/// Page size limits for lists and paginated relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaSettings {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            max_page_size: 100,
        }
    }
}
