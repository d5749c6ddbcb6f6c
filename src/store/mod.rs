//! Storage client interface and the in-process store.

mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::model::Index;
use crate::query::Statement;
use crate::topology::EdgeDefinition;

pub use memory::{MemoryStore, ProvisionEvent};

/// What the compiler needs from a graph-oriented document store.
///
/// Provisioning calls are idempotent: creating something that already exists
/// succeeds without changing it.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Run a statement and return the documents it yields, in order.
    async fn execute(&self, statement: &Statement) -> Result<Vec<Value>, StorageError>;

    async fn create_collection(&self, name: &str, is_edge: bool) -> Result<(), StorageError>;

    async fn create_index(&self, collection: &str, index: &Index) -> Result<(), StorageError>;

    async fn create_graph(
        &self,
        name: &str,
        edge_definitions: &[EdgeDefinition],
    ) -> Result<(), StorageError>;
}
