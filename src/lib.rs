//! neume: graph schema compiler for graph document stores.
//!
//! Node and edge kinds are declared once (in code or YAML). From those
//! declarations the [SchemaAssembler] provisions collections, indexes and
//! named graphs through a [StorageClient], and exposes a GraphQL schema whose
//! relationship fields resolve by graph traversal.

pub mod error;
pub mod model;
pub mod query;
pub mod relationship;
pub mod schema;
pub mod store;
pub mod topology;

pub use error::{ConfigurationError, Error, Result, StorageError};
pub use model::{EntityInstance, EntityKind, ModelDeclaration, Registry};
pub use query::{ClauseBuilder, GraphQuery, Query, Statement};
pub use schema::{MaterializedSchema, SchemaAssembler, SchemaSettings};
pub use store::{MemoryStore, StorageClient};
pub use topology::{GraphTopology, build_topology};
