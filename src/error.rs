//! Error taxonomy for the schema compiler.
//!
//! - [ConfigurationError]: bad declarations, fatal at startup.
//! - [Error::NotFound]: a locate miss on `update` (reads return `None` instead).
//! - [StorageError]: anything the storage client reports, passed through unchanged.
//! - [Error::Validation]: rejected user input on `create`/`update`.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Declaration problems detected while registering kinds or assembling a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("kind `{0}` is registered twice with different definitions")]
    DuplicateKind(String),
    #[error("kind name must not be empty")]
    EmptyKindName,
    #[error("kind `{kind}` declares field `{field}` which collides with a system field")]
    ReservedField { kind: String, field: String },
    #[error("kind `{kind}` declares `{field}` both as a field and as a relationship")]
    DuplicateField { kind: String, field: String },
    #[error("kind `{kind}` declares an index without fields")]
    EmptyIndex { kind: String },
    #[error("index on kind `{kind}` references unknown field `{field}`")]
    UnknownIndexField { kind: String, field: String },
    #[error("node kind `{kind}` declares endpoint constraints; only edge kinds may")]
    ConstraintsOnNode { kind: String },
    #[error("edge kind `{edge}` references `{target}`, which is not a registered node kind")]
    UnknownEndpoint { edge: String, target: String },
    #[error("kind `{0}` is not registered")]
    UnknownKind(String),
    #[error("`{0}` is not an edge kind")]
    NotAnEdge(String),
    #[error("relationship `{owner}.{field}` targets unknown kind `{target}`")]
    UnknownRelationshipTarget {
        owner: String,
        field: String,
        target: String,
    },
    #[error("relationship `{owner}.{field}` traverses unknown graph `{graph}`")]
    UnknownGraph {
        owner: String,
        field: String,
        graph: String,
    },
    #[error("graph `{0}` has no edge kinds")]
    EmptyGraph(String),
    #[error("invalid model declaration: {0}")]
    Declaration(String),
    #[error("failed to assemble GraphQL schema: {0}")]
    GraphQl(String),
}

/// Failure reported by a [StorageClient](crate::store::StorageClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("collection `{0}` does not exist")]
    UnknownCollection(String),
    #[error("graph `{0}` does not exist")]
    UnknownGraph(String),
    #[error("unique constraint violated on `{collection}` for fields {fields:?}")]
    UniqueViolation {
        collection: String,
        fields: Vec<String>,
    },
    #[error("missing bind parameter `@{0}`")]
    MissingBindVar(String),
    #[error("unsupported statement: {0}")]
    Unsupported(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Top-level error for entity operations and relationship resolution.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{kind} not found for {locator}")]
    NotFound { kind: String, locator: String },
    #[error("invalid input for {kind}: {message}")]
    Validation { kind: String, message: String },
}

impl Error {
    pub fn not_found(kind: impl Into<String>, locator: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            locator: locator.into(),
        }
    }

    pub fn validation(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Whether this error is the "no document matched" class.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
