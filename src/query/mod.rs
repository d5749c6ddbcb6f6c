//! Traversal query builder.
//!
//! ```rust,ignore
//! use neume::query::{ClauseBuilder, Direction, GraphQuery};
//!
//! let groups = GraphQuery::new("personGraph")
//!     .direction(Direction::Outbound)
//!     .filter("v._id")
//!     .like("groups/%");
//! let statement = groups.bind("people/1");
//! ```

mod builder;
mod clause;
mod statement;

pub use builder::{ClauseBuilder, GraphQuery, Query};
pub use clause::{Clause, CompareOp, Depth, Direction, Operand, Projection, SortOrder};
pub use statement::{START_VERTEX_PARAM, Statement};
