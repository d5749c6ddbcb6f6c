//! Process-level services for the binary.

pub mod logging;

pub use logging::init_tracing;
