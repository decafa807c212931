//! LearnEx Core - Shared data structures for the LearnEx access layer
//!
//! Holds the role model, the access policy switch, configuration, the error
//! type shared across crates, and logging setup.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use tracing;
