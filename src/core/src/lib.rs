//! Stagefile Core - Shared Types
//!
//! Error taxonomy and parse options shared by the frontend, the build
//! engine and the command-line tool.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{BuildArg, DockerfileOptions};
pub use error::{Result, StagefileError};

/// Stagefile version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
