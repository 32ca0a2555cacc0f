//! Stagefile Runtime
//!
//! The [`BuildEngine`] contract consumed by build front ends, and a
//! [`DryRunEngine`] that plans and logs a build without executing it.

pub mod dry_run;
pub mod engine;

pub use dry_run::{plan, BuildPlan, CommandRecord, DryRunEngine};
pub use engine::{BuildEngine, BuildOptions, RunCommandOptions};
