//! Stagefile CLI - inspect and dry-run multi-stage Dockerfiles.

pub mod commands;
pub mod output;
