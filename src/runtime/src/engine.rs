//! BuildEngine - Trait for build backend implementations.

use async_trait::async_trait;
use stagefile_core::config::BuildArg;
use stagefile_core::error::Result;
use stagefile_frontend::Dockerfile;

/// Options for a build operation.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Image tag (e.g., "myimage:latest")
    pub tag: Option<String>,
    /// Suppress build output
    pub quiet: bool,
}

/// Options for running a command inside a build container.
#[derive(Debug, Clone, Default)]
pub struct RunCommandOptions {
    pub build_args: Vec<BuildArg>,
}

/// Trait for build backend implementations.
#[async_trait]
pub trait BuildEngine: Send + Sync {
    /// Build the target stage of a resolved Dockerfile; returns the image id.
    async fn build(&self, dockerfile: &Dockerfile, options: &BuildOptions) -> Result<String>;

    /// Run a command in a container produced by an earlier build.
    async fn run_command(
        &self,
        container: &str,
        command: &[String],
        options: &RunCommandOptions,
    ) -> Result<()>;
}
