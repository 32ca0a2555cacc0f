//! CLI command definitions and dispatch.

mod build;
mod parse;
mod stages;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use stagefile_core::{BuildArg, DockerfileOptions};
use stagefile_frontend::{parse_dockerfile, Dockerfile};

/// Stagefile - multi-stage Dockerfile frontend.
#[derive(Parser)]
#[command(name = "stagefile", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Print the resolved Dockerfile as JSON
    Parse(parse::ParseArgs),
    /// List stages, their dependencies and the selected target
    Stages(stages::StagesArgs),
    /// Plan and log a build of the target stage without executing it
    Build(build::BuildArgs),
}

/// Dispatch a parsed CLI command to its handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Parse(args) => parse::execute(args).await,
        Command::Stages(args) => stages::execute(args).await,
        Command::Build(args) => build::execute(args).await,
    }
}

/// Dockerfile input shared by every command.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Path to the Dockerfile
    #[arg(short = 'f', long = "file", default_value = "Dockerfile")]
    pub file: PathBuf,

    /// Target build stage (default: last stage)
    #[arg(long)]
    pub target: Option<String>,

    /// Set build-time variables (KEY or KEY=VALUE), can be repeated
    #[arg(long = "build-arg")]
    pub build_arg: Vec<String>,

    /// YAML file with target and build_args
    #[arg(long = "options")]
    pub options: Option<PathBuf>,
}

impl InputArgs {
    /// Assemble options: the options file first, then command-line overrides.
    pub fn dockerfile_options(&self) -> Result<DockerfileOptions, Box<dyn std::error::Error>> {
        let mut options = match &self.options {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    format!("Failed to read options file {}: {}", path.display(), e)
                })?;
                DockerfileOptions::from_yaml(&content)?
            }
            None => DockerfileOptions::default(),
        };

        if let Some(target) = &self.target {
            options.target = target.clone();
        }
        for arg in &self.build_arg {
            options.build_args.push(arg.parse::<BuildArg>()?);
        }

        Ok(options)
    }

    /// Read and resolve the Dockerfile.
    pub fn load(&self) -> Result<Dockerfile, Box<dyn std::error::Error>> {
        let content = std::fs::read(&self.file).map_err(|e| {
            format!("Failed to read Dockerfile {}: {}", self.file.display(), e)
        })?;
        let options = self.dockerfile_options()?;

        tracing::debug!(file = %self.file.display(), "Parsing Dockerfile");
        Ok(parse_dockerfile(&content, options)?)
    }
}
