//! `stagefile build` command - Dry-run build of the target stage.
//!
//! Resolves the Dockerfile, plans the stages the target needs and logs each
//! step without executing anything.

use clap::Args;
use stagefile_runtime::{plan, BuildEngine, BuildOptions, DryRunEngine};

use super::InputArgs;

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Name and optionally tag for the image (e.g., "myimage:latest")
    #[arg(short = 't', long = "tag")]
    pub tag: Option<String>,

    /// Suppress build output, print only the image id
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(args: BuildArgs) -> Result<(), Box<dyn std::error::Error>> {
    let dockerfile = args.input.load()?;
    let build_plan = plan(&dockerfile);

    if !args.quiet {
        println!(
            "Building {} from {} ({} of {} stages)",
            dockerfile.target_stage().display_name(),
            args.input.file.display(),
            build_plan.stages.len(),
            dockerfile.stages().len()
        );
    }

    let engine = DryRunEngine::new();
    let options = BuildOptions {
        tag: args.tag.clone(),
        quiet: args.quiet,
    };
    let image_id = engine.build(&dockerfile, &options).await?;

    if args.quiet {
        println!("{image_id}");
    } else {
        println!("Successfully built {image_id}");
        if let Some(tag) = &args.tag {
            println!("Successfully tagged {tag}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_execute_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dockerfile");
        std::fs::write(&path, "FROM alpine AS base\nRUN true\nFROM base\nCMD [\"sh\"]\n").unwrap();

        let args = BuildArgs {
            input: InputArgs {
                file: path,
                target: None,
                build_arg: Vec::new(),
                options: None,
            },
            tag: Some("app:latest".to_string()),
            quiet: true,
        };
        execute(args).await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_missing_file() {
        let args = BuildArgs {
            input: InputArgs {
                file: PathBuf::from("/nonexistent/Dockerfile"),
                target: None,
                build_arg: Vec::new(),
                options: None,
            },
            tag: None,
            quiet: true,
        };
        assert!(execute(args).await.is_err());
    }
}
