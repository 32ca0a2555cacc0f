//! Dry-run build engine.
//!
//! Plans the stages a target needs, logs every step, and derives a
//! deterministic image id without touching any container storage.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use stagefile_core::config::BuildArg;
use stagefile_core::error::{Result, StagefileError};
use stagefile_frontend::{Dockerfile, Stage};

use crate::engine::{BuildEngine, BuildOptions, RunCommandOptions};

/// Stages required to build a target, in build order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    pub target: usize,
    /// Ascending stage indices; the target is always last
    pub stages: Vec<usize>,
}

/// Compute the stages the target stage transitively depends on.
pub fn plan(dockerfile: &Dockerfile) -> BuildPlan {
    let target = dockerfile.target_index();
    let mut needed = BTreeSet::new();
    let mut pending = vec![target];

    while let Some(index) = pending.pop() {
        if !needed.insert(index) {
            continue;
        }
        if let Some(stage) = dockerfile.stage(index) {
            pending.extend(stage.dependencies().iter().copied());
        }
    }

    BuildPlan {
        target,
        stages: needed.into_iter().collect(),
    }
}

/// A recorded `run_command` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub container: String,
    pub command: Vec<String>,
    pub build_args: Vec<BuildArg>,
}

/// Engine that plans builds and records commands without executing anything.
#[derive(Debug, Default)]
pub struct DryRunEngine {
    /// Image id or tag -> image id
    images: Mutex<HashMap<String, String>>,
    commands: Mutex<Vec<CommandRecord>>,
}

impl DryRunEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `reference` names an image produced by [`BuildEngine::build`].
    pub fn has_image(&self, reference: &str) -> bool {
        self.images.lock().contains_key(reference)
    }

    /// Commands recorded so far, in call order.
    pub fn commands(&self) -> Vec<CommandRecord> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl BuildEngine for DryRunEngine {
    async fn build(&self, dockerfile: &Dockerfile, options: &BuildOptions) -> Result<String> {
        let plan = plan(dockerfile);
        let stages: Vec<&Stage> = plan
            .stages
            .iter()
            .filter_map(|&index| dockerfile.stage(index))
            .collect();

        let total: usize = stages
            .iter()
            .map(|stage| stage.instructions().len() + 1)
            .sum();
        let mut step = 0;

        for stage in &stages {
            step += 1;
            log_step(options.quiet, step, total, &format!("FROM {}", stage.base_name()));
            for instruction in stage.instructions() {
                step += 1;
                log_step(options.quiet, step, total, &instruction.to_string());
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(dockerfile.id().as_str().as_bytes());
        hasher.update(plan.target.to_le_bytes());
        hasher.update(serde_json::to_vec(&stages)?);
        let image_id = format!("sha256:{}", hex::encode(hasher.finalize()));

        let mut images = self.images.lock();
        images.insert(image_id.clone(), image_id.clone());
        if let Some(tag) = &options.tag {
            images.insert(tag.clone(), image_id.clone());
        }

        tracing::info!(
            image = %image_id,
            tag = options.tag.as_deref().unwrap_or(""),
            stages = plan.stages.len(),
            "Dry-run build complete"
        );
        Ok(image_id)
    }

    async fn run_command(
        &self,
        container: &str,
        command: &[String],
        options: &RunCommandOptions,
    ) -> Result<()> {
        if !self.has_image(container) {
            return Err(StagefileError::Engine(format!(
                "No such container: {container}"
            )));
        }
        if command.is_empty() {
            return Err(StagefileError::Engine(format!(
                "Empty command for container {container}"
            )));
        }

        tracing::info!(container, command = ?command, "Dry-run command");
        self.commands.lock().push(CommandRecord {
            container: container.to_string(),
            command: command.to_vec(),
            build_args: options.build_args.clone(),
        });
        Ok(())
    }
}

fn log_step(quiet: bool, step: usize, total: usize, description: &str) {
    if quiet {
        tracing::debug!("Step {}/{}: {}", step, total, description);
    } else {
        tracing::info!("Step {}/{}: {}", step, total, description);
    }
}
