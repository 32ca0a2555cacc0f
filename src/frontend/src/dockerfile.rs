//! Parsed multi-stage Dockerfile.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stagefile_core::config::DockerfileOptions;
use stagefile_core::error::Result;

use crate::graph::setup_stage_dependencies;
use crate::instruction::{parse_arg_definitions, ArgDefinition};
use crate::resolve::resolve_stage_references;
use crate::stage::{build_stages, Stage};
use crate::syntax;
use crate::target::target_stage_index;

/// Content-derived Dockerfile identifier (hex SHA-256 of the input bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DockerfileId(String);

impl DockerfileId {
    pub fn from_content(content: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(content)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DockerfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved multi-stage Dockerfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dockerfile {
    id: DockerfileId,
    /// Value of the `# syntax=` directive, if any
    syntax: Option<String>,
    meta_args: Vec<ArgDefinition>,
    options: DockerfileOptions,
    stages: Vec<Stage>,
    target_index: usize,
}

impl Dockerfile {
    /// Parse Dockerfile content. See [`parse_dockerfile`].
    pub fn parse(content: &[u8], options: DockerfileOptions) -> Result<Self> {
        parse_dockerfile(content, options)
    }

    pub fn id(&self) -> &DockerfileId {
        &self.id
    }

    pub fn syntax(&self) -> Option<&str> {
        self.syntax.as_deref()
    }

    /// `ARG`s declared before the first `FROM`.
    pub fn meta_args(&self) -> &[ArgDefinition] {
        &self.meta_args
    }

    pub fn options(&self) -> &DockerfileOptions {
        &self.options
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    pub fn target_stage(&self) -> &Stage {
        &self.stages[self.target_index]
    }
}

/// Parse Dockerfile bytes into a resolved [`Dockerfile`].
///
/// Runs the whole frontend: syntax parsing, instruction classification,
/// stage building, reference resolution, dependency validation and target
/// selection.
pub fn parse_dockerfile(content: &[u8], options: DockerfileOptions) -> Result<Dockerfile> {
    let id = DockerfileId::from_content(content);
    let tree = syntax::parse(content)?;

    let mut meta_args = Vec::new();
    for command in &tree.meta_args {
        meta_args.extend(parse_arg_definitions(command)?);
    }

    let mut stages = build_stages(&tree.stages, &id)?;
    resolve_stage_references(&mut stages);
    setup_stage_dependencies(&mut stages)?;
    let target_index = target_stage_index(&stages, &options.target)?;

    tracing::debug!(
        id = %id,
        stages = stages.len(),
        target = target_index,
        "Parsed Dockerfile"
    );

    Ok(Dockerfile {
        id,
        syntax: tree.directives.syntax,
        meta_args,
        options,
        stages,
        target_index,
    })
}
