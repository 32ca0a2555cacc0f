//! Build stages.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Serialize;
use stagefile_core::error::Result;

use crate::dockerfile::DockerfileId;
use crate::instruction::{classify, Instruction};
use crate::syntax::RawStage;

/// One `FROM` block and its instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub(crate) index: usize,
    /// External image reference, or the decimal index of an earlier stage
    pub(crate) base_name: String,
    pub(crate) name: Option<String>,
    pub(crate) platform: Option<String>,
    pub(crate) instructions: Vec<Instruction>,
    /// Direct prerequisites, filled in once references are resolved
    pub(crate) dependencies: BTreeSet<usize>,
    pub(crate) dockerfile_id: DockerfileId,
}

impl Stage {
    /// 0-based position of the stage in its Dockerfile.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn dependencies(&self) -> &BTreeSet<usize> {
        &self.dependencies
    }

    /// Identifier of the Dockerfile this stage belongs to.
    pub fn dockerfile_id(&self) -> &DockerfileId {
        &self.dockerfile_id
    }

    /// Name if declared, otherwise the index.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.index.to_string())
    }

    /// Environment declared by all `ENV` instructions; later keys win.
    pub fn env(&self) -> IndexMap<String, String> {
        let mut env = IndexMap::new();
        for instruction in &self.instructions {
            if let Instruction::Env { envs } = instruction {
                env.extend(envs.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        env
    }

    /// Labels declared by all `LABEL` instructions; later keys win.
    pub fn labels(&self) -> IndexMap<String, String> {
        let mut labels = IndexMap::new();
        for instruction in &self.instructions {
            if let Instruction::Label { labels: pairs } = instruction {
                labels.extend(pairs.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        labels
    }

    /// Every `COPY --from` and mount `from` reference, in instruction order.
    pub fn references(&self) -> Vec<&str> {
        self.instructions
            .iter()
            .flat_map(Instruction::stage_references)
            .collect()
    }
}

/// Build one [`Stage`] per raw stage, classifying each command in order.
pub fn build_stages(raw_stages: &[RawStage], dockerfile_id: &DockerfileId) -> Result<Vec<Stage>> {
    let mut stages = Vec::with_capacity(raw_stages.len());

    for (index, raw) in raw_stages.iter().enumerate() {
        let mut instructions = Vec::with_capacity(raw.commands.len());
        for command in &raw.commands {
            if let Some(instruction) = classify(command)? {
                instructions.push(instruction);
            }
        }

        stages.push(Stage {
            index,
            base_name: raw.base_name.clone(),
            name: raw.name.clone(),
            platform: raw.platform.clone(),
            instructions,
            dependencies: BTreeSet::new(),
            dockerfile_id: dockerfile_id.clone(),
        });
    }

    tracing::debug!(stages = stages.len(), "Built stages");
    Ok(stages)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::syntax::parse;

    pub(crate) fn stages_of(content: &str) -> Vec<Stage> {
        let tree = parse(content.as_bytes()).unwrap();
        let id = DockerfileId::from_content(content.as_bytes());
        build_stages(&tree.stages, &id).unwrap()
    }

    #[test]
    fn test_build_stages_assigns_indices() {
        let stages = stages_of("FROM golang AS build\nRUN go build\nFROM scratch\nCOPY --from=build /app /app\n");
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].index(), 0);
        assert_eq!(stages[0].name(), Some("build"));
        assert_eq!(stages[0].base_name(), "golang");
        assert_eq!(stages[0].instructions().len(), 1);
        assert_eq!(stages[1].index(), 1);
        assert_eq!(stages[1].name(), None);
        assert_eq!(stages[1].base_name(), "scratch");
        assert!(stages[1].dependencies().is_empty());
    }

    #[test]
    fn test_build_stages_keeps_platform_and_id() {
        let content = "FROM --platform=linux/amd64 alpine\nRUN true\n";
        let stages = stages_of(content);
        assert_eq!(stages[0].platform(), Some("linux/amd64"));
        assert_eq!(
            stages[0].dockerfile_id(),
            &DockerfileId::from_content(content.as_bytes())
        );
    }

    #[test]
    fn test_build_stages_skips_unknown_instructions() {
        let stages = stages_of("FROM alpine\nFROBNICATE x\nRUN true\n");
        assert_eq!(stages[0].instructions().len(), 1);
        assert_eq!(stages[0].instructions()[0].kind(), "RUN");
    }

    #[test]
    fn test_build_stages_propagates_instruction_errors() {
        let content = "FROM alpine\nRUN --network=bridge true\n";
        let tree = parse(content.as_bytes()).unwrap();
        let id = DockerfileId::from_content(content.as_bytes());
        assert!(build_stages(&tree.stages, &id).is_err());
    }

    #[test]
    fn test_stage_env_folds_instructions() {
        let stages = stages_of("FROM alpine\nENV A=1 B=1\nENV A=2\n");
        let env = stages[0].env();
        assert_eq!(env.len(), 2);
        assert_eq!(env["A"], "2");
        assert_eq!(env["B"], "1");
    }

    #[test]
    fn test_stage_labels_fold_instructions() {
        let stages = stages_of("FROM alpine\nLABEL a=x\nLABEL b=y a=z\n");
        let labels = stages[0].labels();
        assert_eq!(labels["a"], "z");
        assert_eq!(labels["b"], "y");
    }

    #[test]
    fn test_stage_references_in_order() {
        let stages = stages_of(
            "FROM alpine\nCOPY --from=one /a /a\nRUN --mount=from=two,target=/b true\nCOPY /c /c\n",
        );
        assert_eq!(stages[0].references(), vec!["one", "two"]);
    }

    #[test]
    fn test_display_name() {
        let stages = stages_of("FROM alpine AS base\nFROM base\n");
        assert_eq!(stages[0].display_name(), "base");
        assert_eq!(stages[1].display_name(), "1");
    }
}
