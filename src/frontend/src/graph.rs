//! Stage dependency graph.

use stagefile_core::error::{Result, StagefileError};

use crate::stage::Stage;

/// Fill in each stage's direct dependencies from its resolved references.
///
/// A numeric base image below the stage count is a dependency; any other base
/// image is external. Every numeric `COPY --from` or mount `from` is a
/// dependency and must name a declared stage. Dependencies must point at
/// earlier stages.
pub fn setup_stage_dependencies(stages: &mut [Stage]) -> Result<()> {
    let count = stages.len();

    for stage in stages.iter_mut() {
        let mut dependencies = std::collections::BTreeSet::new();

        if let Some(base) = parse_stage_index(&stage.base_name).filter(|&base| base < count) {
            dependencies.insert(base);
        }

        for reference in stage.references() {
            let Some(reference) = parse_stage_index(reference) else {
                continue;
            };
            if reference >= count {
                return Err(StagefileError::StageOutOfRange {
                    stage: stage.index,
                    reference,
                    count,
                });
            }
            dependencies.insert(reference);
        }

        if let Some(&reference) = dependencies.iter().find(|&&dep| dep >= stage.index) {
            return Err(StagefileError::StageCycle {
                stage: stage.index,
                reference,
            });
        }

        tracing::debug!(
            stage = stage.index,
            dependencies = ?dependencies,
            "Resolved stage dependencies"
        );
        stage.dependencies = dependencies;
    }

    Ok(())
}

/// Parse a reference made only of ASCII digits.
fn parse_stage_index(reference: &str) -> Option<usize> {
    if reference.is_empty() || !reference.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    reference.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve_stage_references;
    use crate::stage::tests::stages_of;

    fn resolved(content: &str) -> Result<Vec<Stage>> {
        let mut stages = stages_of(content);
        resolve_stage_references(&mut stages);
        setup_stage_dependencies(&mut stages)?;
        Ok(stages)
    }

    #[test]
    fn test_parse_stage_index() {
        assert_eq!(parse_stage_index("0"), Some(0));
        assert_eq!(parse_stage_index("12"), Some(12));
        assert_eq!(parse_stage_index(""), None);
        assert_eq!(parse_stage_index("+1"), None);
        assert_eq!(parse_stage_index("-1"), None);
        assert_eq!(parse_stage_index("build"), None);
        assert_eq!(parse_stage_index("1a"), None);
    }

    #[test]
    fn test_copy_dependency() {
        let stages = resolved("FROM golang AS build\nFROM scratch\nCOPY --from=build /app /app\n").unwrap();
        assert!(stages[0].dependencies().is_empty());
        assert_eq!(stages[1].dependencies().iter().copied().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_base_stage_dependency() {
        let stages = resolved("FROM alpine AS build\nFROM build AS final\n").unwrap();
        assert!(stages[1].dependencies().contains(&0));
    }

    #[test]
    fn test_multiple_dependencies_deduplicated() {
        let stages = resolved(
            "FROM alpine AS a\nFROM alpine AS b\nFROM a\nCOPY --from=b /x /x\nCOPY --from=a /y /y\nRUN --mount=from=b,target=/b true\n",
        )
        .unwrap();
        assert_eq!(
            stages[2].dependencies().iter().copied().collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn test_external_references_are_not_dependencies() {
        let stages = resolved("FROM alpine\nCOPY --from=nginx:latest /etc/nginx /etc/nginx\n").unwrap();
        assert!(stages[0].dependencies().is_empty());
    }

    #[test]
    fn test_numeric_base_out_of_range_is_external() {
        let stages = resolved("FROM alpine\nFROM 7\n").unwrap();
        assert!(stages[1].dependencies().is_empty());
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let err = resolved("FROM alpine AS a\nCOPY --from=a /x /x\n").unwrap_err();
        assert!(matches!(
            err,
            StagefileError::StageCycle {
                stage: 0,
                reference: 0
            }
        ));
    }

    #[test]
    fn test_forward_reference_is_cycle() {
        let err = resolved("FROM alpine\nCOPY --from=1 /x /x\nFROM alpine\n").unwrap_err();
        assert!(matches!(
            err,
            StagefileError::StageCycle {
                stage: 0,
                reference: 1
            }
        ));
    }

    #[test]
    fn test_out_of_range_reference() {
        let err = resolved("FROM alpine\nFROM alpine\nCOPY --from=5 /x /x\n").unwrap_err();
        assert!(matches!(
            err,
            StagefileError::StageOutOfRange {
                stage: 1,
                reference: 5,
                count: 2
            }
        ));
    }

    #[test]
    fn test_mount_forward_reference_is_cycle() {
        let err = resolved("FROM alpine\nRUN --mount=from=later,target=/x true\nFROM alpine AS later\n")
            .unwrap_err();
        assert!(matches!(err, StagefileError::StageCycle { .. }));
    }
}
