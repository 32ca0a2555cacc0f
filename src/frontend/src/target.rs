use stagefile_core::error::{Result, StagefileError};

use crate::stage::Stage;

/// Select the target stage.
///
/// An empty name selects the last stage. Otherwise the first stage whose
/// declared name matches exactly is chosen.
pub fn target_stage_index(stages: &[Stage], target: &str) -> Result<usize> {
    if target.is_empty() {
        return stages
            .len()
            .checked_sub(1)
            .ok_or_else(|| StagefileError::InvalidTarget(target.to_string()));
    }

    stages
        .iter()
        .position(|stage| stage.name() == Some(target))
        .ok_or_else(|| StagefileError::InvalidTarget(target.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::tests::stages_of;

    #[test]
    fn test_default_target_is_last_stage() {
        let stages = stages_of("FROM alpine AS a\nFROM alpine AS b\nFROM alpine\n");
        assert_eq!(target_stage_index(&stages, "").unwrap(), 2);
    }

    #[test]
    fn test_named_target() {
        let stages = stages_of("FROM alpine AS a\nFROM alpine AS b\nFROM alpine\n");
        assert_eq!(target_stage_index(&stages, "b").unwrap(), 1);
    }

    #[test]
    fn test_first_matching_name_wins() {
        let stages = stages_of("FROM alpine AS dup\nFROM alpine AS dup\n");
        assert_eq!(target_stage_index(&stages, "dup").unwrap(), 0);
    }

    #[test]
    fn test_target_match_is_case_sensitive() {
        let stages = stages_of("FROM alpine AS Release\n");
        let err = target_stage_index(&stages, "release").unwrap_err();
        assert_eq!(
            err.to_string(),
            "determine target stage: release is not a valid target build stage"
        );
    }

    #[test]
    fn test_no_stages() {
        assert!(target_stage_index(&[], "").is_err());
    }
}
