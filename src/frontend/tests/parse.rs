//! End-to-end tests for the Dockerfile frontend.

use stagefile_core::{BuildArg, DockerfileOptions, StagefileError};
use stagefile_frontend::{parse_dockerfile, Dockerfile, Instruction};

fn parse(content: &str) -> Dockerfile {
    parse_dockerfile(content.as_bytes(), DockerfileOptions::default()).unwrap()
}

fn parse_err(content: &str, target: &str) -> StagefileError {
    parse_dockerfile(content.as_bytes(), DockerfileOptions::with_target(target)).unwrap_err()
}

fn copy_from(dockerfile: &Dockerfile, stage: usize, position: usize) -> String {
    match &dockerfile.stages()[stage].instructions()[position] {
        Instruction::Copy { from, .. } => from.clone(),
        other => panic!("Expected COPY instruction, got {other:?}"),
    }
}

#[test]
fn test_build_then_scratch() {
    let dockerfile = parse("FROM alpine AS build\nRUN echo hi\nFROM scratch\nCOPY --from=build /x /y");

    assert_eq!(dockerfile.stages().len(), 2);
    assert_eq!(dockerfile.stages()[0].name(), Some("build"));
    assert_eq!(dockerfile.stages()[1].name(), None);
    assert_eq!(copy_from(&dockerfile, 1, 0), "0");
    assert_eq!(dockerfile.target_index(), 1);
    assert_eq!(
        dockerfile.stages()[1].dependencies().iter().copied().collect::<Vec<_>>(),
        vec![0]
    );
}

#[test]
fn test_stage_count_matches_from_count() {
    let dockerfile = parse(
        "FROM alpine AS a\nRUN true\nFROM alpine AS b\nFROM debian\nFROM ubuntu AS d\nCMD [\"bash\"]\n",
    );
    assert_eq!(dockerfile.stages().len(), 4);
    for (position, stage) in dockerfile.stages().iter().enumerate() {
        assert_eq!(stage.index(), position);
    }
}

#[test]
fn test_env_instructions_fold() {
    let dockerfile = parse("FROM alpine\nENV A=1\nENV A=2\n");
    let env = dockerfile.target_stage().env();
    assert_eq!(env.len(), 1);
    assert_eq!(env["A"], "2");
}

#[test]
fn test_unknown_target() {
    let err = parse_err("FROM alpine AS build\nFROM scratch\n", "nonexistent");
    assert!(matches!(err, StagefileError::InvalidTarget(_)));
    assert!(err
        .to_string()
        .contains("nonexistent is not a valid target build stage"));
}

#[test]
fn test_named_target() {
    let dockerfile = parse_dockerfile(
        b"FROM alpine AS build\nFROM scratch AS release\nFROM busybox\n",
        DockerfileOptions::with_target("release"),
    )
    .unwrap();
    assert_eq!(dockerfile.target_index(), 1);
    assert_eq!(dockerfile.target_stage().name(), Some("release"));
}

#[test]
fn test_numeric_name_matching_own_index() {
    let dockerfile = parse("FROM alpine\nFROM alpine AS 1\nFROM alpine\nCOPY --from=1 /a /a\n");
    assert_eq!(copy_from(&dockerfile, 2, 0), "1");
    assert!(dockerfile.stages()[2].dependencies().contains(&1));
}

#[test]
fn test_numeric_reference_passes_through() {
    let dockerfile = parse("FROM alpine AS a\nFROM alpine\nCOPY --from=0 /a /a\n");
    assert_eq!(copy_from(&dockerfile, 1, 0), "0");
}

#[test]
fn test_case_insensitive_reference() {
    let dockerfile = parse("FROM golang AS Builder\nFROM alpine\nCOPY --from=bUiLdEr /out /out\n");
    assert_eq!(copy_from(&dockerfile, 1, 0), "0");
}

#[test]
fn test_external_image_reference_untouched() {
    let dockerfile = parse("FROM alpine\nCOPY --from=nginx:1.25 /etc/nginx /etc/nginx\n");
    assert_eq!(copy_from(&dockerfile, 0, 0), "nginx:1.25");
    assert!(dockerfile.target_stage().dependencies().is_empty());
}

#[test]
fn test_forward_reference_rejected() {
    let err = parse_err("FROM alpine\nCOPY --from=next /a /a\nFROM alpine AS next\n", "");
    assert!(matches!(
        err,
        StagefileError::StageCycle {
            stage: 0,
            reference: 1
        }
    ));
}

#[test]
fn test_self_reference_rejected() {
    let err = parse_err("FROM alpine\nFROM alpine AS me\nCOPY --from=me /a /a\n", "");
    assert!(matches!(
        err,
        StagefileError::StageCycle {
            stage: 1,
            reference: 1
        }
    ));
}

#[test]
fn test_out_of_range_reference_rejected() {
    let err = parse_err("FROM alpine\nCOPY --from=3 /a /a\n", "");
    assert!(matches!(err, StagefileError::StageOutOfRange { reference: 3, .. }));
}

#[test]
fn test_mount_from_resolution() {
    let dockerfile = parse(
        "FROM node AS deps\nRUN npm ci\nFROM node\nRUN --mount=type=bind,from=deps,source=/node_modules,target=/app/node_modules npm test\n",
    );
    let Instruction::Run { mounts, .. } = &dockerfile.stages()[1].instructions()[0] else {
        panic!("Expected RUN instruction");
    };
    assert_eq!(mounts[0].from, "0");
    assert!(dockerfile.stages()[1].dependencies().contains(&0));
}

#[test]
fn test_from_earlier_stage_dependency() {
    let dockerfile = parse("FROM alpine AS build\nRUN make\nFROM build AS final\nRUN make install\n");
    let last = dockerfile.target_stage();
    assert_eq!(last.base_name(), "0");
    assert!(last.dependencies().contains(&0));
}

#[test]
fn test_meta_args_are_not_stages() {
    let dockerfile = parse("ARG BASE=alpine\nFROM ${BASE}\nRUN true\n");
    assert_eq!(dockerfile.stages().len(), 1);
    assert_eq!(dockerfile.meta_args().len(), 1);
    assert_eq!(dockerfile.meta_args()[0].key, "BASE");
}

#[test]
fn test_build_args_are_carried() {
    let options = DockerfileOptions {
        target: String::new(),
        build_args: vec![BuildArg::new("VERSION", Some("2".to_string()))],
    };
    let dockerfile = parse_dockerfile(b"FROM alpine\n", options).unwrap();
    assert_eq!(dockerfile.options().build_arg("VERSION"), Some("2"));
}

#[test]
fn test_syntax_error_reports_line() {
    let err = parse_dockerfile(b"FROM alpine\nRUN true\nCOPY onlyone\n", DockerfileOptions::default())
        .unwrap_err();
    assert!(matches!(err, StagefileError::Syntax { line: 3, .. }));
}

#[test]
fn test_instruction_error_reports_line() {
    let err = parse_dockerfile(b"FROM alpine\nCOPY --frm=x /a /b\n", DockerfileOptions::default())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "parsing instructions tree: line 2: unknown flag: --frm"
    );
}

#[test]
fn test_flag_on_flagless_keyword_rejected() {
    let err = parse_dockerfile(b"FROM alpine\nWORKDIR --foo /x\n", DockerfileOptions::default())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "parsing instructions tree: line 2: unknown flag: --foo"
    );
}

#[test]
fn test_unknown_keyword_with_stray_quote_is_skipped() {
    let dockerfile = parse("FROM alpine\nFROBNICATE it's\nRUN true\n");
    let instructions = dockerfile.stages()[0].instructions();
    assert_eq!(instructions.len(), 1);
    assert!(matches!(instructions[0], Instruction::Run { .. }));
}

#[test]
fn test_serializes_to_json() {
    let dockerfile = parse("FROM alpine AS build\nWORKDIR /src\nFROM scratch\nCOPY --from=build /src /src\n");
    let json = serde_json::to_value(&dockerfile).unwrap();
    assert_eq!(json["target_index"], 1);
    assert_eq!(json["stages"][0]["name"], "build");
    assert_eq!(json["stages"][1]["instructions"][0]["kind"], "copy");
    assert_eq!(json["stages"][1]["instructions"][0]["from"], "0");
    assert_eq!(json["stages"][1]["dependencies"][0], 0);
}
