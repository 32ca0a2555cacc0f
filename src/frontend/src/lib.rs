//! Stagefile Frontend
//!
//! Turns multi-stage Dockerfile text into a resolved [`Dockerfile`]:
//! stages with typed instructions, symbolic stage references rewritten to
//! indices, per-stage dependency sets and a selected target stage.
//!
//! The frontend performs no I/O and is a pure function of its input.

pub mod dockerfile;
pub mod graph;
pub mod instruction;
pub mod resolve;
pub mod stage;
pub mod syntax;
pub mod target;

pub use dockerfile::{parse_dockerfile, Dockerfile, DockerfileId};
pub use instruction::{
    classify, ArgDefinition, HealthConfig, Instruction, Mount, MountType, NetworkMode,
    SecurityMode,
};
pub use stage::Stage;
