//! Stage name resolution.
//!
//! Rewrites symbolic stage references into decimal stage indices so the
//! dependency graph only deals with numbers.

use std::collections::HashMap;

use crate::instruction::Instruction;
use crate::stage::Stage;

/// Map lower-cased stage names to their indices.
///
/// A stage whose lower-cased name equals its own decimal index gets no entry.
/// When names repeat, the later stage wins.
pub fn stage_name_to_index(stages: &[Stage]) -> HashMap<String, usize> {
    let mut names = HashMap::new();
    for stage in stages {
        insert_name(&mut names, stage);
    }
    names
}

/// Rewrite stage references to decimal indices.
///
/// `COPY --from` and mount `from` values are matched against every named
/// stage. A stage's base image is matched only against earlier stages.
/// Unmatched references are left untouched.
pub fn resolve_stage_references(stages: &mut [Stage]) {
    let names = stage_name_to_index(stages);

    let mut earlier: HashMap<String, usize> = HashMap::new();
    for stage in stages.iter_mut() {
        if let Some(&index) = earlier.get(&stage.base_name.to_lowercase()) {
            tracing::debug!(
                stage = stage.index,
                base = %stage.base_name,
                resolved = index,
                "Resolved base stage"
            );
            stage.base_name = index.to_string();
        }
        insert_name(&mut earlier, stage);

        for instruction in &mut stage.instructions {
            match instruction {
                Instruction::Copy { from, .. } => resolve_reference(from, &names),
                Instruction::Run { mounts, .. } => {
                    for mount in mounts {
                        resolve_reference(&mut mount.from, &names);
                    }
                }
                _ => {}
            }
        }
    }
}

fn insert_name(names: &mut HashMap<String, usize>, stage: &Stage) {
    let Some(name) = stage.name.as_deref().filter(|name| !name.is_empty()) else {
        return;
    };
    let key = name.to_lowercase();
    if key != stage.index.to_string() {
        names.insert(key, stage.index);
    }
}

fn resolve_reference(reference: &mut String, names: &HashMap<String, usize>) {
    if reference.is_empty() {
        return;
    }
    if let Some(&index) = names.get(&reference.to_lowercase()) {
        *reference = index.to_string();
    }
}
