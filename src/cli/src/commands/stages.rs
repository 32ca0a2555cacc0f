//! `stagefile stages` command.

use clap::Args;
use comfy_table::Table;
use stagefile_frontend::Dockerfile;

use super::InputArgs;
use crate::output;

#[derive(Args)]
pub struct StagesArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Only show stage names (index when unnamed), one per line
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(args: StagesArgs) -> Result<(), Box<dyn std::error::Error>> {
    let dockerfile = args.input.load()?;

    if args.quiet {
        for stage in dockerfile.stages() {
            println!("{}", stage.display_name());
        }
        return Ok(());
    }

    println!("{}", stages_table(&dockerfile));
    Ok(())
}

fn stages_table(dockerfile: &Dockerfile) -> Table {
    let mut table = output::new_table(&[
        "INDEX",
        "NAME",
        "BASE",
        "PLATFORM",
        "INSTRUCTIONS",
        "DEPENDS ON",
        "TARGET",
    ]);

    for stage in dockerfile.stages() {
        let target = if stage.index() == dockerfile.target_index() {
            "*"
        } else {
            ""
        };
        table.add_row(vec![
            stage.index().to_string(),
            output::or_dash(stage.name()),
            stage.base_name().to_string(),
            output::or_dash(stage.platform()),
            stage.instructions().len().to_string(),
            output::format_indices(stage.dependencies()),
            target.to_string(),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagefile_core::DockerfileOptions;
    use stagefile_frontend::parse_dockerfile;

    #[test]
    fn test_stages_table_rows() {
        let dockerfile = parse_dockerfile(
            b"FROM --platform=linux/arm64 golang AS build\nRUN go build\nFROM scratch\nCOPY --from=build /app /app\nCMD [\"/app\"]\n",
            DockerfileOptions::default(),
        )
        .unwrap();

        let table = stages_table(&dockerfile);
        assert_eq!(table.row_iter().count(), 2);

        let rendered = table.to_string();
        assert!(rendered.contains("DEPENDS ON"));
        assert!(rendered.contains("linux/arm64"));
        assert!(rendered.contains("scratch"));
        assert!(rendered.contains('*'));
    }
}
