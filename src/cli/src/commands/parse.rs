//! `stagefile parse` command.

use clap::Args;
use stagefile_frontend::Dockerfile;

use super::InputArgs;

#[derive(Args)]
pub struct ParseArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Print compact single-line JSON
    #[arg(long)]
    pub compact: bool,
}

pub async fn execute(args: ParseArgs) -> Result<(), Box<dyn std::error::Error>> {
    let dockerfile = args.input.load()?;
    println!("{}", render(&dockerfile, args.compact)?);
    Ok(())
}

fn render(dockerfile: &Dockerfile, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(dockerfile)
    } else {
        serde_json::to_string_pretty(dockerfile)
    }
}
