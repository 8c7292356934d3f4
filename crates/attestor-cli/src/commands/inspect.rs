//! The `attestor inspect` subcommand.
//!
//! Displays a statement in human-readable format.

use std::path::PathBuf;

use attestor_verify::inspect;
use clap::Args;
use color_eyre::eyre::Result;

/// Arguments for `attestor inspect`.
#[derive(Args)]
pub struct InspectArgs {
    /// Path to the statement JSON file.
    pub document: PathBuf,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the inspect command.
pub fn execute(args: &InspectArgs) -> Result<()> {
    let bytes = std::fs::read(&args.document)?;
    let summary = inspect::summarize(&bytes)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", inspect::format_summary(&summary));
    }

    Ok(())
}
