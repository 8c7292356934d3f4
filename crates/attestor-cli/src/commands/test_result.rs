//! The `attestor test-result` subcommand.

use std::path::PathBuf;

use attestor_statement::test_result;
use attestor_verify::schema_store;
use clap::Args;
use color_eyre::eyre::Result;

use crate::config::Config;
use crate::emit::{self, OutputArgs};
use crate::subject::SubjectArgs;

/// Arguments for `attestor test-result`.
#[derive(Args)]
pub struct TestResultArgs {
    /// Scanner report (grype JSON or `CycloneDX` JSON).
    #[arg(long, value_name = "PATH")]
    pub results_path: PathBuf,

    #[command(flatten)]
    pub subject: SubjectArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Execute the test-result command.
pub fn execute(args: &TestResultArgs, config: &Config) -> Result<()> {
    let scan = attestor_scan::normalize_file(&args.results_path)?;
    let stmt = test_result::build(&scan, args.subject.subject()?);
    tracing::info!(result = %stmt.predicate.result, "built test-result attestation");
    emit::emit(&stmt, schema_store::TEST_RESULT, &args.output, config)
}
