//! The `attestor depscan` subcommand.
//!
//! Normalizes a grype or `CycloneDX` report into a dependency-scan
//! attestation.

use std::path::PathBuf;

use attestor_statement::depscan::{self, ScanWindow};
use attestor_statement::statement::rfc3339;
use attestor_verify::schema_store;
use chrono::Utc;
use clap::Args;
use color_eyre::eyre::Result;

use crate::config::{Config, TimestampSource};
use crate::emit::{self, OutputArgs};
use crate::subject::SubjectArgs;

/// Arguments for `attestor depscan`.
#[derive(Args)]
pub struct DepscanArgs {
    /// Scanner report (grype JSON or `CycloneDX` JSON).
    #[arg(long, value_name = "PATH")]
    pub results_path: PathBuf,

    #[command(flatten)]
    pub subject: SubjectArgs,

    /// Scan window source; overrides `[depscan] timestamps`.
    #[arg(long, value_enum)]
    pub timestamps: Option<TimestampSource>,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Execute the depscan command.
pub fn execute(args: &DepscanArgs, config: &Config) -> Result<()> {
    let scan = attestor_scan::normalize_file(&args.results_path)?;
    let subject = args.subject.subject()?;

    let window = match args.timestamps.unwrap_or(config.depscan.timestamps) {
        TimestampSource::Report => ScanWindow::Report,
        TimestampSource::Now => {
            let now = rfc3339(Utc::now());
            ScanWindow::Explicit {
                started: now.clone(),
                finished: now,
            }
        }
    };

    let stmt = depscan::build(&scan, subject, &window);
    if !stmt.predicate.scan_window_is_ordered() {
        tracing::warn!(
            started = %stmt.predicate.metadata.scan_started_on,
            finished = ?stmt.predicate.metadata.scan_finished_on,
            "scan window ends before it starts"
        );
    }

    emit::emit(&stmt, schema_store::DEPENDENCY_SCAN, &args.output, config)
}
