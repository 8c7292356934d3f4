//! Attestor CLI: in-toto attestations for CI build artifacts.
//!
//! Build metadata, dependency-scan, test-result, and verification summary
//! attestations, gate them on their schemas, and verify SLSA build levels.

mod commands;
#[expect(
    unreachable_pub,
    reason = "binary crate, pub inside a private module is fine"
)]
mod config;
#[expect(
    unreachable_pub,
    reason = "binary crate, pub inside a private module is fine"
)]
mod context;
#[expect(
    unreachable_pub,
    reason = "binary crate, pub inside a private module is fine"
)]
mod emit;
#[expect(
    unreachable_pub,
    reason = "binary crate, pub inside a private module is fine"
)]
mod subject;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;

/// Attestor: build, gate, and verify in-toto attestations.
///
/// Documents go to stdout (or `--output`); logs go to stderr.
#[derive(Parser)]
#[command(name = "attestor", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (repeat for more detail: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output logs as JSON (for machine consumption).
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file (defaults to the user config directory).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Build an artifact metadata attestation from the CI environment.
    Metadata(commands::metadata::MetadataArgs),
    /// Build a dependency vulnerability scan attestation from a scanner report.
    Depscan(commands::depscan::DepscanArgs),
    /// Build a test-result attestation from a scanner report.
    TestResult(commands::test_result::TestResultArgs),
    /// Generate or verify SLSA Verification Summary Attestations.
    Vsa(commands::vsa::VsaArgs),
    /// Validate a document against its JSON Schema.
    Validate(commands::validate::ValidateArgs),
    /// Display a statement in human-readable format.
    Inspect(commands::inspect::InspectArgs),
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = config::Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Metadata(args) => commands::metadata::execute(&args, &config),
        Commands::Depscan(args) => commands::depscan::execute(&args, &config),
        Commands::TestResult(args) => commands::test_result::execute(&args, &config),
        Commands::Vsa(args) => commands::vsa::execute(args, &config),
        Commands::Validate(args) => commands::validate::execute(&args, &config),
        Commands::Inspect(args) => commands::inspect::execute(&args),
    }
}
