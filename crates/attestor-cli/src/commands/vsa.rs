//! The `attestor vsa` subcommands.
//!
//! `generate` emits a Verification Summary Attestation; `verify` checks one
//! against a required SLSA build level.

use std::path::PathBuf;
use std::process;

use attestor_statement::vsa::{self, VerificationResult, VsaOptions, VsaVariant};
use attestor_verify::policy::VerificationPolicy;
use attestor_verify::schema_store;
use attestor_verify::verify::{Verifier, VerifyConfig};
use chrono::Utc;
use clap::{Args, Subcommand};
use color_eyre::eyre::Result;

use crate::config::Config;
use crate::emit::{self, OutputArgs};

/// Arguments for `attestor vsa`.
#[derive(Args)]
pub struct VsaArgs {
    #[command(subcommand)]
    pub command: VsaCommand,
}

/// VSA operations.
#[derive(Subcommand)]
pub enum VsaCommand {
    /// Generate a VSA for an artifact.
    Generate(GenerateArgs),
    /// Verify a VSA against a required build level.
    Verify(VerifyArgs),
}

/// Arguments for `attestor vsa generate`.
#[derive(Args)]
pub struct GenerateArgs {
    /// Subject name.
    #[arg(long, value_name = "NAME")]
    pub name: String,

    /// Subject digest, `sha256:<hex>` or bare hex.
    #[arg(long, value_name = "DIGEST")]
    pub digest: String,

    /// Verifier identity.
    #[arg(long, value_name = "ID")]
    pub verifier: String,

    /// Overall verification result.
    #[arg(long, value_name = "RESULT", default_value = "PASSED")]
    pub result: VerificationResult,

    /// Verified level tags, comma separated (e.g. `SLSA_BUILD_LEVEL_3`).
    #[arg(long, value_name = "TAGS", value_delimiter = ',', required = true)]
    pub levels: Vec<String>,

    /// Resource URI; defaults to the subject name.
    #[arg(long, value_name = "URI")]
    pub uri: Option<String>,

    /// SLSA specification version.
    #[arg(long, value_name = "VERSION")]
    pub slsa: Option<String>,

    /// Record the result as an SLSA policy evaluation instead of
    /// `verificationResult`.
    #[arg(long)]
    pub policy_aware: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for `attestor vsa verify`.
#[derive(Args)]
pub struct VerifyArgs {
    /// Path to the VSA statement JSON file.
    #[arg(long, value_name = "PATH")]
    pub vsa: PathBuf,

    /// Required SLSA build level (0 to 3).
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub level: Option<i64>,

    /// Trusted verifier ID (repeatable).
    #[arg(long = "trusted-verifier", value_name = "ID")]
    pub trusted_verifiers: Vec<String>,

    /// JSON policy file with `minimum_level` and `trusted_verifiers`.
    #[arg(long, value_name = "PATH")]
    pub policy: Option<PathBuf>,

    /// Re-hash subjects against files under this directory.
    #[arg(long, value_name = "PATH")]
    pub base_dir: Option<PathBuf>,

    /// Output results as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute a vsa subcommand.
pub fn execute(args: VsaArgs, config: &Config) -> Result<()> {
    match args.command {
        VsaCommand::Generate(args) => generate(args, config),
        VsaCommand::Verify(args) => verify(&args, config),
    }
}

fn generate(args: GenerateArgs, config: &Config) -> Result<()> {
    let variant = if args.policy_aware {
        VsaVariant::PolicyAware
    } else {
        VsaVariant::Summary
    };
    let stmt = vsa::generate(VsaOptions {
        subject_name: args.name,
        subject_digest: args.digest,
        verifier_id: args.verifier,
        result: args.result,
        levels: args.levels,
        resource_uri: args.uri,
        slsa_version: args.slsa,
        time_verified: Utc::now(),
        variant,
        dependency_levels: None,
    })?;
    emit::emit(&stmt, schema_store::VERIFICATION_SUMMARY, &args.output, config)
}

/// Config file, then policy file, then flags.
fn verify_config(args: &VerifyArgs, config: &Config) -> Result<VerifyConfig> {
    let mut verify_config = VerifyConfig {
        check_files_base: args.base_dir.clone(),
        ..VerifyConfig::default()
    };
    verify_config.apply_policy(&VerificationPolicy {
        minimum_level: config.vsa.minimum_level,
        trusted_verifiers: config.vsa.trusted_verifiers.clone(),
    });
    if let Some(path) = &args.policy {
        verify_config.apply_policy(&VerificationPolicy::from_file(path)?);
    }
    if let Some(level) = args.level {
        verify_config.expected_level = level;
    }
    if !args.trusted_verifiers.is_empty() {
        verify_config.trusted_verifiers = Some(args.trusted_verifiers.clone());
    }
    Ok(verify_config)
}

fn verify(args: &VerifyArgs, config: &Config) -> Result<()> {
    let verifier = Verifier::new(verify_config(args, config)?);
    let report = verifier.verify_file(&args.vsa)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    } else {
        for outcome in &report.outcomes {
            println!("[{}] {}", outcome.label(), outcome.message());
        }

        println!();
        if report.passed {
            match report.achieved_level {
                Some(level) => println!("Verification PASSED (SLSA build level L{level})"),
                None => println!("Verification PASSED"),
            }
        } else {
            println!("Verification FAILED");
        }
    }

    if !report.passed {
        process::exit(1);
    }

    Ok(())
}
