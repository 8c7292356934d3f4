//! The `attestor metadata` subcommand.
//!
//! Builds an artifact metadata attestation from the GitHub Actions
//! environment.

use attestor_statement::metadata::{self, MetadataOptions};
use attestor_verify::schema_store;
use chrono::Utc;
use clap::Args;
use color_eyre::eyre::Result;

use crate::config::Config;
use crate::context::CiEnv;
use crate::emit::{self, OutputArgs};
use crate::subject::SubjectArgs;

/// Arguments for `attestor metadata`.
#[derive(Args)]
pub struct MetadataArgs {
    #[command(flatten)]
    pub subject: SubjectArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Execute the metadata command.
pub fn execute(args: &MetadataArgs, config: &Config) -> Result<()> {
    let ctx = CiEnv::from_process().build_context()?;
    let artifact = args.subject.artifact()?;
    let now = Utc::now();

    let opts = MetadataOptions {
        compliance: config.compliance.resolve(&ctx.server_url, &ctx.owner),
        permissions: config.permissions.for_type(artifact.artifact_type),
        created: now,
        completed_at: now,
        artifact,
    };
    let subjects = opts.artifact.subject().into_iter().collect();
    let stmt = metadata::statement(&ctx, &opts, subjects)?;
    tracing::info!(
        artifact_type = %stmt.predicate.artifact.artifact_type,
        version = %stmt.predicate.artifact.version,
        "built metadata attestation"
    );

    emit::emit(&stmt, schema_store::METADATA, &args.output, config)
}
