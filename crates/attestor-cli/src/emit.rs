//! Gate and write generated documents.

use std::io::Write;
use std::path::{Path, PathBuf};

use attestor_statement::{Predicate, Statement};
use attestor_verify::schema_store::SchemaSource;
use clap::Args;
use color_eyre::eyre::{Result, WrapErr};
use serde::Serialize;

use crate::config::Config;

/// Output flags shared by the attestation-building commands.
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Write the document to a file instead of stdout.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Emit only the predicate, not the full statement.
    #[arg(long)]
    pub predicate_only: bool,

    /// Do not validate against the JSON Schema before writing.
    #[arg(long)]
    pub skip_validation: bool,
}

/// Serialize a statement (or its predicate), gate it on `schema`, and write it.
pub fn emit<P>(stmt: &Statement<P>, schema: &str, args: &OutputArgs, config: &Config) -> Result<()>
where
    P: Predicate + Serialize,
{
    let bytes = if args.predicate_only {
        stmt.predicate_json_pretty()?
    } else {
        stmt.to_json_pretty()?
    };

    if args.skip_validation {
        tracing::warn!(schema, "schema validation skipped");
        if !args.predicate_only {
            stmt.check_envelope()?;
        }
    } else {
        config.schemas.source().gate(schema)?.validate(&bytes)?;
    }

    write_output(&bytes, args.output.as_deref())
}

/// Write bytes to `output`, or to stdout with a trailing newline.
pub fn write_output(bytes: &[u8], output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, bytes)
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "document written");
    } else {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(bytes)?;
        stdout.write_all(b"\n")?;
    }
    Ok(())
}
