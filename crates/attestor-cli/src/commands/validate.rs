//! The `attestor validate` subcommand.
//!
//! Gates a document on its JSON Schema. Verification summaries are also run
//! through the build level check at L1.

use std::path::PathBuf;

use attestor_statement::vsa as vsa_predicate;
use attestor_verify::schema::{self, SchemaGate};
use attestor_verify::schema_store::{self, SchemaSource};
use attestor_verify::vsa;
use clap::Args;
use color_eyre::eyre::{Result, WrapErr, eyre};
use serde_json::Value;

use crate::config::Config;

/// Level a VSA must reach to count as valid.
const MINIMUM_VALID_LEVEL: i64 = 1;

/// Arguments for `attestor validate`.
#[derive(Args)]
pub struct ValidateArgs {
    /// Statement or predicate JSON file.
    pub document: PathBuf,

    /// Schema name (e.g. `metadata.json`); picked from the predicate type
    /// when omitted.
    #[arg(long, value_name = "NAME", conflicts_with = "schema_file")]
    pub schema: Option<String>,

    /// Validate against this schema file instead of a named schema.
    #[arg(long, value_name = "PATH")]
    pub schema_file: Option<PathBuf>,
}

/// Execute the validate command.
pub fn execute(args: &ValidateArgs, config: &Config) -> Result<()> {
    let bytes = std::fs::read(&args.document)
        .wrap_err_with(|| format!("failed to read {}", args.document.display()))?;
    let doc: Value = serde_json::from_slice(&bytes)
        .wrap_err_with(|| format!("{} is not valid JSON", args.document.display()))?;
    let predicate_type = doc.get("predicateType").and_then(Value::as_str);

    let gate = if let Some(path) = &args.schema_file {
        let schema_bytes = std::fs::read(path)
            .wrap_err_with(|| format!("failed to read schema {}", path.display()))?;
        SchemaGate::from_slice(path.display().to_string(), &schema_bytes)?
    } else {
        let name = match (&args.schema, predicate_type) {
            (Some(name), _) => name.clone(),
            (None, Some(predicate_type)) => {
                schema_store::schema_for_predicate_type(predicate_type)
                    .ok_or_else(|| {
                        eyre!("no schema known for predicate type {predicate_type}; pass --schema")
                    })?
                    .to_owned()
            }
            (None, None) => return Err(eyre!("document has no predicateType; pass --schema")),
        };
        config.schemas.source().gate(&name)?
    };

    gate.validate_value(&doc)?;

    if predicate_type == Some(vsa_predicate::PREDICATE_TYPE) && schema::is_statement(&doc) {
        let level = vsa::verify_bytes(&bytes, MINIMUM_VALID_LEVEL)?;
        tracing::info!(level, "verification summary meets the minimum build level");
    }

    println!("{}: valid ({})", args.document.display(), gate.name());
    Ok(())
}
