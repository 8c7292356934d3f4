//! JSON Schema gate for generated attestations.
//!
//! Schemas in circulation come in two scopes: some describe the whole
//! in-toto statement (their root `properties` has a `predicate` key), others
//! describe only the predicate. Documents come in two shapes as well: a full
//! statement, or a bare predicate. The gate pairs them as follows:
//!
//! | schema \ document | statement          | bare predicate           |
//! |-------------------|--------------------|--------------------------|
//! | statement-scoped  | whole document     | `predicate` sub-schema   |
//! | predicate-scoped  | `predicate` member | whole document           |

use serde_json::Value;

use crate::error::VerificationError;

/// What a schema document describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaScope {
    /// The whole statement.
    Statement,
    /// The predicate only.
    Predicate,
}

impl SchemaScope {
    /// A schema whose root `properties` names `predicate` is statement-scoped.
    pub fn detect(schema: &Value) -> Self {
        if schema
            .get("properties")
            .and_then(|p| p.get("predicate"))
            .is_some_and(Value::is_object)
        {
            Self::Statement
        } else {
            Self::Predicate
        }
    }
}

/// Whether a document is a full statement rather than a bare predicate.
pub fn is_statement(doc: &Value) -> bool {
    doc.as_object().is_some_and(|obj| {
        obj.contains_key("predicate")
            && (obj.contains_key("_type") || obj.contains_key("predicateType"))
    })
}

/// The `predicate` sub-schema of a statement-scoped schema, with the root's
/// `definitions` and `$defs` carried along so local `$ref`s still resolve.
fn predicate_subschema(schema: &Value) -> Option<Value> {
    let mut sub = schema.get("properties")?.get("predicate")?.as_object()?.clone();
    for key in ["definitions", "$defs", "$schema"] {
        if let Some(value) = schema.get(key) {
            sub.entry(key.to_owned()).or_insert_with(|| value.clone());
        }
    }
    Some(Value::Object(sub))
}

/// A named schema ready to validate documents.
#[derive(Debug, Clone)]
pub struct SchemaGate {
    name: String,
    schema: Value,
}

impl SchemaGate {
    /// Wrap a schema document.
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// Parse a schema from bytes.
    pub fn from_slice(name: impl Into<String>, bytes: &[u8]) -> Result<Self, VerificationError> {
        let name = name.into();
        let schema = serde_json::from_slice(bytes).map_err(|e| VerificationError::InvalidSchema {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { name, schema })
    }

    /// Schema name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How the schema is scoped.
    pub fn scope(&self) -> SchemaScope {
        SchemaScope::detect(&self.schema)
    }

    /// Validate document bytes, collecting every violation.
    pub fn validate(&self, bytes: &[u8]) -> Result<(), VerificationError> {
        let doc: Value = serde_json::from_slice(bytes).map_err(|e| {
            VerificationError::MalformedInput(format!("document is not valid JSON: {e}"))
        })?;
        self.validate_value(&doc)
    }

    /// Validate a parsed document, collecting every violation.
    pub fn validate_value(&self, doc: &Value) -> Result<(), VerificationError> {
        let scope = self.scope();
        let statement = is_statement(doc);

        let (schema, instance) = match (scope, statement) {
            (SchemaScope::Statement, true) | (SchemaScope::Predicate, false) => {
                (self.schema.clone(), doc)
            }
            (SchemaScope::Statement, false) => {
                let sub = predicate_subschema(&self.schema).ok_or_else(|| {
                    VerificationError::InvalidSchema {
                        name: self.name.clone(),
                        reason: "predicate sub-schema is not an object".to_owned(),
                    }
                })?;
                (sub, doc)
            }
            (SchemaScope::Predicate, true) => {
                let predicate = doc.get("predicate").unwrap_or(&Value::Null);
                (self.schema.clone(), predicate)
            }
        };
        tracing::debug!(schema = %self.name, ?scope, statement, "validating document");

        let validator =
            jsonschema::draft7::new(&schema).map_err(|e| VerificationError::InvalidSchema {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;

        let errors: Vec<String> = validator
            .iter_errors(instance)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect();

        if errors.is_empty() {
            tracing::info!(schema = %self.name, "schema validation passed");
            Ok(())
        } else {
            tracing::warn!(schema = %self.name, violations = errors.len(), "schema validation failed");
            Err(VerificationError::ValidationFailed(errors))
        }
    }
}
