//! Named schema lookup.
//!
//! Schemas are compiled into the binary and can be overridden from a local
//! directory. Names are bare file names ending in `.json`.

use std::path::{Path, PathBuf};

use attestor_statement::{depscan, metadata, test_result, vsa};
use serde_json::Value;

use crate::error::VerificationError;
use crate::schema::SchemaGate;

/// Metadata predicate schema.
pub const METADATA: &str = "metadata.json";
/// Dependency-scan statement schema.
pub const DEPENDENCY_SCAN: &str = "dependency-scan.json";
/// VSA statement schema.
pub const VERIFICATION_SUMMARY: &str = "verification-summary.json";
/// Test-result predicate schema.
pub const TEST_RESULT: &str = "test-result.json";

const EMBEDDED: &[(&str, &str)] = &[
    (METADATA, include_str!("../schemas/metadata.json")),
    (DEPENDENCY_SCAN, include_str!("../schemas/dependency-scan.json")),
    (VERIFICATION_SUMMARY, include_str!("../schemas/verification-summary.json")),
    (TEST_RESULT, include_str!("../schemas/test-result.json")),
];

/// The schema name for a predicate type URI.
pub fn schema_for_predicate_type(predicate_type: &str) -> Option<&'static str> {
    match predicate_type {
        metadata::PREDICATE_TYPE => Some(METADATA),
        depscan::PREDICATE_TYPE => Some(DEPENDENCY_SCAN),
        vsa::PREDICATE_TYPE => Some(VERIFICATION_SUMMARY),
        test_result::PREDICATE_TYPE => Some(TEST_RESULT),
        _ => None,
    }
}

/// Reject names that could escape a schema directory.
pub fn check_schema_name(name: &str) -> Result<(), VerificationError> {
    let reason = if !name.ends_with(".json") {
        "schema name must end with .json"
    } else if name.contains("..") {
        "schema name cannot contain path traversal"
    } else if name.contains('/') || name.contains('\\') {
        "schema name cannot contain path separators"
    } else {
        return Ok(());
    };
    Err(VerificationError::InvalidSchema {
        name: name.to_owned(),
        reason: reason.to_owned(),
    })
}

/// A place schemas can be loaded from.
pub trait SchemaSource {
    /// Load the schema document with the given name.
    fn load(&self, name: &str) -> Result<Value, VerificationError>;

    /// Load a schema and wrap it in a gate.
    fn gate(&self, name: &str) -> Result<SchemaGate, VerificationError> {
        Ok(SchemaGate::new(name, self.load(name)?))
    }
}

/// Schemas compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedSchemas;

impl SchemaSource for EmbeddedSchemas {
    fn load(&self, name: &str) -> Result<Value, VerificationError> {
        check_schema_name(name)?;
        let (_, text) = EMBEDDED
            .iter()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| VerificationError::SchemaNotFound(name.to_owned()))?;
        serde_json::from_str(text).map_err(|e| VerificationError::InvalidSchema {
            name: name.to_owned(),
            reason: e.to_string(),
        })
    }
}

/// Schemas read from a local directory.
#[derive(Debug, Clone)]
pub struct DirectorySchemas {
    dir: PathBuf,
}

impl DirectorySchemas {
    /// Read schemas from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The backing directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SchemaSource for DirectorySchemas {
    fn load(&self, name: &str) -> Result<Value, VerificationError> {
        check_schema_name(name)?;
        let path = self.dir.join(name);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VerificationError::SchemaNotFound(name.to_owned()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| VerificationError::InvalidSchema {
            name: name.to_owned(),
            reason: e.to_string(),
        })
    }
}

/// An optional directory layer over the embedded schemas.
#[derive(Debug, Clone, Default)]
pub struct LayeredSchemas {
    directory: Option<DirectorySchemas>,
}

impl LayeredSchemas {
    /// Embedded schemas, overridden from `dir` when given.
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            directory: dir.map(DirectorySchemas::new),
        }
    }
}

impl SchemaSource for LayeredSchemas {
    fn load(&self, name: &str) -> Result<Value, VerificationError> {
        check_schema_name(name)?;
        if let Some(directory) = &self.directory {
            match directory.load(name) {
                Ok(schema) => {
                    tracing::debug!(schema = name, dir = %directory.dir().display(), "loaded local schema");
                    return Ok(schema);
                }
                Err(e) => {
                    tracing::warn!(
                        schema = name,
                        dir = %directory.dir().display(),
                        error = %e,
                        "local schema unavailable, falling back to embedded"
                    );
                }
            }
        }
        EmbeddedSchemas.load(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_schemas_parse() {
        for (name, _) in EMBEDDED {
            let schema = EmbeddedSchemas.load(name).expect("embedded schema parses");
            assert!(schema.is_object(), "{name}");
        }
    }

    #[test]
    fn predicate_types_map_to_schemas() {
        assert_eq!(
            schema_for_predicate_type("https://slsa.dev/verification_summary/v1"),
            Some(VERIFICATION_SUMMARY)
        );
        assert_eq!(
            schema_for_predicate_type("https://in-toto.io/attestation/vulns/v0.2"),
            Some(DEPENDENCY_SCAN)
        );
        assert_eq!(schema_for_predicate_type("https://example.com/x"), None);
    }

    #[test]
    fn rejects_unsafe_names() {
        for bad in ["metadata", "../metadata.json", "a/metadata.json", "..json"] {
            assert!(
                matches!(check_schema_name(bad), Err(VerificationError::InvalidSchema { .. })),
                "{bad}"
            );
        }
        check_schema_name("metadata.json").unwrap();
    }

    #[test]
    fn unknown_embedded_schema() {
        assert!(matches!(
            EmbeddedSchemas.load("nope.json"),
            Err(VerificationError::SchemaNotFound(_))
        ));
    }

    #[test]
    fn directory_overrides_embedded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(METADATA), r#"{"title": "local"}"#).unwrap();
        let layered = LayeredSchemas::new(Some(dir.path().to_path_buf()));
        assert_eq!(layered.load(METADATA).unwrap()["title"], "local");
    }

    #[test]
    fn directory_miss_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let layered = LayeredSchemas::new(Some(dir.path().to_path_buf()));
        let schema = layered.load(DEPENDENCY_SCAN).unwrap();
        assert_eq!(schema["title"], "Dependency vulnerability scan attestation");
    }

    #[test]
    fn broken_local_schema_is_reported_directly() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("custom.json"), "{").unwrap();
        assert!(matches!(
            DirectorySchemas::new(dir.path()).load("custom.json"),
            Err(VerificationError::InvalidSchema { .. })
        ));
    }
}
