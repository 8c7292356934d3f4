//! JSON verification policy files.
//!
//! All fields are `Option`. An absent rule leaves the caller's setting alone.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::VerificationError;

/// Rules a VSA must satisfy, loadable from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerificationPolicy {
    /// Lowest acceptable SLSA build level.
    pub minimum_level: Option<i64>,
    /// Verifier IDs whose VSAs are accepted.
    pub trusted_verifiers: Option<Vec<String>>,
}

impl VerificationPolicy {
    /// Load a policy from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, VerificationError> {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(VerificationError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_partial_policy() {
        let tmp = tempfile::NamedTempFile::new().expect("tempfile");
        std::fs::write(tmp.path(), r#"{"trusted_verifiers": ["https://verifier.example"]}"#)
            .expect("write");
        let policy = VerificationPolicy::from_file(tmp.path()).unwrap();
        assert_eq!(policy.minimum_level, None);
        assert_eq!(
            policy.trusted_verifiers.as_deref(),
            Some(&["https://verifier.example".to_owned()][..])
        );
    }

    #[test]
    fn rejects_unknown_rules() {
        let tmp = tempfile::NamedTempFile::new().expect("tempfile");
        std::fs::write(tmp.path(), r#"{"minimum_levle": 2}"#).expect("write");
        assert!(matches!(
            VerificationPolicy::from_file(tmp.path()),
            Err(VerificationError::JsonError(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            VerificationPolicy::from_file(Path::new("/nonexistent/policy.json")),
            Err(VerificationError::IoError(_))
        ));
    }
}
