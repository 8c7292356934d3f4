//! Top-level verification orchestrator.
//!
//! The `Verifier` runs the VSA build level pipeline, the verifier trust
//! check, and optional subject digest checks into a single
//! `VerificationReport`.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::digest;
use crate::error::VerificationError;
use crate::policy::VerificationPolicy;
use crate::vsa::{self, VsaStatement};

/// Default required build level.
pub const DEFAULT_EXPECTED_LEVEL: i64 = 3;

/// Configuration for a verification run.
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// Required SLSA build level. Values outside L0 to L3 are rejected
    /// before the VSA is read.
    pub expected_level: i64,
    /// Verifier allowlist. `None` skips the trust check.
    pub trusted_verifiers: Option<Vec<String>>,
    /// Base directory for resolving subject file paths.
    pub check_files_base: Option<PathBuf>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            expected_level: DEFAULT_EXPECTED_LEVEL,
            trusted_verifiers: None,
            check_files_base: None,
        }
    }
}

impl VerifyConfig {
    /// Overlay the rules set in a policy file.
    pub fn apply_policy(&mut self, policy: &VerificationPolicy) {
        if let Some(level) = policy.minimum_level {
            self.expected_level = level;
        }
        if let Some(trusted) = &policy.trusted_verifiers {
            self.trusted_verifiers = Some(trusted.clone());
        }
    }
}

/// Outcome of a single verification check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum VerificationOutcome {
    /// The check passed.
    Pass(String),
    /// The check failed.
    Fail(String),
    /// The check was skipped (not enough information).
    Skip(String),
}

impl VerificationOutcome {
    /// Returns `true` if this outcome is a failure.
    pub const fn is_fail(&self) -> bool {
        matches!(self, Self::Fail(_))
    }

    /// Get the message for this outcome.
    pub fn message(&self) -> &str {
        match self {
            Self::Pass(m) | Self::Fail(m) | Self::Skip(m) => m,
        }
    }

    /// Short label for terminal output.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pass(_) => "PASS",
            Self::Fail(_) => "FAIL",
            Self::Skip(_) => "SKIP",
        }
    }
}

/// The result of a full verification run.
#[derive(Debug)]
pub struct VerificationReport {
    /// Individual check outcomes, in the order they ran.
    pub outcomes: Vec<VerificationOutcome>,
    /// Highest build level in the VSA, once it has been read.
    pub achieved_level: Option<u32>,
    /// Overall pass/fail.
    pub passed: bool,
    /// The first failure.
    pub error: Option<VerificationError>,
}

impl VerificationReport {
    /// Machine-readable form of the report.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "passed": self.passed,
            "achievedLevel": self.achieved_level,
            "error": self.error.as_ref().map(|e| serde_json::json!({
                "kind": e.kind(),
                "message": e.to_string(),
            })),
            "outcomes": self.outcomes,
        })
    }
}

#[derive(Default)]
struct Recorder {
    outcomes: Vec<VerificationOutcome>,
    error: Option<VerificationError>,
}

impl Recorder {
    fn pass(&mut self, message: impl Into<String>) {
        self.outcomes.push(VerificationOutcome::Pass(message.into()));
    }

    fn skip(&mut self, message: impl Into<String>) {
        self.outcomes.push(VerificationOutcome::Skip(message.into()));
    }

    fn fail(&mut self, err: VerificationError) {
        self.outcomes
            .push(VerificationOutcome::Fail(format!("{}: {err}", err.kind())));
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn finish(self, achieved_level: Option<u32>) -> VerificationReport {
        let passed = !self.outcomes.iter().any(VerificationOutcome::is_fail);
        VerificationReport {
            outcomes: self.outcomes,
            achieved_level,
            passed,
            error: self.error,
        }
    }
}

/// Orchestrates all verification checks.
pub struct Verifier {
    config: VerifyConfig,
}

impl Verifier {
    /// Create a new verifier with the given configuration.
    pub const fn new(config: VerifyConfig) -> Self {
        Self { config }
    }

    /// Verify raw VSA bytes.
    pub fn verify(&self, bytes: &[u8]) -> VerificationReport {
        let mut rec = Recorder::default();

        let expected = match vsa::expected_level(self.config.expected_level) {
            Ok(level) => level,
            Err(e) => {
                rec.fail(e);
                return rec.finish(None);
            }
        };

        let stmt = match vsa::parse(bytes) {
            Ok(stmt) => stmt,
            Err(e) => {
                rec.fail(e);
                return rec.finish(None);
            }
        };
        rec.pass("statement and predicate types match");

        self.verify_trust(&stmt, &mut rec);

        if let Err(e) = vsa::check_policy(&stmt.predicate) {
            rec.fail(e);
            return rec.finish(None);
        }
        rec.pass("SLSA policy evaluation passed");

        let achieved = match vsa::achieved_level(&stmt.predicate) {
            Ok(level) => level,
            Err(e) => {
                rec.fail(e);
                return rec.finish(None);
            }
        };
        if achieved < expected {
            rec.fail(VerificationError::LevelTooLow { achieved, expected });
            return rec.finish(Some(achieved));
        }
        rec.pass(format!("build level L{achieved} meets required L{expected}"));

        self.verify_digests(&stmt, &mut rec);

        let report = rec.finish(Some(achieved));
        tracing::info!(passed = report.passed, achieved, expected, "VSA verification finished");
        report
    }

    fn verify_trust(&self, stmt: &VsaStatement, rec: &mut Recorder) {
        let Some(trusted) = &self.config.trusted_verifiers else {
            rec.skip("verifier trust check skipped (no allowlist)");
            return;
        };
        match vsa::check_trusted_verifier(&stmt.predicate, trusted) {
            Ok(()) => rec.pass(format!(
                "verifier `{}` is trusted",
                stmt.predicate.verifier.id
            )),
            Err(e) => rec.fail(e),
        }
    }

    fn verify_digests(&self, stmt: &VsaStatement, rec: &mut Recorder) {
        let Some(base_dir) = &self.config.check_files_base else {
            rec.skip("file digest check skipped (no --base-dir)");
            return;
        };
        let results = digest::check_subjects(&stmt.subject, base_dir);
        if results.is_empty() {
            rec.skip("no subjects with a sha256 digest");
            return;
        }
        for (name, result) in results {
            match result {
                Ok(()) => rec.pass(format!("subject digest match: {name}")),
                Err(e) => rec.fail(e),
            }
        }
    }

    /// Load a VSA from a file and verify it.
    pub fn verify_file(&self, path: &Path) -> Result<VerificationReport, VerificationError> {
        let data = std::fs::read(path)?;
        Ok(self.verify(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::sha256_bytes;
    use serde_json::{Value, json};

    fn vsa_with(verifier: &str, levels: &[&str], subject: &str, digest: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "_type": "https://in-toto.io/Statement/v1",
            "subject": [{"name": subject, "digest": {"sha256": digest}}],
            "predicateType": "https://slsa.dev/verification_summary/v1",
            "predicate": {
                "verifier": {"id": verifier},
                "timeVerified": "2024-01-06T14:00:00Z",
                "resourceUri": subject,
                "verificationResult": "PASSED",
                "verifiedLevels": levels,
                "slsaVersion": "1.0"
            }
        }))
        .unwrap()
    }

    fn config(level: i64) -> VerifyConfig {
        VerifyConfig {
            expected_level: level,
            ..Default::default()
        }
    }

    #[test]
    fn passing_vsa() {
        let report = Verifier::new(config(2)).verify(&vsa_with(
            "https://verifier.example",
            &["SLSA_BUILD_LEVEL_3"],
            "app",
            "abc",
        ));
        assert!(report.passed, "report should pass: {report:?}");
        assert_eq!(report.achieved_level, Some(3));
        assert!(report.error.is_none());
    }

    #[test]
    fn invalid_expected_level_stops_before_parsing() {
        let report = Verifier::new(config(4)).verify(b"not json");
        assert!(!report.passed);
        assert_eq!(report.outcomes.len(), 1);
        assert!(matches!(report.error, Some(VerificationError::InvalidExpectedLevel(4))));
    }

    #[test]
    fn level_too_low_is_terminal() {
        let report = Verifier::new(config(3)).verify(&vsa_with(
            "v",
            &["SLSA_BUILD_LEVEL_1"],
            "app",
            "abc",
        ));
        assert!(!report.passed);
        assert_eq!(report.achieved_level, Some(1));
        let last = report.outcomes.last().unwrap();
        assert!(last.message().starts_with("LevelTooLow: "), "{last:?}");
    }

    #[test]
    fn untrusted_verifier_fails_but_pipeline_continues() {
        let report = Verifier::new(VerifyConfig {
            expected_level: 1,
            trusted_verifiers: Some(vec!["trusted-tool".into()]),
            ..Default::default()
        })
        .verify(&vsa_with("unknown-tool", &["SLSA_BUILD_LEVEL_3"], "app", "abc"));
        assert!(!report.passed);
        assert!(matches!(
            report.error,
            Some(VerificationError::UntrustedVerifier { .. })
        ));
        assert_eq!(report.achieved_level, Some(3));
    }

    #[test]
    fn policy_file_overrides_config() {
        let mut cfg = VerifyConfig::default();
        cfg.apply_policy(&VerificationPolicy {
            minimum_level: Some(1),
            trusted_verifiers: None,
        });
        assert_eq!(cfg.expected_level, 1);
        assert!(cfg.trusted_verifiers.is_none());
    }

    #[test]
    fn subject_digests_checked_under_base_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("app.tar"), b"payload").unwrap();
        let good = vsa_with("v", &["SLSA_BUILD_LEVEL_2"], "app.tar", &sha256_bytes(b"payload"));
        let bad = vsa_with("v", &["SLSA_BUILD_LEVEL_2"], "app.tar", "0000");

        let verifier = Verifier::new(VerifyConfig {
            expected_level: 2,
            check_files_base: Some(dir.path().to_path_buf()),
            ..Default::default()
        });
        assert!(verifier.verify(&good).passed);
        let report = verifier.verify(&bad);
        assert!(matches!(
            report.error,
            Some(VerificationError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn json_report_carries_error_kind() {
        let report = Verifier::new(config(3)).verify(br#"{"_type": "x"}"#);
        let value = report.to_json();
        assert_eq!(value["passed"], false);
        assert_eq!(value["error"]["kind"], "InvalidFormat");
        assert_eq!(value["outcomes"][0]["status"], "fail");
        assert_eq!(value["achievedLevel"], Value::Null);
    }

    #[test]
    fn verify_file_reads_vsa() {
        let tmp = tempfile::NamedTempFile::new().expect("tempfile");
        std::fs::write(tmp.path(), vsa_with("v", &["SLSA_BUILD_LEVEL_3"], "app", "abc")).unwrap();
        let report = Verifier::new(VerifyConfig::default())
            .verify_file(tmp.path())
            .expect("verify_file");
        assert!(report.passed);
    }
}
