//! SLSA Verification Summary Attestation predicate
//! (`https://slsa.dev/verification_summary/v1`).
//!
//! Two shapes are in circulation: a summary form carrying a single
//! `verificationResult`, and a policy-aware form carrying
//! `policyEvaluationResults`. Both are read by [`VsaPredicate`]; fields are
//! lenient on input so that verification can report *which* rule failed
//! instead of a generic parse error.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AttestationError;
use crate::statement::{DigestSet, Predicate, Statement, Subject, rfc3339};

/// Predicate type URI for VSAs.
pub const PREDICATE_TYPE: &str = "https://slsa.dev/verification_summary/v1";

/// Policy type URI identifying a SLSA policy evaluation result.
pub const SLSA_POLICY_TYPE: &str = "https://slsa.dev/policy/v1";

/// Prefix of every build level tag.
pub const BUILD_LEVEL_PREFIX: &str = "SLSA_BUILD_LEVEL_";

/// Highest build level SLSA v1.0 defines.
pub const MAX_BUILD_LEVEL: u32 = 3;

/// SLSA version written when none is given.
pub const DEFAULT_SLSA_VERSION: &str = "1.0";

/// `PASSED` / `FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationResult {
    /// The artifact met the policy.
    Passed,
    /// The artifact did not meet the policy.
    Failed,
}

impl VerificationResult {
    /// The wire form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationResult {
    type Err = AttestationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PASSED" => Ok(Self::Passed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(AttestationError::InvalidStatement(format!(
                "verification result must be PASSED or FAILED, got `{s}`"
            ))),
        }
    }
}

/// Which of the two VSA shapes a predicate uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VsaVariant {
    /// `verificationResult` only.
    Summary,
    /// `policyEvaluationResults`.
    PolicyAware,
}

/// Identity of the tool that performed verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierInfo {
    /// Verifier URI or name.
    #[serde(default)]
    pub id: String,
}

/// One policy evaluation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEvaluation {
    /// Policy type URI.
    #[serde(rename = "type", default)]
    pub policy_type: String,
    /// `PASSED` / `FAILED`.
    #[serde(default)]
    pub result: String,
}

/// VSA predicate payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VsaPredicate {
    /// Who verified.
    #[serde(default)]
    pub verifier: VerifierInfo,
    /// When.
    #[serde(default)]
    pub time_verified: String,
    /// The verified resource.
    #[serde(rename = "resourceUri", default)]
    pub resource_uri: String,
    /// Summary form result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_result: Option<String>,
    /// Policy-aware form results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_evaluation_results: Option<Vec<PolicyEvaluation>>,
    /// Level tags, e.g. `SLSA_BUILD_LEVEL_3`.
    #[serde(default)]
    pub verified_levels: Vec<String>,
    /// Per-dependency levels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_levels: Option<BTreeMap<String, u32>>,
    /// SLSA specification version.
    #[serde(default)]
    pub slsa_version: String,
}

impl Predicate for VsaPredicate {
    const PREDICATE_TYPE: &'static str = PREDICATE_TYPE;
}

impl VsaPredicate {
    /// Detect the predicate shape. A predicate carrying policy evaluation
    /// results is policy-aware even if it also has a summary result.
    pub fn variant(&self) -> Option<VsaVariant> {
        if self.policy_evaluation_results.is_some() {
            Some(VsaVariant::PolicyAware)
        } else if self.verification_result.is_some() {
            Some(VsaVariant::Summary)
        } else {
            None
        }
    }

    /// Highest build level asserted by `verified_levels`.
    pub fn max_build_level(&self) -> Result<Option<u32>, AttestationError> {
        max_build_level(&self.verified_levels)
    }
}

/// `SLSA_BUILD_LEVEL_<n>`.
pub fn level_tag(level: u32) -> String {
    format!("{BUILD_LEVEL_PREFIX}{level}")
}

/// Parse a level tag.
///
/// Returns `Ok(None)` for tags without the build level prefix (other SLSA
/// tracks), and [`AttestationError::InvalidLevelTag`] when the prefix
/// matches but the suffix is not a non-negative integer.
pub fn parse_level_tag(tag: &str) -> Result<Option<u32>, AttestationError> {
    let Some(suffix) = tag.strip_prefix(BUILD_LEVEL_PREFIX) else {
        return Ok(None);
    };
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AttestationError::InvalidLevelTag(tag.to_owned()));
    }
    suffix
        .parse::<u32>()
        .map(Some)
        .map_err(|_| AttestationError::InvalidLevelTag(tag.to_owned()))
}

/// Maximum over all build level tags; `Ok(None)` when no tag carries the
/// build level prefix.
pub fn max_build_level<S: AsRef<str>>(tags: &[S]) -> Result<Option<u32>, AttestationError> {
    let mut max = None;
    for tag in tags {
        if let Some(level) = parse_level_tag(tag.as_ref())? {
            max = Some(max.map_or(level, |m: u32| m.max(level)));
        }
    }
    Ok(max)
}

/// Inputs for generating a VSA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VsaOptions {
    /// Subject name.
    pub subject_name: String,
    /// Subject digest; a `sha256:` prefix is stripped into the digest map.
    pub subject_digest: String,
    /// Verifier identity.
    pub verifier_id: String,
    /// Overall result.
    pub result: VerificationResult,
    /// Level tags to assert.
    pub levels: Vec<String>,
    /// Resource URI; defaults to the subject name.
    pub resource_uri: Option<String>,
    /// SLSA version; defaults to [`DEFAULT_SLSA_VERSION`].
    pub slsa_version: Option<String>,
    /// Verification time.
    pub time_verified: DateTime<Utc>,
    /// Shape to emit.
    pub variant: VsaVariant,
    /// Optional per-dependency levels.
    pub dependency_levels: Option<BTreeMap<String, u32>>,
}

fn require(value: &str, field: &'static str) -> Result<(), AttestationError> {
    if value.trim().is_empty() {
        return Err(AttestationError::MissingRequiredField {
            field,
            context: "verification summary",
        });
    }
    Ok(())
}

/// Generate a VSA statement.
pub fn generate(opts: VsaOptions) -> Result<Statement<VsaPredicate>, AttestationError> {
    require(&opts.subject_name, "subject name")?;
    require(&opts.subject_digest, "subject digest")?;
    require(&opts.verifier_id, "verifier id")?;
    if opts.levels.is_empty() {
        return Err(AttestationError::MissingRequiredField {
            field: "verified levels",
            context: "verification summary",
        });
    }
    for tag in &opts.levels {
        if parse_level_tag(tag)?.is_none() {
            return Err(AttestationError::InvalidLevelTag(tag.clone()));
        }
    }

    let (verification_result, policy_evaluation_results) = match opts.variant {
        VsaVariant::Summary => (Some(opts.result.as_str().to_owned()), None),
        VsaVariant::PolicyAware => (
            None,
            Some(vec![PolicyEvaluation {
                policy_type: SLSA_POLICY_TYPE.to_owned(),
                result: opts.result.as_str().to_owned(),
            }]),
        ),
    };

    let predicate = VsaPredicate {
        verifier: VerifierInfo {
            id: opts.verifier_id,
        },
        time_verified: rfc3339(opts.time_verified),
        resource_uri: opts
            .resource_uri
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| opts.subject_name.clone()),
        verification_result,
        policy_evaluation_results,
        verified_levels: opts.levels,
        dependency_levels: opts.dependency_levels,
        slsa_version: opts
            .slsa_version
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_SLSA_VERSION.to_owned()),
    };

    let subject = Subject::new(opts.subject_name, DigestSet::sha256(&opts.subject_digest));
    tracing::debug!(
        verifier = %predicate.verifier.id,
        levels = ?predicate.verified_levels,
        "generated verification summary"
    );
    Ok(Statement::new(vec![subject], predicate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> VsaOptions {
        VsaOptions {
            subject_name: "ghcr.io/acme/app".into(),
            subject_digest: "sha256:abc123".into(),
            verifier_id: "https://verifier.example/slsa".into(),
            result: VerificationResult::Passed,
            levels: vec![level_tag(3), level_tag(2)],
            resource_uri: None,
            slsa_version: None,
            time_verified: DateTime::parse_from_rfc3339("2024-01-06T14:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            variant: VsaVariant::PolicyAware,
            dependency_levels: None,
        }
    }

    #[test]
    fn parses_level_tags() {
        assert_eq!(parse_level_tag("SLSA_BUILD_LEVEL_3").unwrap(), Some(3));
        assert_eq!(parse_level_tag("SLSA_BUILD_LEVEL_0").unwrap(), Some(0));
        assert_eq!(parse_level_tag("SLSA_SOURCE_LEVEL_2").unwrap(), None);
        assert!(parse_level_tag("SLSA_BUILD_LEVEL_x").is_err());
        assert!(parse_level_tag("SLSA_BUILD_LEVEL_").is_err());
        assert!(parse_level_tag("SLSA_BUILD_LEVEL_-1").is_err());
        assert!(parse_level_tag("SLSA_BUILD_LEVEL_+1").is_err());
    }

    #[test]
    fn max_level_is_maximum() {
        assert_eq!(
            max_build_level(&["SLSA_BUILD_LEVEL_1", "SLSA_BUILD_LEVEL_3"]).unwrap(),
            Some(3)
        );
        assert_eq!(
            max_build_level(&["SLSA_BUILD_LEVEL_2", "FOO", "SLSA_BUILD_LEVEL_1"]).unwrap(),
            Some(2)
        );
        assert_eq!(max_build_level::<&str>(&[]).unwrap(), None);
        assert_eq!(max_build_level(&["FOO"]).unwrap(), None);
    }

    #[test]
    fn generates_policy_aware_vsa() {
        let stmt = generate(opts()).unwrap();
        assert_eq!(stmt.predicate_type, PREDICATE_TYPE);
        assert_eq!(stmt.subject[0].digest.get("sha256"), Some("abc123"));
        let pred = &stmt.predicate;
        assert_eq!(pred.variant(), Some(VsaVariant::PolicyAware));
        let results = pred.policy_evaluation_results.as_ref().unwrap();
        assert_eq!(results[0].policy_type, SLSA_POLICY_TYPE);
        assert_eq!(results[0].result, "PASSED");
        assert_eq!(pred.slsa_version, "1.0");
        assert_eq!(pred.resource_uri, "ghcr.io/acme/app");
        assert_eq!(pred.time_verified, "2024-01-06T14:00:00Z");
        assert_eq!(pred.max_build_level().unwrap(), Some(3));
    }

    #[test]
    fn generates_summary_vsa() {
        let stmt = generate(VsaOptions {
            variant: VsaVariant::Summary,
            result: VerificationResult::Failed,
            ..opts()
        })
        .unwrap();
        assert_eq!(stmt.predicate.variant(), Some(VsaVariant::Summary));
        assert_eq!(stmt.predicate.verification_result.as_deref(), Some("FAILED"));
        let json: serde_json::Value =
            serde_json::from_slice(&stmt.to_json_pretty().unwrap()).unwrap();
        assert!(json["predicate"].get("policyEvaluationResults").is_none());
        assert_eq!(json["predicate"]["resourceUri"], "ghcr.io/acme/app");
    }

    #[test]
    fn rejects_bad_level_tags() {
        let err = generate(VsaOptions {
            levels: vec!["SLSA_BUILD_LEVEL_three".into()],
            ..opts()
        })
        .unwrap_err();
        assert!(matches!(err, AttestationError::InvalidLevelTag(_)));

        let err = generate(VsaOptions {
            levels: vec!["LEVEL_3".into()],
            ..opts()
        })
        .unwrap_err();
        assert!(matches!(err, AttestationError::InvalidLevelTag(_)));
    }

    #[test]
    fn rejects_missing_fields() {
        let err = generate(VsaOptions {
            verifier_id: String::new(),
            ..opts()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            AttestationError::MissingRequiredField { field: "verifier id", .. }
        ));
        let err = generate(VsaOptions {
            levels: vec![],
            ..opts()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            AttestationError::MissingRequiredField { field: "verified levels", .. }
        ));
    }

    #[test]
    fn lenient_parse_of_partial_predicate() {
        let pred: VsaPredicate = serde_json::from_str(r#"{"verifiedLevels":["SLSA_BUILD_LEVEL_1"]}"#).unwrap();
        assert_eq!(pred.variant(), None);
        assert!(pred.verifier.id.is_empty());
    }

    #[test]
    fn level_survives_round_trip() {
        let stmt = generate(opts()).unwrap();
        let before = stmt.predicate.max_build_level().unwrap();
        let bytes = stmt.to_json_pretty().unwrap();
        let back: Statement<VsaPredicate> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.predicate.max_build_level().unwrap(), before);
    }
}
