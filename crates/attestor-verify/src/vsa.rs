//! SLSA build level verification of Verification Summary Attestations.

use attestor_statement::statement::{STATEMENT_TYPE, Statement};
use attestor_statement::vsa::{
    self as predicate, MAX_BUILD_LEVEL, SLSA_POLICY_TYPE, VsaPredicate, VsaVariant,
};
use attestor_statement::AttestationError;
use serde_json::Value;

use crate::error::VerificationError;

/// A parsed VSA statement.
pub type VsaStatement = Statement<VsaPredicate>;

const PASSED: &str = "PASSED";

fn check_types(statement_type: &str, predicate_type: &str) -> Result<(), VerificationError> {
    if statement_type != STATEMENT_TYPE {
        return Err(VerificationError::InvalidFormat {
            field: "statement type",
            expected: STATEMENT_TYPE.to_owned(),
            actual: statement_type.to_owned(),
        });
    }
    if predicate_type != predicate::PREDICATE_TYPE {
        return Err(VerificationError::InvalidFormat {
            field: "predicate type",
            expected: predicate::PREDICATE_TYPE.to_owned(),
            actual: predicate_type.to_owned(),
        });
    }
    Ok(())
}

/// Stage 1: parse bytes into a VSA statement, checking both type URIs.
pub fn parse(bytes: &[u8]) -> Result<VsaStatement, VerificationError> {
    let doc: Value = serde_json::from_slice(bytes)
        .map_err(|e| VerificationError::MalformedInput(format!("VSA is not valid JSON: {e}")))?;
    if !doc.is_object() {
        return Err(VerificationError::MalformedInput(
            "VSA is not a JSON object".to_owned(),
        ));
    }
    let field = |key: &str| doc.get(key).and_then(Value::as_str).unwrap_or("").to_owned();
    check_types(&field("_type"), &field("predicateType"))?;

    let statement: VsaStatement = serde_json::from_value(doc)
        .map_err(|e| VerificationError::MalformedInput(format!("invalid VSA statement: {e}")))?;
    tracing::debug!(
        verifier = %statement.predicate.verifier.id,
        subjects = statement.subject.len(),
        "parsed VSA"
    );
    Ok(statement)
}

/// Stage 2: the VSA must record a passing result.
///
/// Policy-aware VSAs need at least one SLSA policy entry with `PASSED`;
/// when no entry has the SLSA policy type the VSA is silent on policy,
/// which is reported as [`VerificationError::PolicyEvaluationMissing`].
pub fn check_policy(pred: &VsaPredicate) -> Result<(), VerificationError> {
    match pred.variant() {
        Some(VsaVariant::PolicyAware) => {
            let slsa: Vec<&str> = pred
                .policy_evaluation_results
                .iter()
                .flatten()
                .filter(|r| r.policy_type == SLSA_POLICY_TYPE)
                .map(|r| r.result.as_str())
                .collect();
            if slsa.is_empty() {
                return Err(VerificationError::PolicyEvaluationMissing(format!(
                    "no policyEvaluationResults entry of type {SLSA_POLICY_TYPE}"
                )));
            }
            if slsa.contains(&PASSED) {
                return Ok(());
            }
            Err(VerificationError::PolicyNotPassed {
                result: slsa.first().copied().unwrap_or_default().to_owned(),
            })
        }
        Some(VsaVariant::Summary) => {
            let result = pred.verification_result.as_deref().unwrap_or_default();
            if result == PASSED {
                Ok(())
            } else {
                Err(VerificationError::PolicyNotPassed {
                    result: result.to_owned(),
                })
            }
        }
        None => Err(VerificationError::PolicyEvaluationMissing(
            "neither verificationResult nor policyEvaluationResults present".to_owned(),
        )),
    }
}

/// Stage 3: the highest build level asserted.
pub fn achieved_level(pred: &VsaPredicate) -> Result<u32, VerificationError> {
    match pred.max_build_level() {
        Ok(Some(level)) => Ok(level),
        Ok(None) => Err(VerificationError::NoLevelFound),
        Err(AttestationError::InvalidLevelTag(tag)) => {
            Err(VerificationError::InvalidLevelTag { tag })
        }
        Err(other) => Err(VerificationError::MalformedInput(other.to_string())),
    }
}

/// Check a requested level is one SLSA v1.0 defines (L0 to L3).
pub fn expected_level(level: i64) -> Result<u32, VerificationError> {
    u32::try_from(level)
        .ok()
        .filter(|l| *l <= MAX_BUILD_LEVEL)
        .ok_or(VerificationError::InvalidExpectedLevel(level))
}

/// Run stages 2 to 4 on a parsed VSA; returns the achieved level.
///
/// The requested level is checked before anything in the VSA is looked at.
pub fn verify_build_level(stmt: &VsaStatement, expected: i64) -> Result<u32, VerificationError> {
    let expected = expected_level(expected)?;
    check_types(&stmt.statement_type, &stmt.predicate_type)?;
    check_policy(&stmt.predicate)?;
    let achieved = achieved_level(&stmt.predicate)?;
    if achieved < expected {
        return Err(VerificationError::LevelTooLow { achieved, expected });
    }
    tracing::info!(achieved, expected, "VSA build level verified");
    Ok(achieved)
}

/// Parse and verify raw VSA bytes.
pub fn verify_bytes(bytes: &[u8], expected: i64) -> Result<u32, VerificationError> {
    expected_level(expected)?;
    let stmt = parse(bytes)?;
    verify_build_level(&stmt, expected)
}

/// The VSA's verifier must be non-empty and on the allowlist.
pub fn check_trusted_verifier(
    pred: &VsaPredicate,
    trusted: &[String],
) -> Result<(), VerificationError> {
    let id = pred.verifier.id.as_str();
    if !id.is_empty() && trusted.iter().any(|t| t == id) {
        return Ok(());
    }
    Err(VerificationError::UntrustedVerifier {
        verifier: id.to_owned(),
    })
}
