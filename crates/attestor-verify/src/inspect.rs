//! Human-readable statement display.
//!
//! Extracts key fields from any in-toto statement and formats them for
//! terminal display, with a short digest for the predicate types we build.

use std::fmt::Write;

use attestor_statement::{depscan, metadata, test_result, vsa};
use serde::Serialize;
use serde_json::Value;

use crate::error::VerificationError;

/// A subject as shown in a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectSummary {
    /// Subject name.
    pub name: String,
    /// `algorithm:hex` digests.
    pub digests: Vec<String>,
}

/// Predicate-specific highlights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PredicateDigest {
    /// Dependency scan.
    DependencyScan {
        /// Scanner name and version.
        scanner: String,
        /// Number of findings.
        findings: usize,
        /// Scan start time.
        started: String,
        /// Scan end time.
        finished: String,
    },
    /// Artifact metadata.
    Metadata {
        /// `container-image` or `blob`.
        artifact_type: String,
        /// Artifact version.
        version: String,
    },
    /// Verification summary.
    VerificationSummary {
        /// Verifier ID.
        verifier: String,
        /// Recorded result, from either result field.
        result: String,
        /// Highest build level tag, if any parses.
        achieved_level: Option<u32>,
    },
    /// Test result.
    TestResult {
        /// Overall result.
        result: String,
        /// Passed test count.
        passed: usize,
        /// Warned test count.
        warned: usize,
        /// Failed test count.
        failed: usize,
    },
    /// A predicate type we do not interpret.
    Other,
}

/// Extracted summary of a statement.
#[derive(Debug, Clone, Serialize)]
pub struct StatementSummary {
    /// The in-toto statement type URI.
    pub statement_type: String,
    /// The predicate type URI.
    pub predicate_type: String,
    /// Subjects.
    pub subjects: Vec<SubjectSummary>,
    /// Predicate highlights.
    pub predicate: PredicateDigest,
}

fn str_at(value: Option<&Value>, keys: &[&str]) -> String {
    let mut current = value;
    for key in keys {
        current = current.and_then(|v| v.get(*key));
    }
    current.and_then(Value::as_str).unwrap_or("").to_owned()
}

fn array_len(value: Option<&Value>, key: &str) -> usize {
    value
        .and_then(|v| v.get(key))
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

fn digest_predicate(predicate_type: &str, predicate: Option<&Value>) -> PredicateDigest {
    match predicate_type {
        depscan::PREDICATE_TYPE => {
            let scanner = predicate.and_then(|p| p.get("scanner"));
            PredicateDigest::DependencyScan {
                scanner: format!(
                    "{} {}",
                    str_at(scanner, &["name"]),
                    str_at(scanner, &["version"])
                )
                .trim()
                .to_owned(),
                findings: array_len(scanner, "result"),
                started: str_at(predicate, &["metadata", "scanStartedOn"]),
                finished: str_at(predicate, &["metadata", "scanFinishedOn"]),
            }
        }
        metadata::PREDICATE_TYPE => PredicateDigest::Metadata {
            artifact_type: str_at(predicate, &["artifact", "type"]),
            version: str_at(predicate, &["artifact", "version"]),
        },
        vsa::PREDICATE_TYPE => {
            let mut result = str_at(predicate, &["verificationResult"]);
            if result.is_empty() {
                result = predicate
                    .and_then(|p| p.get("policyEvaluationResults"))
                    .and_then(Value::as_array)
                    .and_then(|entries| entries.first())
                    .map(|entry| str_at(Some(entry), &["result"]))
                    .unwrap_or_default();
            }
            let tags: Vec<&str> = predicate
                .and_then(|p| p.get("verifiedLevels"))
                .and_then(Value::as_array)
                .map(|levels| levels.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            PredicateDigest::VerificationSummary {
                verifier: str_at(predicate, &["verifier", "id"]),
                result,
                achieved_level: vsa::max_build_level(&tags).ok().flatten(),
            }
        }
        test_result::PREDICATE_TYPE => PredicateDigest::TestResult {
            result: str_at(predicate, &["result"]),
            passed: array_len(predicate, "passedTests"),
            warned: array_len(predicate, "warnedTests"),
            failed: array_len(predicate, "failedTests"),
        },
        _ => PredicateDigest::Other,
    }
}

/// Extract a summary from statement bytes.
pub fn summarize(bytes: &[u8]) -> Result<StatementSummary, VerificationError> {
    let doc: Value = serde_json::from_slice(bytes)?;
    if !doc.is_object() {
        return Err(VerificationError::MalformedInput(
            "statement is not a JSON object".to_owned(),
        ));
    }
    let predicate_type = str_at(Some(&doc), &["predicateType"]);

    let subjects = doc
        .get("subject")
        .and_then(Value::as_array)
        .map(|subjects| {
            subjects
                .iter()
                .map(|s| SubjectSummary {
                    name: str_at(Some(s), &["name"]),
                    digests: s
                        .get("digest")
                        .and_then(Value::as_object)
                        .map(|d| {
                            d.iter()
                                .map(|(alg, hex)| format!("{alg}:{}", hex.as_str().unwrap_or("?")))
                                .collect()
                        })
                        .unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(StatementSummary {
        statement_type: str_at(Some(&doc), &["_type"]),
        predicate: digest_predicate(&predicate_type, doc.get("predicate")),
        predicate_type,
        subjects,
    })
}

/// Format a summary as a human-readable string.
pub fn format_summary(summary: &StatementSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Statement Summary");
    let _ = writeln!(out, "-----------------");
    let _ = writeln!(out, "Statement type:  {}", summary.statement_type);
    let _ = writeln!(out, "Predicate type:  {}", summary.predicate_type);
    let _ = writeln!(out, "Subjects:        {}", summary.subjects.len());
    for subject in &summary.subjects {
        // blob listings span several lines
        let name = subject.name.replace('\n', ", ");
        let _ = writeln!(out, "  {name}  {}", subject.digests.join(" "));
    }

    match &summary.predicate {
        PredicateDigest::DependencyScan {
            scanner,
            findings,
            started,
            finished,
        } => {
            let _ = writeln!(out, "Scanner:         {scanner}");
            let _ = writeln!(out, "Findings:        {findings}");
            let _ = writeln!(out, "Scan started:    {started}");
            let _ = writeln!(out, "Scan finished:   {finished}");
        }
        PredicateDigest::Metadata {
            artifact_type,
            version,
        } => {
            let _ = writeln!(out, "Artifact type:   {artifact_type}");
            let _ = writeln!(out, "Version:         {version}");
        }
        PredicateDigest::VerificationSummary {
            verifier,
            result,
            achieved_level,
        } => {
            let _ = writeln!(out, "Verifier:        {verifier}");
            let _ = writeln!(out, "Result:          {result}");
            let level = achieved_level.map_or_else(|| "none".to_owned(), |l| format!("L{l}"));
            let _ = writeln!(out, "Build level:     {level}");
        }
        PredicateDigest::TestResult {
            result,
            passed,
            warned,
            failed,
        } => {
            let _ = writeln!(out, "Result:          {result}");
            let _ = writeln!(
                out,
                "Tests:           {passed} passed, {warned} warned, {failed} failed"
            );
        }
        PredicateDigest::Other => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn statement(predicate_type: &str, predicate: &Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "_type": "https://in-toto.io/Statement/v1",
            "subject": [{"name": "ghcr.io/acme/app", "digest": {"sha256": "abc123"}}],
            "predicateType": predicate_type,
            "predicate": predicate,
        }))
        .unwrap()
    }

    #[test]
    fn summarize_dependency_scan() {
        let doc = statement(
            depscan::PREDICATE_TYPE,
            &json!({
                "scanner": {"name": "grype", "version": "0.87.0", "result": [{"id": "CVE-1"}, {"id": "CVE-2"}]},
                "metadata": {"scanStartedOn": "2024-01-05T08:00:00Z", "scanFinishedOn": "2024-01-06T10:00:00Z"}
            }),
        );
        let summary = summarize(&doc).expect("summarize");
        assert_eq!(summary.subjects[0].digests, ["sha256:abc123"]);
        assert_eq!(
            summary.predicate,
            PredicateDigest::DependencyScan {
                scanner: "grype 0.87.0".into(),
                findings: 2,
                started: "2024-01-05T08:00:00Z".into(),
                finished: "2024-01-06T10:00:00Z".into(),
            }
        );
        let text = format_summary(&summary);
        assert!(text.contains("Findings:        2"));
        assert!(text.contains("ghcr.io/acme/app  sha256:abc123"));
    }

    #[test]
    fn summarize_policy_aware_vsa() {
        let doc = statement(
            vsa::PREDICATE_TYPE,
            &json!({
                "verifier": {"id": "https://verifier.example"},
                "policyEvaluationResults": [{"type": "https://slsa.dev/policy/v1", "result": "PASSED"}],
                "verifiedLevels": ["SLSA_BUILD_LEVEL_1", "SLSA_BUILD_LEVEL_3"]
            }),
        );
        let summary = summarize(&doc).unwrap();
        let PredicateDigest::VerificationSummary {
            result,
            achieved_level,
            ..
        } = &summary.predicate
        else {
            panic!("unexpected digest {:?}", summary.predicate);
        };
        assert_eq!(result, "PASSED");
        assert_eq!(*achieved_level, Some(3));
        assert!(format_summary(&summary).contains("Build level:     L3"));
    }

    #[test]
    fn summarize_test_result_counts() {
        let doc = statement(
            test_result::PREDICATE_TYPE,
            &json!({"result": "WARNED", "passedTests": ["a"], "warnedTests": ["b", "c"]}),
        );
        let summary = summarize(&doc).unwrap();
        assert!(format_summary(&summary).contains("1 passed, 2 warned, 0 failed"));
    }

    #[test]
    fn unknown_predicate_type_still_summarizes() {
        let summary = summarize(&statement("https://example.com/other", &json!({}))).unwrap();
        assert_eq!(summary.predicate, PredicateDigest::Other);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["predicate"]["kind"], "other");
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(summarize(b"[]"), Err(VerificationError::MalformedInput(_))));
        assert!(matches!(summarize(b"{"), Err(VerificationError::JsonError(_))));
    }
}
