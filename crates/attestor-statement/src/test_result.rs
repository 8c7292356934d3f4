//! Test-result predicate (`https://in-toto.io/attestation/test-result/v0.1`)
//! derived from a vulnerability scan.
//!
//! Every finding becomes one test named `vulnerability-<ID>`. Critical and
//! high findings fail, medium findings warn, everything else passes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::depscan::{NormalizedScan, ScanFinding, SeverityEntry};
use crate::statement::{Predicate, Statement, Subject};

/// Predicate type URI for test results.
pub const PREDICATE_TYPE: &str = "https://in-toto.io/attestation/test-result/v0.1";

/// Qualitative severity band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SeverityBand {
    /// Below medium, or negligible.
    Low,
    /// CVSS 4.0 to 6.9.
    Medium,
    /// CVSS 7.0 to 8.9.
    High,
    /// CVSS 9.0 and above.
    Critical,
}

impl SeverityBand {
    /// Band for a numeric CVSS score.
    pub fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            Self::Critical
        } else if score >= 7.0 {
            Self::High
        } else if score >= 4.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Band for one severity entry; `None` when the score says nothing
    /// (`UNKNOWN`, empty, or an unrecognized word).
    pub fn from_entry(entry: &SeverityEntry) -> Option<Self> {
        if let Ok(score) = entry.score.parse::<f64>() {
            return Some(Self::from_score(score));
        }
        match entry.score.to_ascii_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" | "moderate" => Some(Self::Medium),
            "low" | "negligible" | "info" | "none" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Outcome of a single finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    /// Not actionable.
    Passed,
    /// Needs attention.
    Warned,
    /// Blocks.
    Failed,
}

/// Classify a finding by the first severity entry that names a band.
pub fn classify(finding: &ScanFinding) -> TestOutcome {
    match finding.severity.iter().find_map(SeverityBand::from_entry) {
        Some(SeverityBand::Critical | SeverityBand::High) => TestOutcome::Failed,
        Some(SeverityBand::Medium) => TestOutcome::Warned,
        Some(SeverityBand::Low) | None => TestOutcome::Passed,
    }
}

/// A resource used to run the tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// Tool name.
    pub name: String,
    /// Where to get it.
    pub download_location: String,
    /// Identifying values (`version`, `dbVersion`, `dbBuilt`).
    pub digest: BTreeMap<String, String>,
}

/// Test-result predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// `PASSED`, `WARNED`, or `FAILED`.
    pub result: String,
    /// Scanner configuration.
    pub configuration: Vec<ResourceDescriptor>,
    /// Vulnerability database URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Findings that passed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passed_tests: Vec<String>,
    /// Findings that warned.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warned_tests: Vec<String>,
    /// Findings that failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_tests: Vec<String>,
}

impl Predicate for TestResult {
    const PREDICATE_TYPE: &'static str = PREDICATE_TYPE;
}

impl TestResult {
    /// Build the predicate from a normalized scan.
    pub fn from_scan(scan: &NormalizedScan) -> Self {
        let mut passed = Vec::new();
        let mut warned = Vec::new();
        let mut failed = Vec::new();

        for finding in &scan.findings {
            let name = format!("vulnerability-{}", finding.id);
            match classify(finding) {
                TestOutcome::Passed => passed.push(name),
                TestOutcome::Warned => warned.push(name),
                TestOutcome::Failed => failed.push(name),
            }
        }

        let result = if !failed.is_empty() {
            "FAILED"
        } else if !warned.is_empty() {
            "WARNED"
        } else {
            "PASSED"
        };

        let mut digest = BTreeMap::new();
        digest.insert("version".to_owned(), scan.scanner.version.clone());
        digest.insert("dbVersion".to_owned(), scan.database.version.clone());
        digest.insert("dbBuilt".to_owned(), scan.database.last_update.clone());

        Self {
            result: result.to_owned(),
            configuration: vec![ResourceDescriptor {
                name: scan.scanner.name.clone(),
                download_location: scan.scanner.uri.clone(),
                digest,
            }],
            url: scan.database.uri.clone(),
            passed_tests: passed,
            warned_tests: warned,
            failed_tests: failed,
        }
    }
}

/// Build a test-result statement for one subject.
pub fn build(scan: &NormalizedScan, subject: Subject) -> Statement<TestResult> {
    let predicate = TestResult::from_scan(scan);
    tracing::debug!(
        result = %predicate.result,
        failed = predicate.failed_tests.len(),
        warned = predicate.warned_tests.len(),
        passed = predicate.passed_tests.len(),
        "assembled test-result predicate"
    );
    Statement::new(vec![subject], predicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depscan::{DatabaseIdentity, ReportTimes, ScannerIdentity};
    use crate::statement::DigestSet;

    fn finding(id: &str, entries: &[(&str, &str)]) -> ScanFinding {
        ScanFinding {
            id: id.into(),
            severity: entries
                .iter()
                .map(|(m, s)| SeverityEntry::new(*m, *s))
                .collect(),
        }
    }

    fn scan(findings: Vec<ScanFinding>) -> NormalizedScan {
        NormalizedScan {
            scanner: ScannerIdentity::new("anchore", "grype", "0.87.0"),
            database: DatabaseIdentity {
                name: None,
                uri: Some("https://grype.anchore.io/databases".into()),
                version: "5".into(),
                last_update: "2024-01-05T08:00:00Z".into(),
            },
            findings,
            report_times: ReportTimes::default(),
        }
    }

    #[test]
    fn score_bands() {
        assert_eq!(SeverityBand::from_score(9.0), SeverityBand::Critical);
        assert_eq!(SeverityBand::from_score(8.9), SeverityBand::High);
        assert_eq!(SeverityBand::from_score(4.0), SeverityBand::Medium);
        assert_eq!(SeverityBand::from_score(3.9), SeverityBand::Low);
    }

    #[test]
    fn classification_uses_first_meaningful_entry() {
        assert_eq!(
            classify(&finding("A", &[("nvd", "Medium"), ("cvss_score", "9.8")])),
            TestOutcome::Warned
        );
        assert_eq!(
            classify(&finding("B", &[("ghsa", "UNKNOWN"), ("cvss_score", "7.5")])),
            TestOutcome::Failed
        );
        assert_eq!(classify(&finding("C", &[("CVSSv3", "HIGH")])), TestOutcome::Failed);
        assert_eq!(classify(&finding("D", &[("nvd", "Negligible")])), TestOutcome::Passed);
        assert_eq!(classify(&finding("E", &[])), TestOutcome::Passed);
    }

    #[test]
    fn overall_result_precedence() {
        let failed = TestResult::from_scan(&scan(vec![
            finding("CVE-1", &[("nvd", "Medium")]),
            finding("CVE-2", &[("nvd", "Critical")]),
        ]));
        assert_eq!(failed.result, "FAILED");
        assert_eq!(failed.failed_tests, ["vulnerability-CVE-2"]);
        assert_eq!(failed.warned_tests, ["vulnerability-CVE-1"]);

        let warned = TestResult::from_scan(&scan(vec![finding("CVE-3", &[("nvd", "Medium")])]));
        assert_eq!(warned.result, "WARNED");

        let passed = TestResult::from_scan(&scan(vec![]));
        assert_eq!(passed.result, "PASSED");
    }

    #[test]
    fn configuration_describes_scanner() {
        let stmt = build(&scan(vec![]), Subject::new("app", DigestSet::sha256("abc")));
        let json: serde_json::Value =
            serde_json::from_slice(&stmt.to_json_pretty().unwrap()).unwrap();
        let p = &json["predicate"];
        assert_eq!(json["predicateType"], PREDICATE_TYPE);
        assert_eq!(p["configuration"][0]["name"], "grype");
        assert_eq!(
            p["configuration"][0]["downloadLocation"],
            "https://github.com/anchore/grype/releases/tag/v0.87.0"
        );
        assert_eq!(p["configuration"][0]["digest"]["dbVersion"], "5");
        assert_eq!(p["url"], "https://grype.anchore.io/databases");
        assert!(p.get("failedTests").is_none());
    }
}
