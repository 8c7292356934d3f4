//! Dependency-scan predicate (`https://in-toto.io/attestation/vulns/v0.2`).
//!
//! The builder here is pure assembly: it copies a [`NormalizedScan`] into the
//! predicate's `scanner` block and fills the scan window. Parsing scanner
//! reports into a [`NormalizedScan`] is the job of the scan crate.

use serde::{Deserialize, Serialize};

use crate::statement::{Predicate, Statement, Subject};

/// Predicate type URI for dependency-scan attestations.
pub const PREDICATE_TYPE: &str = "https://in-toto.io/attestation/vulns/v0.2";

/// Render a numeric CVSS score with exactly one fractional digit.
pub fn format_cvss_score(score: f64) -> String {
    format!("{score:.1}")
}

/// Release page URI for a scanner, e.g.
/// `https://github.com/anchore/grype/releases/tag/v0.87.0`.
///
/// A leading `v` on `version` is not doubled.
pub fn release_uri(vendor: &str, tool: &str, version: &str) -> String {
    let version = version.strip_prefix('v').unwrap_or(version);
    format!("https://github.com/{vendor}/{tool}/releases/tag/v{version}")
}

/// One severity rating attached to a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityEntry {
    /// Rating method, e.g. `nvd`, `cvss_score`, `CVSSv3`.
    pub method: String,
    /// Severity word (`HIGH`) or a one-decimal numeric score (`7.5`).
    pub score: String,
}

impl SeverityEntry {
    /// Create an entry from a method and an already-rendered score.
    pub fn new(method: impl Into<String>, score: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            score: score.into(),
        }
    }

    /// Create an entry from a numeric CVSS score.
    pub fn numeric(method: impl Into<String>, score: f64) -> Self {
        Self::new(method, format_cvss_score(score))
    }
}

/// A single vulnerability finding, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFinding {
    /// Vulnerability identifier (CVE, GHSA, ...).
    pub id: String,
    /// Severity ratings; never empty for normalized findings.
    pub severity: Vec<SeverityEntry>,
}

/// The scanner that produced a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerIdentity {
    /// Tool name, e.g. `grype`.
    pub name: String,
    /// Release page URI derived from vendor, tool, and version.
    pub uri: String,
    /// Tool version.
    pub version: String,
}

impl ScannerIdentity {
    /// Build an identity, deriving the release URI.
    pub fn new(vendor: &str, name: &str, version: &str) -> Self {
        Self {
            name: name.to_owned(),
            uri: release_uri(vendor, name, version),
            version: version.to_owned(),
        }
    }
}

/// The vulnerability database the scanner matched against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseIdentity {
    /// Database name, when the report names it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Database update URI, when the report carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Database schema or spec version.
    pub version: String,
    /// When the database was last built.
    pub last_update: String,
}

/// Timestamps a report carries about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportTimes {
    /// Build time of the scanner database.
    pub database_built: Option<String>,
    /// When the report itself was generated.
    pub generated: Option<String>,
}

/// Scanner output reduced to the fields the predicates need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedScan {
    /// Who scanned.
    pub scanner: ScannerIdentity,
    /// Against which database.
    pub database: DatabaseIdentity,
    /// Findings in report order.
    pub findings: Vec<ScanFinding>,
    /// Report-provided timestamps.
    pub report_times: ReportTimes,
}

/// Where the scan window timestamps come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanWindow {
    /// Caller-supplied timestamps.
    Explicit {
        /// Scan start.
        started: String,
        /// Scan end.
        finished: String,
    },
    /// Database build time as the start, report generation time as the end.
    Report,
}

/// The `scanner` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scanner {
    /// Tool name.
    pub name: String,
    /// Release page URI.
    pub uri: String,
    /// Tool version.
    pub version: String,
    /// Vulnerability database.
    pub db: DatabaseIdentity,
    /// Findings.
    pub result: Vec<ScanFinding>,
}

/// The `metadata` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMetadata {
    /// Scan start.
    pub scan_started_on: String,
    /// Scan end, omitted when the report does not say.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_finished_on: Option<String>,
}

/// Dependency-scan predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyScan {
    /// Scanner identity, database, and findings.
    pub scanner: Scanner,
    /// Scan window.
    pub metadata: ScanMetadata,
}

impl Predicate for DependencyScan {
    const PREDICATE_TYPE: &'static str = PREDICATE_TYPE;
}

impl DependencyScan {
    /// Assemble the predicate from a normalized scan.
    pub fn from_scan(scan: &NormalizedScan, window: &ScanWindow) -> Self {
        let metadata = match window {
            ScanWindow::Explicit { started, finished } => ScanMetadata {
                scan_started_on: started.clone(),
                scan_finished_on: Some(finished.clone()),
            },
            ScanWindow::Report => ScanMetadata {
                scan_started_on: scan
                    .report_times
                    .database_built
                    .clone()
                    .unwrap_or_else(|| scan.database.last_update.clone()),
                scan_finished_on: scan.report_times.generated.clone(),
            },
        };

        Self {
            scanner: Scanner {
                name: scan.scanner.name.clone(),
                uri: scan.scanner.uri.clone(),
                version: scan.scanner.version.clone(),
                db: scan.database.clone(),
                result: scan.findings.clone(),
            },
            metadata,
        }
    }

    /// Whether `scanStartedOn <= scanFinishedOn`.
    ///
    /// Holds vacuously when either end is missing or not an RFC 3339
    /// timestamp.
    pub fn scan_window_is_ordered(&self) -> bool {
        let Some(finished) = self.metadata.scan_finished_on.as_deref() else {
            return true;
        };
        let parse = |s: &str| chrono::DateTime::parse_from_rfc3339(s).ok();
        match (parse(&self.metadata.scan_started_on), parse(finished)) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        }
    }
}

/// Build a dependency-scan statement for one subject.
///
/// The subject is not validated here; the schema gate rejects an empty
/// name or digest.
pub fn build(
    scan: &NormalizedScan,
    subject: Subject,
    window: &ScanWindow,
) -> Statement<DependencyScan> {
    let predicate = DependencyScan::from_scan(scan, window);
    tracing::debug!(
        findings = predicate.scanner.result.len(),
        scanner = %predicate.scanner.name,
        "assembled dependency-scan predicate"
    );
    Statement::new(vec![subject], predicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::DigestSet;

    fn sample_scan() -> NormalizedScan {
        NormalizedScan {
            scanner: ScannerIdentity::new("anchore", "grype", "0.87.0"),
            database: DatabaseIdentity {
                name: None,
                uri: Some("https://toolbox-data.anchore.io/grype/databases/listing.json".into()),
                version: "5".into(),
                last_update: "2024-01-05T08:00:00Z".into(),
            },
            findings: vec![ScanFinding {
                id: "CVE-2024-0001".into(),
                severity: vec![
                    SeverityEntry::new("nvd", "Medium"),
                    SeverityEntry::numeric("cvss_score", 7.5),
                ],
            }],
            report_times: ReportTimes {
                database_built: Some("2024-01-05T08:00:00Z".into()),
                generated: Some("2024-01-06T14:00:00Z".into()),
            },
        }
    }

    fn subject() -> Subject {
        Subject::new("ghcr.io/acme/app", DigestSet::sha256("abc"))
    }

    #[test]
    fn cvss_scores_have_one_decimal() {
        assert_eq!(format_cvss_score(7.5), "7.5");
        assert_eq!(format_cvss_score(8.0), "8.0");
        assert_eq!(format_cvss_score(9.76), "9.8");
        assert_eq!(format_cvss_score(10.0), "10.0");
    }

    #[test]
    fn release_uri_template() {
        assert_eq!(
            release_uri("anchore", "grype", "0.87.0"),
            "https://github.com/anchore/grype/releases/tag/v0.87.0"
        );
        assert_eq!(
            release_uri("anchore", "grype", "v0.87.0"),
            "https://github.com/anchore/grype/releases/tag/v0.87.0"
        );
    }

    #[test]
    fn report_window_uses_db_built_then_report_time() {
        let stmt = build(&sample_scan(), subject(), &ScanWindow::Report);
        assert_eq!(stmt.predicate_type, PREDICATE_TYPE);
        assert_eq!(stmt.predicate.metadata.scan_started_on, "2024-01-05T08:00:00Z");
        assert_eq!(
            stmt.predicate.metadata.scan_finished_on.as_deref(),
            Some("2024-01-06T14:00:00Z")
        );
        assert!(stmt.predicate.scan_window_is_ordered());
    }

    #[test]
    fn explicit_window_overrides_report_times() {
        let window = ScanWindow::Explicit {
            started: "2024-02-01T00:00:00Z".into(),
            finished: "2024-02-01T00:05:00Z".into(),
        };
        let pred = DependencyScan::from_scan(&sample_scan(), &window);
        assert_eq!(pred.metadata.scan_started_on, "2024-02-01T00:00:00Z");
        assert_eq!(pred.metadata.scan_finished_on.as_deref(), Some("2024-02-01T00:05:00Z"));
    }

    #[test]
    fn inverted_window_is_reported() {
        let window = ScanWindow::Explicit {
            started: "2024-02-02T00:00:00Z".into(),
            finished: "2024-02-01T00:00:00Z".into(),
        };
        let pred = DependencyScan::from_scan(&sample_scan(), &window);
        assert!(!pred.scan_window_is_ordered());
    }

    #[test]
    fn serialized_shape() {
        let stmt = build(&sample_scan(), subject(), &ScanWindow::Report);
        let json: serde_json::Value =
            serde_json::from_slice(&stmt.to_json_pretty().unwrap()).unwrap();
        let scanner = &json["predicate"]["scanner"];
        assert_eq!(scanner["name"], "grype");
        assert_eq!(scanner["uri"], "https://github.com/anchore/grype/releases/tag/v0.87.0");
        assert_eq!(scanner["db"]["lastUpdate"], "2024-01-05T08:00:00Z");
        assert!(scanner["db"].get("name").is_none());
        assert_eq!(scanner["result"][0]["severity"][1]["score"], "7.5");
        assert_eq!(json["predicate"]["metadata"]["scanStartedOn"], "2024-01-05T08:00:00Z");
    }

    #[test]
    fn build_is_deterministic() {
        let a = build(&sample_scan(), subject(), &ScanWindow::Report)
            .to_json_pretty()
            .unwrap();
        let b = build(&sample_scan(), subject(), &ScanWindow::Report)
            .to_json_pretty()
            .unwrap();
        assert_eq!(a, b);
    }
}
