//! Grype native JSON report (`grype -o json`).
//!
//! Each match yields an `nvd` entry carrying Grype's severity word, plus a
//! `cvss_score` entry taken from the first CVSS record when the match has
//! any. A first record without a base score scores `0.0`.

use attestor_statement::depscan::{
    DatabaseIdentity, NormalizedScan, ReportTimes, ScanFinding, ScannerIdentity, SeverityEntry,
};
use attestor_statement::statement::normalize_rfc3339;
use serde::Deserialize;

use crate::error::ScanError;

/// Grype's vendor on GitHub.
pub const VENDOR: &str = "anchore";

/// Scanner name.
pub const TOOL: &str = "grype";

/// Top level of a Grype report; only the fields we read.
#[derive(Debug, Deserialize)]
pub struct GrypeReport {
    /// Run descriptor.
    pub descriptor: Descriptor,
    /// Vulnerability matches.
    #[serde(default)]
    pub matches: Vec<Match>,
}

/// `descriptor` block.
#[derive(Debug, Deserialize)]
pub struct Descriptor {
    /// Grype version.
    #[serde(default)]
    pub version: String,
    /// Report generation time.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Effective configuration.
    #[serde(default)]
    pub configuration: Configuration,
    /// Database status.
    #[serde(default)]
    pub db: DbStatus,
}

/// `descriptor.configuration`.
#[derive(Debug, Default, Deserialize)]
pub struct Configuration {
    /// Database settings.
    #[serde(default)]
    pub db: DbConfig,
}

/// `descriptor.configuration.db`.
#[derive(Debug, Default, Deserialize)]
pub struct DbConfig {
    /// Listing URL the database was fetched from.
    #[serde(rename = "update-url", default)]
    pub update_url: Option<String>,
}

/// `descriptor.db`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStatus {
    /// Database build time.
    #[serde(default)]
    pub built: Option<String>,
    /// Schema version; a number in older reports, a string in newer ones.
    #[serde(default)]
    pub schema_version: Option<serde_json::Value>,
}

/// One match.
#[derive(Debug, Deserialize)]
pub struct Match {
    /// The matched vulnerability.
    pub vulnerability: Vulnerability,
}

/// `matches[].vulnerability`.
#[derive(Debug, Deserialize)]
pub struct Vulnerability {
    /// Vulnerability ID.
    pub id: String,
    /// Severity word (`Critical`, `High`, ...).
    #[serde(default)]
    pub severity: String,
    /// CVSS records.
    #[serde(default)]
    pub cvss: Vec<Cvss>,
}

/// `matches[].vulnerability.cvss[]`.
#[derive(Debug, Deserialize)]
pub struct Cvss {
    /// Scoring metrics.
    #[serde(default)]
    pub metrics: CvssMetrics,
}

/// `cvss[].metrics`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvssMetrics {
    /// Base score.
    #[serde(default)]
    pub base_score: Option<f64>,
}

fn schema_version(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn finding(vuln: &Vulnerability) -> ScanFinding {
    let word = if vuln.severity.is_empty() {
        "Unknown"
    } else {
        vuln.severity.as_str()
    };
    let mut severity = vec![SeverityEntry::new("nvd", word)];
    if let Some(first) = vuln.cvss.first() {
        let score = first.metrics.base_score.unwrap_or_default();
        severity.push(SeverityEntry::numeric("cvss_score", score));
    }
    ScanFinding {
        id: vuln.id.clone(),
        severity,
    }
}

/// Normalize a parsed Grype report.
pub fn normalize(report: &GrypeReport) -> Result<NormalizedScan, ScanError> {
    let descriptor = &report.descriptor;
    if descriptor.version.is_empty() {
        return Err(ScanError::MalformedInput(
            "grype report has no descriptor.version".to_owned(),
        ));
    }

    let built = descriptor.db.built.as_deref().map(normalize_rfc3339);
    let findings: Vec<ScanFinding> = report
        .matches
        .iter()
        .map(|m| finding(&m.vulnerability))
        .collect();

    tracing::debug!(
        version = %descriptor.version,
        findings = findings.len(),
        "normalized grype report"
    );

    Ok(NormalizedScan {
        scanner: ScannerIdentity::new(VENDOR, TOOL, &descriptor.version),
        database: DatabaseIdentity {
            name: None,
            uri: descriptor.configuration.db.update_url.clone(),
            version: schema_version(descriptor.db.schema_version.as_ref()),
            last_update: built.clone().unwrap_or_default(),
        },
        findings,
        report_times: ReportTimes {
            database_built: built,
            generated: descriptor.timestamp.as_deref().map(normalize_rfc3339),
        },
    })
}
