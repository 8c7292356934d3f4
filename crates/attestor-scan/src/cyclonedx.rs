//! `CycloneDX` vulnerability report (VEX), as emitted by `grype -o cyclonedx-json`.
//!
//! Scanner identity comes from the first entry of `metadata.tools`, which is
//! either the legacy tool array (1.4) or `{ "components": [...] }` (1.5+).
//! Each vulnerability contributes one severity entry taken from its first
//! rating, or from its source when it carries no ratings.

use attestor_statement::depscan::{
    DatabaseIdentity, NormalizedScan, ReportTimes, ScanFinding, ScannerIdentity, SeverityEntry,
};
use attestor_statement::statement::normalize_rfc3339;
use serde::Deserialize;

use crate::error::ScanError;

/// Score or method placeholder when a vulnerability carries no rating data.
pub const UNKNOWN: &str = "UNKNOWN";

/// Rating method used when a rating omits one.
pub const DEFAULT_METHOD: &str = "other";

/// Top level of a `CycloneDX` BOM; only the fields we read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycloneDxReport {
    /// `CycloneDX` specification version.
    #[serde(default)]
    pub spec_version: String,
    /// BOM metadata.
    #[serde(default)]
    pub metadata: Option<BomMetadata>,
    /// Vulnerabilities.
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
}

/// `metadata` block.
#[derive(Debug, Default, Deserialize)]
pub struct BomMetadata {
    /// Generation time.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Producing tools.
    #[serde(default)]
    pub tools: Option<Tools>,
}

/// `metadata.tools` in either of its two shapes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Tools {
    /// `CycloneDX` 1.4 array of tools.
    Legacy(Vec<Tool>),
    /// `CycloneDX` 1.5+ object.
    Structured {
        /// Tools expressed as components.
        #[serde(default)]
        components: Vec<Tool>,
    },
}

impl Tools {
    fn first(&self) -> Option<&Tool> {
        match self {
            Self::Legacy(tools) => tools.first(),
            Self::Structured { components } => components.first(),
        }
    }
}

/// A producing tool.
#[derive(Debug, Deserialize)]
pub struct Tool {
    /// Vendor (1.4).
    #[serde(default)]
    pub vendor: Option<String>,
    /// Author (1.5+ components).
    #[serde(default)]
    pub author: Option<String>,
    /// Group (1.5+ components).
    #[serde(default)]
    pub group: Option<String>,
    /// Tool name.
    #[serde(default)]
    pub name: String,
    /// Tool version.
    #[serde(default)]
    pub version: String,
}

impl Tool {
    fn vendor(&self) -> &str {
        [&self.vendor, &self.author, &self.group]
            .into_iter()
            .flatten()
            .find(|v| !v.is_empty())
            .map_or(self.name.as_str(), String::as_str)
    }
}

/// One vulnerability.
#[derive(Debug, Deserialize)]
pub struct Vulnerability {
    /// Vulnerability ID.
    pub id: String,
    /// Severity ratings.
    #[serde(default)]
    pub ratings: Vec<Rating>,
    /// Advisory source.
    #[serde(default)]
    pub source: Option<Source>,
}

/// `vulnerabilities[].ratings[]`.
#[derive(Debug, Deserialize)]
pub struct Rating {
    /// Numeric score.
    #[serde(default)]
    pub score: Option<f64>,
    /// Severity word.
    #[serde(default)]
    pub severity: Option<String>,
    /// Scoring method (`CVSSv31`, ...).
    #[serde(default)]
    pub method: Option<String>,
}

/// `vulnerabilities[].source`.
#[derive(Debug, Deserialize)]
pub struct Source {
    /// Source name (`nvd`, `ghsa`, ...).
    #[serde(default)]
    pub name: String,
}

fn severity_entry(vuln: &Vulnerability) -> SeverityEntry {
    if let Some(rating) = vuln.ratings.first() {
        let method = rating
            .method
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_METHOD);
        return match (rating.score, rating.severity.as_deref()) {
            (Some(score), _) => SeverityEntry::numeric(method, score),
            (None, Some(word)) if !word.is_empty() => SeverityEntry::new(method, word),
            _ => SeverityEntry::new(method, UNKNOWN),
        };
    }
    match &vuln.source {
        Some(source) if !source.name.is_empty() => SeverityEntry::new(&source.name, UNKNOWN),
        _ => {
            tracing::warn!(
                id = %vuln.id,
                "vulnerability has neither ratings nor source; recording UNKNOWN severity"
            );
            SeverityEntry::new(UNKNOWN, UNKNOWN)
        }
    }
}

/// Normalize a parsed `CycloneDX` report.
pub fn normalize(report: &CycloneDxReport) -> Result<NormalizedScan, ScanError> {
    let metadata = report
        .metadata
        .as_ref()
        .ok_or_else(|| ScanError::MalformedInput("CycloneDX report has no metadata".to_owned()))?;
    let tool = metadata
        .tools
        .as_ref()
        .and_then(Tools::first)
        .ok_or_else(|| {
            ScanError::MalformedInput("CycloneDX report lists no producing tool".to_owned())
        })?;
    if tool.name.is_empty() || tool.version.is_empty() {
        return Err(ScanError::MalformedInput(
            "CycloneDX tool entry is missing its name or version".to_owned(),
        ));
    }

    let timestamp = metadata.timestamp.as_deref().map(normalize_rfc3339);
    let findings: Vec<ScanFinding> = report
        .vulnerabilities
        .iter()
        .map(|vuln| ScanFinding {
            id: vuln.id.clone(),
            severity: vec![severity_entry(vuln)],
        })
        .collect();

    tracing::debug!(
        tool = %tool.name,
        version = %tool.version,
        spec_version = %report.spec_version,
        findings = findings.len(),
        "normalized CycloneDX report"
    );

    Ok(NormalizedScan {
        scanner: ScannerIdentity::new(tool.vendor(), &tool.name, &tool.version),
        database: DatabaseIdentity {
            name: Some(tool.name.clone()),
            uri: None,
            version: report.spec_version.clone(),
            last_update: timestamp.clone().unwrap_or_default(),
        },
        findings,
        report_times: ReportTimes {
            database_built: None,
            generated: timestamp,
        },
    })
}
