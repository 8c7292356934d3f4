//! Report shape detection and dispatch.

use std::fmt;
use std::path::Path;

use attestor_statement::depscan::NormalizedScan;
use serde_json::Value;

use crate::error::ScanError;
use crate::{cyclonedx, grype};

/// Supported scanner report shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDialect {
    /// Grype native JSON: `descriptor` + `matches`.
    Grype,
    /// `CycloneDX` BOM with a `vulnerabilities` array.
    CycloneDx,
}

impl fmt::Display for ReportDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Grype => "grype",
            Self::CycloneDx => "cyclonedx",
        })
    }
}

impl ReportDialect {
    /// Probe a parsed document for the fields that distinguish the shapes.
    pub fn detect(doc: &Value) -> Option<Self> {
        let obj = doc.as_object()?;
        if obj.contains_key("descriptor") && obj.contains_key("matches") {
            Some(Self::Grype)
        } else if obj.contains_key("bomFormat") || obj.contains_key("specVersion") {
            Some(Self::CycloneDx)
        } else {
            None
        }
    }
}

fn malformed(dialect: ReportDialect, err: &serde_json::Error) -> ScanError {
    ScanError::MalformedInput(format!("invalid {dialect} report: {err}"))
}

/// Normalize raw report bytes.
pub fn normalize(bytes: &[u8]) -> Result<NormalizedScan, ScanError> {
    let doc: Value = serde_json::from_slice(bytes)
        .map_err(|e| ScanError::MalformedInput(format!("report is not valid JSON: {e}")))?;
    let dialect = ReportDialect::detect(&doc).ok_or_else(|| {
        ScanError::MalformedInput(
            "report is neither a grype JSON report nor a CycloneDX BOM".to_owned(),
        )
    })?;
    tracing::debug!(%dialect, "detected scanner report dialect");

    match dialect {
        ReportDialect::Grype => {
            let report: grype::GrypeReport =
                serde_json::from_value(doc).map_err(|e| malformed(dialect, &e))?;
            grype::normalize(&report)
        }
        ReportDialect::CycloneDx => {
            let report: cyclonedx::CycloneDxReport =
                serde_json::from_value(doc).map_err(|e| malformed(dialect, &e))?;
            cyclonedx::normalize(&report)
        }
    }
}

/// Read and normalize a report file.
pub fn normalize_file(path: &Path) -> Result<NormalizedScan, ScanError> {
    let bytes = std::fs::read(path).map_err(|source| ScanError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let scan = normalize(&bytes)?;
    tracing::info!(
        path = %path.display(),
        scanner = %scan.scanner.name,
        findings = scan.findings.len(),
        "normalized scanner report"
    );
    Ok(scan)
}
