//! Scanner report normalization.
//!
//! `attestor-scan` reads vulnerability scanner output in either of the two
//! report shapes we accept (Grype's native JSON and `CycloneDX` VEX) and
//! reduces it to a [`NormalizedScan`]: scanner identity, database identity,
//! and findings in report order.

pub mod cyclonedx;
pub mod dialect;
pub mod error;
pub mod grype;

pub use attestor_statement::depscan::NormalizedScan;
pub use dialect::{ReportDialect, normalize, normalize_file};
pub use error::ScanError;
