//! in-toto attestation statements for CI build artifacts.
//!
//! `attestor-statement` holds the in-toto v1 statement envelope and the
//! predicates this project emits: dependency vulnerability scans, build
//! metadata, SLSA Verification Summary Attestations, and test results.
//! Builders here are pure: they take fully resolved inputs and never read
//! the environment or the filesystem.

pub mod depscan;
pub mod error;
pub mod metadata;
pub mod statement;
pub mod test_result;
pub mod vsa;

pub use error::AttestationError;
pub use statement::{DigestSet, Predicate, STATEMENT_TYPE, Statement, Subject};
