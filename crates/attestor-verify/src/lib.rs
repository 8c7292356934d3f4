//! Verification for supply-chain attestations.
//!
//! `attestor-verify` checks SLSA Verification Summary Attestations against a
//! required build level, gates generated documents on their JSON Schemas,
//! and re-checks subject digests against files on disk.
//!
//! VSA verification runs four stages, each terminal on failure:
//! 1. **Parse**: statement and predicate type URIs
//! 2. **Policy**: `verificationResult` or the SLSA policy evaluation result
//! 3. **Level**: the highest `SLSA_BUILD_LEVEL_<N>` tag
//! 4. **Compare**: achieved level against the required one
//!
//! Verifier trust (an allowlist of verifier IDs) is checked separately.

pub mod digest;
pub mod error;
pub mod inspect;
pub mod policy;
pub mod schema;
pub mod schema_store;
pub mod verify;
pub mod vsa;

// Re-export primary types for convenience.
pub use error::VerificationError;
pub use schema::SchemaGate;
pub use verify::{VerificationOutcome, VerificationReport, Verifier, VerifyConfig};
