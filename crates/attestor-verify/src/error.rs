//! Error types for the verification subsystem.

/// Errors from VSA verification, schema gating, and digest checks.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// The document is not JSON or not a statement at all.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The statement envelope names the wrong type.
    #[error("invalid {field}: expected `{expected}`, got `{actual}`")]
    InvalidFormat {
        /// `_type` or `predicateType`.
        field: &'static str,
        /// The required URI.
        expected: String,
        /// What the document carried.
        actual: String,
    },

    /// The VSA records an explicit failed check.
    #[error("SLSA policy evaluation failed with result: {result}")]
    PolicyNotPassed {
        /// The recorded result.
        result: String,
    },

    /// The VSA says nothing about SLSA policy.
    #[error("VSA missing SLSA policy evaluation result: {0}")]
    PolicyEvaluationMissing(String),

    /// No `SLSA_BUILD_LEVEL_<N>` tag in `verifiedLevels`.
    #[error("no SLSA build level found in VSA")]
    NoLevelFound,

    /// A tag has the build level prefix but a non-numeric suffix.
    #[error("invalid SLSA build level tag `{tag}`")]
    InvalidLevelTag {
        /// The offending tag.
        tag: String,
    },

    /// The caller asked for a level SLSA v1.0 does not define.
    #[error("invalid SLSA build level {0}: SLSA v1.0 only defines build levels L0-L3")]
    InvalidExpectedLevel(i64),

    /// The VSA asserts a lower level than required.
    #[error("VSA build level L{achieved} is lower than expected level L{expected}")]
    LevelTooLow {
        /// Highest level in the VSA.
        achieved: u32,
        /// Level the caller required.
        expected: u32,
    },

    /// The verifier ID is empty or not allowlisted.
    #[error("{}", untrusted_message(.verifier))]
    UntrustedVerifier {
        /// The verifier ID from the VSA.
        verifier: String,
    },

    /// The document does not conform to its schema.
    #[error("schema validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    /// A schema document is not usable.
    #[error("invalid schema `{name}`: {reason}")]
    InvalidSchema {
        /// Schema name.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// No schema with this name is available.
    #[error("schema `{0}` not found")]
    SchemaNotFound(String),

    /// Digest mismatch.
    #[error("digest mismatch for `{artifact}`: expected {expected}, got {actual}")]
    DigestMismatch {
        /// The artifact whose digest was checked.
        artifact: String,
        /// Expected hex digest.
        expected: String,
        /// Actual hex digest.
        actual: String,
    },

    /// I/O error during verification.
    #[error("verification I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error in a policy or schema file.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

fn untrusted_message(verifier: &str) -> String {
    if verifier.is_empty() {
        "VSA missing verifier ID".to_owned()
    } else {
        format!("VSA verifier `{verifier}` not in trusted list")
    }
}

impl VerificationError {
    /// Stable kind name for machine-readable output.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedInput(_) | Self::JsonError(_) => "MalformedInput",
            Self::InvalidFormat { .. } => "InvalidFormat",
            Self::PolicyNotPassed { .. } => "PolicyNotPassed",
            Self::PolicyEvaluationMissing(_) => "PolicyEvaluationMissing",
            Self::NoLevelFound => "NoLevelFound",
            Self::InvalidLevelTag { .. } => "InvalidLevelTag",
            Self::InvalidExpectedLevel(_) => "InvalidExpectedLevel",
            Self::LevelTooLow { .. } => "LevelTooLow",
            Self::UntrustedVerifier { .. } => "UntrustedVerifier",
            Self::ValidationFailed(_) => "ValidationFailed",
            Self::InvalidSchema { .. } => "InvalidSchema",
            Self::SchemaNotFound(_) => "SchemaNotFound",
            Self::DigestMismatch { .. } => "DigestMismatch",
            Self::IoError(_) => "IoError",
        }
    }
}
