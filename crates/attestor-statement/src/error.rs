//! Error types for statement and predicate construction.

/// Errors from building attestation statements and predicates.
#[derive(Debug, thiserror::Error)]
pub enum AttestationError {
    /// A field the predicate cannot be built without was not supplied.
    #[error("missing required field `{field}` for {context}")]
    MissingRequiredField {
        /// Name of the absent field.
        field: &'static str,
        /// What was being built (e.g. `container-image metadata`).
        context: &'static str,
    },

    /// A verified-level tag did not have the form `SLSA_BUILD_LEVEL_<N>`.
    #[error("invalid SLSA build level tag `{0}`")]
    InvalidLevelTag(String),

    /// The statement envelope is internally inconsistent.
    #[error("invalid statement: {0}")]
    InvalidStatement(String),

    /// Failed to serialize the statement.
    #[error("failed to serialize attestation: {0}")]
    SerializeError(#[from] serde_json::Error),
}
