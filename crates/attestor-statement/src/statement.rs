//! in-toto v1 attestation statement envelope.
//!
//! See: <https://github.com/in-toto/attestation/blob/main/spec/v1/statement.md>

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AttestationError;

/// The canonical statement type URI.
pub const STATEMENT_TYPE: &str = "https://in-toto.io/Statement/v1";

/// A typed predicate payload that a [`Statement`] can carry.
pub trait Predicate {
    /// The URI written to the statement's `predicateType`.
    const PREDICATE_TYPE: &'static str;
}

/// An in-toto v1 attestation statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement<P> {
    /// Always [`STATEMENT_TYPE`] for statements built here.
    #[serde(rename = "_type")]
    pub statement_type: String,
    /// The artifacts this statement is about.
    pub subject: Vec<Subject>,
    /// URI identifying the shape of `predicate`.
    #[serde(rename = "predicateType")]
    pub predicate_type: String,
    /// The typed payload.
    pub predicate: P,
}

impl<P: Predicate> Statement<P> {
    /// Wrap a predicate in a statement about the given subjects.
    pub fn new(subject: Vec<Subject>, predicate: P) -> Self {
        Self {
            statement_type: STATEMENT_TYPE.to_owned(),
            subject,
            predicate_type: P::PREDICATE_TYPE.to_owned(),
            predicate,
        }
    }

    /// Check the envelope invariants: fixed statement type, a predicate type
    /// matching the payload, and at least one subject with a name and a
    /// non-empty digest set.
    pub fn check_envelope(&self) -> Result<(), AttestationError> {
        if self.statement_type != STATEMENT_TYPE {
            return Err(AttestationError::InvalidStatement(format!(
                "statement type `{}` is not `{STATEMENT_TYPE}`",
                self.statement_type
            )));
        }
        if self.predicate_type != P::PREDICATE_TYPE {
            return Err(AttestationError::InvalidStatement(format!(
                "predicate type `{}` does not match payload type `{}`",
                self.predicate_type,
                P::PREDICATE_TYPE
            )));
        }
        if self.subject.is_empty() {
            return Err(AttestationError::InvalidStatement(
                "statement has no subjects".to_owned(),
            ));
        }
        for subject in &self.subject {
            if subject.name.is_empty() {
                return Err(AttestationError::InvalidStatement(
                    "subject has an empty name".to_owned(),
                ));
            }
            if subject.digest.is_empty() {
                return Err(AttestationError::InvalidStatement(format!(
                    "subject `{}` has no digests",
                    subject.name
                )));
            }
        }
        Ok(())
    }
}

impl<P: Serialize> Statement<P> {
    /// Pretty-printed JSON of the whole statement.
    pub fn to_json_pretty(&self) -> Result<Vec<u8>, AttestationError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Pretty-printed JSON of the predicate alone, for tools that wrap the
    /// predicate in their own statement.
    pub fn predicate_json_pretty(&self) -> Result<Vec<u8>, AttestationError> {
        Ok(serde_json::to_vec_pretty(&self.predicate)?)
    }
}

/// A subject (attested artifact) of a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Image reference, file path, or newline-separated file listing.
    pub name: String,
    /// Content digests.
    pub digest: DigestSet,
}

impl Subject {
    /// Create a subject.
    pub fn new(name: impl Into<String>, digest: DigestSet) -> Self {
        Self {
            name: name.into(),
            digest,
        }
    }
}

/// Digest algorithm names mapped to hex-encoded values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DigestSet(BTreeMap<String, String>);

impl DigestSet {
    /// A set holding a single SHA-256 digest. A leading `sha256:` is dropped.
    pub fn sha256(hex: &str) -> Self {
        let mut set = Self::default();
        set.insert("sha256", hex.strip_prefix("sha256:").unwrap_or(hex));
        set
    }

    /// Parse an `algorithm:hex` digest string. Strings without an algorithm
    /// prefix are taken as SHA-256.
    pub fn from_prefixed(digest: &str) -> Self {
        match digest.split_once(':') {
            Some((alg, hex)) if !alg.is_empty() => {
                let mut set = Self::default();
                set.insert(alg, hex);
                set
            }
            _ => Self::sha256(digest),
        }
    }

    /// Add or replace one digest.
    pub fn insert(&mut self, algorithm: &str, hex: &str) {
        self.0.insert(algorithm.to_owned(), hex.to_owned());
    }

    /// Look up a digest by algorithm name.
    pub fn get(&self, algorithm: &str) -> Option<&str> {
        self.0.get(algorithm).map(String::as_str)
    }

    /// Whether the set holds no digests.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(algorithm, hex)` pairs in algorithm order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Format a timestamp as RFC 3339 with second precision and a `Z` suffix.
pub fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Re-render an RFC 3339 timestamp in UTC with second precision. Strings
/// that do not parse are returned unchanged.
pub fn normalize_rfc3339(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map_or_else(|_| raw.to_owned(), |ts| rfc3339(ts.with_timezone(&Utc)))
}
