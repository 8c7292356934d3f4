//! Subject flags shared by the attestation-building commands.

use std::path::PathBuf;

use attestor_statement::metadata::{ArtifactRef, ArtifactType};
use attestor_statement::{DigestSet, Subject};
use attestor_verify::digest;
use clap::Args;
use color_eyre::eyre::Result;

/// What the attestation is about.
#[derive(Args, Debug, Clone)]
pub struct SubjectArgs {
    /// Artifact type: `image` or `blob`.
    #[arg(long = "type", value_name = "TYPE", default_value = "image")]
    pub artifact_type: ArtifactType,

    /// Image reference (images).
    #[arg(long, value_name = "NAME")]
    pub subject_name: Option<String>,

    /// Subject digest, `sha256:<hex>` or bare hex. Computed from
    /// `--subject-path` for blobs when omitted.
    #[arg(long, value_name = "DIGEST")]
    pub subject_digest: Option<String>,

    /// Registry host; derived from the image reference when omitted.
    #[arg(long, value_name = "HOST")]
    pub registry: Option<String>,

    /// File or directory making up a blob (repeatable).
    #[arg(long, value_name = "PATH")]
    pub subject_path: Vec<PathBuf>,
}

impl SubjectArgs {
    /// Resolve the flags into an artifact reference, digesting blob files
    /// when no digest was given.
    pub fn artifact(&self) -> Result<ArtifactRef> {
        match self.artifact_type {
            ArtifactType::ContainerImage => Ok(ArtifactRef {
                artifact_type: ArtifactType::ContainerImage,
                name: self.subject_name.clone(),
                digest: self.subject_digest.clone(),
                registry: self.registry.clone(),
                paths: Vec::new(),
            }),
            ArtifactType::Blob => {
                if self.subject_path.is_empty() {
                    return Ok(ArtifactRef::blob(Vec::new(), self.subject_digest.clone()));
                }
                let mut files = Vec::new();
                for path in &self.subject_path {
                    files.extend(digest::list_files(path)?);
                }
                files.sort();
                files.dedup();
                let digest = match &self.subject_digest {
                    Some(digest) => digest.clone(),
                    None => format!("sha256:{}", digest::digest_paths(&files)?),
                };
                let names = files.iter().map(|f| f.display().to_string()).collect();
                Ok(ArtifactRef::blob(names, Some(digest)))
            }
        }
    }

    /// The statement subject. Missing parts are left empty for the schema
    /// gate to reject.
    pub fn subject(&self) -> Result<Subject> {
        let artifact = self.artifact()?;
        Ok(artifact.subject().unwrap_or_else(|| {
            let name = match artifact.artifact_type {
                ArtifactType::ContainerImage => artifact.name.unwrap_or_default(),
                ArtifactType::Blob => artifact.paths.join("\n"),
            };
            Subject::new(
                name,
                DigestSet::from_prefixed(artifact.digest.as_deref().unwrap_or_default()),
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(paths: Vec<PathBuf>) -> SubjectArgs {
        SubjectArgs {
            artifact_type: ArtifactType::Blob,
            subject_name: None,
            subject_digest: None,
            registry: None,
            subject_path: paths,
        }
    }

    #[test]
    fn image_subject_strips_digest_suffix() {
        let args = SubjectArgs {
            artifact_type: ArtifactType::ContainerImage,
            subject_name: Some("ghcr.io/acme/app@sha256:abc".into()),
            subject_digest: Some("sha256:abc".into()),
            registry: None,
            subject_path: Vec::new(),
        };
        let subject = args.subject().unwrap();
        assert_eq!(subject.name, "ghcr.io/acme/app");
        assert_eq!(subject.digest.get("sha256"), Some("abc"));
    }

    #[test]
    fn blob_directory_is_listed_and_digested() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.bin"), b"world").unwrap();
        std::fs::write(dir.path().join("a.bin"), b"hello").unwrap();

        let artifact = blob(vec![dir.path().to_path_buf()]).artifact().unwrap();
        assert_eq!(artifact.paths.len(), 2);
        assert!(artifact.paths[0].ends_with("a.bin"));
        assert_eq!(
            artifact.digest.as_deref(),
            Some(format!("sha256:{}", digest::sha256_bytes(b"helloworld")).as_str())
        );
        let subject = blob(vec![dir.path().to_path_buf()]).subject().unwrap();
        assert_eq!(subject.name.lines().count(), 2);
    }

    #[test]
    fn missing_image_digest_leaves_empty_subject() {
        let args = SubjectArgs {
            artifact_type: ArtifactType::ContainerImage,
            subject_name: Some("ghcr.io/acme/app".into()),
            subject_digest: None,
            registry: None,
            subject_path: Vec::new(),
        };
        let subject = args.subject().unwrap();
        assert_eq!(subject.digest.get("sha256"), Some(""));
    }
}
