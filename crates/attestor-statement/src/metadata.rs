//! Artifact metadata predicate (`https://cosign.sigstore.dev/attestation/v1`).
//!
//! Binds an artifact to the CI run that produced it: repository, owner,
//! runner, workflow, job, and commit provenance plus a compliance block and
//! the token permissions the run was granted.
//!
//! The builder takes compliance and permission values as explicit inputs.
//! Organization-scoped defaults live in [`Compliance::for_owner`] and
//! [`default_permissions`] for the configuration layer to apply.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AttestationError;
use crate::statement::{DigestSet, Predicate, Statement, Subject, rfc3339};

/// Predicate type URI for metadata attestations.
pub const PREDICATE_TYPE: &str = "https://cosign.sigstore.dev/attestation/v1";

/// Registry assumed when an image name carries no host component.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// What kind of artifact is being described.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactType {
    /// An OCI image in a registry.
    ContainerImage,
    /// One or more files.
    Blob,
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ContainerImage => "container-image",
            Self::Blob => "blob",
        })
    }
}

impl FromStr for ArtifactType {
    type Err = AttestationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" | "container-image" => Ok(Self::ContainerImage),
            "blob" => Ok(Self::Blob),
            other => Err(AttestationError::InvalidStatement(format!(
                "unknown artifact type `{other}` (expected image or blob)"
            ))),
        }
    }
}

/// Access level granted for one token scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Read and write.
    Write,
    /// Read only.
    Read,
    /// No access.
    None,
}

/// Token scope name mapped to its access level.
pub type Permissions = BTreeMap<String, Permission>;

/// Default permissions for an artifact type.
///
/// Images need registry push rights (`packages: write`); blobs get
/// `packages: none`.
pub fn default_permissions(artifact_type: ArtifactType) -> Permissions {
    let packages = match artifact_type {
        ArtifactType::ContainerImage => Permission::Write,
        ArtifactType::Blob => Permission::None,
    };
    Permissions::from([
        ("id-token".to_owned(), Permission::Write),
        ("attestations".to_owned(), Permission::Write),
        ("contents".to_owned(), Permission::Read),
        ("packages".to_owned(), packages),
    ])
}

/// Compliance block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compliance {
    /// URI of the policy library the artifact is governed by.
    pub policy_ref: String,
    /// Control identifiers this attestation provides evidence for.
    pub control_ids: Vec<String>,
}

impl Compliance {
    /// Organization-scoped defaults: a policy repository under the owner and
    /// the three standard control IDs.
    pub fn for_owner(server_url: &str, owner: &str) -> Self {
        Self {
            policy_ref: format!(
                "{}/{owner}/attestation-policy",
                server_url.trim_end_matches('/')
            ),
            control_ids: default_control_ids(owner),
        }
    }
}

/// `<owner>-PROVENANCE-001`, `<owner>-SBOM-002`, `<owner>-METADATA-003`.
pub fn default_control_ids(owner: &str) -> Vec<String> {
    vec![
        format!("{owner}-PROVENANCE-001"),
        format!("{owner}-SBOM-002"),
        format!("{owner}-METADATA-003"),
    ]
}

/// Runner host details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerContext {
    /// Runner operating system.
    pub os: String,
    /// Runner CPU architecture.
    pub arch: String,
    /// `github-hosted` or `self-hosted`.
    pub environment: String,
}

/// CI run details, loaded by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildContext {
    /// `owner/name`.
    pub repository: String,
    /// Numeric repository ID.
    pub repository_id: String,
    /// Forge base URL.
    pub server_url: String,
    /// Repository owner login.
    pub owner: String,
    /// Numeric owner ID.
    pub owner_id: String,
    /// Organization name.
    pub organization: String,
    /// Commit SHA under build.
    pub sha: String,
    /// Branch or tag name.
    pub ref_name: String,
    /// Triggering event name.
    pub event_name: String,
    /// User who triggered the run.
    pub actor: String,
    /// Run ID.
    pub run_id: String,
    /// Run number.
    pub run_number: String,
    /// Workflow file reference.
    pub workflow_ref: String,
    /// Job status.
    pub job_status: String,
    /// Runner details.
    pub runner: RunnerContext,
    /// Workflow inputs.
    pub inputs: BTreeMap<String, serde_json::Value>,
    /// When the workflow run was created.
    pub workflow_started_at: Option<DateTime<Utc>>,
    /// Head commit timestamp.
    pub commit_timestamp: Option<DateTime<Utc>>,
}

impl BuildContext {
    /// `<sha[:7]>-<runNumber>`.
    pub fn artifact_version(&self) -> String {
        let short = self.sha.get(..7).unwrap_or(&self.sha);
        format!("{short}-{}", self.run_number)
    }
}

/// Identity of the artifact being described.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    /// Image or blob.
    pub artifact_type: ArtifactType,
    /// Image reference (images).
    pub name: Option<String>,
    /// Content digest, with or without `sha256:`.
    pub digest: Option<String>,
    /// Explicit registry host (images).
    pub registry: Option<String>,
    /// Subject paths (blobs).
    pub paths: Vec<String>,
}

impl ArtifactRef {
    /// An image reference.
    pub fn image(name: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            artifact_type: ArtifactType::ContainerImage,
            name: Some(name.into()),
            digest: Some(digest.into()),
            registry: None,
            paths: Vec::new(),
        }
    }

    /// A blob described by one or more paths.
    pub fn blob(paths: Vec<String>, digest: Option<String>) -> Self {
        Self {
            artifact_type: ArtifactType::Blob,
            name: None,
            digest,
            registry: None,
            paths,
        }
    }

    /// The statement subject for this artifact, when name and digest are known.
    pub fn subject(&self) -> Option<Subject> {
        let digest = non_empty(self.digest.as_deref())?;
        let name = match self.artifact_type {
            ArtifactType::ContainerImage => {
                let name = non_empty(self.name.as_deref())?;
                name.split_once('@').map_or(name, |(repo, _)| repo).to_owned()
            }
            ArtifactType::Blob => {
                if self.paths.is_empty() {
                    return None;
                }
                self.paths.join("\n")
            }
        };
        Some(Subject::new(name, DigestSet::from_prefixed(digest)))
    }
}

/// Everything the builder needs beyond the CI context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataOptions {
    /// The artifact.
    pub artifact: ArtifactRef,
    /// Artifact creation time.
    pub created: DateTime<Utc>,
    /// Job completion time.
    pub completed_at: DateTime<Utc>,
    /// Compliance block.
    pub compliance: Compliance,
    /// Token permissions.
    pub permissions: Permissions,
}

/// `artifact` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDetails {
    /// `<sha[:7]>-<runNumber>`.
    pub version: String,
    /// Creation time.
    pub created: String,
    /// Artifact type.
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    /// Registry host (images).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    /// `<name>@<digest>` (images).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// `sha256:`-prefixed digest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Newline-joined subject paths (blobs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// `repositoryData` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryData {
    /// `owner/name`.
    pub repository: String,
    /// Numeric repository ID.
    pub repository_id: String,
    /// Forge base URL.
    #[serde(rename = "githubServerURL")]
    pub github_server_url: String,
}

/// `ownerData` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerData {
    /// Owner login.
    pub owner: String,
    /// Numeric owner ID.
    pub owner_id: String,
}

/// `workflowData` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowData {
    /// Workflow file reference.
    pub workflow_ref_path: String,
    /// Workflow inputs.
    pub inputs: BTreeMap<String, serde_json::Value>,
    /// Branch or tag.
    pub branch: String,
    /// Triggering event.
    pub event: String,
}

/// `jobData` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobData {
    /// Run number.
    pub run_number: String,
    /// Run ID.
    pub run_id: String,
    /// Job status.
    pub status: String,
    /// Actor.
    pub triggered_by: String,
    /// Workflow run start.
    pub started_at: String,
    /// Job completion.
    pub completed_at: String,
}

/// `commitData` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitData {
    /// Commit SHA.
    pub sha: String,
    /// Commit timestamp.
    pub timestamp: String,
}

/// `organization` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Organization name.
    pub name: String,
}

/// `security` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    /// Token permissions.
    pub permissions: Permissions,
}

/// Metadata predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Artifact identity.
    pub artifact: ArtifactDetails,
    /// Repository provenance.
    pub repository_data: RepositoryData,
    /// Owner provenance.
    pub owner_data: OwnerData,
    /// Runner details.
    pub runner_data: RunnerContext,
    /// Workflow details.
    pub workflow_data: WorkflowData,
    /// Job details.
    pub job_data: JobData,
    /// Commit details.
    pub commit_data: CommitData,
    /// Organization.
    pub organization: Organization,
    /// Compliance references.
    pub compliance: Compliance,
    /// Granted permissions.
    pub security: Security,
}

impl Predicate for Metadata {
    const PREDICATE_TYPE: &'static str = PREDICATE_TYPE;
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn with_sha256_prefix(digest: &str) -> String {
    if digest.starts_with("sha256:") {
        digest.to_owned()
    } else {
        format!("sha256:{digest}")
    }
}

/// Registry host from an image reference: the first path segment when it
/// looks like a host, otherwise [`DEFAULT_REGISTRY`].
pub fn registry_of(image: &str) -> String {
    match image.split_once('/') {
        Some((host, _)) if host.contains('.') || host.contains(':') || host == "localhost" => {
            host.to_owned()
        }
        _ => DEFAULT_REGISTRY.to_owned(),
    }
}

fn artifact_details(
    ctx: &BuildContext,
    artifact: &ArtifactRef,
    created: &str,
) -> Result<ArtifactDetails, AttestationError> {
    let mut details = ArtifactDetails {
        version: ctx.artifact_version(),
        created: created.to_owned(),
        artifact_type: artifact.artifact_type,
        registry: None,
        full_name: None,
        digest: None,
        path: None,
    };

    match artifact.artifact_type {
        ArtifactType::ContainerImage => {
            let name = non_empty(artifact.name.as_deref()).ok_or(
                AttestationError::MissingRequiredField {
                    field: "subject name",
                    context: "container-image metadata",
                },
            )?;
            let digest = non_empty(artifact.digest.as_deref()).ok_or(
                AttestationError::MissingRequiredField {
                    field: "subject digest",
                    context: "container-image metadata",
                },
            )?;
            let digest = with_sha256_prefix(digest);
            let full_name = if name.contains("@sha256:") {
                name.to_owned()
            } else {
                format!("{name}@{digest}")
            };
            details.registry = Some(
                non_empty(artifact.registry.as_deref())
                    .map_or_else(|| registry_of(name), str::to_owned),
            );
            details.full_name = Some(full_name);
            details.digest = Some(digest);
        }
        ArtifactType::Blob => {
            if artifact.paths.iter().all(String::is_empty) {
                return Err(AttestationError::MissingRequiredField {
                    field: "subject path",
                    context: "blob metadata",
                });
            }
            details.path = Some(artifact.paths.join("\n"));
            details.digest = non_empty(artifact.digest.as_deref()).map(with_sha256_prefix);
        }
    }

    Ok(details)
}

/// Build the metadata predicate.
///
/// Images need a name and digest; blobs need at least one path.
pub fn build(ctx: &BuildContext, opts: &MetadataOptions) -> Result<Metadata, AttestationError> {
    let created = rfc3339(opts.created);
    let artifact = artifact_details(ctx, &opts.artifact, &created)?;

    let metadata = Metadata {
        artifact,
        repository_data: RepositoryData {
            repository: ctx.repository.clone(),
            repository_id: ctx.repository_id.clone(),
            github_server_url: ctx.server_url.clone(),
        },
        owner_data: OwnerData {
            owner: ctx.owner.clone(),
            owner_id: ctx.owner_id.clone(),
        },
        runner_data: ctx.runner.clone(),
        workflow_data: WorkflowData {
            workflow_ref_path: ctx.workflow_ref.clone(),
            inputs: ctx.inputs.clone(),
            branch: ctx.ref_name.clone(),
            event: ctx.event_name.clone(),
        },
        job_data: JobData {
            run_number: ctx.run_number.clone(),
            run_id: ctx.run_id.clone(),
            status: ctx.job_status.clone(),
            triggered_by: ctx.actor.clone(),
            started_at: ctx.workflow_started_at.map_or_else(|| created.clone(), rfc3339),
            completed_at: rfc3339(opts.completed_at),
        },
        commit_data: CommitData {
            sha: ctx.sha.clone(),
            timestamp: ctx.commit_timestamp.map_or_else(|| created.clone(), rfc3339),
        },
        organization: Organization {
            name: ctx.organization.clone(),
        },
        compliance: opts.compliance.clone(),
        security: Security {
            permissions: opts.permissions.clone(),
        },
    };

    tracing::debug!(
        artifact_type = %metadata.artifact.artifact_type,
        version = %metadata.artifact.version,
        "assembled metadata predicate"
    );
    Ok(metadata)
}

/// Build the metadata predicate wrapped in a statement about `subjects`.
pub fn statement(
    ctx: &BuildContext,
    opts: &MetadataOptions,
    subjects: Vec<Subject>,
) -> Result<Statement<Metadata>, AttestationError> {
    Ok(Statement::new(subjects, build(ctx, opts)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn ctx() -> BuildContext {
        BuildContext {
            repository: "acme/app".into(),
            repository_id: "42".into(),
            server_url: "https://github.com".into(),
            owner: "acme".into(),
            owner_id: "7".into(),
            organization: "acme".into(),
            sha: "0123456789abcdef".into(),
            ref_name: "main".into(),
            event_name: "push".into(),
            actor: "octocat".into(),
            run_id: "1001".into(),
            run_number: "12".into(),
            workflow_ref: "acme/app/.github/workflows/build.yml@refs/heads/main".into(),
            job_status: "success".into(),
            runner: RunnerContext {
                os: "Linux".into(),
                arch: "X64".into(),
                environment: "github-hosted".into(),
            },
            inputs: BTreeMap::new(),
            workflow_started_at: Some(ts("2024-01-06T13:55:00Z")),
            commit_timestamp: None,
        }
    }

    fn opts(artifact: ArtifactRef) -> MetadataOptions {
        let permissions = default_permissions(artifact.artifact_type);
        MetadataOptions {
            artifact,
            created: ts("2024-01-06T14:00:00Z"),
            completed_at: ts("2024-01-06T14:01:00Z"),
            compliance: Compliance::for_owner("https://github.com", "acme"),
            permissions,
        }
    }

    #[test]
    fn artifact_version_uses_short_sha() {
        assert_eq!(ctx().artifact_version(), "0123456-12");
        let short = BuildContext {
            sha: "abc".into(),
            run_number: "3".into(),
            ..BuildContext::default()
        };
        assert_eq!(short.artifact_version(), "abc-3");
    }

    #[test]
    fn image_metadata() {
        let artifact = ArtifactRef::image("ghcr.io/acme/app", "deadbeef");
        let m = build(&ctx(), &opts(artifact)).unwrap();
        assert_eq!(m.artifact.artifact_type, ArtifactType::ContainerImage);
        assert_eq!(m.artifact.registry.as_deref(), Some("ghcr.io"));
        assert_eq!(m.artifact.full_name.as_deref(), Some("ghcr.io/acme/app@sha256:deadbeef"));
        assert_eq!(m.artifact.digest.as_deref(), Some("sha256:deadbeef"));
        assert!(m.artifact.path.is_none());
        assert_eq!(m.security.permissions["packages"], Permission::Write);
        assert_eq!(m.job_data.started_at, "2024-01-06T13:55:00Z");
        assert_eq!(m.commit_data.timestamp, "2024-01-06T14:00:00Z");
    }

    #[test]
    fn full_name_with_digest_is_kept() {
        let artifact = ArtifactRef::image("ghcr.io/acme/app@sha256:deadbeef", "sha256:deadbeef");
        let m = build(&ctx(), &opts(artifact)).unwrap();
        assert_eq!(m.artifact.full_name.as_deref(), Some("ghcr.io/acme/app@sha256:deadbeef"));
    }

    #[test]
    fn registry_defaults_for_hubless_names() {
        assert_eq!(registry_of("library/nginx"), "docker.io");
        assert_eq!(registry_of("nginx"), "docker.io");
        assert_eq!(registry_of("localhost:5000/app"), "localhost:5000");
    }

    #[test]
    fn explicit_registry_wins() {
        let mut artifact = ArtifactRef::image("acme/app", "deadbeef");
        artifact.registry = Some("registry.internal".into());
        let m = build(&ctx(), &opts(artifact)).unwrap();
        assert_eq!(m.artifact.registry.as_deref(), Some("registry.internal"));
    }

    #[test]
    fn image_without_digest_is_rejected() {
        let mut artifact = ArtifactRef::image("ghcr.io/acme/app", "");
        artifact.digest = None;
        let err = build(&ctx(), &opts(artifact)).unwrap_err();
        assert!(matches!(
            err,
            AttestationError::MissingRequiredField { field: "subject digest", .. }
        ));
    }

    #[test]
    fn image_without_name_is_rejected() {
        let mut artifact = ArtifactRef::image("", "deadbeef");
        artifact.name = None;
        assert!(build(&ctx(), &opts(artifact)).is_err());
    }

    #[test]
    fn blob_metadata_joins_paths() {
        let artifact = ArtifactRef::blob(vec!["dist/a.tar".into(), "dist/b.tar".into()], None);
        let m = build(&ctx(), &opts(artifact)).unwrap();
        assert_eq!(m.artifact.path.as_deref(), Some("dist/a.tar\ndist/b.tar"));
        assert!(m.artifact.registry.is_none());
        assert!(m.artifact.full_name.is_none());
        assert_eq!(m.security.permissions["packages"], Permission::None);
    }

    #[test]
    fn blob_without_path_is_rejected() {
        let artifact = ArtifactRef::blob(vec![], Some("abc".into()));
        let err = build(&ctx(), &opts(artifact)).unwrap_err();
        assert!(matches!(
            err,
            AttestationError::MissingRequiredField { field: "subject path", .. }
        ));
    }

    #[test]
    fn compliance_defaults_are_owner_scoped() {
        let c = Compliance::for_owner("https://github.com/", "acme");
        assert_eq!(c.policy_ref, "https://github.com/acme/attestation-policy");
        assert_eq!(
            c.control_ids,
            ["acme-PROVENANCE-001", "acme-SBOM-002", "acme-METADATA-003"]
        );
    }

    #[test]
    fn serialized_field_names() {
        let artifact = ArtifactRef::image("ghcr.io/acme/app", "deadbeef");
        let subject = artifact.subject().unwrap();
        let stmt = statement(&ctx(), &opts(artifact), vec![subject]).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&stmt.to_json_pretty().unwrap()).unwrap();
        let p = &json["predicate"];
        assert_eq!(json["predicateType"], PREDICATE_TYPE);
        assert_eq!(json["subject"][0]["name"], "ghcr.io/acme/app");
        assert_eq!(json["subject"][0]["digest"]["sha256"], "deadbeef");
        assert_eq!(p["artifact"]["type"], "container-image");
        assert_eq!(p["artifact"]["fullName"], "ghcr.io/acme/app@sha256:deadbeef");
        assert_eq!(p["repositoryData"]["githubServerURL"], "https://github.com");
        assert_eq!(p["ownerData"]["ownerId"], "7");
        assert_eq!(p["jobData"]["runNumber"], "12");
        assert_eq!(p["compliance"]["controlIds"][0], "acme-PROVENANCE-001");
        assert_eq!(p["security"]["permissions"]["id-token"], "write");
        assert!(p["artifact"].get("path").is_none());
    }

    #[test]
    fn artifact_type_parsing() {
        assert_eq!("image".parse::<ArtifactType>().unwrap(), ArtifactType::ContainerImage);
        assert_eq!("blob".parse::<ArtifactType>().unwrap(), ArtifactType::Blob);
        assert!("tarball".parse::<ArtifactType>().is_err());
    }
}
