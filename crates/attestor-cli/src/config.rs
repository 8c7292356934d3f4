//! Configuration file loading.
//!
//! Resolution order:
//! 1. `--config <path>` (must exist)
//! 2. `config.toml` in the user config directory (`~/.config/attestor/`)
//! 3. Built-in defaults
//!
//! Organization-scoped compliance defaults and per-type permission defaults
//! are applied here, so the builders only ever see explicit values.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use attestor_statement::metadata::{self, ArtifactType, Compliance, Permissions};
use attestor_verify::schema_store::LayeredSchemas;
use color_eyre::eyre::{Result, WrapErr};
use serde::Deserialize;

/// Environment variable overriding `[schemas] dir`.
pub const SCHEMA_DIR_ENV: &str = "ATTESTOR_SCHEMA_DIR";

/// Forge URL used when the CI context does not name one.
pub const DEFAULT_SERVER_URL: &str = "https://github.com";

/// Default config file, resolved lazily.
static DEFAULT_CONFIG_PATH: LazyLock<Option<PathBuf>> = LazyLock::new(|| {
    directories::ProjectDirs::from("dev", "attestor", "attestor")
        .map(|dirs| dirs.config_dir().join("config.toml"))
});

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `[compliance]`
    pub compliance: ComplianceConfig,
    /// `[permissions]`
    pub permissions: PermissionsConfig,
    /// `[schemas]`
    pub schemas: SchemasConfig,
    /// `[depscan]`
    pub depscan: DepscanConfig,
    /// `[vsa]`
    pub vsa: VsaConfig,
}

impl Config {
    /// Load the configuration, falling back to defaults when no file exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match DEFAULT_CONFIG_PATH.as_ref() {
                Some(path) if path.is_file() => path.clone(),
                _ => {
                    tracing::debug!("no config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };
        let content = std::fs::read_to_string(&path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        let config = Self::parse(&content)
            .wrap_err_with(|| format!("invalid config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// `[compliance]`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComplianceConfig {
    /// Policy library URI.
    pub policy_ref: Option<String>,
    /// Control identifiers.
    pub control_ids: Option<Vec<String>>,
}

impl ComplianceConfig {
    /// Fill anything unset with the owner-scoped defaults.
    pub fn resolve(&self, server_url: &str, owner: &str) -> Compliance {
        let server_url = if server_url.is_empty() {
            DEFAULT_SERVER_URL
        } else {
            server_url
        };
        let defaults = Compliance::for_owner(server_url, owner);
        Compliance {
            policy_ref: self.policy_ref.clone().unwrap_or(defaults.policy_ref),
            control_ids: self.control_ids.clone().unwrap_or(defaults.control_ids),
        }
    }
}

/// `[permissions.container_image]` and `[permissions.blob]`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PermissionsConfig {
    /// Overrides for images.
    pub container_image: Permissions,
    /// Overrides for blobs.
    pub blob: Permissions,
}

impl PermissionsConfig {
    /// The per-type defaults with configured entries laid over them.
    pub fn for_type(&self, artifact_type: ArtifactType) -> Permissions {
        let mut permissions = metadata::default_permissions(artifact_type);
        let overrides = match artifact_type {
            ArtifactType::ContainerImage => &self.container_image,
            ArtifactType::Blob => &self.blob,
        };
        permissions.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
        permissions
    }
}

/// `[schemas]`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemasConfig {
    /// Local schema directory layered over the embedded schemas.
    pub dir: Option<PathBuf>,
}

impl SchemasConfig {
    /// The schema source, honoring [`SCHEMA_DIR_ENV`].
    pub fn source(&self) -> LayeredSchemas {
        LayeredSchemas::new(self.dir_with(|key| std::env::var_os(key).map(PathBuf::from)))
    }

    fn dir_with(&self, lookup: impl Fn(&str) -> Option<PathBuf>) -> Option<PathBuf> {
        lookup(SCHEMA_DIR_ENV)
            .filter(|d| !d.as_os_str().is_empty())
            .or_else(|| self.dir.clone())
    }
}

/// Which clock fills the dependency-scan window.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimestampSource {
    /// Database build time and report generation time.
    #[default]
    Report,
    /// The current time for both ends.
    Now,
}

/// `[depscan]`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DepscanConfig {
    /// Scan window source.
    pub timestamps: TimestampSource,
}

/// `[vsa]`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VsaConfig {
    /// Verifier allowlist.
    pub trusted_verifiers: Option<Vec<String>>,
    /// Required build level.
    pub minimum_level: Option<i64>,
}
