//! GitHub Actions build context.
//!
//! Reads the runner's environment variables (and the event payload they
//! point at) into a [`BuildContext`]. Variables are taken from a map so the
//! loader can be driven without touching the process environment.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use attestor_statement::metadata::{BuildContext, RunnerContext};
use chrono::{DateTime, Utc};
use color_eyre::eyre::{Result, WrapErr, eyre};
use serde_json::Value;

use crate::config::DEFAULT_SERVER_URL;

const INPUT_PREFIX: &str = "INPUT_";

/// Environment variables for one CI job.
#[derive(Debug, Default)]
pub struct CiEnv {
    vars: HashMap<String, String>,
}

impl CiEnv {
    /// Snapshot the process environment.
    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build from explicit `(name, value)` pairs.
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            vars: vars.into_iter().collect(),
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_owned()
    }

    fn require(&self, key: &str) -> Result<String> {
        self.get(key)
            .map(str::to_owned)
            .ok_or_else(|| eyre!("required environment variable {key} is not set"))
    }

    /// Load the build context.
    ///
    /// `RUNNER_OS` and `RUNNER_ARCH` are required; everything else falls
    /// back to an empty string or a documented default.
    pub fn build_context(&self) -> Result<BuildContext> {
        let owner = self.get_or("GITHUB_REPOSITORY_OWNER", "");
        let organization = self
            .get("GITHUB_ORGANIZATION")
            .map_or_else(|| owner.clone(), str::to_owned);
        let job_status = self
            .get("GITHUB_JOB_STATUS")
            .or_else(|| self.get("JOB_STATUS"))
            .unwrap_or("success")
            .to_owned();

        let runner = RunnerContext {
            os: self.require("RUNNER_OS")?,
            arch: self.require("RUNNER_ARCH")?,
            environment: self.get_or("RUNNER_ENVIRONMENT", ""),
        };

        let (workflow_started_at, commit_timestamp) = match self.get("GITHUB_EVENT_PATH") {
            Some(path) => event_timestamps(Path::new(path))?,
            None => (None, None),
        };

        let ctx = BuildContext {
            repository: self.get_or("GITHUB_REPOSITORY", ""),
            repository_id: self.get_or("GITHUB_REPOSITORY_ID", ""),
            server_url: self.get_or("GITHUB_SERVER_URL", DEFAULT_SERVER_URL),
            owner_id: self.get_or("GITHUB_REPOSITORY_OWNER_ID", ""),
            owner,
            organization,
            sha: self.get_or("GITHUB_SHA", ""),
            ref_name: self.get_or("GITHUB_REF_NAME", ""),
            event_name: self.get_or("GITHUB_EVENT_NAME", ""),
            actor: self.get_or("GITHUB_ACTOR", ""),
            run_id: self.get_or("GITHUB_RUN_ID", ""),
            run_number: self.get_or("GITHUB_RUN_NUMBER", ""),
            workflow_ref: self.get_or("GITHUB_WORKFLOW_REF", ""),
            job_status,
            runner,
            inputs: self.workflow_inputs()?,
            workflow_started_at,
            commit_timestamp,
        };
        tracing::debug!(
            repository = %ctx.repository,
            run_id = %ctx.run_id,
            inputs = ctx.inputs.len(),
            "loaded CI build context"
        );
        Ok(ctx)
    }

    /// `GITHUB_WORKFLOW_INPUTS` as JSON, with `INPUT_<NAME>` variables
    /// filling in names it does not already carry.
    fn workflow_inputs(&self) -> Result<BTreeMap<String, Value>> {
        let mut inputs = match self.get("GITHUB_WORKFLOW_INPUTS") {
            Some(raw) => serde_json::from_str::<BTreeMap<String, Value>>(raw)
                .wrap_err("GITHUB_WORKFLOW_INPUTS is not a JSON object")?,
            None => BTreeMap::new(),
        };
        for (key, value) in &self.vars {
            if let Some(name) = key.strip_prefix(INPUT_PREFIX) {
                if name.is_empty() {
                    continue;
                }
                inputs
                    .entry(name.to_lowercase())
                    .or_insert_with(|| Value::String(value.clone()));
            }
        }
        Ok(inputs)
    }
}

fn parse_time(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let raw = value?.as_str()?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(value = raw, error = %e, "ignoring unparseable event timestamp");
            None
        }
    }
}

/// `workflow_run.created_at` and `head_commit.timestamp` from the event
/// payload file.
fn event_timestamps(path: &Path) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let data = std::fs::read(path)
        .wrap_err_with(|| format!("failed to read event payload {}", path.display()))?;
    let event: Value = serde_json::from_slice(&data)
        .wrap_err_with(|| format!("event payload {} is not JSON", path.display()))?;
    Ok((
        parse_time(event.pointer("/workflow_run/created_at")),
        parse_time(event.pointer("/head_commit/timestamp")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> CiEnv {
        CiEnv::from_vars(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned())),
        )
    }

    fn runner() -> Vec<(&'static str, &'static str)> {
        vec![("RUNNER_OS", "Linux"), ("RUNNER_ARCH", "X64")]
    }

    #[test]
    fn runner_variables_are_required() {
        let err = env(&[("RUNNER_OS", "Linux")]).build_context().unwrap_err();
        assert!(err.to_string().contains("RUNNER_ARCH"));
    }

    #[test]
    fn defaults_for_optional_variables() {
        let mut pairs = runner();
        pairs.extend([("GITHUB_REPOSITORY_OWNER", "acme"), ("JOB_STATUS", "failure")]);
        let ctx = env(&pairs).build_context().unwrap();
        assert_eq!(ctx.organization, "acme");
        assert_eq!(ctx.job_status, "failure");
        assert_eq!(ctx.server_url, "https://github.com");
        assert!(ctx.workflow_started_at.is_none());
    }

    #[test]
    fn job_status_prefers_github_variable() {
        let mut pairs = runner();
        pairs.extend([("GITHUB_JOB_STATUS", "cancelled"), ("JOB_STATUS", "failure")]);
        assert_eq!(env(&pairs).build_context().unwrap().job_status, "cancelled");
        assert_eq!(env(&runner()).build_context().unwrap().job_status, "success");
    }

    #[test]
    fn inputs_merge_json_and_input_variables() {
        let mut pairs = runner();
        pairs.extend([
            ("GITHUB_WORKFLOW_INPUTS", r#"{"environment": "prod", "dry_run": false}"#),
            ("INPUT_ENVIRONMENT", "staging"),
            ("INPUT_IMAGE_TAG", "v1.2.3"),
        ]);
        let inputs = env(&pairs).build_context().unwrap().inputs;
        assert_eq!(inputs["environment"], "prod");
        assert_eq!(inputs["dry_run"], false);
        assert_eq!(inputs["image_tag"], "v1.2.3");
    }

    #[test]
    fn malformed_workflow_inputs_are_an_error() {
        let mut pairs = runner();
        pairs.push(("GITHUB_WORKFLOW_INPUTS", "{not json"));
        assert!(env(&pairs).build_context().is_err());
    }

    #[test]
    fn event_payload_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let event = dir.path().join("event.json");
        std::fs::write(
            &event,
            r#"{"workflow_run": {"created_at": "2024-01-06T09:00:00+01:00"},
                "head_commit": {"timestamp": "not a time"}}"#,
        )
        .unwrap();
        let event_path = event.display().to_string();
        let mut pairs: Vec<(&str, &str)> = runner();
        pairs.push(("GITHUB_EVENT_PATH", &event_path));
        let ctx = env(&pairs).build_context().unwrap();
        assert_eq!(
            ctx.workflow_started_at.unwrap().to_rfc3339(),
            "2024-01-06T08:00:00+00:00"
        );
        assert!(ctx.commit_timestamp.is_none());
    }
}
