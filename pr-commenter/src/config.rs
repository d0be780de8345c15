use crate::error::{Error, Result};
use crate::github::DEFAULT_API_URL;
use crate::signature::SignatureConfig;

use std::time::Duration;

use tracing::warn;

/// Prefix Buildkite gives this plugin's options.
pub const PLUGIN_PREFIX: &str = "BUILDKITE_PLUGIN_PR_COMMENTER_";

const DEFAULT_SECRET_NAME: &str = "GITHUB_TOKEN";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Everything the binary reads from the job environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    /// Clone URL of the repository the pull request lives in
    pub repository: String,
    /// Pull request number as given by Buildkite, `None` for non-PR builds
    pub pull_request: Option<String>,
    pub pipeline_slug: String,
    pub step_label: String,
    /// Separates several comments from the same step
    pub message_id: Option<String>,
    /// Name of the secret holding the GitHub token
    pub secret_name: String,
    /// Comment text, before signing
    pub message: String,
    /// When false, an existing comment from this step is reused
    pub allow_repeats: bool,
    pub api_url: String,
    /// Upper bound for the whole run against the GitHub API
    pub timeout: Duration,
}

impl PluginConfig {
    pub fn from_env() -> Result<PluginConfig> {
        PluginConfig::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<PluginConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let plugin = |option: &str| lookup(&format!("{PLUGIN_PREFIX}{option}"));
        let var = |key: &str| lookup(key).unwrap_or_default();

        let repository = lookup("BUILDKITE_PULL_REQUEST_REPO")
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| var("BUILDKITE_REPO"));

        let pull_request = lookup("BUILDKITE_PULL_REQUEST")
            .map(|pr| pr.trim().to_owned())
            .filter(|pr| !pr.is_empty() && pr != "false");

        let message = plugin("MESSAGE").unwrap_or_else(|| {
            let step_url = format!(
                "{}#{}",
                var("BUILDKITE_BUILD_URL"),
                var("BUILDKITE_JOB_ID")
            );
            format!(
                "[{step_url}]({step_url}) exited with code {}",
                var("BUILDKITE_COMMAND_EXIT_STATUS")
            )
        });

        // Set but unparsable reads as false, which turns reconciliation on.
        let allow_repeats = match plugin("ALLOW_REPEATS") {
            None => true,
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "Unparsable allow-repeats value, treating it as false");
                false
            }),
        };

        let timeout = match plugin("TIMEOUT_SECONDS") {
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            Some(raw) => raw
                .trim()
                .parse()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| Error::Config(format!("invalid timeout-seconds {raw:?}")))?,
        };

        Ok(PluginConfig {
            repository,
            pull_request,
            pipeline_slug: var("BUILDKITE_PIPELINE_SLUG"),
            step_label: var("BUILDKITE_LABEL"),
            message_id: plugin("MESSAGE_ID"),
            secret_name: plugin("SECRET_NAME")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SECRET_NAME.to_owned()),
            message,
            allow_repeats,
            api_url: plugin("API_URL")
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_owned()),
            timeout,
        })
    }

    pub fn signature_config(&self) -> SignatureConfig {
        SignatureConfig::new(
            self.pipeline_slug.clone(),
            self.step_label.clone(),
            self.message_id.clone(),
        )
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}
