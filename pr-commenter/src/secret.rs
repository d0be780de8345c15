//! Looks up the GitHub token by name: environment first, then the
//! Buildkite agent's secret store.
use std::io;
use std::process::Command;

use tracing::debug;

const AGENT_BIN: &str = "buildkite-agent";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("secret name is empty")]
    EmptyName,
    #[error("could not run `buildkite-agent secret get {name}`: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("`buildkite-agent secret get {name}` failed: {stderr}")]
    Agent { name: String, stderr: String },
    #[error("secret {0:?} is empty")]
    Empty(String),
}

pub fn get_secret(name: &str) -> Result<String, Error> {
    get_secret_with(name, |key| std::env::var(key).ok(), AGENT_BIN)
}

fn get_secret_with<F>(name: &str, lookup: F, agent: &str) -> Result<String, Error>
where
    F: Fn(&str) -> Option<String>,
{
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::EmptyName);
    }

    if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
        debug!(name, "Using secret from the environment");
        return Ok(value.trim().to_owned());
    }

    debug!(name, "Asking the agent for the secret");
    let output = Command::new(agent)
        .args(["secret", "get", name])
        .output()
        .map_err(|source| Error::Spawn {
            name: name.to_owned(),
            source,
        })?;

    if !output.status.success() {
        return Err(Error::Agent {
            name: name.to_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }

    let value = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    if value.is_empty() {
        return Err(Error::Empty(name.to_owned()));
    }

    Ok(value)
}
