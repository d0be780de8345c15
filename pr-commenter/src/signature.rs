//! Identity of a comment slot, and the hidden marker that carries it.
//!
//! A signature looks like `pipeline:step:pr-commenter-buildkite-plugin:id`
//! and is appended to every posted body as an HTML comment so it never
//! renders. The exact byte layout has to stay stable: comments posted by
//! earlier runs are found again by substring match on it.
use crate::error::{Error, Result};

use tracing::debug;

/// Fixed name embedded in every signature.
pub const PLUGIN_NAME: &str = "pr-commenter-buildkite-plugin";

/// Message id used when none is configured.
pub const DEFAULT_MESSAGE_ID: &str = "0";

const DELIMITER: char = ':';

/// Inputs to the signature, populated once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureConfig {
    pub pipeline: String,
    pub step: String,
    pub message_id: Option<String>,
}

impl SignatureConfig {
    pub fn new(
        pipeline: impl Into<String>,
        step: impl Into<String>,
        message_id: Option<String>,
    ) -> SignatureConfig {
        SignatureConfig {
            pipeline: pipeline.into(),
            step: step.into(),
            message_id,
        }
    }

    pub fn signature(&self) -> Result<Signature> {
        Signature::build(&self.pipeline, &self.step, self.message_id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    /// Builds the token for one (pipeline, step, message id) slot.
    ///
    /// The pipeline and message id may not contain `:`; the step label
    /// may, since Buildkite labels routinely carry `:emoji:` shortcodes.
    /// With the plugin name fixed between them, the token still splits
    /// back into a single triple. Nothing may contain `-->` or a line
    /// break, either of which would end the hidden marker early.
    pub fn build(pipeline: &str, step: &str, message_id: Option<&str>) -> Result<Signature> {
        let message_id = message_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_MESSAGE_ID);

        if pipeline.trim().is_empty() {
            return Err(Error::Config("pipeline slug is empty".to_owned()));
        }
        if step.trim().is_empty() {
            return Err(Error::Config("step label is empty".to_owned()));
        }
        if pipeline.contains(DELIMITER) {
            return Err(Error::Config(format!(
                "pipeline slug {pipeline:?} contains {DELIMITER:?}"
            )));
        }
        if message_id.contains(DELIMITER) {
            return Err(Error::Config(format!(
                "message id {message_id:?} contains {DELIMITER:?}"
            )));
        }
        for (what, value) in [
            ("pipeline slug", pipeline),
            ("step label", step),
            ("message id", message_id),
        ] {
            if value.contains("-->") || value.contains(['\n', '\r']) {
                return Err(Error::Config(format!(
                    "{what} {value:?} cannot be embedded in a comment marker"
                )));
            }
        }

        let token = format!("{pipeline}{DELIMITER}{step}{DELIMITER}{PLUGIN_NAME}{DELIMITER}{message_id}");
        debug!(signature = %token, "Computed comment signature");

        Ok(Signature(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The hidden marker as it appears at the end of a signed body.
    pub fn marker(&self) -> String {
        format!("<!-- {} -->", self.0)
    }

    /// `message`, a blank line, then the marker.
    pub fn sign(&self, message: &str) -> String {
        format!("{}\n\n{}", message, self.marker())
    }

    /// Whether `body` carries this signature anywhere.
    ///
    /// This is a plain substring search, so a body quoting another slot's
    /// full signature text would also match.
    pub fn is_in(&self, body: &str) -> bool {
        body.contains(&self.0)
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
