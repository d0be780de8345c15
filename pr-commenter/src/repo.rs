use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("repository URL is empty")]
    Empty,
    #[error("cannot find owner/name in repository URL {0:?}")]
    Unrecognized(String),
}

fn repo_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // scheme://[user@]host[:port]/owner/name or scp-like user@host:owner/name
        Regex::new(
            r"^(?:(?:https?|ssh|git)://(?:[^@/]+@)?[^/]+/|[^@/\s]+@[^:/\s]+:)(?P<owner>[^/\s]+)/(?P<name>[^/\s]+?)(?:\.git)?/?$",
        )
        .unwrap_or_else(|e| panic!("repository regex does not compile: {e}"))
    })
}

/// Splits a clone URL into `(owner, repo)`.
pub fn parse_repo(url: &str) -> Result<(String, String), ParseError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ParseError::Empty);
    }

    let caps = repo_re()
        .captures(url)
        .ok_or_else(|| ParseError::Unrecognized(url.to_owned()))?;

    Ok((caps["owner"].to_owned(), caps["name"].to_owned()))
}
