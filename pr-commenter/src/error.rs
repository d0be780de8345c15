use crate::comment::StoreError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The message was empty or whitespace only. Nothing is sent.
    #[error("refusing to post an empty comment body")]
    EmptyBody,

    /// The signature inputs were unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid issue number {0:?}")]
    InvalidIssueNumber(String),

    /// The comment store failed. The source is kept as-is.
    #[error("{operation} failed for {target}: {source}")]
    Remote {
        operation: &'static str,
        target: String,
        #[source]
        source: StoreError,
    },
}

impl Error {
    pub(crate) fn remote(operation: &'static str, target: String, source: StoreError) -> Error {
        Error::Remote {
            operation,
            target,
            source,
        }
    }
}
