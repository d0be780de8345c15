use std::time::{Duration, Instant};

use serde::{Deserialize, Deserializer};

/// Errors surfaced by a [`CommentStore`].
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// An issue or pull request comment as the remote store reports it.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub body: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub html_url: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Paging for [`CommentStore::list_comments`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub per_page: u8,
}

impl Default for ListOptions {
    fn default() -> ListOptions {
        ListOptions { per_page: 100 }
    }
}

/// Carried through every store call untouched by the commenter. Only the
/// store implementation looks inside.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn background() -> CallContext {
        CallContext { deadline: None }
    }

    pub fn with_timeout(timeout: Duration) -> CallContext {
        CallContext {
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `Some(ZERO)` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

/// The three calls the commenter needs from an issue comment store.
///
/// `list_comments` returns every comment on the issue, oldest first; any
/// paging is the implementation's business.
pub trait CommentStore {
    fn create_comment(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<Comment, StoreError>;

    fn list_comments(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        number: u64,
        options: &ListOptions,
    ) -> Result<Vec<Comment>, StoreError>;

    fn edit_comment(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        comment_id: u64,
        body: &str,
    ) -> Result<Comment, StoreError>;
}

impl<S: CommentStore + ?Sized> CommentStore for &S {
    fn create_comment(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<Comment, StoreError> {
        (**self).create_comment(ctx, owner, repo, number, body)
    }

    fn list_comments(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        number: u64,
        options: &ListOptions,
    ) -> Result<Vec<Comment>, StoreError> {
        (**self).list_comments(ctx, owner, repo, number, options)
    }

    fn edit_comment(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        comment_id: u64,
        body: &str,
    ) -> Result<Comment, StoreError> {
        (**self).edit_comment(ctx, owner, repo, comment_id, body)
    }
}
