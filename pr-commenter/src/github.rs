//! GitHub REST implementation of [`CommentStore`].
use crate::comment::{CallContext, Comment, CommentStore, ListOptions, StoreError};

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Serialize;
use tracing::{debug, trace};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const USER_AGENT: &str = "pr-commenter-buildkite-plugin";
const API_VERSION: &str = "2022-11-28";
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("GitHub responded {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("deadline exceeded before the request was sent")]
    DeadlineExceeded,

    #[error("invalid authorization token")]
    InvalidToken,
}

#[derive(Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

pub struct GithubClient {
    http: Client,
    api_base: String,
}

impl GithubClient {
    pub fn new(api_base: &str, token: &str, timeout: Duration) -> Result<GithubClient, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|_| ApiError::InvalidToken)?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(GithubClient {
            http,
            api_base: api_base.trim_end_matches('/').to_owned(),
        })
    }

    fn issue_comments_url(&self, owner: &str, repo: &str, number: u64) -> String {
        format!(
            "{}/repos/{owner}/{repo}/issues/{number}/comments",
            self.api_base
        )
    }

    fn comment_url(&self, owner: &str, repo: &str, comment_id: u64) -> String {
        format!(
            "{}/repos/{owner}/{repo}/issues/comments/{comment_id}",
            self.api_base
        )
    }

    fn send<T>(&self, ctx: &CallContext, request: RequestBuilder) -> Result<T, ApiError>
    where
        T: serde::de::DeserializeOwned,
    {
        let request = match ctx.remaining() {
            Some(left) if left.is_zero() => return Err(ApiError::DeadlineExceeded),
            Some(left) => request.timeout(left),
            None => request,
        };

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ApiError::Status {
                status,
                body: truncate(body.trim(), MAX_ERROR_BODY),
            });
        }

        Ok(response.json()?)
    }
}

impl CommentStore for GithubClient {
    fn create_comment(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<Comment, StoreError> {
        let request = self
            .http
            .post(self.issue_comments_url(owner, repo, number))
            .json(&CommentBody { body });
        Ok(self.send(ctx, request)?)
    }

    fn list_comments(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        number: u64,
        options: &ListOptions,
    ) -> Result<Vec<Comment>, StoreError> {
        let per_page = usize::from(options.per_page.max(1));
        let mut comments = Vec::new();
        let mut page = 1_u32;

        loop {
            trace!(owner, repo, number, page, "Fetching comment page");
            let request = self
                .http
                .get(self.issue_comments_url(owner, repo, number))
                .query(&[
                    ("per_page", per_page.to_string()),
                    ("page", page.to_string()),
                ]);
            let chunk: Vec<Comment> = self.send(ctx, request)?;
            let chunk_len = chunk.len();
            comments.extend(chunk);

            if chunk_len < per_page {
                break;
            }
            page = page.saturating_add(1);
        }

        debug!(owner, repo, number, count = comments.len(), "Listed comments");
        Ok(comments)
    }

    fn edit_comment(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        comment_id: u64,
        body: &str,
    ) -> Result<Comment, StoreError> {
        let request = self
            .http
            .patch(self.comment_url(owner, repo, comment_id))
            .json(&CommentBody { body });
        Ok(self.send(ctx, request)?)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_owned(),
    }
}
