//! Keeps one signed comment per pipeline step on a pull request.
//!
//! Every body the commenter writes ends with the slot's hidden signature
//! marker. Later runs list the issue's comments, pick the first one that
//! carries the signature, and either leave it, edit it, or post a new one.
//! Lookup and write are separate calls, so two concurrent runs for the same
//! slot can still both post.
use crate::comment::{CallContext, Comment, CommentStore, ListOptions};
use crate::error::{Error, Result};
use crate::signature::{Signature, SignatureConfig};

use tracing::{debug, info};

/// What to do with the current state of the issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No comment carries the signature yet.
    Create,
    /// The found comment already has exactly the signed body.
    Skip(Comment),
    /// The found comment carries the signature but its body differs.
    Update(Comment),
}

/// How a run treats earlier comments from the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Post a new comment every time.
    AlwaysPost,
    /// Create, skip or update the slot's existing comment.
    Reconcile,
}

impl Policy {
    pub fn from_allow_repeats(allow_repeats: bool) -> Policy {
        if allow_repeats {
            Policy::AlwaysPost
        } else {
            Policy::Reconcile
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(Comment),
    Unchanged(Comment),
    Updated(Comment),
}

impl Outcome {
    pub fn comment(&self) -> &Comment {
        match self {
            Outcome::Created(c) | Outcome::Unchanged(c) | Outcome::Updated(c) => c,
        }
    }
}

pub struct Commenter<S> {
    store: S,
    signature: Signature,
}

impl<S: CommentStore> Commenter<S> {
    pub fn new(store: S, config: &SignatureConfig) -> Result<Commenter<S>> {
        Ok(Commenter {
            store,
            signature: config.signature()?,
        })
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Posts `message` as a new signed comment.
    pub fn post(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        number: &str,
        message: &str,
    ) -> Result<Comment> {
        let body = self.signed_body(message)?;
        let number = parse_issue_number(number)?;

        debug!(owner, repo, number, "Creating comment");
        self.store
            .create_comment(ctx, owner, repo, number, &body)
            .map_err(|e| Error::remote("create comment", issue_target(owner, repo, number), e))
    }

    /// The first comment, oldest first, whose body contains the signature.
    /// `Ok(None)` when there is none.
    pub fn find_existing_comment(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        number: &str,
    ) -> Result<Option<Comment>> {
        let number = parse_issue_number(number)?;

        let comments = self
            .store
            .list_comments(ctx, owner, repo, number, &ListOptions::default())
            .map_err(|e| Error::remote("list comments", issue_target(owner, repo, number), e))?;
        debug!(owner, repo, number, count = comments.len(), "Scanning comments");

        Ok(comments
            .into_iter()
            .find(|comment| self.signature.is_in(&comment.body)))
    }

    /// True when `comment` already holds exactly the signed form of `message`.
    pub fn match_body(&self, comment: &Comment, message: &str) -> bool {
        comment.body == self.signature.sign(message)
    }

    /// Replaces the body of `comment_id` with the signed form of `message`.
    pub fn update_comment(
        &self,
        ctx: &CallContext,
        owner: &str,
        repo: &str,
        message: &str,
        comment_id: u64,
    ) -> Result<Comment> {
        let body = self.signed_body(message)?;

        debug!(owner, repo, comment_id, "Editing comment");
        self.store
            .edit_comment(ctx, owner, repo, comment_id, &body)
            .map_err(|e| {
                Error::remote(
                    "edit comment",
                    format!("{owner}/{repo} comment {comment_id}"),
                    e,
                )
            })
    }

    pub fn decide(&self, existing: Option<Comment>, message: &str) -> Decision {
        match existing {
            None => Decision::Create,
            Some(comment) if self.match_body(&comment, message) => Decision::Skip(comment),
            Some(comment) => Decision::Update(comment),
        }
    }

    /// One full pass for `policy`.
    pub fn run(
        &self,
        ctx: &CallContext,
        policy: Policy,
        owner: &str,
        repo: &str,
        number: &str,
        message: &str,
    ) -> Result<Outcome> {
        if is_blank(message) {
            return Err(Error::EmptyBody);
        }

        let decision = match policy {
            Policy::AlwaysPost => Decision::Create,
            Policy::Reconcile => {
                let existing = self.find_existing_comment(ctx, owner, repo, number)?;
                self.decide(existing, message)
            }
        };

        match decision {
            Decision::Create => {
                let comment = self.post(ctx, owner, repo, number, message)?;
                info!(id = comment.id, url = %comment.html_url, "Created comment");
                Ok(Outcome::Created(comment))
            }
            Decision::Skip(comment) => {
                info!(id = comment.id, url = %comment.html_url, "Comment is up to date");
                Ok(Outcome::Unchanged(comment))
            }
            Decision::Update(comment) => {
                let updated = self.update_comment(ctx, owner, repo, message, comment.id)?;
                info!(id = updated.id, url = %updated.html_url, "Updated comment");
                Ok(Outcome::Updated(updated))
            }
        }
    }

    fn signed_body(&self, message: &str) -> Result<String> {
        if is_blank(message) {
            return Err(Error::EmptyBody);
        }
        Ok(self.signature.sign(message))
    }
}

pub fn parse_issue_number(number: &str) -> Result<u64> {
    number
        .trim()
        .parse()
        .map_err(|_| Error::InvalidIssueNumber(number.to_owned()))
}

fn is_blank(message: &str) -> bool {
    message.trim().is_empty()
}

fn issue_target(owner: &str, repo: &str, number: u64) -> String {
    format!("{owner}/{repo}#{number}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::StoreError;

    use std::cell::RefCell;

    const SIGNED_TEST_COMMENT: &str =
        "Test comment\n\n<!-- test-pipeline:test-label:pr-commenter-buildkite-plugin:1 -->";

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Create {
            owner: String,
            repo: String,
            number: u64,
            body: String,
        },
        List {
            owner: String,
            repo: String,
            number: u64,
        },
        Edit {
            owner: String,
            repo: String,
            id: u64,
            body: String,
        },
    }

    #[derive(Default)]
    struct FakeStore {
        comments: Vec<Comment>,
        fail: bool,
        calls: RefCell<Vec<Call>>,
    }

    impl FakeStore {
        fn with_comments(comments: Vec<Comment>) -> FakeStore {
            FakeStore {
                comments,
                ..Default::default()
            }
        }

        fn failing() -> FakeStore {
            FakeStore {
                fail: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        fn check(&self) -> std::result::Result<(), StoreError> {
            if self.fail {
                Err("HTTP 502 Bad Gateway".into())
            } else {
                Ok(())
            }
        }
    }

    impl CommentStore for FakeStore {
        fn create_comment(
            &self,
            _ctx: &CallContext,
            owner: &str,
            repo: &str,
            number: u64,
            body: &str,
        ) -> std::result::Result<Comment, StoreError> {
            self.calls.borrow_mut().push(Call::Create {
                owner: owner.to_owned(),
                repo: repo.to_owned(),
                number,
                body: body.to_owned(),
            });
            self.check()?;
            Ok(comment(900, body))
        }

        fn list_comments(
            &self,
            _ctx: &CallContext,
            owner: &str,
            repo: &str,
            number: u64,
            _options: &ListOptions,
        ) -> std::result::Result<Vec<Comment>, StoreError> {
            self.calls.borrow_mut().push(Call::List {
                owner: owner.to_owned(),
                repo: repo.to_owned(),
                number,
            });
            self.check()?;
            Ok(self.comments.clone())
        }

        fn edit_comment(
            &self,
            _ctx: &CallContext,
            owner: &str,
            repo: &str,
            comment_id: u64,
            body: &str,
        ) -> std::result::Result<Comment, StoreError> {
            self.calls.borrow_mut().push(Call::Edit {
                owner: owner.to_owned(),
                repo: repo.to_owned(),
                id: comment_id,
                body: body.to_owned(),
            });
            self.check()?;
            Ok(comment(comment_id, body))
        }
    }

    fn comment(id: u64, body: &str) -> Comment {
        Comment {
            id,
            body: body.to_owned(),
            html_url: format!("https://github.com/test/repo/pull/1#issuecomment-{id}"),
        }
    }

    fn config() -> SignatureConfig {
        SignatureConfig::new("test-pipeline", "test-label", Some("1".to_owned()))
    }

    fn commenter(store: &FakeStore) -> Commenter<&FakeStore> {
        Commenter::new(store, &config()).unwrap()
    }

    #[test]
    fn test_post() {
        let store = FakeStore::default();
        let posted = commenter(&store)
            .post(&CallContext::background(), "testdev", "hello", "420", "Test comment")
            .unwrap();

        assert_eq!(posted.body, SIGNED_TEST_COMMENT);
        assert_eq!(
            store.calls(),
            vec![Call::Create {
                owner: "testdev".to_owned(),
                repo: "hello".to_owned(),
                number: 420,
                body: SIGNED_TEST_COMMENT.to_owned(),
            }]
        );
    }

    #[test]
    fn test_post_empty_body() {
        let store = FakeStore::default();
        let c = commenter(&store);

        for message in ["", " ", "\n\t "] {
            match c.post(&CallContext::background(), "testdev", "hello", "69", message) {
                Err(Error::EmptyBody) => {}
                other => panic!("expected EmptyBody for {message:?}, got {other:?}"),
            }
        }
        assert_eq!(store.calls(), vec![]);
    }

    #[test]
    fn test_post_keeps_surrounding_whitespace() {
        let store = FakeStore::default();
        let posted = commenter(&store)
            .post(&CallContext::background(), "o", "r", "1", "  hi\n")
            .unwrap();
        assert_eq!(
            posted.body,
            "  hi\n\n\n<!-- test-pipeline:test-label:pr-commenter-buildkite-plugin:1 -->"
        );
    }

    #[test]
    fn test_post_bad_number() {
        let store = FakeStore::default();
        match commenter(&store).post(&CallContext::background(), "o", "r", "false", "hi") {
            Err(Error::InvalidIssueNumber(n)) => assert_eq!(n, "false"),
            other => panic!("expected InvalidIssueNumber, got {other:?}"),
        }
        assert_eq!(store.calls(), vec![]);
    }

    #[test]
    fn test_post_remote_error() {
        let store = FakeStore::failing();
        let err = commenter(&store)
            .post(&CallContext::background(), "testdev", "hello", "420", "hi")
            .unwrap_err();

        match &err {
            Error::Remote {
                operation, target, ..
            } => {
                assert_eq!(*operation, "create comment");
                assert_eq!(target, "testdev/hello#420");
            }
            other => panic!("expected Remote, got {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "create comment failed for testdev/hello#420: HTTP 502 Bad Gateway"
        );
    }

    #[test]
    fn test_find_existing_comment_found() {
        let store = FakeStore::with_comments(vec![comment(123, SIGNED_TEST_COMMENT)]);
        let found = commenter(&store)
            .find_existing_comment(&CallContext::background(), "testdev", "hello", "320")
            .unwrap()
            .expect("expected comment to be found");

        assert_eq!(found.id, 123);
        assert_eq!(
            found.html_url,
            "https://github.com/test/repo/pull/1#issuecomment-123"
        );
        assert_eq!(
            store.calls(),
            vec![Call::List {
                owner: "testdev".to_owned(),
                repo: "hello".to_owned(),
                number: 320,
            }]
        );
    }

    #[test]
    fn test_find_existing_comment_not_found() {
        let store = FakeStore::with_comments(vec![
            comment(1, "unrelated"),
            comment(
                2,
                "Test comment\n\n<!-- test-pipeline:test-label:pr-commenter-buildkite-plugin:2 -->",
            ),
            comment(
                3,
                "Test comment\n\n<!-- other-pipeline:test-label:pr-commenter-buildkite-plugin:1 -->",
            ),
        ]);
        let found = commenter(&store)
            .find_existing_comment(&CallContext::background(), "o", "r", "5")
            .unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn test_find_existing_comment_first_wins() {
        let store = FakeStore::with_comments(vec![
            comment(10, "unrelated"),
            comment(11, "older\n\n<!-- test-pipeline:test-label:pr-commenter-buildkite-plugin:1 -->"),
            comment(12, SIGNED_TEST_COMMENT),
        ]);
        let found = commenter(&store)
            .find_existing_comment(&CallContext::background(), "o", "r", "5")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, 11);
    }

    #[test]
    fn test_find_existing_comment_matches_anywhere() {
        let store = FakeStore::with_comments(vec![comment(
            4,
            "see test-pipeline:test-label:pr-commenter-buildkite-plugin:1 for details",
        )]);
        let found = commenter(&store)
            .find_existing_comment(&CallContext::background(), "o", "r", "5")
            .unwrap();
        assert_eq!(found.map(|c| c.id), Some(4));
    }

    #[test]
    fn test_find_existing_comment_remote_error() {
        let store = FakeStore::failing();
        match commenter(&store).find_existing_comment(&CallContext::background(), "o", "r", "5") {
            Err(Error::Remote { operation, .. }) => assert_eq!(operation, "list comments"),
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[test]
    fn test_match_body() {
        let store = FakeStore::default();
        let c = commenter(&store);
        let existing = comment(1, SIGNED_TEST_COMMENT);

        assert!(c.match_body(&existing, "Test comment"));
        assert!(!c.match_body(&existing, "Test comment "));
        assert!(!c.match_body(&existing, "Test  comment"));
        assert!(!c.match_body(&existing, "Other comment"));
        assert!(!c.match_body(&comment(1, "Test comment"), "Test comment"));
        assert_eq!(store.calls(), vec![]);
    }

    #[test]
    fn test_update_comment() {
        let store = FakeStore::default();
        let updated = commenter(&store)
            .update_comment(
                &CallContext::background(),
                "testdev",
                "hello",
                "Updated comment",
                456,
            )
            .unwrap();

        let expected_body =
            "Updated comment\n\n<!-- test-pipeline:test-label:pr-commenter-buildkite-plugin:1 -->";
        assert_eq!(updated.id, 456);
        assert_eq!(
            store.calls(),
            vec![Call::Edit {
                owner: "testdev".to_owned(),
                repo: "hello".to_owned(),
                id: 456,
                body: expected_body.to_owned(),
            }]
        );
    }

    #[test]
    fn test_update_comment_empty_body() {
        let store = FakeStore::default();
        match commenter(&store).update_comment(&CallContext::background(), "o", "r", "  ", 456) {
            Err(Error::EmptyBody) => {}
            other => panic!("expected EmptyBody, got {other:?}"),
        }
        assert_eq!(store.calls(), vec![]);
    }

    #[test]
    fn test_update_comment_remote_error() {
        let store = FakeStore::failing();
        let err = commenter(&store)
            .update_comment(&CallContext::background(), "o", "r", "hi", 456)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "edit comment failed for o/r comment 456: HTTP 502 Bad Gateway"
        );
    }

    #[test]
    fn test_reconcile_creates_when_missing() {
        let store = FakeStore::with_comments(vec![comment(1, "unrelated")]);
        let outcome = commenter(&store)
            .run(
                &CallContext::background(),
                Policy::Reconcile,
                "o",
                "r",
                "7",
                "Test comment",
            )
            .unwrap();

        assert!(matches!(outcome, Outcome::Created(_)));
        assert_eq!(outcome.comment().body, SIGNED_TEST_COMMENT);
        assert_eq!(store.calls().len(), 2);
    }

    #[test]
    fn test_reconcile_skips_identical() {
        let store = FakeStore::with_comments(vec![comment(55, SIGNED_TEST_COMMENT)]);
        let outcome = commenter(&store)
            .run(
                &CallContext::background(),
                Policy::Reconcile,
                "o",
                "r",
                "7",
                "Test comment",
            )
            .unwrap();

        assert_eq!(outcome, Outcome::Unchanged(comment(55, SIGNED_TEST_COMMENT)));
        assert_eq!(
            store.calls(),
            vec![Call::List {
                owner: "o".to_owned(),
                repo: "r".to_owned(),
                number: 7,
            }]
        );
    }

    #[test]
    fn test_reconcile_updates_changed() {
        let store = FakeStore::with_comments(vec![comment(55, SIGNED_TEST_COMMENT)]);
        let outcome = commenter(&store)
            .run(
                &CallContext::background(),
                Policy::Reconcile,
                "o",
                "r",
                "7",
                "Build failed",
            )
            .unwrap();

        let new_body =
            "Build failed\n\n<!-- test-pipeline:test-label:pr-commenter-buildkite-plugin:1 -->";
        assert_eq!(outcome, Outcome::Updated(comment(55, new_body)));
        assert_eq!(
            store.calls().last(),
            Some(&Call::Edit {
                owner: "o".to_owned(),
                repo: "r".to_owned(),
                id: 55,
                body: new_body.to_owned(),
            })
        );
    }

    #[test]
    fn test_always_post_ignores_existing() {
        let store = FakeStore::with_comments(vec![comment(55, SIGNED_TEST_COMMENT)]);
        let outcome = commenter(&store)
            .run(
                &CallContext::background(),
                Policy::AlwaysPost,
                "o",
                "r",
                "7",
                "Test comment",
            )
            .unwrap();

        assert!(matches!(outcome, Outcome::Created(_)));
        assert!(matches!(store.calls().as_slice(), [Call::Create { .. }]));
    }

    #[test]
    fn test_run_empty_body_makes_no_calls() {
        let store = FakeStore::with_comments(vec![comment(55, SIGNED_TEST_COMMENT)]);
        for policy in [Policy::AlwaysPost, Policy::Reconcile] {
            match commenter(&store).run(&CallContext::background(), policy, "o", "r", "7", "") {
                Err(Error::EmptyBody) => {}
                other => panic!("expected EmptyBody, got {other:?}"),
            }
        }
        assert_eq!(store.calls(), vec![]);
    }

    #[test]
    fn test_new_rejects_bad_signature() {
        let store = FakeStore::default();
        let config = SignatureConfig::new("", "test-label", None);
        assert!(matches!(
            Commenter::new(&store, &config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_policy_from_allow_repeats() {
        assert_eq!(Policy::from_allow_repeats(true), Policy::AlwaysPost);
        assert_eq!(Policy::from_allow_repeats(false), Policy::Reconcile);
    }
}
