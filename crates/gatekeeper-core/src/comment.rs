//! Threaded review discussion
//!
//! Comments are append-only. A reply may only point at a comment that
//! already exists in the same review, so the parent graph is a forest and
//! every thread has finite depth.

use crate::error::ReviewError;
use crate::types::{CommentId, ReviewId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Default upper bound on a comment body, in characters
pub const DEFAULT_MAX_BODY_LEN: usize = 5000;

/// A posted comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment ID
    pub id: CommentId,
    /// Owning review
    pub review_id: ReviewId,
    /// Author
    pub author: UserId,
    /// Comment this one replies to
    pub parent: Option<CommentId>,
    /// File the comment is anchored to
    pub file_path: Option<String>,
    /// Line within `file_path`
    pub line: Option<u32>,
    /// Text
    pub body: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Whether this comment replies to another
    #[inline]
    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.parent.is_some()
    }

    fn display_order(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Input for a new comment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    /// Text
    pub body: String,
    /// Reply target
    pub parent: Option<CommentId>,
    /// Anchor file
    pub file_path: Option<String>,
    /// Anchor line
    pub line: Option<u32>,
}

impl NewComment {
    /// Top-level comment with `body`
    #[inline]
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Reply to `parent`
    #[inline]
    #[must_use]
    pub fn reply_to(mut self, parent: CommentId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Anchor to a file line
    #[inline]
    #[must_use]
    pub fn at(mut self, file_path: impl Into<String>, line: u32) -> Self {
        self.file_path = Some(file_path.into());
        self.line = Some(line);
        self
    }

    /// Anchor to a whole file
    #[inline]
    #[must_use]
    pub fn on_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }
}

/// The comments of one review, kept in display order
#[derive(Debug, Clone)]
pub struct CommentThread {
    review_id: ReviewId,
    comments: Vec<Comment>,
    max_body_len: usize,
}

impl CommentThread {
    /// Build the thread for `review_id`. Comments of other reviews are ignored.
    pub fn new(review_id: ReviewId, comments: impl IntoIterator<Item = Comment>) -> Self {
        let mut comments: Vec<Comment> = comments
            .into_iter()
            .filter(|c| c.review_id == review_id)
            .collect();
        comments.sort_by(Comment::display_order);
        Self {
            review_id,
            comments,
            max_body_len: DEFAULT_MAX_BODY_LEN,
        }
    }

    /// Override the body length limit
    #[inline]
    #[must_use]
    pub fn with_max_body_len(mut self, max_body_len: usize) -> Self {
        self.max_body_len = max_body_len;
        self
    }

    /// Validate and append a comment, returning it.
    ///
    /// # Errors
    /// - `InvalidComment` for a blank or oversized body, or a line without a file
    /// - `CommentParentNotFound` if the parent is not in this review
    pub fn add(
        &mut self,
        author: UserId,
        draft: NewComment,
        now: DateTime<Utc>,
    ) -> Result<Comment, ReviewError> {
        self.validate(&draft)?;

        let comment = Comment {
            id: CommentId::new(),
            review_id: self.review_id,
            author,
            parent: draft.parent,
            file_path: draft.file_path,
            line: draft.line,
            body: draft.body,
            created_at: now,
        };

        let at = self
            .comments
            .partition_point(|c| c.display_order(&comment) == Ordering::Less);
        self.comments.insert(at, comment.clone());
        Ok(comment)
    }

    fn validate(&self, draft: &NewComment) -> Result<(), ReviewError> {
        if draft.body.trim().is_empty() {
            return Err(ReviewError::InvalidComment("body must not be empty".to_string()));
        }
        let len = draft.body.chars().count();
        if len > self.max_body_len {
            return Err(ReviewError::InvalidComment(format!(
                "body has {len} characters, limit is {}",
                self.max_body_len
            )));
        }
        if draft.line.is_some() && draft.file_path.is_none() {
            return Err(ReviewError::InvalidComment(
                "line number given without a file path".to_string(),
            ));
        }
        if let Some(parent) = draft.parent {
            if self.get(parent).is_none() {
                return Err(ReviewError::CommentParentNotFound {
                    review: self.review_id,
                    parent,
                });
            }
        }
        Ok(())
    }

    /// Owning review
    #[inline]
    #[must_use]
    pub fn review_id(&self) -> ReviewId {
        self.review_id
    }

    /// All comments, chronological
    #[inline]
    #[must_use]
    pub fn ordered(&self) -> &[Comment] {
        &self.comments
    }

    /// Look up a comment
    #[must_use]
    pub fn get(&self, id: CommentId) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    /// Top-level comments, chronological
    pub fn roots(&self) -> impl Iterator<Item = &Comment> {
        self.comments.iter().filter(|c| c.parent.is_none())
    }

    /// Direct replies to `parent`, chronological
    pub fn replies(&self, parent: CommentId) -> impl Iterator<Item = &Comment> {
        self.comments
            .iter()
            .filter(move |c| c.parent == Some(parent))
    }

    /// Ancestors of `id`, nearest first
    #[must_use]
    pub fn ancestors(&self, id: CommentId) -> Vec<CommentId> {
        let mut chain = Vec::new();
        let mut cursor = self.get(id).and_then(|c| c.parent);
        // A forest never has a chain longer than the thread itself
        while let Some(parent) = cursor {
            if chain.len() >= self.comments.len() || chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            cursor = self.get(parent).and_then(|c| c.parent);
        }
        chain
    }

    /// Number of ancestors; 0 for top-level comments
    #[inline]
    #[must_use]
    pub fn depth(&self, id: CommentId) -> usize {
        self.ancestors(id).len()
    }

    /// Number of comments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.comments.len()
    }

    /// Whether there are no comments
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn unknown_parent_rejected() {
        let mut thread = CommentThread::new(ReviewId::new(), Vec::new());
        let missing = CommentId::new();

        let err = thread
            .add(UserId::new(), NewComment::new("hi").reply_to(missing), Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            ReviewError::CommentParentNotFound { parent, .. } if parent == missing
        ));
        assert!(thread.is_empty());
    }

    #[test]
    fn parent_from_other_review_rejected() {
        let mut other = CommentThread::new(ReviewId::new(), Vec::new());
        let foreign = other.add(UserId::new(), NewComment::new("x"), Utc::now()).unwrap();

        let review = ReviewId::new();
        let mut thread = CommentThread::new(review, vec![foreign.clone()]);
        assert!(thread.is_empty());

        let err = thread
            .add(UserId::new(), NewComment::new("y").reply_to(foreign.id), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ReviewError::CommentParentNotFound { .. }));
    }

    #[test]
    fn replies_form_a_forest() {
        let mut thread = CommentThread::new(ReviewId::new(), Vec::new());
        let t0 = Utc::now();
        let user = UserId::new();

        let root = thread.add(user, NewComment::new("root"), t0).unwrap();
        let child = thread
            .add(user, NewComment::new("child").reply_to(root.id), t0 + Duration::seconds(1))
            .unwrap();
        let grandchild = thread
            .add(user, NewComment::new("grandchild").reply_to(child.id), t0 + Duration::seconds(2))
            .unwrap();

        assert_eq!(thread.depth(root.id), 0);
        assert_eq!(thread.depth(grandchild.id), 2);
        assert_eq!(thread.ancestors(grandchild.id), vec![child.id, root.id]);
        for c in thread.ordered() {
            assert!(!thread.ancestors(c.id).contains(&c.id));
        }
        assert_eq!(thread.replies(root.id).count(), 1);
        assert_eq!(thread.roots().count(), 1);
    }

    #[test]
    fn ordering_is_chronological_with_id_tiebreak() {
        let review = ReviewId::new();
        let t0 = Utc::now();
        let mut thread = CommentThread::new(review, Vec::new());
        let late = thread
            .add(UserId::new(), NewComment::new("late"), t0 + Duration::minutes(5))
            .unwrap();
        let early = thread.add(UserId::new(), NewComment::new("early"), t0).unwrap();
        let tied = thread.add(UserId::new(), NewComment::new("tied"), t0).unwrap();

        let ids: Vec<_> = thread.ordered().iter().map(|c| c.id).collect();
        let (first, second) = if early.id < tied.id {
            (early.id, tied.id)
        } else {
            (tied.id, early.id)
        };
        assert_eq!(ids, vec![first, second, late.id]);

        let rebuilt = CommentThread::new(review, thread.ordered().iter().rev().cloned());
        let rebuilt_ids: Vec<_> = rebuilt.ordered().iter().map(|c| c.id).collect();
        assert_eq!(rebuilt_ids, ids);
    }

    #[test]
    fn body_validation() {
        let mut thread = CommentThread::new(ReviewId::new(), Vec::new()).with_max_body_len(10);
        let user = UserId::new();

        assert!(matches!(
            thread.add(user, NewComment::new("   "), Utc::now()),
            Err(ReviewError::InvalidComment(_))
        ));
        assert!(matches!(
            thread.add(user, NewComment::new("x".repeat(11)), Utc::now()),
            Err(ReviewError::InvalidComment(_))
        ));
        let anchored = thread
            .add(user, NewComment::new("nit").at("src/lib.rs", 42), Utc::now())
            .unwrap();
        assert_eq!(anchored.line, Some(42));
    }

    #[test]
    fn line_without_file_rejected() {
        let mut thread = CommentThread::new(ReviewId::new(), Vec::new());
        let draft = NewComment {
            line: Some(3),
            ..NewComment::new("where?")
        };
        assert!(matches!(
            thread.add(UserId::new(), draft, Utc::now()),
            Err(ReviewError::InvalidComment(_))
        ));
    }
}
