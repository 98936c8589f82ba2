// Canonical content records produced by the snapshot normalizer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{ReactionKind, StorePath, UserId};

/// One author-reference shape, whatever the stored record looked like
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    pub id: Option<UserId>,
    pub display_name: Option<String>,
    /// Embedded suspension flag copied at write time; stale by definition
    pub suspended_hint: Option<bool>,
}

impl AuthorRef {
    pub fn by_id(id: UserId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn display_name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.display_name.as_deref().unwrap_or(fallback)
    }
}

/// Reaction maps of one subject: acting user -> timestamp (ms)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionSet {
    pub likes: BTreeMap<UserId, i64>,
    pub dislikes: BTreeMap<UserId, i64>,
    pub upvotes: BTreeMap<UserId, i64>,
}

impl ReactionSet {
    pub fn get(&self, kind: ReactionKind) -> &BTreeMap<UserId, i64> {
        match kind {
            ReactionKind::Like => &self.likes,
            ReactionKind::Dislike => &self.dislikes,
            ReactionKind::Upvote => &self.upvotes,
        }
    }

    pub fn get_mut(&mut self, kind: ReactionKind) -> &mut BTreeMap<UserId, i64> {
        match kind {
            ReactionKind::Like => &mut self.likes,
            ReactionKind::Dislike => &mut self.dislikes,
            ReactionKind::Upvote => &mut self.upvotes,
        }
    }

    pub fn count(&self, kind: ReactionKind) -> usize {
        self.get(kind).len()
    }

    pub fn contains(&self, kind: ReactionKind, user: &UserId) -> bool {
        self.get(kind).contains_key(user)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    /// Identity of the comment; parent references point at it
    pub id: String,
    /// Key the record is stored under in its collection. Equal to `id` for
    /// keyed mappings; the list position for legacy comment lists.
    pub storage_key: String,
    pub author: AuthorRef,
    pub text: String,
    pub attachment_url: Option<String>,
    pub is_published: bool,
    pub reactions: ReactionSet,
    /// Flat-shape link to another comment in the same collection
    pub parent_id: Option<String>,
    pub created_at: Option<i64>,
    /// Nested-shape children, in stored order
    pub replies: Vec<CommentRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: String,
    pub path: StorePath,
    pub title: String,
    pub body: Option<String>,
    pub is_published: bool,
    pub reactions: ReactionSet,
    pub comments: Vec<CommentRecord>,
}

/// A devlog post, stored under its owner at `posts/{owner}/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub owner: UserId,
    pub id: String,
    pub path: StorePath,
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub author: AuthorRef,
    pub is_published: bool,
    pub created_at: Option<i64>,
    pub reactions: ReactionSet,
    pub comments: Vec<CommentRecord>,
    pub logs: Vec<LogRecord>,
}

impl PostRecord {
    pub fn comments_path(&self) -> StorePath {
        self.path.child_unchecked(crate::core::layout::COMMENTS)
    }
}
