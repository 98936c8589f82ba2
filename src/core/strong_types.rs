// Strong Types - newtypes and closed enums shared by every component
// Keeps raw strings out of engine signatures

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AppError, AppResult};

/// A single key in the hierarchical keyspace may not contain `/ . # $ [ ]`
static KEY_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^/.#$\[\]\x00-\x1f]+$").expect("key segment pattern is valid")
});

pub fn is_valid_key(segment: &str) -> bool {
    KEY_SEGMENT.is_match(segment)
}

fn check_key(segment: &str) -> AppResult<()> {
    if is_valid_key(segment) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("invalid key segment '{}'", segment)))
    }
}

/// Slash-delimited path into the shared keyspace. The empty path is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorePath(String);

impl StorePath {
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse and validate a path; leading/trailing slashes are ignored
    pub fn parse(raw: &str) -> AppResult<Self> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        for segment in trimmed.split('/') {
            check_key(segment)?;
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Append one validated key segment
    pub fn join(&self, segment: &str) -> AppResult<Self> {
        check_key(segment)?;
        Ok(self.child_unchecked(segment))
    }

    /// Append a path (possibly several segments)
    pub fn join_path(&self, other: &StorePath) -> Self {
        if self.is_root() {
            other.clone()
        } else if other.is_root() {
            self.clone()
        } else {
            Self(format!("{}/{}", self.0, other.0))
        }
    }

    /// For keys read back from a snapshot, which the store has already validated
    pub(crate) fn child_unchecked(&self, segment: &str) -> Self {
        if self.is_root() {
            Self(segment.to_string())
        } else {
            Self(format!("{}/{}", self.0, segment))
        }
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn last(&self) -> Option<&str> {
        self.segments().last()
    }

    pub fn parent(&self) -> Option<StorePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// True if `self` equals `other` or is one of its ancestors
    pub fn is_ancestor_or_self(&self, other: &StorePath) -> bool {
        if self.is_root() || self.0 == other.0 {
            return true;
        }
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }

    /// Segments of `other` below `self`, if `self` is an ancestor-or-self
    pub fn relative_segments<'a>(&self, other: &'a StorePath) -> Option<Vec<&'a str>> {
        if !self.is_ancestor_or_self(other) {
            return None;
        }
        let depth = self.segments().count();
        Some(other.segments().skip(depth).collect())
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl TryFrom<String> for StorePath {
    type Error = AppError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        StorePath::parse(&raw)
    }
}

impl From<StorePath> for String {
    fn from(path: StorePath) -> Self {
        path.0
    }
}

/// Strongly-typed user id (the key under `users/`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> AppResult<Self> {
        let id = id.into();
        check_key(&id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reaction kinds. Like and dislike exclude each other; upvote is independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
    Upvote,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 3] = [ReactionKind::Like, ReactionKind::Dislike, ReactionKind::Upvote];

    /// Name of the map stored under the subject
    pub fn collection(self) -> &'static str {
        match self {
            ReactionKind::Like => "likes",
            ReactionKind::Dislike => "dislikes",
            ReactionKind::Upvote => "upvotes",
        }
    }

    pub fn opposite(self) -> Option<ReactionKind> {
        match self {
            ReactionKind::Like => Some(ReactionKind::Dislike),
            ReactionKind::Dislike => Some(ReactionKind::Like),
            ReactionKind::Upvote => None,
        }
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "like" => Ok(ReactionKind::Like),
            "dislike" => Ok(ReactionKind::Dislike),
            "upvote" => Ok(ReactionKind::Upvote),
            other => Err(AppError::Validation(format!("unknown reaction kind '{}'", other))),
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
            ReactionKind::Upvote => "upvote",
        };
        write!(f, "{}", name)
    }
}

/// What a report points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    Post,
    Comment,
}

impl SubjectType {
    pub fn collection(self) -> &'static str {
        match self {
            SubjectType::Post => "posts",
            SubjectType::Comment => "comments",
        }
    }

    pub fn from_collection(raw: &str) -> Option<Self> {
        match raw {
            "posts" => Some(SubjectType::Post),
            "comments" => Some(SubjectType::Comment),
            _ => None,
        }
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "post" => Ok(SubjectType::Post),
            "comment" => Ok(SubjectType::Comment),
            other => Err(AppError::Validation(format!("unknown subject type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Unknown role strings fall back to `user`
    pub fn from_str_lossy(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleFilter {
    #[default]
    All,
    Only(Role),
}

impl RoleFilter {
    pub fn matches(self, role: Role) -> bool {
        match self {
            RoleFilter::All => true,
            RoleFilter::Only(expected) => expected == role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishFilter {
    #[default]
    All,
    Published,
    Unpublished,
}

impl PublishFilter {
    pub fn matches(self, is_published: bool) -> bool {
        match self {
            PublishFilter::All => true,
            PublishFilter::Published => is_published,
            PublishFilter::Unpublished => !is_published,
        }
    }
}
