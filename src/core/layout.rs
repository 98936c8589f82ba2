// Store layout - where each collection lives in the shared keyspace

use crate::core::strong_types::{ReactionKind, StorePath, SubjectType, UserId};
use crate::error::AppResult;

pub const USERS: &str = "users";
pub const POSTS: &str = "posts";
pub const REPORTS: &str = "reports";
pub const ADMIN_ALLOW_LIST: &str = "adminAllowList";
pub const COMMENTS: &str = "comments";
pub const REPLIES: &str = "replies";
pub const LOGS: &str = "logs";

/// Builds paths under an optional root prefix (e.g. `devnote`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreLayout {
    root: StorePath,
}

impl StoreLayout {
    pub fn new(root_prefix: &str) -> AppResult<Self> {
        Ok(Self {
            root: StorePath::parse(root_prefix)?,
        })
    }

    pub fn root(&self) -> &StorePath {
        &self.root
    }

    pub fn users(&self) -> StorePath {
        self.root.child_unchecked(USERS)
    }

    pub fn user(&self, user_id: &UserId) -> StorePath {
        self.users().child_unchecked(user_id.as_str())
    }

    pub fn posts(&self) -> StorePath {
        self.root.child_unchecked(POSTS)
    }

    pub fn post(&self, owner: &UserId, post_id: &str) -> AppResult<StorePath> {
        self.posts().child_unchecked(owner.as_str()).join(post_id)
    }

    pub fn post_comments(&self, owner: &UserId, post_id: &str) -> AppResult<StorePath> {
        Ok(self.post(owner, post_id)?.child_unchecked(COMMENTS))
    }

    pub fn log(&self, owner: &UserId, post_id: &str, log_id: &str) -> AppResult<StorePath> {
        self.post(owner, post_id)?.child_unchecked(LOGS).join(log_id)
    }

    pub fn reports(&self) -> StorePath {
        self.root.child_unchecked(REPORTS)
    }

    /// All report entries filed against one subject
    pub fn report_subject(&self, subject_type: SubjectType, subject_id: &str) -> AppResult<StorePath> {
        self.reports()
            .child_unchecked(subject_type.collection())
            .join(subject_id)
    }

    pub fn admin_allow_list(&self) -> StorePath {
        self.root.child_unchecked(ADMIN_ALLOW_LIST)
    }

    pub fn admin_allow_list_entry(&self, entry_id: &str) -> AppResult<StorePath> {
        self.admin_allow_list().join(entry_id)
    }
}

/// `subject/{likes|dislikes|upvotes}`
pub fn reaction_map_path(subject: &StorePath, kind: ReactionKind) -> StorePath {
    subject.child_unchecked(kind.collection())
}

/// `subject/{likes|dislikes|upvotes}/{userId}`
pub fn reaction_path(subject: &StorePath, kind: ReactionKind, user: &UserId) -> StorePath {
    reaction_map_path(subject, kind).child_unchecked(user.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_with_prefix() {
        let layout = StoreLayout::new("devnote").unwrap();
        let owner = UserId::new("u1").unwrap();

        assert_eq!(layout.users().as_str(), "devnote/users");
        assert_eq!(layout.post(&owner, "p1").unwrap().as_str(), "devnote/posts/u1/p1");
        assert_eq!(
            layout.report_subject(SubjectType::Comment, "c9").unwrap().as_str(),
            "devnote/reports/comments/c9"
        );
        assert!(layout.post(&owner, "bad#id").is_err());
    }

    #[test]
    fn test_reaction_paths() {
        let layout = StoreLayout::default();
        let owner = UserId::new("u1").unwrap();
        let subject = layout.post(&owner, "p1").unwrap();
        let voter = UserId::new("u2").unwrap();

        assert_eq!(
            reaction_path(&subject, ReactionKind::Dislike, &voter).as_str(),
            "posts/u1/p1/dislikes/u2"
        );
    }
}
