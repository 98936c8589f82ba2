// Comment rendering - forest plus projection into display-ready threads

use serde::Serialize;

use crate::core::{StorePath, UserId};
use crate::models::AuthorRef;
use crate::services::projection::ProjectionState;
use crate::services::tree_builder::{CommentForest, NodeIndex};

pub const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedComment {
    pub key: String,
    pub scoped_id: String,
    pub store_path: StorePath,
    pub depth: usize,
    pub author_id: Option<UserId>,
    pub author_name: String,
    pub author_suspended: bool,
    pub text: String,
    pub attachment_url: Option<String>,
    pub is_published: bool,
    pub likes: usize,
    pub dislikes: usize,
    pub upvotes: usize,
    pub children: Vec<RenderedComment>,
}

impl RenderedComment {
    /// This comment and every descendant, pre-order
    pub fn walk(&self) -> Vec<&RenderedComment> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

/// Suspension comes from the projection; the copy embedded in the record is
/// only consulted for users the projection has never seen.
pub fn author_suspended(author: &AuthorRef, users: &ProjectionState) -> bool {
    author
        .id
        .as_ref()
        .and_then(|id| users.is_suspended(id))
        .or(author.suspended_hint)
        .unwrap_or(false)
}

fn author_name(author: &AuthorRef, users: &ProjectionState) -> String {
    if let Some(name) = author.display_name.as_deref().filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    author
        .id
        .as_ref()
        .and_then(|id| users.user(id))
        .map(|u| u.name.as_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(ANONYMOUS)
        .to_string()
}

fn render_node(forest: &CommentForest, index: NodeIndex, depth: usize, users: &ProjectionState) -> Option<RenderedComment> {
    let node = forest.node(index)?;
    let comment = &node.comment;
    let children = node
        .children
        .iter()
        .filter_map(|&child| render_node(forest, child, depth + 1, users))
        .collect();

    Some(RenderedComment {
        key: node.key.clone(),
        scoped_id: node.scoped_id.clone(),
        store_path: node.store_path.clone(),
        depth,
        author_id: comment.author.id.clone(),
        author_name: author_name(&comment.author, users),
        author_suspended: author_suspended(&comment.author, users),
        text: comment.text.clone(),
        attachment_url: comment.attachment_url.clone(),
        is_published: comment.is_published,
        likes: comment.reactions.likes.len(),
        dislikes: comment.reactions.dislikes.len(),
        upvotes: comment.reactions.upvotes.len(),
        children,
    })
}

pub fn render_forest(forest: &CommentForest, users: &ProjectionState) -> Vec<RenderedComment> {
    forest
        .roots()
        .iter()
        .filter_map(|&root| render_node(forest, root, 0, users))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::subscription::Snapshot;
    use crate::services::projection::SuspensionProjection;
    use crate::services::tree_builder::build_tree_from_value;
    use serde_json::json;

    #[tokio::test]
    async fn test_projection_overrides_embedded_flag() {
        let projection = SuspensionProjection::new();
        projection
            .apply_snapshot(&Snapshot::new(
                StorePath::parse("users").unwrap(),
                Some(json!({"u1": {"name": "Ada", "isSuspended": true}})),
            ))
            .await;
        let users = projection.current().await;

        let (forest, _) = build_tree_from_value(
            &StorePath::parse("posts/o/p/comments").unwrap(),
            Some(&json!({
                "c1": {"text": "hi", "user": {"id": "u1", "name": "Ada", "isSuspended": false},
                       "replies": {"c2": {"text": "again", "userId": "u1"}}},
                "c3": {"text": "ghost", "user": {"id": "u9", "isSuspended": true}},
                "c4": {"text": "nobody"}
            })),
        );
        let rendered = render_forest(&forest, users.as_ref());

        assert!(rendered[0].author_suspended);
        assert!(rendered[0].children[0].author_suspended);
        assert_eq!(rendered[0].children[0].author_name, "Ada");
        assert_eq!(rendered[0].children[0].depth, 1);
        // Unknown to the projection: embedded flag is all there is
        assert!(rendered[1].author_suspended);
        assert_eq!(rendered[2].author_name, ANONYMOUS);
        assert!(!rendered[2].author_suspended);
    }

    #[test]
    fn test_walk_is_preorder() {
        let (forest, _) = build_tree_from_value(
            &StorePath::parse("c").unwrap(),
            Some(&json!({
                "a": {"text": "1", "replies": {"b": {"text": "2"}}},
                "d": {"text": "3", "parentId": "a"}
            })),
        );
        let rendered = render_forest(&forest, &ProjectionState::default());
        let keys: Vec<&str> = rendered[0].walk().iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "d"]);
    }
}
