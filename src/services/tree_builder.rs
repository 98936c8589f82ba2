// Tree Builder - comment forest from a normalized comment mapping
// Both storage shapes (nested `replies` mappings and flat `parentId` links) are
// folded into one arena before any linking happens.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::layout::REPLIES;
use crate::core::StorePath;
use crate::models::CommentRecord;
use crate::services::normalizer::{normalize_comments, NormalizeReport};

pub type NodeIndex = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    /// Key of the comment inside its own mapping
    pub key: String,
    /// Unique within the collection; nested replies are scoped as `c1/replies/c2`
    pub scoped_id: String,
    /// Where the comment lives in the store (target for delete/publish/reactions)
    pub store_path: StorePath,
    /// The record itself; its nested replies live in the arena instead
    pub comment: CommentRecord,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
}

/// Ordered forest stored as a flat node table plus child-index lists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentForest {
    nodes: Vec<CommentNode>,
    roots: Vec<NodeIndex>,
    index: HashMap<String, NodeIndex>,
    /// Bare comment id to its node; `None` once the id is seen twice
    by_key: HashMap<String, Option<NodeIndex>>,
}

enum ParentRef {
    /// Embedded under another record; always resolvable
    Nested(NodeIndex),
    /// Flat `parentId` link; may dangle
    Flat(Option<String>),
}

fn without_replies(comment: &CommentRecord) -> CommentRecord {
    CommentRecord {
        id: comment.id.clone(),
        storage_key: comment.storage_key.clone(),
        author: comment.author.clone(),
        text: comment.text.clone(),
        attachment_url: comment.attachment_url.clone(),
        is_published: comment.is_published,
        reactions: comment.reactions.clone(),
        parent_id: comment.parent_id.clone(),
        created_at: comment.created_at,
        replies: Vec::new(),
    }
}

impl CommentForest {
    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    pub fn node(&self, index: NodeIndex) -> Option<&CommentNode> {
        self.nodes.get(index)
    }

    pub fn get(&self, scoped_id: &str) -> Option<&CommentNode> {
        self.index.get(scoped_id).and_then(|&i| self.nodes.get(i))
    }

    pub fn index_of(&self, scoped_id: &str) -> Option<NodeIndex> {
        self.index.get(scoped_id).copied()
    }

    /// Node whose bare id is `key`, provided no other node shares it
    pub fn unique_key(&self, key: &str) -> Option<NodeIndex> {
        self.by_key.get(key).copied().flatten()
    }

    /// Target of a flat `parentId`: a scoped id first, then an unambiguous bare id
    fn resolve_parent(&self, id: &str) -> Option<NodeIndex> {
        self.index_of(id).or_else(|| self.unique_key(id))
    }

    pub fn children(&self, index: NodeIndex) -> impl Iterator<Item = &CommentNode> {
        self.nodes
            .get(index)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(move |&child| self.nodes.get(child))
    }

    pub fn nodes(&self) -> &[CommentNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root_keys(&self) -> Vec<&str> {
        self.roots.iter().map(|&i| self.nodes[i].key.as_str()).collect()
    }

    pub fn child_keys(&self, scoped_id: &str) -> Vec<&str> {
        match self.index_of(scoped_id) {
            Some(index) => self.children(index).map(|c| c.key.as_str()).collect(),
            None => Vec::new(),
        }
    }

    /// Pre-order walk from the roots with each node's depth (roots are 0)
    pub fn depth_first(&self) -> Vec<(NodeIndex, usize)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(NodeIndex, usize)> = self.roots.iter().rev().map(|&r| (r, 0)).collect();
        while let Some((index, depth)) = stack.pop() {
            out.push((index, depth));
            for &child in self.nodes[index].children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }

    /// The node and all of its descendants
    pub fn subtree(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(current) {
                out.push(current);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    fn fold(
        &mut self,
        collection: &StorePath,
        enclosing: Option<NodeIndex>,
        comment: &CommentRecord,
        declared: &mut Vec<ParentRef>,
    ) {
        let (scoped_id, store_path, parent_ref) = match enclosing {
            None => (
                comment.id.clone(),
                collection.child_unchecked(&comment.storage_key),
                ParentRef::Flat(comment.parent_id.clone()),
            ),
            Some(parent) => {
                let parent_node = &self.nodes[parent];
                (
                    format!("{}/{}/{}", parent_node.scoped_id, REPLIES, comment.id),
                    parent_node
                        .store_path
                        .child_unchecked(REPLIES)
                        .child_unchecked(&comment.storage_key),
                    ParentRef::Nested(parent),
                )
            }
        };

        let index = self.nodes.len();
        if self.index.contains_key(&scoped_id) {
            warn!("Duplicate comment id {} under {}; later copy cannot be a parent", scoped_id, collection);
        } else {
            self.index.insert(scoped_id.clone(), index);
        }
        self.by_key
            .entry(comment.id.clone())
            .and_modify(|slot| *slot = None)
            .or_insert(Some(index));
        self.nodes.push(CommentNode {
            key: comment.id.clone(),
            scoped_id,
            store_path,
            comment: without_replies(comment),
            parent: None,
            children: Vec::new(),
        });
        declared.push(parent_ref);

        for reply in &comment.replies {
            self.fold(collection, Some(index), reply, declared);
        }
    }
}

/// Cuts every parent cycle at its earliest node (in input order)
fn break_cycles(parents: &mut [Option<NodeIndex>]) {
    const UNSEEN: u8 = 0;
    const ON_PATH: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![UNSEEN; parents.len()];
    for start in 0..parents.len() {
        if state[start] != UNSEEN {
            continue;
        }
        let mut path = Vec::new();
        let mut current = Some(start);
        while let Some(node) = current {
            if state[node] == DONE {
                break;
            }
            if state[node] == ON_PATH {
                if let Some(pos) = path.iter().position(|&p| p == node) {
                    if let Some(&cut) = path[pos..].iter().min() {
                        debug!("Breaking parent cycle at node {}", cut);
                        parents[cut] = None;
                    }
                }
                break;
            }
            state[node] = ON_PATH;
            path.push(node);
            current = parents[node];
        }
        for node in path {
            state[node] = DONE;
        }
    }
}

/// Build the ordered forest for the comment collection stored at `collection`.
///
/// Children keep input order. A flat `parentId` may name a scoped id or, when
/// only one comment carries it, a bare id. A comment whose parent does not
/// resolve becomes a root. Rebuilding from the same input yields an identical forest.
pub fn build_tree(collection: &StorePath, comments: &[CommentRecord]) -> CommentForest {
    let mut forest = CommentForest::default();
    let mut declared = Vec::new();
    for comment in comments {
        forest.fold(collection, None, comment, &mut declared);
    }

    let mut parents: Vec<Option<NodeIndex>> = declared
        .iter()
        .map(|parent| match parent {
            ParentRef::Nested(index) => Some(*index),
            ParentRef::Flat(Some(id)) => forest.resolve_parent(id),
            ParentRef::Flat(None) => None,
        })
        .collect();
    break_cycles(&mut parents);

    for (index, parent) in parents.into_iter().enumerate() {
        forest.nodes[index].parent = parent;
        match parent {
            Some(parent) => forest.nodes[parent].children.push(index),
            None => forest.roots.push(index),
        }
    }

    debug!(
        "Built comment forest for {}: {} nodes, {} roots",
        collection,
        forest.nodes.len(),
        forest.roots.len()
    );
    forest
}

/// Normalize a raw comment mapping and build its forest in one step
pub fn build_tree_from_value(collection: &StorePath, raw: Option<&Value>) -> (CommentForest, NormalizeReport) {
    let mut report = NormalizeReport::default();
    let comments = normalize_comments(raw, collection.as_str(), &mut report);
    (build_tree(collection, &comments), report)
}
