// Reaction Toggle Engine - per-user like/dislike/upvote toggles on posts and comments
// Each toggle is a short sequence of independent store calls; nothing is transactional.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::core::layout::{reaction_map_path, reaction_path};
use crate::core::{ReactionKind, StorePath, UserId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::traits::RemoteStore;

/// Result of one toggle
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    /// The reaction existed and is now gone
    Removed,
    /// The reaction was recorded; `cleared_opposite` names the kind that was removed with it
    Added { cleared_opposite: Option<ReactionKind> },
    /// The reaction was recorded but the opposite one could not be cleared
    AddedKeptOpposite { opposite: ReactionKind, error: AppError },
}

impl ToggleOutcome {
    pub fn is_active(&self) -> bool {
        !matches!(self, ToggleOutcome::Removed)
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, ToggleOutcome::AddedKeptOpposite { .. })
    }
}

/// Counts of every reaction kind on one subject
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactionSummary {
    pub likes: usize,
    pub dislikes: usize,
    pub upvotes: usize,
}

impl ReactionSummary {
    pub fn get(&self, kind: ReactionKind) -> usize {
        match kind {
            ReactionKind::Like => self.likes,
            ReactionKind::Dislike => self.dislikes,
            ReactionKind::Upvote => self.upvotes,
        }
    }

    pub fn total(&self) -> usize {
        self.likes + self.dislikes + self.upvotes
    }
}

#[derive(Clone)]
pub struct ReactionEngine {
    store: Arc<dyn RemoteStore>,
}

impl ReactionEngine {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Flip `user`'s reaction of `kind` on the subject at `subject`.
    /// Adding a like clears the same user's dislike and vice versa.
    #[instrument(skip(self))]
    pub async fn toggle(&self, subject: &StorePath, kind: ReactionKind, user: &UserId) -> AppResult<ToggleOutcome> {
        let entry = reaction_path(subject, kind, user);

        if self.store.read_once(&entry).await?.is_some() {
            match self.store.delete(&entry).await {
                Ok(()) => {}
                // Someone else removed it between the read and the delete
                Err(e) if e.is_not_found() => debug!("Reaction {} already gone", entry),
                Err(e) => return Err(e),
            }
            info!("Removed {} by {} on {}", kind, user, subject);
            return Ok(ToggleOutcome::Removed);
        }

        self.store
            .write(&entry, json!(Utc::now().timestamp_millis()))
            .await?;
        info!("Added {} by {} on {}", kind, user, subject);

        let Some(opposite) = kind.opposite() else {
            return Ok(ToggleOutcome::Added { cleared_opposite: None });
        };

        match self.clear(subject, opposite, user).await {
            Ok(true) => Ok(ToggleOutcome::Added { cleared_opposite: Some(opposite) }),
            Ok(false) => Ok(ToggleOutcome::Added { cleared_opposite: None }),
            Err(error) => {
                warn!("Added {} on {} but could not clear {}: {}", kind, subject, opposite, error);
                Ok(ToggleOutcome::AddedKeptOpposite { opposite, error })
            }
        }
    }

    /// Remove `user`'s reaction of `kind` if present. Returns whether anything was removed.
    async fn clear(&self, subject: &StorePath, kind: ReactionKind, user: &UserId) -> AppResult<bool> {
        let entry = reaction_path(subject, kind, user);
        if self.store.read_once(&entry).await?.is_none() {
            return Ok(false);
        }
        match self.store.delete(&entry).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn has_reacted(&self, subject: &StorePath, kind: ReactionKind, user: &UserId) -> AppResult<bool> {
        Ok(self
            .store
            .read_once(&reaction_path(subject, kind, user))
            .await?
            .is_some())
    }

    /// Size of the live reaction map
    pub async fn count(&self, subject: &StorePath, kind: ReactionKind) -> AppResult<usize> {
        let map = self.store.read_once(&reaction_map_path(subject, kind)).await?;
        Ok(match map {
            Some(Value::Object(entries)) => entries.len(),
            _ => 0,
        })
    }

    pub async fn summary(&self, subject: &StorePath) -> AppResult<ReactionSummary> {
        Ok(ReactionSummary {
            likes: self.count(subject, ReactionKind::Like).await?,
            dislikes: self.count(subject, ReactionKind::Dislike).await?,
            upvotes: self.count(subject, ReactionKind::Upvote).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_store::MemoryStore;

    async fn setup() -> (Arc<MemoryStore>, ReactionEngine, StorePath, UserId) {
        let store = Arc::new(
            MemoryStore::with_data(json!({"posts": {"u1": {"p1": {"title": "hello"}}}}))
                .await
                .unwrap(),
        );
        let engine = ReactionEngine::new(store.clone());
        let subject = StorePath::parse("posts/u1/p1").unwrap();
        (store, engine, subject, UserId::new("u2").unwrap())
    }

    #[tokio::test]
    async fn test_like_twice_restores_state() {
        let (store, engine, post, user) = setup().await;
        let before = store.dump().await;

        let first = engine.toggle(&post, ReactionKind::Like, &user).await.unwrap();
        assert_eq!(first, ToggleOutcome::Added { cleared_opposite: None });
        assert_eq!(engine.count(&post, ReactionKind::Like).await.unwrap(), 1);
        assert_eq!(engine.count(&post, ReactionKind::Dislike).await.unwrap(), 0);

        let second = engine.toggle(&post, ReactionKind::Like, &user).await.unwrap();
        assert_eq!(second, ToggleOutcome::Removed);
        assert_eq!(engine.count(&post, ReactionKind::Like).await.unwrap(), 0);
        assert_eq!(store.dump().await, before);
    }

    #[tokio::test]
    async fn test_like_clears_dislike() {
        let (_store, engine, post, user) = setup().await;

        engine.toggle(&post, ReactionKind::Dislike, &user).await.unwrap();
        let outcome = engine.toggle(&post, ReactionKind::Like, &user).await.unwrap();

        assert_eq!(outcome, ToggleOutcome::Added { cleared_opposite: Some(ReactionKind::Dislike) });
        assert!(engine.has_reacted(&post, ReactionKind::Like, &user).await.unwrap());
        assert!(!engine.has_reacted(&post, ReactionKind::Dislike, &user).await.unwrap());
    }

    #[tokio::test]
    async fn test_upvote_has_no_opposite() {
        let (_store, engine, post, user) = setup().await;
        engine.toggle(&post, ReactionKind::Like, &user).await.unwrap();

        let outcome = engine.toggle(&post, ReactionKind::Upvote, &user).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Added { cleared_opposite: None });

        let summary = engine.summary(&post).await.unwrap();
        assert_eq!(summary, ReactionSummary { likes: 1, dislikes: 0, upvotes: 1 });
        assert_eq!(summary.total(), 2);
    }

    #[tokio::test]
    async fn test_reactions_from_different_users_are_independent() {
        let (_store, engine, post, user) = setup().await;
        let other = UserId::new("u3").unwrap();

        engine.toggle(&post, ReactionKind::Like, &user).await.unwrap();
        engine.toggle(&post, ReactionKind::Dislike, &other).await.unwrap();

        assert_eq!(engine.count(&post, ReactionKind::Like).await.unwrap(), 1);
        assert_eq!(engine.count(&post, ReactionKind::Dislike).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_opposite_clear_is_partial() {
        let (store, engine, post, user) = setup().await;
        engine.toggle(&post, ReactionKind::Dislike, &user).await.unwrap();

        store
            .fail_mutations_under(&reaction_map_path(&post, ReactionKind::Dislike))
            .await;
        let outcome = engine.toggle(&post, ReactionKind::Like, &user).await.unwrap();

        assert!(outcome.is_partial());
        assert!(outcome.is_active());
        assert!(engine.has_reacted(&post, ReactionKind::Like, &user).await.unwrap());
        assert!(engine.has_reacted(&post, ReactionKind::Dislike, &user).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_write_surfaces_error() {
        let (store, engine, post, user) = setup().await;
        store.fail_mutations_under(&post).await;

        let result = engine.toggle(&post, ReactionKind::Like, &user).await;
        assert!(matches!(result, Err(AppError::RemoteWrite(_))));
        assert_eq!(engine.count(&post, ReactionKind::Like).await.unwrap(), 0);
    }
}
