// User suspension projection - one shared, versioned view of the user collection
// A single subscription on `users` feeds it; every renderer reads the same state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::{StorePath, UserId};
use crate::error::AppResult;
use crate::infrastructure::cache::SnapshotCache;
use crate::infrastructure::subscription::Snapshot;
use crate::infrastructure::traits::RemoteStore;
use crate::models::UserRecord;
use crate::services::normalizer::{normalize_users, NormalizeReport};

/// Immutable state of the projection at one version
#[derive(Debug, Clone, Default)]
pub struct ProjectionState {
    pub version: u64,
    users: HashMap<UserId, UserRecord>,
}

impl ProjectionState {
    /// `None` when the user is unknown to the projection
    pub fn is_suspended(&self, user: &UserId) -> Option<bool> {
        self.users.get(user).map(|u| u.is_suspended)
    }

    pub fn user(&self, user: &UserId) -> Option<&UserRecord> {
        self.users.get(user)
    }

    pub fn users(&self) -> impl Iterator<Item = &UserRecord> {
        self.users.values()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn suspended_count(&self) -> usize {
        self.users.values().filter(|u| u.is_suspended).count()
    }
}

/// Cheap to clone; all clones share one state and one version channel
#[derive(Clone)]
pub struct SuspensionProjection {
    state: Arc<RwLock<Arc<ProjectionState>>>,
    versions: watch::Sender<u64>,
}

impl Default for SuspensionProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl SuspensionProjection {
    pub fn new() -> Self {
        let (versions, _) = watch::channel(0);
        Self {
            state: Arc::new(RwLock::new(Arc::new(ProjectionState::default()))),
            versions,
        }
    }

    /// Replace the projection with the contents of a `users` snapshot
    pub async fn apply_snapshot(&self, snapshot: &Snapshot) -> NormalizeReport {
        let normalized = normalize_users(snapshot.value.as_ref());
        let users: HashMap<UserId, UserRecord> = normalized
            .items
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect();

        let version = {
            let mut state = self.state.write().await;
            let version = state.version + 1;
            *state = Arc::new(ProjectionState { version, users });
            version
        };
        self.versions.send_replace(version);

        if !normalized.report.rejected.is_empty() {
            warn!(
                "Projection v{} skipped {} malformed user records",
                version,
                normalized.report.rejected.len()
            );
        }
        debug!("Suspension projection advanced to v{}", version);
        normalized.report
    }

    /// Snapshot of the current state; never blocks writers for long
    pub async fn current(&self) -> Arc<ProjectionState> {
        self.state.read().await.clone()
    }

    pub async fn is_suspended(&self, user: &UserId) -> Option<bool> {
        self.state.read().await.is_suspended(user)
    }

    pub fn version(&self) -> u64 {
        *self.versions.borrow()
    }

    pub fn subscribe_versions(&self) -> watch::Receiver<u64> {
        self.versions.subscribe()
    }

    /// Wait until the projection has reached at least `version`
    pub async fn wait_for_version(&self, version: u64) -> Arc<ProjectionState> {
        let mut receiver = self.subscribe_versions();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = receiver.wait_for(|v| *v >= version).await;
        self.current().await
    }

    /// Subscribe to `users_path` and keep this projection current until the
    /// returned task handle is dropped
    pub async fn spawn(
        &self,
        store: Arc<dyn RemoteStore>,
        users_path: StorePath,
        cache: SnapshotCache,
    ) -> AppResult<ProjectionTask> {
        let mut subscription = store.subscribe(&users_path).await?;
        let projection = self.clone();
        info!("Suspension projection subscribed to {}", users_path);

        let handle = tokio::spawn(async move {
            while let Some(snapshot) = subscription.next_snapshot().await {
                cache.store(snapshot.clone()).await;
                projection.apply_snapshot(&snapshot).await;
            }
            debug!("Suspension projection stream for {} ended", users_path);
        });

        Ok(ProjectionTask { handle })
    }
}

/// Owns the projection's subscription task; dropping it unsubscribes
#[derive(Debug)]
pub struct ProjectionTask {
    handle: JoinHandle<()>,
}

impl Drop for ProjectionTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
