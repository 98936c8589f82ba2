// Admin console wiring - shared projection, engines and live views over the store

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::Config;
use crate::core::{StoreLayout, StorePath};
use crate::error::{AppError, AppResult};
use crate::infrastructure::cache::SnapshotCache;
use crate::infrastructure::security::AdminGate;
use crate::infrastructure::subscription::{Snapshot, Subscription};
use crate::infrastructure::traits::{AuthProvider, RemoteStore};
use crate::logging::init_tracing;
use crate::models::{AdminEntry, PostRecord, ReportGroup, UserRecord};
use crate::services::aggregation::DashboardStats;
use crate::services::moderation_service::ModerationEngine;
use crate::services::normalizer::{
    normalize_allow_list, normalize_posts, normalize_reports, normalize_users, NormalizeReport, Normalized,
};
use crate::services::projection::{ProjectionState, ProjectionTask, SuspensionProjection};
use crate::services::reaction_service::ReactionEngine;
use crate::services::render::{render_forest, RenderedComment};
use crate::services::tree_builder::{build_tree_from_value, CommentForest};

/// Derived value of one subscribed path, rebuilt on every snapshot.
/// Dropping the view stops its task and releases the subscription.
pub struct LiveView<T> {
    path: StorePath,
    receiver: watch::Receiver<Arc<T>>,
    task: JoinHandle<()>,
}

pub type PostsView = LiveView<Normalized<PostRecord>>;
pub type UsersView = LiveView<Normalized<UserRecord>>;
pub type ReportsView = LiveView<Normalized<ReportGroup>>;
pub type AllowListView = LiveView<Normalized<AdminEntry>>;
pub type CommentsView = LiveView<CommentThread>;

/// One comment collection as a forest and as rendered threads
#[derive(Debug, Clone)]
pub struct CommentThread {
    pub forest: CommentForest,
    pub rendered: Vec<RenderedComment>,
    pub report: NormalizeReport,
    /// Projection version the threads were rendered against
    pub projection_version: u64,
}

impl CommentThread {
    fn build(snapshot: &Snapshot, users: &ProjectionState) -> Self {
        let (forest, report) = build_tree_from_value(&snapshot.path, snapshot.value.as_ref());
        Self {
            rendered: render_forest(&forest, users),
            forest,
            report,
            projection_version: users.version,
        }
    }
}

/// Starting value for a new view: the cached slot when one exists, otherwise the
/// subscription's first snapshot. A cached start is refreshed by that first
/// snapshot once the view's task runs.
async fn initial_snapshot(cache: &SnapshotCache, subscription: &mut Subscription) -> AppResult<Snapshot> {
    if let Some(cached) = cache.latest(subscription.path()).await {
        debug!("Seeding view on {} from cached snapshot", subscription.path());
        return Ok(cached);
    }
    let first = first_snapshot(subscription).await?;
    cache.store(first.clone()).await;
    Ok(first)
}

async fn first_snapshot(subscription: &mut Subscription) -> AppResult<Snapshot> {
    subscription.next_snapshot().await.ok_or_else(|| {
        AppError::Internal(format!(
            "subscription to {} closed before its first snapshot",
            subscription.path()
        ))
    })
}

impl<T: Send + Sync + 'static> LiveView<T> {
    async fn open<F>(store: &Arc<dyn RemoteStore>, path: StorePath, cache: SnapshotCache, build: F) -> AppResult<Self>
    where
        F: Fn(&Snapshot) -> T + Send + 'static,
    {
        let mut subscription = store.subscribe(&path).await?;
        let first = initial_snapshot(&cache, &mut subscription).await?;
        let (sender, receiver) = watch::channel(Arc::new(build(&first)));

        let task_path = path.clone();
        let task = tokio::spawn(async move {
            while let Some(snapshot) = subscription.next_snapshot().await {
                cache.store(snapshot.clone()).await;
                if sender.send(Arc::new(build(&snapshot))).is_err() {
                    break;
                }
            }
            debug!("Live view on {} stopped", task_path);
        });

        Ok(Self { path, receiver, task })
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    pub fn current(&self) -> Arc<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next rebuild
    pub async fn changed(&mut self) -> AppResult<Arc<T>> {
        self.receiver
            .changed()
            .await
            .map_err(|_| AppError::Internal(format!("live view on {} has stopped", self.path)))?;
        Ok(self.receiver.borrow_and_update().clone())
    }

    /// Wait until the derived value satisfies `predicate` (checked against the current value first)
    pub async fn wait_until<P>(&mut self, mut predicate: P) -> AppResult<Arc<T>>
    where
        P: FnMut(&T) -> bool,
    {
        let value = self
            .receiver
            .wait_for(|value| predicate(value.as_ref()))
            .await
            .map_err(|_| AppError::Internal(format!("live view on {} has stopped", self.path)))?;
        Ok(value.clone())
    }
}

impl<T> Drop for LiveView<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Everything an admin session needs, built around one store connection
pub struct AdminConsole {
    config: Config,
    layout: StoreLayout,
    store: Arc<dyn RemoteStore>,
    cache: SnapshotCache,
    projection: SuspensionProjection,
    reactions: ReactionEngine,
    moderation: ModerationEngine,
    _projection_task: ProjectionTask,
}

impl AdminConsole {
    pub async fn start(config: Config, store: Arc<dyn RemoteStore>, auth: Arc<dyn AuthProvider>) -> AppResult<Self> {
        init_tracing(&config);

        let layout = StoreLayout::new(&config.store.root_prefix)?;
        let cache = SnapshotCache::new(config.cache.capacity);
        let projection = SuspensionProjection::new();
        let projection_task = projection
            .spawn(Arc::clone(&store), layout.users(), cache.clone())
            .await?;

        let reactions = ReactionEngine::new(Arc::clone(&store));
        let moderation = ModerationEngine::new(Arc::clone(&store), layout.clone(), AdminGate::new(auth));

        info!("Admin console started (root: {})", layout.root());
        Ok(Self {
            config,
            layout,
            store,
            cache,
            projection,
            reactions,
            moderation,
            _projection_task: projection_task,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn projection(&self) -> &SuspensionProjection {
        &self.projection
    }

    pub fn reactions(&self) -> &ReactionEngine {
        &self.reactions
    }

    pub fn moderation(&self) -> &ModerationEngine {
        &self.moderation
    }

    pub async fn open_posts(&self) -> AppResult<PostsView> {
        let posts = self.layout.posts();
        let base = posts.clone();
        LiveView::open(&self.store, posts, self.cache.clone(), move |snapshot| {
            normalize_posts(&base, snapshot.value.as_ref())
        })
        .await
    }

    pub async fn open_users(&self) -> AppResult<UsersView> {
        LiveView::open(&self.store, self.layout.users(), self.cache.clone(), |snapshot| {
            normalize_users(snapshot.value.as_ref())
        })
        .await
    }

    pub async fn open_reports(&self) -> AppResult<ReportsView> {
        LiveView::open(&self.store, self.layout.reports(), self.cache.clone(), |snapshot| {
            normalize_reports(snapshot.value.as_ref())
        })
        .await
    }

    pub async fn open_allow_list(&self) -> AppResult<AllowListView> {
        LiveView::open(&self.store, self.layout.admin_allow_list(), self.cache.clone(), |snapshot| {
            normalize_allow_list(snapshot.value.as_ref())
        })
        .await
    }

    /// Live threads for the comment collection at `collection`. Threads are
    /// re-rendered when the collection changes and when the suspension
    /// projection advances.
    pub async fn open_comments(&self, collection: &StorePath) -> AppResult<CommentsView> {
        let mut subscription = self.store.subscribe(collection).await?;
        let mut latest = initial_snapshot(&self.cache, &mut subscription).await?;

        let projection = self.projection.clone();
        let mut versions = projection.subscribe_versions();
        let users = projection.current().await;
        let initial = CommentThread::build(&latest, users.as_ref());
        let (sender, receiver) = watch::channel(Arc::new(initial));

        let cache = self.cache.clone();
        let task_path = collection.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    next = subscription.next_snapshot() => match next {
                        Some(snapshot) => {
                            cache.store(snapshot.clone()).await;
                            latest = snapshot;
                        }
                        None => break,
                    },
                    changed = versions.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                let users = projection.current().await;
                if sender.send(Arc::new(CommentThread::build(&latest, users.as_ref()))).is_err() {
                    break;
                }
            }
            debug!("Comment view on {} stopped", task_path);
        });

        Ok(LiveView {
            path: collection.clone(),
            receiver,
            task,
        })
    }

    /// One-shot dashboard figures from the current store contents
    pub async fn dashboard(&self) -> AppResult<DashboardStats> {
        let users_path = self.layout.users();
        let posts_path = self.layout.posts();
        let reports_path = self.layout.reports();
        let (users, posts, reports) = futures::try_join!(
            self.store.read_once(&users_path),
            self.store.read_once(&posts_path),
            self.store.read_once(&reports_path),
        )?;

        let users = normalize_users(users.as_ref()).items;
        let posts = normalize_posts(&posts_path, posts.as_ref()).items;
        let reports = normalize_reports(reports.as_ref()).items;
        Ok(DashboardStats::compute(&users, &posts, &reports))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UserId;
    use crate::infrastructure::memory_store::MemoryStore;
    use crate::infrastructure::security::{Identity, StaticAuthProvider};
    use serde_json::json;

    async fn console(data: serde_json::Value) -> (Arc<MemoryStore>, AdminConsole) {
        let store = Arc::new(MemoryStore::with_data(data).await.unwrap());
        let auth = Arc::new(StaticAuthProvider::admin(Identity::new(
            UserId::new("root").unwrap(),
            "root@devnote.io",
        )));
        let console = AdminConsole::start(Config::default(), store.clone(), auth)
            .await
            .unwrap();
        (store, console)
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_posts_view_follows_publish_toggle() {
        let (_store, console) = console(json!({
            "posts": {"u1": {"p1": {"title": "t", "isPublished": true}}}
        }))
        .await;
        let mut posts = console.open_posts().await.unwrap();
        assert!(posts.current().items[0].is_published);

        let path = posts.current().items[0].path.clone();
        console.moderation().toggle_publish(&path, true).await.unwrap();

        let updated = posts.wait_until(|p| !p.items[0].is_published).await.unwrap();
        assert_eq!(updated.items[0].id, "p1");
    }

    #[tokio::test]
    async fn test_dropping_views_releases_subscriptions() {
        let (store, console) = console(json!({"users": {"u1": {"name": "a"}}})).await;
        settle().await;
        let baseline = store.subscriber_count().await;

        let users = console.open_users().await.unwrap();
        let reports = console.open_reports().await.unwrap();
        assert_eq!(store.subscriber_count().await, baseline + 2);
        assert_eq!(users.current().items.len(), 1);
        assert!(reports.current().items.is_empty());

        drop(users);
        drop(reports);
        settle().await;
        assert_eq!(store.subscriber_count().await, baseline);
    }

    #[tokio::test]
    async fn test_views_start_from_cached_snapshot_then_refresh() {
        let (_store, console) = console(json!({"users": {"u1": {"name": "a"}}})).await;
        console.projection().wait_for_version(1).await;
        let users_path = console.layout().users();
        console
            .cache()
            .store(Snapshot::new(users_path.clone(), Some(json!({"stale": {"name": "old"}}))))
            .await;

        let mut users = console.open_users().await.unwrap();
        assert_eq!(users.current().items[0].id.as_str(), "stale");

        let fresh = users.wait_until(|u| u.items.iter().any(|user| user.id.as_str() == "u1")).await.unwrap();
        assert_eq!(fresh.items.len(), 1);
        let cached = console.cache().latest(&users_path).await.unwrap();
        assert_eq!(cached.value, Some(json!({"u1": {"name": "a"}})));
    }

    #[tokio::test]
    async fn test_comment_view_without_cached_slot_reads_the_store() {
        let (_store, console) = console(json!({
            "posts": {"u1": {"p1": {"title": "t", "comments": {"c1": {"text": "x"}}}}}
        }))
        .await;
        let collection = StorePath::parse("posts/u1/p1/comments").unwrap();
        assert!(console.cache().latest(&collection).await.is_none());

        let comments = console.open_comments(&collection).await.unwrap();
        assert_eq!(comments.current().forest.root_keys(), vec!["c1"]);
        assert!(console.cache().latest(&collection).await.is_some());
    }

    #[tokio::test]
    async fn test_dashboard() {
        let (_store, console) = console(json!({
            "users": {"u1": {"name": "a", "isSuspended": true}, "u2": {"name": "b"}},
            "posts": {"u1": {"p1": {"title": "t", "comments": {"c1": {"text": "x"}}}}},
            "reports": {"posts": {"p1": {"r1": {"reason": "spam"}}}}
        }))
        .await;

        let stats = console.dashboard().await.unwrap();
        assert_eq!(stats.users.total, 2);
        assert_eq!(stats.users.suspended, 1);
        assert_eq!(stats.content.comments, 1);
        assert_eq!(stats.reports.total, 1);
    }
}
