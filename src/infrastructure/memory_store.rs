// In-memory reference store
// Behaves like the hosted keyspace: hierarchical JSON, push notifications to
// every subscriber whose path overlaps a change, empty objects pruned on delete.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::core::{is_valid_key, StorePath};
use crate::error::{AppError, AppResult};
use crate::infrastructure::id_generator::PushKeyGenerator;
use crate::infrastructure::subscription::{Snapshot, Subscription, SubscriptionId};
use crate::infrastructure::traits::RemoteStore;

struct Subscriber {
    id: SubscriptionId,
    path: StorePath,
    sender: mpsc::UnboundedSender<Snapshot>,
}

#[derive(Default)]
struct StoreState {
    root: Map<String, Value>,
    subscribers: Vec<Subscriber>,
    next_subscription_id: SubscriptionId,
    /// Mutations at or below these paths fail with `RemoteWrite`
    failing_paths: Vec<StorePath>,
    mutation_count: u64,
}

/// Reference implementation of [`RemoteStore`]
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<StoreState>>,
    keys: Arc<PushKeyGenerator>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from a JSON document
    pub async fn with_data(data: Value) -> AppResult<Self> {
        let store = Self::new();
        store.write(&StorePath::root(), data).await?;
        Ok(store)
    }

    /// Make every mutation at or below `path` fail until cleared
    pub async fn fail_mutations_under(&self, path: &StorePath) {
        self.state.write().await.failing_paths.push(path.clone());
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.failing_paths.clear();
    }

    /// Live subscriptions; closed channels are not counted
    pub async fn subscriber_count(&self) -> usize {
        let mut state = self.state.write().await;
        state.subscribers.retain(|s| !s.sender.is_closed());
        state.subscribers.len()
    }

    pub async fn mutation_count(&self) -> u64 {
        self.state.read().await.mutation_count
    }

    /// Full copy of the keyspace
    pub async fn dump(&self) -> Value {
        Value::Object(self.state.read().await.root.clone())
    }

    fn check_writable(state: &StoreState, path: &StorePath, operation: &str) -> AppResult<()> {
        if let Some(blocked) = state.failing_paths.iter().find(|p| p.is_ancestor_or_self(path)) {
            warn!("{} rejected at {} (blocked under {})", operation, path, blocked);
            return Err(AppError::RemoteWrite(format!("{} denied at {}", operation, path)));
        }
        Ok(())
    }

    /// Notify every subscriber whose path is an ancestor or a descendant of `changed`
    fn notify(state: &mut StoreState, changed: &StorePath) {
        let root = &state.root;
        state.subscribers.retain(|subscriber| {
            let related = subscriber.path.is_ancestor_or_self(changed)
                || changed.is_ancestor_or_self(&subscriber.path);
            if !related {
                return !subscriber.sender.is_closed();
            }
            let snapshot = Snapshot::new(subscriber.path.clone(), read_at(root, &subscriber.path));
            match subscriber.sender.send(snapshot) {
                Ok(()) => true,
                Err(_) => {
                    debug!("Pruning closed subscription {} on {}", subscriber.id, subscriber.path);
                    false
                }
            }
        });
    }

    fn finish_mutation(state: &mut StoreState, changed: &StorePath) {
        state.mutation_count += 1;
        Self::notify(state, changed);
    }
}

fn lookup<'a>(root: &'a Map<String, Value>, path: &StorePath) -> Option<&'a Value> {
    let mut segments = path.segments();
    let first = match segments.next() {
        Some(first) => first,
        None => return None,
    };
    let mut current = root.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn read_at(root: &Map<String, Value>, path: &StorePath) -> Option<Value> {
    if path.is_root() {
        if root.is_empty() {
            None
        } else {
            Some(Value::Object(root.clone()))
        }
    } else {
        lookup(root, path).cloned()
    }
}

/// Rejects keys the hosted keyspace would refuse, anywhere inside `value`
fn validate_value(value: &Value) -> AppResult<()> {
    if let Value::Object(map) = value {
        for (key, child) in map {
            if !is_valid_key(key) {
                return Err(AppError::Validation(format!("invalid key '{}' in value", key)));
            }
            validate_value(child)?;
        }
    }
    if let Value::Array(items) = value {
        for item in items {
            validate_value(item)?;
        }
    }
    Ok(())
}

/// Walks to the parent object of `path`, creating (or replacing non-object)
/// intermediate nodes on the way
fn parent_object_mut<'a>(root: &'a mut Map<String, Value>, path: &StorePath) -> (&'a mut Map<String, Value>, String) {
    let segments: Vec<&str> = path.segments().collect();
    let (last, ancestors) = segments
        .split_last()
        .map(|(last, rest)| (last.to_string(), rest.to_vec()))
        .unwrap_or_default();

    let mut current = root;
    for segment in ancestors {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => unreachable!("entry was just made an object"),
        };
    }
    (current, last)
}

fn remove_at(root: &mut Map<String, Value>, segments: &[&str]) -> bool {
    match segments {
        [] => false,
        [last] => root.shift_remove(*last).is_some(),
        [first, rest @ ..] => {
            let removed = match root.get_mut(*first) {
                Some(Value::Object(child)) => remove_at(child, rest),
                _ => false,
            };
            // Empty objects do not exist in the keyspace
            if removed && matches!(root.get(*first), Some(Value::Object(child)) if child.is_empty()) {
                root.shift_remove(*first);
            }
            removed
        }
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn subscribe(&self, path: &StorePath) -> AppResult<Subscription> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.write().await;

        let id = state.next_subscription_id;
        state.next_subscription_id += 1;

        let initial = Snapshot::new(path.clone(), read_at(&state.root, path));
        // The receiver is alive; this cannot fail
        let _ = sender.send(initial);

        state.subscribers.push(Subscriber {
            id,
            path: path.clone(),
            sender,
        });
        debug!("Subscription {} opened on {}", id, path);
        Ok(Subscription::new(id, path.clone(), receiver))
    }

    async fn read_once(&self, path: &StorePath) -> AppResult<Option<Value>> {
        let state = self.state.read().await;
        Ok(read_at(&state.root, path))
    }

    async fn write(&self, path: &StorePath, value: Value) -> AppResult<()> {
        validate_value(&value)?;
        let mut state = self.state.write().await;
        Self::check_writable(&state, path, "write")?;

        if is_empty_value(&value) {
            // Writing nothing is a removal
            let segments: Vec<&str> = path.segments().collect();
            if path.is_root() {
                state.root.clear();
            } else {
                remove_at(&mut state.root, &segments);
            }
        } else if path.is_root() {
            match value {
                Value::Object(map) => state.root = map,
                _ => return Err(AppError::Validation("root value must be an object".to_string())),
            }
        } else {
            let (parent, key) = parent_object_mut(&mut state.root, path);
            parent.insert(key, value);
        }

        Self::finish_mutation(&mut state, path);
        Ok(())
    }

    async fn patch(&self, path: &StorePath, fields: Map<String, Value>) -> AppResult<()> {
        validate_value(&Value::Object(fields.clone()))?;
        let mut state = self.state.write().await;
        Self::check_writable(&state, path, "patch")?;

        let target = if path.is_root() {
            Some(&mut state.root)
        } else {
            let segments: Vec<&str> = path.segments().collect();
            let mut current = Some(&mut state.root);
            for segment in segments {
                current = current
                    .and_then(|map| map.get_mut(segment))
                    .and_then(|value| value.as_object_mut());
            }
            current
        };

        let target = match target {
            Some(target) => target,
            None => return Err(AppError::NotFound(format!("nothing to patch at {}", path))),
        };
        for (field, value) in fields {
            if value.is_null() {
                target.shift_remove(&field);
            } else {
                target.insert(field, value);
            }
        }

        Self::finish_mutation(&mut state, path);
        Ok(())
    }

    async fn delete(&self, path: &StorePath) -> AppResult<()> {
        let mut state = self.state.write().await;
        Self::check_writable(&state, path, "delete")?;

        let removed = if path.is_root() {
            let had_data = !state.root.is_empty();
            state.root.clear();
            had_data
        } else {
            let segments: Vec<&str> = path.segments().collect();
            remove_at(&mut state.root, &segments)
        };
        if !removed {
            return Err(AppError::NotFound(format!("nothing to delete at {}", path)));
        }

        Self::finish_mutation(&mut state, path);
        Ok(())
    }

    async fn push(&self, path: &StorePath, value: Value) -> AppResult<String> {
        let key = self.keys.next_key();
        let target = path.join(&key)?;
        self.write(&target, value).await?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let store = MemoryStore::new();
        store.write(&path("users/u1"), json!({"name": "Ada"})).await.unwrap();

        assert_eq!(store.read_once(&path("users/u1/name")).await.unwrap(), Some(json!("Ada")));
        assert_eq!(store.read_once(&path("users/u2")).await.unwrap(), None);
        assert_eq!(store.mutation_count().await, 1);
    }

    #[tokio::test]
    async fn test_patch_preserves_siblings() {
        let store = MemoryStore::with_data(json!({"users": {"u1": {"name": "Ada", "isSuspended": false}}}))
            .await
            .unwrap();

        let mut fields = Map::new();
        fields.insert("isSuspended".to_string(), json!(true));
        store.patch(&path("users/u1"), fields.clone()).await.unwrap();

        assert_eq!(
            store.read_once(&path("users/u1")).await.unwrap(),
            Some(json!({"name": "Ada", "isSuspended": true}))
        );
        assert!(store.patch(&path("users/missing"), fields).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_prunes_empty_parents() {
        let store = MemoryStore::with_data(json!({"reports": {"comments": {"c1": {"r1": {"reason": "spam"}}}}}))
            .await
            .unwrap();

        store.delete(&path("reports/comments/c1")).await.unwrap();
        assert_eq!(store.read_once(&path("reports")).await.unwrap(), None);
        assert!(store.delete(&path("reports/comments/c1")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_subscription_sees_changes_below_and_above() {
        let store = MemoryStore::new();
        let mut users = store.subscribe(&path("users")).await.unwrap();
        let mut single = store.subscribe(&path("users/u1/isSuspended")).await.unwrap();

        assert_eq!(users.next_snapshot().await.unwrap().value, None);
        assert_eq!(single.next_snapshot().await.unwrap().value, None);

        store.write(&path("users/u1"), json!({"isSuspended": true})).await.unwrap();

        assert_eq!(
            users.next_snapshot().await.unwrap().value,
            Some(json!({"u1": {"isSuspended": true}}))
        );
        assert_eq!(single.next_snapshot().await.unwrap().value, Some(json!(true)));

        store.write(&path("posts/u1/p1"), json!({"title": "x"})).await.unwrap();
        assert!(users.try_next().is_none());
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_released() {
        let store = MemoryStore::new();
        let subscription = store.subscribe(&path("users")).await.unwrap();
        assert_eq!(store.subscriber_count().await, 1);

        subscription.unsubscribe();
        assert_eq!(store.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_push_and_failure_injection() {
        let store = MemoryStore::new();
        let list = path("adminAllowList");

        let first = store.push(&list, json!("a@x.io")).await.unwrap();
        let second = store.push(&list, json!("b@x.io")).await.unwrap();
        assert!(first < second);

        store.fail_mutations_under(&list).await;
        assert!(matches!(
            store.push(&list, json!("c@x.io")).await,
            Err(AppError::RemoteWrite(_))
        ));
        store.clear_failures().await;
        assert!(store.delete(&list.join(&first).unwrap()).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_invalid_keys() {
        let store = MemoryStore::new();
        let result = store.write(&path("users/u1"), json!({"bad.key": 1})).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
