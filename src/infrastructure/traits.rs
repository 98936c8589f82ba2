use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::StorePath;
use crate::error::AppResult;
use crate::infrastructure::security::Identity;
use crate::infrastructure::subscription::Subscription;

/// Push-based hierarchical store shared by every admin session.
/// No operation spans more than one path; there are no transactions.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fires once with the current value, then on every change at or below `path`
    async fn subscribe(&self, path: &StorePath) -> AppResult<Subscription>;
    async fn read_once(&self, path: &StorePath) -> AppResult<Option<Value>>;
    /// Full replace
    async fn write(&self, path: &StorePath, value: Value) -> AppResult<()>;
    /// Partial update; sibling fields are preserved. `NotFound` if the path is absent.
    async fn patch(&self, path: &StorePath, fields: Map<String, Value>) -> AppResult<()>;
    /// Removes the path and everything nested under it. `NotFound` if absent.
    async fn delete(&self, path: &StorePath) -> AppResult<()>;
    /// Append under a generated, chronologically ordered key
    async fn push(&self, path: &StorePath, value: Value) -> AppResult<String>;
}

/// Session collaborator. Only consulted to gate operations.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_identity(&self) -> Option<Identity>;
    async fn is_admin(&self, identity: &Identity) -> bool;
}
