// Authorization gate for moderation operations
// Identity verification belongs to the host application; this only asks who is
// acting and whether they hold the admin capability.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::core::{StoreLayout, UserId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::traits::{AuthProvider, RemoteStore};
use crate::services::normalizer::normalize_allow_list;

/// Who is acting in the current session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
}

impl Identity {
    pub fn new(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
        }
    }
}

/// Fixed identity and admin flag. Useful for embedding shells that already
/// resolved the session, and for tests.
#[derive(Debug, Clone)]
pub struct StaticAuthProvider {
    identity: Option<Identity>,
    is_admin: bool,
}

impl StaticAuthProvider {
    pub fn admin(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            is_admin: true,
        }
    }

    pub fn non_admin(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            is_admin: false,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            identity: None,
            is_admin: false,
        }
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn current_identity(&self) -> Option<Identity> {
        self.identity.clone()
    }

    async fn is_admin(&self, _identity: &Identity) -> bool {
        self.is_admin
    }
}

/// Admin membership decided by the live admin allow-list
pub struct AllowListAuthProvider {
    identity: Option<Identity>,
    store: Arc<dyn RemoteStore>,
    layout: StoreLayout,
}

impl AllowListAuthProvider {
    pub fn new(identity: Option<Identity>, store: Arc<dyn RemoteStore>, layout: StoreLayout) -> Self {
        Self {
            identity,
            store,
            layout,
        }
    }
}

#[async_trait]
impl AuthProvider for AllowListAuthProvider {
    async fn current_identity(&self) -> Option<Identity> {
        self.identity.clone()
    }

    async fn is_admin(&self, identity: &Identity) -> bool {
        // Same entry shapes and email matching as grant/revoke
        match self.store.read_once(&self.layout.admin_allow_list()).await {
            Ok(raw) => normalize_allow_list(raw.as_ref())
                .items
                .iter()
                .any(|entry| entry.matches(&identity.email)),
            Err(e) => {
                warn!("Admin allow-list lookup failed for {}: {}", identity.email, e);
                false
            }
        }
    }
}

/// Wraps the auth collaborator for engines that need an admin check
#[derive(Clone)]
pub struct AdminGate {
    auth: Arc<dyn AuthProvider>,
}

impl AdminGate {
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        Self { auth }
    }

    /// Returns the acting identity if it holds the admin capability
    pub async fn require_admin(&self, operation: &str) -> AppResult<Identity> {
        let identity = self.auth.current_identity().await.ok_or_else(|| {
            AppError::Unauthorized(format!("{} requires a signed-in administrator", operation))
        })?;

        if !self.auth.is_admin(&identity).await {
            warn!("{} denied for {}", operation, identity.user_id);
            return Err(AppError::Unauthorized(format!(
                "{} is not permitted for {}",
                operation, identity.user_id
            )));
        }

        debug!("{} permitted for {}", operation, identity.user_id);
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_store::MemoryStore;
    use serde_json::json;

    fn identity(id: &str, email: &str) -> Identity {
        Identity::new(UserId::new(id).unwrap(), email)
    }

    #[tokio::test]
    async fn test_static_gate() {
        let gate = AdminGate::new(Arc::new(StaticAuthProvider::admin(identity("a1", "a@x.io"))));
        assert_eq!(gate.require_admin("suspend_user").await.unwrap().email, "a@x.io");

        let gate = AdminGate::new(Arc::new(StaticAuthProvider::non_admin(identity("u1", "u@x.io"))));
        assert!(matches!(
            gate.require_admin("suspend_user").await,
            Err(AppError::Unauthorized(_))
        ));

        let gate = AdminGate::new(Arc::new(StaticAuthProvider::anonymous()));
        assert!(gate.require_admin("suspend_user").await.is_err());
    }

    #[tokio::test]
    async fn test_allow_list_membership() {
        let store = Arc::new(MemoryStore::new());
        let layout = StoreLayout::default();
        store
            .write(&layout.admin_allow_list(), json!({"-k1": "Admin@X.io"}))
            .await
            .unwrap();

        let admin = AllowListAuthProvider::new(Some(identity("a1", "admin@x.io")), store.clone(), layout.clone());
        let gate = AdminGate::new(Arc::new(admin));
        assert!(gate.require_admin("delete_subtree").await.is_ok());

        let other = AllowListAuthProvider::new(Some(identity("u1", "user@x.io")), store, layout);
        let gate = AdminGate::new(Arc::new(other));
        assert!(gate.require_admin("delete_subtree").await.is_err());
    }

    #[tokio::test]
    async fn test_allow_list_object_entries_grant_admin() {
        let store = Arc::new(MemoryStore::new());
        let layout = StoreLayout::default();
        store
            .write(
                &layout.admin_allow_list(),
                json!({"-k1": {"email": " Ops@X.io ", "addedBy": "root"}, "-k2": 42}),
            )
            .await
            .unwrap();

        let ops = AllowListAuthProvider::new(Some(identity("o1", "ops@x.io")), store.clone(), layout.clone());
        assert!(AdminGate::new(Arc::new(ops)).require_admin("suspend_user").await.is_ok());

        let stranger = AllowListAuthProvider::new(Some(identity("s1", "42")), store, layout);
        assert!(AdminGate::new(Arc::new(stranger)).require_admin("suspend_user").await.is_err());
    }
}
