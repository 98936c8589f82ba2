// Moderation Engine - admin-gated publish toggles, subtree deletes, user status,
// admin grants and report resolution
// Every action is a single remote mutation except grant/revoke, which are two
// ordered steps with an explicit partial result.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::core::{Role, StoreLayout, StorePath, SubjectType, UserId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::security::AdminGate;
use crate::infrastructure::traits::RemoteStore;
use crate::models::UserRecord;
use crate::services::normalizer::normalize_allow_list;

/// Delete of an absent target is still a success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

/// Result of a grant/revoke. The allow-list step always runs first.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminChange {
    /// Both steps applied; `allow_list_changed` is false when the list already agreed
    Applied { allow_list_changed: bool },
    /// The allow-list step applied, the role update did not. Retry the role half.
    Partial { allow_list_changed: bool, error: AppError },
    /// Revoke removed some matching allow-list entries before a removal failed.
    /// The role was not touched. Retrying the revoke finishes the job.
    AllowListPartial {
        removed: Vec<String>,
        remaining: Vec<String>,
        error: AppError,
    },
}

impl AdminChange {
    pub fn is_complete(&self) -> bool {
        matches!(self, AdminChange::Applied { .. })
    }
}

/// Actions currently being submitted, keyed by action and subject
#[derive(Debug, Default)]
struct InFlight {
    keys: Mutex<HashSet<String>>,
}

struct InFlightGuard {
    registry: Arc<InFlight>,
    key: String,
}

impl InFlight {
    fn acquire(self: &Arc<Self>, key: String) -> AppResult<InFlightGuard> {
        let mut keys = self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !keys.insert(key.clone()) {
            warn!("Rejected duplicate submission of {}", key);
            return Err(AppError::Conflict(format!("{} is already in progress", key)));
        }
        Ok(InFlightGuard {
            registry: Arc::clone(self),
            key,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut keys = self
            .registry
            .keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        keys.remove(&self.key);
    }
}

#[derive(Clone)]
pub struct ModerationEngine {
    store: Arc<dyn RemoteStore>,
    layout: StoreLayout,
    gate: AdminGate,
    in_flight: Arc<InFlight>,
}

impl ModerationEngine {
    pub fn new(store: Arc<dyn RemoteStore>, layout: StoreLayout, gate: AdminGate) -> Self {
        Self {
            store,
            layout,
            gate,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    async fn begin(&self, operation: &str, subject: &str) -> AppResult<InFlightGuard> {
        self.gate.require_admin(operation).await?;
        self.in_flight.acquire(format!("{}:{}", operation, subject))
    }

    async fn patch_field(&self, path: &StorePath, field: &str, value: Value) -> AppResult<()> {
        let mut fields = Map::new();
        fields.insert(field.to_string(), value);
        self.store.patch(path, fields).await
    }

    /// Flip `isPublished` on a post, log or comment given the value the caller saw.
    /// Returns the new value.
    #[instrument(skip(self))]
    pub async fn toggle_publish(&self, path: &StorePath, current: bool) -> AppResult<bool> {
        let _guard = self.begin("toggle_publish", path.as_str()).await?;
        let next = !current;

        self.patch_field(path, "isPublished", json!(next))
            .await
            .inspect_err(|e| warn!("Publish toggle failed at {}: {}", path, e))?;

        info!("Set isPublished={} at {}", next, path);
        Ok(next)
    }

    /// Remove `path` and everything below it in one store call. The caller
    /// is expected to have confirmed the action.
    #[instrument(skip(self))]
    pub async fn delete_subtree(&self, path: &StorePath) -> AppResult<DeleteOutcome> {
        self.delete_gated("delete_subtree", path).await
    }

    async fn delete_gated(&self, operation: &str, path: &StorePath) -> AppResult<DeleteOutcome> {
        if path.is_root() || path == self.layout.root() {
            return Err(AppError::Validation(format!("{} refuses to delete the store root", operation)));
        }
        let _guard = self.begin(operation, path.as_str()).await?;

        match self.store.delete(path).await {
            Ok(()) => {
                info!("{} removed {}", operation, path);
                Ok(DeleteOutcome::Deleted)
            }
            Err(e) if e.is_not_found() => {
                debug!("{}: {} was already absent", operation, path);
                Ok(DeleteOutcome::AlreadyAbsent)
            }
            Err(e) => {
                error!("{} failed at {}: {}", operation, path, e);
                Err(e)
            }
        }
    }

    async fn set_user_flag(&self, operation: &str, user: &UserId, field: &str, value: bool) -> AppResult<()> {
        let path = self.layout.user(user);
        let _guard = self.begin(operation, path.as_str()).await?;

        self.patch_field(&path, field, json!(value))
            .await
            .inspect_err(|e| warn!("{} failed for {}: {}", operation, user, e))?;

        info!("{}: {}={} for {}", operation, field, value, user);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn suspend_user(&self, user: &UserId) -> AppResult<()> {
        self.set_user_flag("suspend_user", user, "isSuspended", true).await
    }

    #[instrument(skip(self))]
    pub async fn unsuspend_user(&self, user: &UserId) -> AppResult<()> {
        self.set_user_flag("unsuspend_user", user, "isSuspended", false).await
    }

    #[instrument(skip(self))]
    pub async fn activate_user(&self, user: &UserId) -> AppResult<()> {
        self.set_user_flag("activate_user", user, "active", true).await
    }

    #[instrument(skip(self))]
    pub async fn deactivate_user(&self, user: &UserId) -> AppResult<()> {
        self.set_user_flag("deactivate_user", user, "active", false).await
    }

    /// Removes the user record only; posts stay under their owner
    #[instrument(skip(self))]
    pub async fn delete_user(&self, user: &UserId) -> AppResult<DeleteOutcome> {
        self.delete_gated("delete_user", &self.layout.user(user)).await
    }

    fn require_email(user: &UserRecord) -> AppResult<&str> {
        user.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::Validation(format!("user {} has no email to grant or revoke", user.id)))
    }

    async fn allow_list_entries_for(&self, email: &str) -> AppResult<Vec<String>> {
        let raw = self.store.read_once(&self.layout.admin_allow_list()).await?;
        Ok(normalize_allow_list(raw.as_ref())
            .items
            .into_iter()
            .filter(|entry| entry.matches(email))
            .map(|entry| entry.entry_id)
            .collect())
    }

    async fn set_role(&self, user: &UserId, role: Role) -> AppResult<()> {
        self.patch_field(&self.layout.user(user), "role", json!(role.as_str()))
            .await
    }

    /// Add the user's email to the allow-list, then set `role = admin`
    #[instrument(skip(self, user), fields(user = %user.id))]
    pub async fn grant_admin(&self, user: &UserRecord) -> AppResult<AdminChange> {
        let email = Self::require_email(user)?;
        let _guard = self.begin("admin_role", user.id.as_str()).await?;

        let allow_list_changed = if self.allow_list_entries_for(email).await?.is_empty() {
            let key = self
                .store
                .push(&self.layout.admin_allow_list(), json!(email))
                .await
                .inspect_err(|e| warn!("Allow-list push for {} failed: {}", email, e))?;
            debug!("Allow-listed {} as {}", email, key);
            true
        } else {
            false
        };

        match self.set_role(&user.id, Role::Admin).await {
            Ok(()) => {
                info!("Granted admin to {}", user.id);
                Ok(AdminChange::Applied { allow_list_changed })
            }
            Err(error) => {
                warn!("Allow-list updated but role update failed for {}: {}", user.id, error);
                Ok(AdminChange::Partial { allow_list_changed, error })
            }
        }
    }

    /// Drop every allow-list entry carrying the user's email, then set `role = user`
    #[instrument(skip(self, user), fields(user = %user.id))]
    pub async fn revoke_admin(&self, user: &UserRecord) -> AppResult<AdminChange> {
        let email = Self::require_email(user)?;
        let _guard = self.begin("admin_role", user.id.as_str()).await?;

        let entries = self.allow_list_entries_for(email).await?;
        let mut removed = Vec::with_capacity(entries.len());
        for (position, entry_id) in entries.iter().enumerate() {
            let path = self.layout.admin_allow_list_entry(entry_id)?;
            match self.store.delete(&path).await {
                Ok(()) => removed.push(entry_id.clone()),
                Err(e) if e.is_not_found() => removed.push(entry_id.clone()),
                Err(error) if removed.is_empty() => {
                    warn!("Allow-list removal of {} failed: {}", email, error);
                    return Err(error);
                }
                Err(error) => {
                    warn!(
                        "Allow-list removal of {} stopped after {} of {} entries: {}",
                        email,
                        removed.len(),
                        entries.len(),
                        error
                    );
                    return Ok(AdminChange::AllowListPartial {
                        removed,
                        remaining: entries[position..].to_vec(),
                        error,
                    });
                }
            }
        }

        match self.set_role(&user.id, Role::User).await {
            Ok(()) => {
                info!("Revoked admin from {}", user.id);
                Ok(AdminChange::Applied {
                    allow_list_changed: !entries.is_empty(),
                })
            }
            Err(error) => {
                warn!("Allow-list updated but role update failed for {}: {}", user.id, error);
                Ok(AdminChange::Partial {
                    allow_list_changed: !entries.is_empty(),
                    error,
                })
            }
        }
    }

    /// Clear every report filed against one subject. The subject is untouched.
    #[instrument(skip(self))]
    pub async fn resolve_report(&self, subject_type: SubjectType, subject_id: &str) -> AppResult<DeleteOutcome> {
        let path = self.layout.report_subject(subject_type, subject_id)?;
        self.delete_gated("resolve_report", &path).await
    }
}
