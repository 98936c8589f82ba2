use serde::{Deserialize, Serialize};

use crate::core::{Role, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    /// Account enabled; independent of suspension
    pub active: bool,
    pub is_suspended: bool,
}

impl UserRecord {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// One entry of the admin allow-list: `adminAllowList/{entry_id}` -> email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminEntry {
    pub entry_id: String,
    pub email: String,
}

impl AdminEntry {
    pub fn matches(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }
}
