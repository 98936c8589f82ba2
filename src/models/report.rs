use serde::{Deserialize, Serialize};

use crate::core::{SubjectType, UserId};

/// A single moderation report filed by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub id: String,
    pub reporter: Option<UserId>,
    pub timestamp: Option<i64>,
    pub reason: String,
}

/// All open reports against one subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportGroup {
    pub subject_type: SubjectType,
    pub subject_id: String,
    pub entries: Vec<ReportEntry>,
}
