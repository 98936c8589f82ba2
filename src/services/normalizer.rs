// Snapshot Normalizer - raw snapshot values into canonical records
// Every legacy field variant is resolved here; nothing downstream branches on
// how a record happened to be stored.

use chrono::DateTime;
use serde_json::{Map, Value};

use crate::core::{ReactionKind, Role, StorePath, SubjectType, UserId};
use crate::error::{AppError, AppResult};
use crate::models::{
    AdminEntry, AuthorRef, CommentRecord, LogRecord, PostRecord, ReactionSet, ReportEntry,
    ReportGroup, UserRecord,
};

/// A record that was dropped from a collection, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub location: String,
    pub error: AppError,
}

/// Data that was accepted but stored in a shape slated for migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationWarning {
    /// Reactions stored as a list of user objects instead of a user -> timestamp map
    LegacyReactionList { location: String, kind: ReactionKind },
    /// Both the nested map and the legacy inline form exist; the nested map was used
    ConflictingReactionShapes { location: String, kind: ReactionKind },
    /// Comments stored as an array instead of a keyed mapping
    LegacyCommentList { location: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeReport {
    pub rejected: Vec<Rejection>,
    pub warnings: Vec<MigrationWarning>,
}

impl NormalizeReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.warnings.is_empty()
    }

    fn reject(&mut self, location: String, error: AppError) {
        tracing::debug!("Rejected record at {}: {}", location, error);
        self.rejected.push(Rejection { location, error });
    }
}

/// Output of a collection-level normalization
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub items: Vec<T>,
    pub report: NormalizeReport,
}

fn loc(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", parent, key)
    }
}

fn as_object<'a>(raw: &'a Value, what: &str) -> AppResult<&'a Map<String, Value>> {
    raw.as_object()
        .ok_or_else(|| AppError::Validation(format!("{} is not an object", what)))
}

/// First string among `names`; empty strings count as absent
fn str_field(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Ids show up as strings or, in legacy data, as numbers
fn id_field(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().filter_map(|name| obj.get(*name)).find_map(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn user_id_field(obj: &Map<String, Value>, names: &[&str]) -> Option<UserId> {
    id_field(obj, names).and_then(|id| UserId::new(id).ok())
}

fn bool_field(obj: &Map<String, Value>, name: &str) -> Option<bool> {
    obj.get(name).and_then(Value::as_bool)
}

/// Milliseconds from a number or an RFC 3339 string
fn time_field(obj: &Map<String, Value>, names: &[&str]) -> Option<i64> {
    names.iter().filter_map(|name| obj.get(*name)).find_map(timestamp_of)
}

fn timestamp_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp_millis()),
        _ => None,
    }
}

fn embedded_author(map: &Map<String, Value>) -> AuthorRef {
    AuthorRef {
        id: user_id_field(map, &["id", "uid", "userId"]),
        display_name: str_field(map, &["name", "displayName"]),
        suspended_hint: bool_field(map, "isSuspended")
            .or_else(|| str_field(map, &["status"]).map(|s| s == "suspended")),
    }
}

/// `user: {..}` / `author: {..}` objects, bare `userId`/`authorId` references,
/// and `author`/`authorName` display-name strings
fn comment_author(obj: &Map<String, Value>) -> AuthorRef {
    for field in ["user", "author"] {
        if let Some(Value::Object(embedded)) = obj.get(field) {
            return embedded_author(embedded);
        }
    }
    AuthorRef {
        id: user_id_field(obj, &["userId", "authorId", "uid"]),
        display_name: str_field(obj, &["author", "authorName", "userName"]),
        suspended_hint: str_field(obj, &["status"]).map(|s| s == "suspended"),
    }
}

fn reactions_from_map(map: &Map<String, Value>) -> Vec<(UserId, i64)> {
    map.iter()
        .filter_map(|(user, value)| {
            let user = UserId::new(user.as_str()).ok()?;
            let ts = match value {
                Value::Bool(true) => 0,
                Value::Object(entry) => time_field(entry, &["timestamp", "time"]).unwrap_or(0),
                other => timestamp_of(other)?,
            };
            Some((user, ts))
        })
        .collect()
}

fn reactions_from_list(list: &[Value]) -> Vec<(UserId, i64)> {
    list.iter()
        .filter_map(|item| match item {
            Value::String(id) => UserId::new(id.as_str()).ok().map(|u| (u, 0)),
            Value::Object(entry) => {
                let user = user_id_field(entry, &["id", "uid", "userId"])?;
                Some((user, time_field(entry, &["timestamp", "time"]).unwrap_or(0)))
            }
            _ => None,
        })
        .collect()
}

fn reactions_from_any(value: &Value) -> Vec<(UserId, i64)> {
    match value {
        Value::Object(map) => reactions_from_map(map),
        Value::Array(list) => reactions_from_list(list),
        _ => Vec::new(),
    }
}

/// The map nested under the subject (`likes/{userId}`) wins over the legacy
/// inline `reactions.likes` block; both being present is flagged.
fn reaction_set(obj: &Map<String, Value>, location: &str, report: &mut NormalizeReport) -> ReactionSet {
    let mut set = ReactionSet::default();
    let legacy_block = obj.get("reactions").and_then(Value::as_object);

    for kind in ReactionKind::ALL {
        let nested = obj.get(kind.collection()).filter(|v| !v.is_null());
        let legacy = legacy_block.and_then(|block| block.get(kind.collection()));

        let entries = match (nested, legacy) {
            (Some(Value::Object(map)), legacy) => {
                if legacy.is_some() {
                    report.warnings.push(MigrationWarning::ConflictingReactionShapes {
                        location: location.to_string(),
                        kind,
                    });
                }
                reactions_from_map(map)
            }
            (Some(Value::Array(list)), _) => {
                report.warnings.push(MigrationWarning::LegacyReactionList {
                    location: location.to_string(),
                    kind,
                });
                reactions_from_list(list)
            }
            (Some(_), _) => Vec::new(),
            (None, Some(legacy)) => {
                report.warnings.push(MigrationWarning::LegacyReactionList {
                    location: location.to_string(),
                    kind,
                });
                reactions_from_any(legacy)
            }
            (None, None) => Vec::new(),
        };
        set.get_mut(kind).extend(entries);
    }
    set
}

/// Normalize one comment and, recursively, its nested replies.
/// Fails only when the value is not an object, the id is empty or the text is absent.
pub fn normalize_comment(
    id: &str,
    raw: &Value,
    location: &str,
    report: &mut NormalizeReport,
) -> AppResult<CommentRecord> {
    normalize_stored_comment(id, id, raw, location, report)
}

/// Like [`normalize_comment`] for a record whose storage key differs from its id
fn normalize_stored_comment(
    id: &str,
    storage_key: &str,
    raw: &Value,
    location: &str,
    report: &mut NormalizeReport,
) -> AppResult<CommentRecord> {
    if id.trim().is_empty() {
        return Err(AppError::Validation(format!("comment at {} has no id", location)));
    }
    let obj = as_object(raw, &format!("comment {}", id))?;

    let text = ["text", "content"]
        .iter()
        .find_map(|name| obj.get(*name).and_then(Value::as_str))
        .ok_or_else(|| AppError::Validation(format!("comment {} has no text", id)))?
        .to_string();

    let replies = normalize_comments(obj.get("replies"), &loc(location, "replies"), report);

    Ok(CommentRecord {
        id: id.to_string(),
        storage_key: storage_key.to_string(),
        author: comment_author(obj),
        text,
        attachment_url: str_field(obj, &["fileURL", "fileUrl", "attachmentUrl"]),
        is_published: bool_field(obj, "isPublished").unwrap_or(true),
        reactions: reaction_set(obj, location, report),
        parent_id: id_field(obj, &["parentId", "parent", "replyTo"]),
        created_at: time_field(obj, &["timestamp", "createdAt", "date"]),
        replies,
    })
}

/// Normalize a comment mapping (or a legacy comment array), keeping stored order.
/// Bad records are rejected individually.
pub fn normalize_comments(raw: Option<&Value>, location: &str, report: &mut NormalizeReport) -> Vec<CommentRecord> {
    let mut comments = Vec::new();
    match raw {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (key, value) in map {
                let at = loc(location, key);
                match normalize_comment(key, value, &at, report) {
                    Ok(comment) => comments.push(comment),
                    Err(e) => report.reject(at, e),
                }
            }
        }
        Some(Value::Array(items)) => {
            report.warnings.push(MigrationWarning::LegacyCommentList {
                location: location.to_string(),
            });
            // The store keys list items by position; the `id` field is only an identity
            for (index, value) in items.iter().enumerate() {
                let storage_key = index.to_string();
                let id = value
                    .as_object()
                    .and_then(|obj| id_field(obj, &["id"]))
                    .unwrap_or_else(|| storage_key.clone());
                let at = loc(location, &storage_key);
                match normalize_stored_comment(&id, &storage_key, value, &at, report) {
                    Ok(comment) => comments.push(comment),
                    Err(e) => report.reject(at, e),
                }
            }
        }
        Some(_) => report.reject(
            location.to_string(),
            AppError::Validation("comment collection is not a mapping".to_string()),
        ),
    }
    comments
}

pub fn normalize_user(id: &str, raw: &Value) -> AppResult<UserRecord> {
    let user_id = UserId::new(id)?;
    let obj = as_object(raw, &format!("user {}", id))?;
    let status = str_field(obj, &["status"]);

    Ok(UserRecord {
        id: user_id,
        name: str_field(obj, &["name", "displayName"]).unwrap_or_default(),
        email: str_field(obj, &["email"]),
        role: str_field(obj, &["role"])
            .map(|r| Role::from_str_lossy(&r))
            .unwrap_or_default(),
        active: bool_field(obj, "active").unwrap_or(true),
        is_suspended: bool_field(obj, "isSuspended")
            .unwrap_or_else(|| status.as_deref() == Some("suspended")),
    })
}

/// `users` snapshot (`{userId: user}`) into records
pub fn normalize_users(raw: Option<&Value>) -> Normalized<UserRecord> {
    let mut report = NormalizeReport::default();
    let mut items = Vec::new();

    if let Some(Value::Object(map)) = raw {
        for (id, value) in map {
            match normalize_user(id, value) {
                Ok(user) => items.push(user),
                Err(e) => report.reject(id.clone(), e),
            }
        }
    } else if let Some(other) = raw.filter(|v| !v.is_null()) {
        report.reject(
            String::new(),
            AppError::Validation(format!("users snapshot is not a mapping: {}", other)),
        );
    }
    Normalized { items, report }
}

pub fn normalize_log(id: &str, path: StorePath, raw: &Value, report: &mut NormalizeReport) -> AppResult<LogRecord> {
    let obj = as_object(raw, &format!("log {}", id))?;
    let location = path.as_str().to_string();
    Ok(LogRecord {
        id: id.to_string(),
        title: str_field(obj, &["title"]).unwrap_or_default(),
        body: str_field(obj, &["text", "body", "content", "description"]),
        is_published: bool_field(obj, "isPublished").unwrap_or(true),
        reactions: reaction_set(obj, &location, report),
        comments: normalize_comments(obj.get("comments"), &loc(&location, "comments"), report),
        path,
    })
}

/// `path` is the post's own store path; `owner` is the user key it sits under
pub fn normalize_post(
    owner: &UserId,
    id: &str,
    path: StorePath,
    raw: &Value,
    report: &mut NormalizeReport,
) -> AppResult<PostRecord> {
    if id.trim().is_empty() {
        return Err(AppError::Validation("post has no id".to_string()));
    }
    let obj = as_object(raw, &format!("post {}", id))?;
    let location = path.as_str().to_string();

    // Legacy records carry `status: "published" | "unpublished"` instead of the flag
    let is_published = bool_field(obj, "isPublished")
        .or_else(|| str_field(obj, &["status"]).map(|s| s == "published"))
        .unwrap_or(true);

    let display_name = str_field(obj, &["author", "authorName"]).or_else(|| {
        obj.get("user")
            .and_then(Value::as_object)
            .and_then(|user| str_field(user, &["name", "displayName"]))
    });

    let mut logs = Vec::new();
    if let Some(Value::Object(entries)) = obj.get("logs") {
        for (log_id, value) in entries {
            let log_path = path.child_unchecked(crate::core::layout::LOGS).child_unchecked(log_id);
            match normalize_log(log_id, log_path, value, report) {
                Ok(log) => logs.push(log),
                Err(e) => report.reject(loc(&location, &format!("logs/{}", log_id)), e),
            }
        }
    }

    Ok(PostRecord {
        owner: owner.clone(),
        id: id.to_string(),
        title: str_field(obj, &["title"]).unwrap_or_default(),
        description: str_field(obj, &["description"]),
        image: str_field(obj, &["image", "imageUrl"]),
        author: AuthorRef {
            id: Some(owner.clone()),
            display_name,
            suspended_hint: None,
        },
        is_published,
        created_at: time_field(obj, &["createdAt", "date", "timestamp"]),
        reactions: reaction_set(obj, &location, report),
        comments: normalize_comments(obj.get("comments"), &loc(&location, "comments"), report),
        logs,
        path,
    })
}

/// Flatten the `posts` snapshot (`{userId: {postId: post}}`) in stored order
pub fn normalize_posts(posts_path: &StorePath, raw: Option<&Value>) -> Normalized<PostRecord> {
    let mut report = NormalizeReport::default();
    let mut items = Vec::new();

    let owners = match raw {
        Some(Value::Object(owners)) => owners,
        _ => return Normalized { items, report },
    };

    for (owner_key, posts) in owners {
        let owner = match UserId::new(owner_key.as_str()) {
            Ok(owner) => owner,
            Err(e) => {
                report.reject(owner_key.clone(), e);
                continue;
            }
        };
        let posts = match posts.as_object() {
            Some(posts) => posts,
            None => {
                report.reject(
                    owner_key.clone(),
                    AppError::Validation(format!("posts of {} are not a mapping", owner_key)),
                );
                continue;
            }
        };
        for (post_id, value) in posts {
            let path = posts_path.child_unchecked(owner_key).child_unchecked(post_id);
            match normalize_post(&owner, post_id, path, value, &mut report) {
                Ok(post) => items.push(post),
                Err(e) => report.reject(loc(owner_key, post_id), e),
            }
        }
    }
    Normalized { items, report }
}

fn normalize_report_entry(id: &str, raw: &Value) -> AppResult<ReportEntry> {
    match raw {
        // Bare reason strings come from the earliest report form
        Value::String(reason) => Ok(ReportEntry {
            id: id.to_string(),
            reporter: None,
            timestamp: None,
            reason: reason.clone(),
        }),
        Value::Object(obj) => Ok(ReportEntry {
            id: id.to_string(),
            reporter: user_id_field(obj, &["reporter", "reportedBy", "userId"]),
            timestamp: time_field(obj, &["timestamp", "createdAt"]),
            reason: str_field(obj, &["reason", "text"]).unwrap_or_default(),
        }),
        _ => Err(AppError::Validation(format!("report {} is malformed", id))),
    }
}

/// `reports` snapshot (`{posts|comments: {subjectId: {reportId: entry}}}`)
pub fn normalize_reports(raw: Option<&Value>) -> Normalized<ReportGroup> {
    let mut report = NormalizeReport::default();
    let mut items = Vec::new();

    let collections = match raw {
        Some(Value::Object(collections)) => collections,
        _ => return Normalized { items, report },
    };

    for (collection, subjects) in collections {
        let subject_type = match SubjectType::from_collection(collection) {
            Some(subject_type) => subject_type,
            None => {
                report.reject(
                    collection.clone(),
                    AppError::Validation(format!("unknown report collection '{}'", collection)),
                );
                continue;
            }
        };
        let Some(subjects) = subjects.as_object() else {
            continue;
        };
        for (subject_id, entries) in subjects {
            let at = loc(collection, subject_id);
            let Some(entries) = entries.as_object() else {
                report.reject(at, AppError::Validation("report group is not a mapping".to_string()));
                continue;
            };
            let mut group = ReportGroup {
                subject_type,
                subject_id: subject_id.clone(),
                entries: Vec::new(),
            };
            for (report_id, value) in entries {
                match normalize_report_entry(report_id, value) {
                    Ok(entry) => group.entries.push(entry),
                    Err(e) => report.reject(loc(&at, report_id), e),
                }
            }
            if !group.entries.is_empty() {
                items.push(group);
            }
        }
    }
    Normalized { items, report }
}

/// `adminAllowList` snapshot (`{entryId: email}`)
pub fn normalize_allow_list(raw: Option<&Value>) -> Normalized<AdminEntry> {
    let mut report = NormalizeReport::default();
    let mut items = Vec::new();

    if let Some(Value::Object(entries)) = raw {
        for (entry_id, value) in entries {
            let email = match value {
                Value::String(email) => Some(email.trim().to_string()),
                Value::Object(obj) => str_field(obj, &["email"]),
                _ => None,
            };
            match email.filter(|e| !e.is_empty()) {
                Some(email) => items.push(AdminEntry {
                    entry_id: entry_id.clone(),
                    email,
                }),
                None => report.reject(
                    entry_id.clone(),
                    AppError::Validation(format!("allow-list entry {} has no email", entry_id)),
                ),
            }
        }
    }
    Normalized { items, report }
}
