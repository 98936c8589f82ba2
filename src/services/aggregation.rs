// Aggregation - dashboard counts and list filters over current snapshots
// Everything here is a pure function recomputed in full on each update.

use serde::Serialize;

use crate::core::{PublishFilter, ReactionKind, RoleFilter, SubjectType};
use crate::models::{CommentRecord, PostRecord, ReactionSet, ReportGroup, UserRecord};
use crate::services::reaction_service::ReactionSummary;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub total: usize,
    /// Enabled and not suspended
    pub active: usize,
    pub suspended: usize,
    pub deactivated: usize,
    pub admins: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContentStats {
    pub posts: usize,
    pub published: usize,
    pub unpublished: usize,
    pub logs: usize,
    /// Every comment on posts and logs, nested replies included
    pub comments: usize,
    /// Reactions on posts, logs and comments
    pub likes: usize,
    pub dislikes: usize,
    pub upvotes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectReports {
    pub subject_type: SubjectType,
    pub subject_id: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportStats {
    pub total: usize,
    pub post_subjects: usize,
    pub comment_subjects: usize,
    /// Most reported first; ties keep snapshot order
    pub per_subject: Vec<SubjectReports>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub users: UserStats,
    pub content: ContentStats,
    pub reports: ReportStats,
}

impl DashboardStats {
    pub fn compute(users: &[UserRecord], posts: &[PostRecord], reports: &[ReportGroup]) -> Self {
        Self {
            users: user_stats(users),
            content: content_stats(posts),
            reports: report_stats(reports),
        }
    }
}

pub fn user_stats(users: &[UserRecord]) -> UserStats {
    users.iter().fold(UserStats::default(), |mut stats, user| {
        stats.total += 1;
        if user.active && !user.is_suspended {
            stats.active += 1;
        }
        if user.is_suspended {
            stats.suspended += 1;
        }
        if !user.active {
            stats.deactivated += 1;
        }
        if user.is_admin() {
            stats.admins += 1;
        }
        stats
    })
}

pub fn reaction_summary(reactions: &ReactionSet) -> ReactionSummary {
    ReactionSummary {
        likes: reactions.count(ReactionKind::Like),
        dislikes: reactions.count(ReactionKind::Dislike),
        upvotes: reactions.count(ReactionKind::Upvote),
    }
}

/// Comments plus all nested replies
pub fn comment_count(comments: &[CommentRecord]) -> usize {
    comments.iter().map(|c| 1 + comment_count(&c.replies)).sum()
}

fn add_reactions(stats: &mut ContentStats, reactions: &ReactionSet) {
    let summary = reaction_summary(reactions);
    stats.likes += summary.likes;
    stats.dislikes += summary.dislikes;
    stats.upvotes += summary.upvotes;
}

fn add_comment_reactions(stats: &mut ContentStats, comments: &[CommentRecord]) {
    for comment in comments {
        add_reactions(stats, &comment.reactions);
        add_comment_reactions(stats, &comment.replies);
    }
}

pub fn content_stats(posts: &[PostRecord]) -> ContentStats {
    let mut stats = ContentStats::default();
    for post in posts {
        stats.posts += 1;
        if post.is_published {
            stats.published += 1;
        } else {
            stats.unpublished += 1;
        }
        stats.logs += post.logs.len();

        stats.comments += comment_count(&post.comments);
        add_reactions(&mut stats, &post.reactions);
        add_comment_reactions(&mut stats, &post.comments);
        for log in &post.logs {
            add_reactions(&mut stats, &log.reactions);
            stats.comments += comment_count(&log.comments);
            add_comment_reactions(&mut stats, &log.comments);
        }
    }
    stats
}

pub fn report_stats(groups: &[ReportGroup]) -> ReportStats {
    let mut stats = ReportStats::default();
    for group in groups {
        stats.total += group.entries.len();
        match group.subject_type {
            SubjectType::Post => stats.post_subjects += 1,
            SubjectType::Comment => stats.comment_subjects += 1,
        }
        stats.per_subject.push(SubjectReports {
            subject_type: group.subject_type,
            subject_id: group.subject_id.clone(),
            count: group.entries.len(),
        });
    }
    // Stable sort keeps snapshot order among equal counts
    stats.per_subject.sort_by(|a, b| b.count.cmp(&a.count));
    stats
}

pub fn filter_users(users: &[UserRecord], filter: RoleFilter) -> Vec<&UserRecord> {
    users.iter().filter(|u| filter.matches(u.role)).collect()
}

pub fn filter_posts(posts: &[PostRecord], filter: PublishFilter) -> Vec<&PostRecord> {
    posts.iter().filter(|p| filter.matches(p.is_published)).collect()
}
