// Domain services - normalization, tree building and the moderation engines
pub mod aggregation;
pub mod moderation_service;
pub mod normalizer;
pub mod projection;
pub mod reaction_service;
pub mod render;
pub mod tree_builder;

pub use aggregation::{DashboardStats, ContentStats, ReportStats, UserStats};
pub use moderation_service::{AdminChange, DeleteOutcome, ModerationEngine};
pub use normalizer::{MigrationWarning, NormalizeReport, Normalized, Rejection};
pub use projection::{ProjectionState, ProjectionTask, SuspensionProjection};
pub use reaction_service::{ReactionEngine, ReactionSummary, ToggleOutcome};
pub use render::{render_forest, RenderedComment};
pub use tree_builder::{build_tree, build_tree_from_value, CommentForest, CommentNode};
