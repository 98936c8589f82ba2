pub mod content;
pub mod report;
pub mod user;

pub use content::{AuthorRef, CommentRecord, LogRecord, PostRecord, ReactionSet};
pub use report::{ReportEntry, ReportGroup};
pub use user::{AdminEntry, UserRecord};
