pub mod layout;
pub mod strong_types;

pub use layout::{reaction_map_path, reaction_path, StoreLayout};
pub use strong_types::{
    is_valid_key, PublishFilter, ReactionKind, Role, RoleFilter, StorePath, SubjectType, UserId,
};
