//! Shared utilities across modules.

pub mod files;
pub mod probe;

pub use files::{
    copy_preserving, copy_symlink, discard_temp_dir, ensure_parent_exists, is_permission_denied,
    make_removable, remove_path,
};
pub use probe::{probe, Presence};
