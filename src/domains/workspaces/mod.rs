pub mod config_copy;
pub mod db_worktrees;
pub mod entity;
pub mod pipeline;
pub mod registry;
pub mod repository;
pub mod resolver;
pub mod teardown;

pub use db_worktrees::WorktreeMethods;
pub use entity::{InitProgress, InitStep, WorktreeRecord};
pub use registry::InitRegistry;
pub use resolver::{StartPoint, UnresolvedReason, resolve_start_point};
