pub mod domains;
pub mod errors;
pub mod infrastructure;
pub mod shared;

pub use domains::workspaces::pipeline::{CreateWorkspaceParams, WorkspaceProvisioner};
pub use domains::workspaces::registry::InitRegistry;
pub use domains::workspaces::teardown::{TeardownConfig, TeardownCoordinator};
pub use errors::WorkspaceError;
