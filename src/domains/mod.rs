pub mod git;
pub mod workspaces;
