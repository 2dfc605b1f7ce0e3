use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", content = "data")]
pub enum WorkspaceError {
    WorkspaceNotFound {
        workspace_id: String,
    },
    ProjectNotFound {
        project_id: String,
    },
    /// `wait_for_init` elapsed before the init job reached a terminal state.
    /// Surfaced distinctly so deletion flows can refuse to proceed against a
    /// workspace whose provisioning state is unknown.
    InitWaitTimeout {
        workspace_id: String,
        waited_ms: u64,
    },
    ResolutionFailed {
        branch: String,
        message: String,
    },
    GitOperationFailed {
        operation: String,
        message: String,
    },
    DatabaseError {
        message: String,
    },
    InvalidInput {
        field: String,
        message: String,
    },
    IoError {
        operation: String,
        path: String,
        message: String,
    },
}

impl WorkspaceError {
    pub fn git(operation: &str, error: impl ToString) -> Self {
        WorkspaceError::GitOperationFailed {
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }

    pub fn database(error: impl ToString) -> Self {
        WorkspaceError::DatabaseError {
            message: error.to_string(),
        }
    }

    pub fn io(operation: &str, path: impl ToString, error: impl ToString) -> Self {
        WorkspaceError::IoError {
            operation: operation.to_string(),
            path: path.to_string(),
            message: error.to_string(),
        }
    }

    pub fn invalid_input(field: &str, message: impl ToString) -> Self {
        WorkspaceError::InvalidInput {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for WorkspaceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::WorkspaceNotFound { workspace_id } => {
                write!(f, "Workspace '{workspace_id}' not found")
            }
            Self::ProjectNotFound { project_id } => {
                write!(f, "Project '{project_id}' not found")
            }
            Self::InitWaitTimeout {
                workspace_id,
                waited_ms,
            } => {
                write!(
                    f,
                    "Timed out after {waited_ms}ms waiting for workspace '{workspace_id}' to finish initializing"
                )
            }
            Self::ResolutionFailed { branch, message } => {
                write!(f, "Cannot resolve base branch '{branch}': {message}")
            }
            Self::GitOperationFailed { operation, message } => {
                write!(f, "Git operation '{operation}' failed: {message}")
            }
            Self::DatabaseError { message } => {
                write!(f, "Database error: {message}")
            }
            Self::InvalidInput { field, message } => {
                write!(f, "Invalid input for field '{field}': {message}")
            }
            Self::IoError {
                operation,
                path,
                message,
            } => {
                write!(f, "I/O error during '{operation}' on '{path}': {message}")
            }
        }
    }
}

impl std::error::Error for WorkspaceError {}

impl From<WorkspaceError> for String {
    fn from(error: WorkspaceError) -> Self {
        error.to_string()
    }
}
