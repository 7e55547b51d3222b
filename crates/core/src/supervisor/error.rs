//! Error types for process supervision.

use fd_protocol::ProcessRole;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A live process already holds this role.
    #[error("{0} is already running")]
    AlreadyRunning(ProcessRole),

    /// Nothing is running under this role.
    #[error("{0} is not running")]
    NotRunning(ProcessRole),

    /// The child process could not be spawned.
    #[error("Failed to launch {program}: {source}")]
    ToolInvocationFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A flow to record does not exist in either flow tree.
    #[error("Flow not found: {0}")]
    FlowNotFound(String),

    /// The task to work on does not exist.
    #[error("Task not found: {0}")]
    TaskNotFound(uuid::Uuid),
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;
