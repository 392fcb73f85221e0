use thiserror::Error;

/// Reasons a requested script name does not map to a runnable file.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No script name provided")]
    EmptyName,

    #[error("Invalid script name: {0}")]
    InvalidName(String),

    #[error("Script not found: {0}")]
    NotFound(String),
}

/// Failures that happen before any byte of a stream reaches the caller.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Failed to spawn {shell} for {script}: {source}")]
    Spawn {
        shell: String,
        script: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Child process for {0} has no captured {1}")]
    MissingPipe(String, &'static str),

    #[error("Too many concurrent executions (limit {0})")]
    Busy(usize),
}
