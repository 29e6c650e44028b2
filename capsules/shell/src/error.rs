use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Deploy-time failure. A function that hits one of these never becomes ready.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Failed to parse runtime attribute '{field}' (expected {expected}, got '{actual}')")]
    InvalidAttribute {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Unsupported runtime '{runtime}' (expected 'shell')")]
    UnsupportedRuntime { runtime: String },
    #[error("Function handler cannot be empty")]
    EmptyHandler,
    #[error("Handler script {} is not executable", path.display())]
    HandlerNotExecutable { path: PathBuf },
    #[error("Failed to inspect handler script {}: {source}", path.display())]
    HandlerInspection {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Per-request failure, reported on the failed invocation only.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("Failed to spawn handler '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("Handler {stream} pipe was not captured")]
    Pipe { stream: &'static str },
    #[error("Failed to write request body to handler stdin: {source}")]
    Stdin { source: std::io::Error },
    #[error("Failed to read handler {stream}: {source}")]
    Output {
        stream: &'static str,
        source: std::io::Error,
    },
    #[error("Failed to wait for handler exit: {source}")]
    Wait { source: std::io::Error },
    #[error("{}", describe_exit(*code, stderr))]
    NonZeroExit { code: Option<i32>, stderr: String },
    #[error("Handler timed out after {}ms", timeout.as_millis())]
    Timeout { timeout: Duration },
}

impl InvocationError {
    pub fn code(&self) -> &'static str {
        match self {
            InvocationError::Spawn { .. } => "SHELL_SPAWN_FAILED",
            InvocationError::Pipe { .. }
            | InvocationError::Stdin { .. }
            | InvocationError::Output { .. }
            | InvocationError::Wait { .. } => "SHELL_IO_ERROR",
            InvocationError::NonZeroExit { .. } => "SHELL_NONZERO_EXIT",
            InvocationError::Timeout { .. } => "SHELL_TIMEOUT",
        }
    }

    /// HTTP status reported for this failure.
    pub fn status(&self) -> u16 {
        match self {
            InvocationError::Timeout { .. } => 504,
            _ => 500,
        }
    }
}

fn describe_exit(code: Option<i32>, stderr: &str) -> String {
    let mut message = match code {
        Some(code) => format!("Handler exited with code {}", code),
        None => "Handler was terminated by a signal".to_string(),
    };
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        message.push_str(": ");
        message.push_str(stderr);
    }
    message
}
