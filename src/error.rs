//! Error types for breakout-harness operations.
//!
//! Defines error types for the major subsystems:
//! - Action Protocol block parsing
//! - Command dispatch against the execution target
//! - Run directory and event log persistence
//! - Metric computation over persisted logs
//!
//! Parse errors are recoverable (the session re-prompts); everything else
//! here is fatal to the run that raised it. A nonzero command exit code is
//! not an error anywhere in this crate; it is a recorded outcome.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while parsing an Action Protocol block.
///
/// Always recoverable: the session loop reports the error back to the
/// decision source and asks for a corrected block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("required tag {0} is missing")]
    MissingTag(&'static str),

    #[error("tag {0} appears more than once")]
    DuplicateTag(&'static str),

    #[error("section {0} is empty")]
    EmptySection(&'static str),

    #[error("command section contains no command line")]
    EmptyCommand,

    #[error("command section must be exactly one line")]
    MultiLineCommand,
}

/// Errors raised when the execution target cannot run a command at all.
///
/// Reserved for dispatch-level failures. A command that runs and exits
/// nonzero produces a normal [`crate::executor::CommandOutcome`] instead.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Docker daemon not available: {0}")]
    DaemonUnavailable(String),

    #[error("Execution target '{id}' not found")]
    TargetNotFound { id: String },

    #[error("Execution target '{id}' is not running")]
    TargetNotRunning { id: String },

    #[error("Failed to dispatch command to execution target: {0}")]
    Dispatch(String),
}

/// Errors raised by run directory setup and event log persistence.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Run directory for '{run_id}' already exists")]
    RunExists { run_id: String },

    #[error("Event timestamp {t} precedes the last appended record at {last}")]
    OutOfOrder { t: f64, last: f64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while scoring a persisted run.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("No event log found at {}", .0.display())]
    MissingLog(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
