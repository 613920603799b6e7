//! Command dispatch against an execution target.
//!
//! The session loop never talks to Docker directly. It hands a single
//! command line to a [`CommandExecutor`], which measures latency on a
//! monotonic clock and delegates the actual run to an [`ExecutionTarget`]
//! implementation. The production target is the bollard-backed
//! [`DockerTarget`]; tests substitute scripted targets through the same
//! trait.

mod docker;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;

pub use docker::DockerTarget;

/// Conventional exit code recorded for a command that hit the timeout.
pub const TIMEOUT_EXIT_CODE: i64 = -1;

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Raw result of one dispatched command, before latency is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
}

impl TargetOutput {
    /// Synthesizes the outcome of a command that exceeded `timeout`.
    ///
    /// Partial output captured up to the deadline is preserved, a marker
    /// line is appended to stderr, and the exit code is
    /// [`TIMEOUT_EXIT_CODE`]. The session logs this like any other result.
    pub fn timed_out(stdout: String, mut stderr: String, timeout: Duration) -> Self {
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&format!("Command timed out after {}s", timeout.as_secs()));
        Self {
            stdout,
            stderr,
            exit_code: TIMEOUT_EXIT_CODE,
        }
    }
}

/// The external execution-target contract.
///
/// Implementations run exactly one single-line command to completion, or
/// until `timeout` elapses, in which case they surrender whatever output
/// was captured so far via [`TargetOutput::timed_out`]. Only dispatch-level
/// failures (target unreachable, stream broken) surface as
/// [`ExecutionError`]; a command that runs and exits nonzero is a normal
/// output.
#[async_trait]
pub trait ExecutionTarget: Send + Sync {
    /// Identifier of the target, recorded in run metadata.
    fn id(&self) -> &str;

    /// Runs one command and returns its captured output.
    async fn dispatch(&self, command: &str, timeout: Duration)
        -> Result<TargetOutput, ExecutionError>;
}

/// Outcome of one executed command, as folded into the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
    /// Seconds from dispatch to result receipt, monotonic-clock derived.
    pub latency_seconds: f64,
}

impl CommandOutcome {
    /// Whether the command exited cleanly.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs single commands against one execution target with a fixed timeout.
pub struct CommandExecutor {
    target: Box<dyn ExecutionTarget>,
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(target: Box<dyn ExecutionTarget>) -> Self {
        Self {
            target,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Overrides the per-command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn target_id(&self) -> &str {
        self.target.id()
    }

    /// Dispatches one command and measures its latency.
    ///
    /// Latency spans dispatch to result receipt on [`Instant`], so NTP
    /// adjustments to the wall clock never perturb recorded timings.
    pub async fn execute(&self, command: &str) -> Result<CommandOutcome, ExecutionError> {
        let started = Instant::now();
        let output = self.target.dispatch(command, self.timeout).await?;
        let latency_seconds = started.elapsed().as_secs_f64();

        Ok(CommandOutcome {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
            latency_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct ScriptedTarget {
        outputs: Mutex<Vec<TargetOutput>>,
    }

    impl ScriptedTarget {
        fn new(outputs: Vec<TargetOutput>) -> Self {
            Self {
                outputs: Mutex::new(outputs),
            }
        }
    }

    #[async_trait]
    impl ExecutionTarget for ScriptedTarget {
        fn id(&self) -> &str {
            "scripted"
        }

        async fn dispatch(
            &self,
            _command: &str,
            _timeout: Duration,
        ) -> Result<TargetOutput, ExecutionError> {
            let mut outputs = self.outputs.lock().unwrap();
            if outputs.is_empty() {
                return Err(ExecutionError::Dispatch("script exhausted".to_string()));
            }
            Ok(outputs.remove(0))
        }
    }

    #[tokio::test]
    async fn test_execute_attaches_monotonic_latency() {
        let target = ScriptedTarget::new(vec![TargetOutput {
            stdout: "data.csv\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
        }]);
        let executor = CommandExecutor::new(Box::new(target));

        let outcome = executor.execute("ls /world").await.unwrap();
        assert_eq!(outcome.stdout, "data.csv\n");
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.is_success());
        assert!(outcome.latency_seconds >= 0.0);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_an_outcome_not_an_error() {
        let target = ScriptedTarget::new(vec![TargetOutput {
            stdout: String::new(),
            stderr: "ls: cannot access '/nope': No such file or directory\n".to_string(),
            exit_code: 2,
        }]);
        let executor = CommandExecutor::new(Box::new(target));

        let outcome = executor.execute("ls /nope").await.unwrap();
        assert_eq!(outcome.exit_code, 2);
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_fatal() {
        let executor = CommandExecutor::new(Box::new(ScriptedTarget::new(Vec::new())));
        let err = executor.execute("ls").await.unwrap_err();
        assert!(matches!(err, ExecutionError::Dispatch(_)));
    }

    #[test]
    fn test_timed_out_keeps_partial_output_and_marks_stderr() {
        let output = TargetOutput::timed_out(
            "partial stdout".to_string(),
            "partial stderr".to_string(),
            Duration::from_secs(60),
        );
        assert_eq!(output.exit_code, TIMEOUT_EXIT_CODE);
        assert_eq!(output.stdout, "partial stdout");
        assert_eq!(output.stderr, "partial stderr\nCommand timed out after 60s");
    }

    #[test]
    fn test_timed_out_with_no_prior_stderr() {
        let output = TargetOutput::timed_out(String::new(), String::new(), Duration::from_secs(5));
        assert_eq!(output.stderr, "Command timed out after 5s");
    }

    #[test]
    fn test_with_timeout_overrides_default() {
        let executor = CommandExecutor::new(Box::new(ScriptedTarget::new(Vec::new())))
            .with_timeout(Duration::from_secs(5));
        assert_eq!(executor.timeout, Duration::from_secs(5));
        assert_eq!(executor.target_id(), "scripted");
    }
}
