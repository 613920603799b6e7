//! Docker-backed execution target using the bollard crate.

use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, LogOutput};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::Docker;
use futures::StreamExt;

use crate::error::ExecutionError;

use super::{ExecutionTarget, TargetOutput};

/// A named, already-running container that executes dispatched commands.
///
/// Provisioning (image, mounts, networking) happens outside this crate;
/// the target only needs the container to exist and be running. Commands
/// run under a login shell so the agent's profile environment applies.
pub struct DockerTarget {
    docker: Docker,
    container: String,
}

impl DockerTarget {
    /// Connects to the local Docker daemon and binds to `container`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::DaemonUnavailable`] if the daemon is not
    /// accessible.
    pub fn connect(container: impl Into<String>) -> Result<Self, ExecutionError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| ExecutionError::DaemonUnavailable(format!("Failed to connect: {e}")))?;

        Ok(Self {
            docker,
            container: container.into(),
        })
    }

    /// Confirms the bound container exists and is running.
    ///
    /// Called once before a session opens its run directory, so a
    /// misconfigured target fails fast instead of leaving an empty run
    /// behind.
    pub async fn verify(&self) -> Result<(), ExecutionError> {
        let info = self
            .docker
            .inspect_container(&self.container, None::<InspectContainerOptions>)
            .await
            .map_err(|e| classify_api_error(&e.to_string(), &self.container))?;

        let running = info.state.and_then(|state| state.running).unwrap_or(false);
        if !running {
            return Err(ExecutionError::TargetNotRunning {
                id: self.container.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionTarget for DockerTarget {
    fn id(&self) -> &str {
        &self.container
    }

    async fn dispatch(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<TargetOutput, ExecutionError> {
        let exec_options = CreateExecOptions {
            cmd: Some(vec!["/bin/bash", "-lc", command]),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(&self.container, exec_options)
            .await
            .map_err(|e| classify_api_error(&e.to_string(), &self.container))?;

        let start_result = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| ExecutionError::Dispatch(format!("Failed to start exec: {e}")))?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        if let StartExecResults::Attached { mut output, .. } = start_result {
            let drained = tokio::time::timeout(timeout, async {
                while let Some(chunk) = output.next().await {
                    match chunk {
                        Ok(LogOutput::StdOut { message }) => {
                            stdout.push_str(&String::from_utf8_lossy(&message));
                        }
                        Ok(LogOutput::StdErr { message }) => {
                            stderr.push_str(&String::from_utf8_lossy(&message));
                        }
                        Ok(_) => {}
                        Err(e) => {
                            return Err(ExecutionError::Dispatch(format!(
                                "Error reading output: {e}"
                            )));
                        }
                    }
                }
                Ok(())
            })
            .await;

            match drained {
                Ok(result) => result?,
                // Deadline hit: surrender what was captured so far. The
                // exec keeps running in the container; only our read stops.
                Err(_elapsed) => return Ok(TargetOutput::timed_out(stdout, stderr, timeout)),
            }
        }

        let exec_info = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| ExecutionError::Dispatch(format!("Failed to inspect exec: {e}")))?;

        Ok(TargetOutput {
            stdout,
            stderr,
            exit_code: exec_info.exit_code.unwrap_or(-1),
        })
    }
}

/// Maps a Docker API error message onto the execution-error taxonomy.
fn classify_api_error(message: &str, container: &str) -> ExecutionError {
    if message.contains("No such container") {
        ExecutionError::TargetNotFound {
            id: container.to_string(),
        }
    } else if message.contains("is not running") {
        ExecutionError::TargetNotRunning {
            id: container.to_string(),
        }
    } else {
        ExecutionError::Dispatch(message.to_string())
    }
}
