//! The protocol-driven session loop.
//!
//! One [`SessionLoop`] drives one run start-to-finish: pull a pre-exec
//! block from the decision source, parse it, execute its command, log the
//! outcome, then collect the post-exec note and log that too. Parse
//! failures re-prompt; dispatch and persistence failures abort the run.
//! Whatever the exit path, the run's metadata is finalized before control
//! returns, so every run directory is self-describing and scorable.

use std::path::PathBuf;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::driver::{DecisionSource, DriverError};
use crate::error::{ExecutionError, LogError};
use crate::events::{CommandEvent, Event, EventClock, NoteEvent, RunSession};
use crate::executor::CommandExecutor;
use crate::protocol::{parse_action, parse_note};

/// Why a session stopped, absent a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The decision source signaled end of session.
    EndOfSession,
    /// An interrupt arrived while awaiting the decision source.
    Interrupted,
}

/// What a completed session produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub run_id: String,
    pub run_dir: PathBuf,
    /// Completed pre-exec/execute/log cycles.
    pub steps: u32,
    pub stop: StopReason,
}

/// Error type for a fatally aborted session.
///
/// The run metadata has already been finalized by the time one of these
/// propagates; the partial log stays on disk for post-mortem scoring.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("execution target failure: {0}")]
    Execution(#[from] ExecutionError),

    #[error("event log failure: {0}")]
    Log(#[from] LogError),

    #[error("decision source failure: {0}")]
    Driver(#[from] DriverError),
}

/// Outcome of one decision-source prompt.
enum Prompt {
    Text(String),
    Empty,
    Interrupted,
}

/// Drives one run through the protocol state machine.
pub struct SessionLoop {
    source: Box<dyn DecisionSource>,
    executor: CommandExecutor,
    session: RunSession,
    clock: EventClock,
    interrupt: watch::Receiver<bool>,
}

impl SessionLoop {
    /// Binds a decision source and executor to a freshly created run.
    ///
    /// `interrupt` flips to `true` when the process receives a shutdown
    /// signal; the loop honors it only between states, never mid-command.
    pub fn new(
        source: Box<dyn DecisionSource>,
        executor: CommandExecutor,
        session: RunSession,
        interrupt: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            executor,
            session,
            clock: EventClock::new(),
            interrupt,
        }
    }

    /// Runs the session to completion.
    ///
    /// Finalizes the run metadata exactly once on every exit path. On a
    /// fatal error the original failure wins; a secondary finalize failure
    /// is only logged.
    pub async fn run(mut self) -> Result<SessionSummary, SessionError> {
        let driven = self.drive().await;
        let finalized = self.session.finalize().await;

        match driven {
            Ok((steps, stop)) => {
                finalized?;
                info!(
                    run_id = self.session.run_id(),
                    steps,
                    reason = ?stop,
                    "session finished"
                );
                Ok(SessionSummary {
                    run_id: self.session.run_id().to_string(),
                    run_dir: self.session.run_dir().to_path_buf(),
                    steps,
                    stop,
                })
            }
            Err(err) => {
                if let Err(finalize_err) = finalized {
                    warn!(error = %finalize_err, "failed to finalize run metadata after abort");
                }
                Err(err)
            }
        }
    }

    async fn drive(&mut self) -> Result<(u32, StopReason), SessionError> {
        let mut steps: u32 = 0;

        let stop = 'turns: loop {
            // AwaitingPreExec
            let raw_plan = match self.prompt_action().await? {
                Prompt::Interrupted => break 'turns StopReason::Interrupted,
                Prompt::Empty => break 'turns StopReason::EndOfSession,
                Prompt::Text(text) => text,
            };

            // Parsing: a malformed block re-prompts; the step counter
            // does not move.
            let action = match parse_action(&raw_plan) {
                Ok(action) => action,
                Err(err) => {
                    warn!(error = %err, "rejected pre-exec block");
                    self.source.report_error(&err.to_string()).await;
                    continue 'turns;
                }
            };

            // Executing: the one suspension point that ignores interrupts.
            // An in-flight command always completes and gets logged.
            let outcome = self.executor.execute(&action.command).await?;

            // Logging
            let event = Event::Command(CommandEvent {
                t: self.clock.next(),
                plan: raw_plan,
                command: action.command,
                stdout: outcome.stdout.clone(),
                stderr: outcome.stderr.clone(),
                exit_code: outcome.exit_code,
                latency_s: outcome.latency_seconds,
            });
            self.session.append(event).await?;
            steps += 1;
            info!(
                step = steps,
                exit_code = outcome.exit_code,
                latency_s = outcome.latency_seconds,
                "command completed"
            );

            // AwaitingPostExec
            loop {
                let raw_note = match self.prompt_note(&outcome).await? {
                    Prompt::Interrupted => break 'turns StopReason::Interrupted,
                    Prompt::Empty => break, // note skipped this turn
                    Prompt::Text(text) => text,
                };
                match parse_note(&raw_note) {
                    Ok(_) => {
                        let event = Event::Note(NoteEvent {
                            t: self.clock.next(),
                            post: raw_note,
                        });
                        self.session.append(event).await?;
                        break;
                    }
                    Err(err) => {
                        warn!(error = %err, "rejected post-exec block");
                        self.source.report_error(&err.to_string()).await;
                    }
                }
            }
        };

        Ok((steps, stop))
    }

    async fn prompt_action(&mut self) -> Result<Prompt, SessionError> {
        tokio::select! {
            biased;
            _ = interrupted(&mut self.interrupt) => Ok(Prompt::Interrupted),
            action = self.source.next_action(self.session.events()) => Ok(match action? {
                Some(text) => Prompt::Text(text),
                None => Prompt::Empty,
            }),
        }
    }

    async fn prompt_note(
        &mut self,
        outcome: &crate::executor::CommandOutcome,
    ) -> Result<Prompt, SessionError> {
        tokio::select! {
            biased;
            _ = interrupted(&mut self.interrupt) => Ok(Prompt::Interrupted),
            note = self.source.next_note(self.session.events(), outcome) => Ok(match note? {
                Some(text) => Prompt::Text(text),
                None => Prompt::Empty,
            }),
        }
    }
}

/// Completes when the interrupt flag is armed.
///
/// A dropped sender means no interrupt can ever arrive; park instead of
/// spinning on the closed channel.
async fn interrupted(interrupt: &mut watch::Receiver<bool>) {
    if interrupt.wait_for(|armed| *armed).await.is_err() {
        std::future::pending::<()>().await;
    }
}
