//! Interactive console decision source.
//!
//! Reads protocol blocks from an operator terminal. A block is every line
//! typed until end-of-input (Ctrl+D on a terminal finishes the block
//! without closing the session; the next prompt reads again). Prompts and
//! command outcomes are product output and go to stdout; diagnostics stay
//! on the tracing layer.
//!
//! Stdin is read on a dedicated thread feeding a bounded channel; the
//! async side only ever awaits the channel. A blocking stdin read cannot
//! be cancelled, so it must never run on the runtime's blocking pool,
//! where shutdown would wait on it until the operator pressed Enter.

use std::io::BufRead;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::events::Event;
use crate::executor::CommandOutcome;

use super::{DecisionSource, DriverError};

/// Line buffer between the reader thread and the console.
///
/// A pipe at end-of-input returns zero bytes on every read; the bound
/// parks the reader thread instead of letting markers pile up while a
/// command runs.
const INPUT_BUFFER_LINES: usize = 100;

/// One message from the stdin reader thread.
enum ConsoleInput {
    Line(String),
    /// Ctrl+D on a terminal, or a pipe running dry. Finishes the current
    /// block; on a terminal the next read blocks for more input.
    EndOfInput,
    Failed(std::io::Error),
}

/// Decision source backed by the operator's terminal.
///
/// Construction spawns the stdin reader thread. The thread exits when the
/// console is dropped (its next send fails) or when stdin reports a read
/// error; a thread parked inside `read_line` just dies with the process.
pub struct ManualConsole {
    input: mpsc::Receiver<ConsoleInput>,
}

impl ManualConsole {
    /// Console over the process stdin.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(INPUT_BUFFER_LINES);
        spawn_stdin_reader(tx);
        Self { input: rx }
    }

    /// Collects lines until end-of-input and returns the trimmed block.
    ///
    /// Cancel-safe: dropping the returned future mid-read abandons the
    /// current block but leaves the reader thread and any queued lines
    /// intact.
    async fn read_block(&mut self) -> Result<String, DriverError> {
        let mut collected: Vec<String> = Vec::new();
        loop {
            match self.input.recv().await {
                Some(ConsoleInput::Line(line)) => collected.push(line),
                Some(ConsoleInput::EndOfInput) | None => break,
                Some(ConsoleInput::Failed(err)) => return Err(DriverError::Io(err)),
            }
        }
        Ok(collected.join("\n").trim().to_string())
    }
}

impl Default for ManualConsole {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_stdin_reader(tx: mpsc::Sender<ConsoleInput>) {
    std::thread::spawn(move || {
        let mut input = std::io::stdin().lock();
        loop {
            let mut line = String::new();
            let message = match input.read_line(&mut line) {
                Ok(0) => ConsoleInput::EndOfInput,
                Ok(_) => {
                    if line.ends_with('\n') {
                        line.pop();
                        if line.ends_with('\r') {
                            line.pop();
                        }
                    }
                    ConsoleInput::Line(line)
                }
                Err(err) => ConsoleInput::Failed(err),
            };
            let fatal = matches!(message, ConsoleInput::Failed(_));
            if tx.blocking_send(message).is_err() || fatal {
                break;
            }
        }
    });
}

#[async_trait]
impl DecisionSource for ManualConsole {
    async fn next_action(&mut self, transcript: &[Event]) -> Result<Option<String>, DriverError> {
        let step = transcript.iter().filter(|e| e.as_command().is_some()).count() + 1;
        println!();
        println!("=== Step {step} ===");
        println!("Enter pre-exec Action Protocol block (Intent/Command/Expected/OnError).");
        println!("Press Ctrl+D when done; an empty block ends the session:");

        let block = self.read_block().await?;
        Ok(if block.is_empty() { None } else { Some(block) })
    }

    async fn next_note(
        &mut self,
        _transcript: &[Event],
        outcome: &CommandOutcome,
    ) -> Result<Option<String>, DriverError> {
        println!();
        println!("Exit code: {}", outcome.exit_code);
        println!("Stdout:\n{}", outcome.stdout);
        println!("Stderr:\n{}", outcome.stderr);
        println!("Enter post-exec Action Protocol block (Observation/Inference/Next).");
        println!("Press Ctrl+D when done; an empty block skips the note:");

        let block = self.read_block().await?;
        Ok(if block.is_empty() { None } else { Some(block) })
    }

    async fn report_error(&mut self, message: &str) {
        println!("Error: {message}. Please re-enter the block.");
    }
}
