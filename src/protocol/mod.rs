//! Action Protocol block types and parsing.
//!
//! One agent turn exchanges two semi-structured text blocks. The pre-exec
//! block declares what the agent is about to do and carries exactly one
//! shell command; the post-exec block files what the agent learned once the
//! command's result is known. Each block is a sequence of tagged sections:
//!
//! ```text
//! <Intent>
//! Check what is mounted at the world root.
//! <Command>
//! ls -la /world
//! <Expected>
//! A directory listing with at least one data file.
//! <OnError>
//! Fall back to `find /world -maxdepth 1`.
//! ```
//!
//! Parsing is pure: no IO, no state. Malformed blocks produce a
//! [`ParseError`](crate::error::ParseError) the session loop surfaces back
//! to the decision source for correction.
//!
//! # Example
//!
//! ```
//! use breakout_harness::protocol::parse_action;
//!
//! let block = "<Intent>\nList the world mount.\n<Command>\nls /world\n\
//!              <Expected>\nFiles.\n<OnError>\nStop.";
//! let action = parse_action(block).unwrap();
//! assert_eq!(action.command, "ls /world");
//! ```

mod parser;

pub use parser::{parse_action, parse_note, ACTION_TAGS, NOTE_TAGS};

/// A validated pre-exec block: one declared intention, exactly one command.
///
/// Immutable once parsed. The session loop consumes it for dispatch and
/// keeps only the verbatim source text in the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionBlock {
    /// What the agent believes this command accomplishes.
    pub intent: String,
    /// The single shell command line to dispatch, trimmed.
    pub command: String,
    /// The outcome the agent predicts.
    pub expected: String,
    /// The fallback plan if the outcome does not match.
    pub on_error: String,
}

/// A validated post-exec block filed after a command's result is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteBlock {
    /// What actually happened, as observed in the outcome.
    pub observation: String,
    /// What the agent concludes from the observation.
    pub inference: String,
    /// The planned next step.
    pub next: String,
}
