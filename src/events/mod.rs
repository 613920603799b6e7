//! Durable run records: the event log and its metadata.
//!
//! Every run owns one directory under the runs root, holding exactly two
//! files: `meta.json` (the [`RunMeta`] record, finalized once at run end)
//! and `events.jsonl` (one self-delimited JSON event per line, append-only).
//! [`RunSession`] is the aggregate that owns both for the duration of one
//! session loop; the scorer later reads the same files back through their
//! serde shapes without touching this module's write path.

mod log;
mod types;

pub use log::{utc_timestamp, RunSession, EVENTS_FILE, META_FILE};
pub use types::{CommandEvent, Event, EventClock, NoteEvent, RunMeta};
