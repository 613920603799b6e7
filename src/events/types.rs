//! Event and metadata record types for the run log.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One executed command with its full captured outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEvent {
    /// Epoch-seconds timestamp of the record.
    pub t: f64,

    /// The verbatim pre-exec block text that produced this command.
    pub plan: String,

    /// The single command line that was dispatched.
    pub command: String,

    /// Captured standard output, decoded lossily as UTF-8.
    pub stdout: String,

    /// Captured standard error, decoded lossily as UTF-8.
    pub stderr: String,

    /// Process exit code; `-1` marks a timed-out command.
    pub exit_code: i64,

    /// Dispatch-to-result latency in seconds, monotonic-clock derived.
    pub latency_s: f64,
}

/// One post-exec note filed by the agent after seeing a command's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Epoch-seconds timestamp of the record.
    pub t: f64,

    /// The verbatim post-exec block text.
    pub post: String,
}

/// A single line of the event log.
///
/// The wire format carries no discriminator field; the two variants have
/// disjoint required keys (`command` et al. vs `post`), so untagged
/// deserialization resolves the shape and a line matching neither is a
/// parse error rather than a silently odd record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Event {
    Command(CommandEvent),
    Note(NoteEvent),
}

impl Event {
    /// Timestamp of the record, regardless of variant.
    pub fn timestamp(&self) -> f64 {
        match self {
            Event::Command(event) => event.t,
            Event::Note(event) => event.t,
        }
    }

    /// The command record, if this event is one.
    pub fn as_command(&self) -> Option<&CommandEvent> {
        match self {
            Event::Command(event) => Some(event),
            Event::Note(_) => None,
        }
    }
}

/// Metadata for one run, written at session start and finalized at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    /// Name or ID of the execution target container.
    pub container: String,

    /// Decision source mode the run was driven by.
    pub mode: String,

    /// Prompt text shown to the agent, empty when none was recorded.
    pub prompt: String,

    /// Sanitized UTC timestamp at which the run started.
    pub started_at: String,

    /// Sanitized UTC timestamp at which the run ended; `null` until
    /// the session finalizes the log.
    pub ended_at: Option<String>,
}

/// Wall-clock event timestamps with a monotonic correction.
///
/// Event timestamps come from the system clock, which can step backwards
/// under NTP adjustment. The log requires non-decreasing timestamps within
/// a run, so the clock clamps each reading to the last one handed out.
#[derive(Debug, Default)]
pub struct EventClock {
    last: f64,
}

impl EventClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next event timestamp, never earlier than the previous.
    pub fn next(&mut self) -> f64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or(self.last);
        self.last = now.max(self.last);
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_command_event() -> CommandEvent {
        CommandEvent {
            t: 1_700_000_000.25,
            plan: "<Intent>\nLook around.\n<Command>\nls /world\n<Expected>\nFiles.\n<OnError>\nStop.".to_string(),
            command: "ls /world".to_string(),
            stdout: "data.csv\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
            latency_s: 0.12,
        }
    }

    #[test]
    fn test_command_event_roundtrip() {
        let event = Event::Command(sample_command_event());
        let line = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&line).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_note_event_roundtrip() {
        let event = Event::Note(NoteEvent {
            t: 1_700_000_001.5,
            post: "<Observation>\nSaw data.csv.\n<Inference>\nSeed data.\n<Next>\nRead it.".to_string(),
        });
        let line = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&line).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_untagged_discrimination_by_shape() {
        let command_line = r#"{"t":1.0,"plan":"p","command":"ls","stdout":"","stderr":"","exit_code":0,"latency_s":0.1}"#;
        let note_line = r#"{"t":2.0,"post":"note"}"#;

        assert!(matches!(
            serde_json::from_str::<Event>(command_line).unwrap(),
            Event::Command(_)
        ));
        assert!(matches!(serde_json::from_str::<Event>(note_line).unwrap(), Event::Note(_)));
        assert!(serde_json::from_str::<Event>(r#"{"t":3.0}"#).is_err());
    }

    #[test]
    fn test_meta_ended_at_serializes_as_null_until_finalized() {
        let meta = RunMeta {
            container: "breakout_agent".to_string(),
            mode: "manual".to_string(),
            prompt: String::new(),
            started_at: "2026-08-23T10-00-00.000000Z".to_string(),
            ended_at: None,
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains(r#""ended_at":null"#));

        let back: RunMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_event_clock_never_regresses() {
        let mut clock = EventClock::new();
        let first = clock.next();
        let second = clock.next();
        assert!(second >= first);

        // A clock that stepped backwards must clamp to the last reading.
        clock.last = f64::MAX;
        assert_eq!(clock.next(), f64::MAX);
    }
}
