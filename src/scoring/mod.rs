//! Metric derivation over persisted run logs.
//!
//! The scorer is a pure read pass: it loads a run's `events.jsonl`, derives
//! a [`MetricsReport`], and never writes anything back. Path detection is a
//! documented best-effort heuristic, not semantic analysis: substrings that
//! look like absolute paths under the two agent mount points (`/world`,
//! `/home/agent`) count as coverage; matches under the tools directory
//! count as tool usage.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ScoreError;
use crate::events::{CommandEvent, Event, RunMeta, EVENTS_FILE, META_FILE};

/// Absolute paths under the agent's mount points, scanned in stdout.
///
/// Trailing punctuation that fits the path character class (for example a
/// final period) stays part of the match; this is the documented edge of
/// the heuristic.
const PATH_PATTERN: &str = r"/(?:home/agent|world)(?:/[A-Za-z0-9._\-]+)+";

/// Paths under the agent's tools directory, scanned in command and stdout.
const TOOLS_PATTERN: &str = r"/home/agent/tools/[^\s]+";

fn path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PATH_PATTERN).expect("Invalid path pattern"))
}

fn tools_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TOOLS_PATTERN).expect("Invalid tools pattern"))
}

/// Summary metrics derived from one run's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Distinct mount-point paths seen in command stdout.
    pub coverage_files: usize,

    /// Share of commands that exited zero; `0.0` for an empty run.
    pub efficiency_success_rate: f64,

    /// Median command latency in seconds; `0.0` for an empty run.
    pub latency_median_s: f64,

    /// Number of distinct tools-directory paths used.
    pub tools_count: usize,

    /// The distinct tools-directory paths, sorted.
    pub tools: Vec<String>,

    /// Number of executed commands.
    pub steps: usize,
}

/// Scores a run directory (or a direct path to an events file).
///
/// Missing directory or log file is the only error condition; a present
/// but empty log scores to an all-zero report.
pub fn score(path: &Path) -> Result<MetricsReport, ScoreError> {
    let events = load_events(path)?;
    warn_if_unfinalized(path);
    Ok(compute_metrics(&events))
}

/// Loads every parseable event from a run directory or events file.
///
/// Blank and malformed lines are skipped with a warning: a run that
/// crashed mid-append may legitimately end in a torn line, and that must
/// not make the rest of the log unscorable.
pub fn load_events(path: &Path) -> Result<Vec<Event>, ScoreError> {
    let events_path = if path.is_dir() {
        path.join(EVENTS_FILE)
    } else {
        path.to_path_buf()
    };
    if !events_path.is_file() {
        return Err(ScoreError::MissingLog(events_path));
    }

    let contents = std::fs::read_to_string(&events_path)?;
    let mut events = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Event>(line) {
            Ok(event) => events.push(event),
            Err(err) => {
                warn!(line = number + 1, error = %err, "skipping malformed event record");
            }
        }
    }
    Ok(events)
}

/// Derives the metrics report from an ordered event sequence.
pub fn compute_metrics(events: &[Event]) -> MetricsReport {
    let commands: Vec<&CommandEvent> = events.iter().filter_map(Event::as_command).collect();
    let steps = commands.len();

    let successes = commands.iter().filter(|c| c.exit_code == 0).count();
    let efficiency_success_rate = if steps > 0 {
        successes as f64 / steps as f64
    } else {
        0.0
    };

    let mut latencies: Vec<f64> = commands.iter().map(|c| c.latency_s).collect();
    let latency_median_s = median(&mut latencies);

    let mut coverage: HashSet<&str> = HashSet::new();
    for command in &commands {
        for m in path_regex().find_iter(&command.stdout) {
            coverage.insert(m.as_str());
        }
    }

    let mut tools: BTreeSet<String> = BTreeSet::new();
    for command in &commands {
        for text in [&command.command, &command.stdout] {
            for m in tools_regex().find_iter(text) {
                tools.insert(m.as_str().to_string());
            }
        }
    }

    MetricsReport {
        coverage_files: coverage.len(),
        efficiency_success_rate,
        latency_median_s,
        tools_count: tools.len(),
        tools: tools.into_iter().collect(),
        steps,
    }
}

/// Standard median: average of the two middle values for even counts.
fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Warns when scoring a run whose metadata says it never finalized.
fn warn_if_unfinalized(path: &Path) {
    if !path.is_dir() {
        return;
    }
    let Ok(raw) = std::fs::read_to_string(path.join(META_FILE)) else {
        return;
    };
    if let Ok(meta) = serde_json::from_str::<RunMeta>(&raw) {
        if meta.ended_at.is_none() {
            warn!(
                run_dir = %path.display(),
                "run is not finalized; metrics reflect a partial log"
            );
        }
    }
}
