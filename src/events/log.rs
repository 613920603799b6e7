//! Run directory lifecycle and append-only event persistence.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::LogError;

use super::types::{Event, RunMeta};

/// File name of the append-only event log inside a run directory.
pub const EVENTS_FILE: &str = "events.jsonl";

/// File name of the run metadata record inside a run directory.
pub const META_FILE: &str = "meta.json";

/// Current UTC time as a filesystem-safe ISO-8601 string.
///
/// Colons are replaced and the UTC offset collapses to `Z`, so the value
/// can key a directory on every platform while still sorting
/// chronologically. Microsecond precision keeps ids distinct across rapid
/// consecutive runs.
pub fn utc_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H-%M-%S%.6fZ").to_string()
}

/// The aggregate owning one run: the run directory and its metadata, plus
/// the open append handle to the event log.
///
/// Exactly one session loop owns a `RunSession` from creation to finalize.
/// Appends go straight to disk (flushed and synced before returning) and
/// are mirrored in memory so the decision source can condition on the
/// transcript without re-reading the file.
#[derive(Debug)]
pub struct RunSession {
    run_id: String,
    dir: PathBuf,
    meta: RunMeta,
    log: fs::File,
    events: Vec<Event>,
}

impl RunSession {
    /// Creates a fresh run directory under `runs_root` keyed by the current
    /// UTC timestamp and writes the initial metadata record.
    pub async fn create(
        runs_root: &Path,
        container: &str,
        mode: &str,
        prompt: &str,
    ) -> Result<Self, LogError> {
        Self::create_with_id(runs_root, utc_timestamp(), container, mode, prompt).await
    }

    /// Creates a run directory with a caller-chosen id.
    ///
    /// An existing directory with the same id is a fatal setup error, never
    /// silently reused: two sessions must not interleave one event log.
    pub async fn create_with_id(
        runs_root: &Path,
        run_id: String,
        container: &str,
        mode: &str,
        prompt: &str,
    ) -> Result<Self, LogError> {
        fs::create_dir_all(runs_root).await?;

        let dir = runs_root.join(&run_id);
        fs::create_dir(&dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                LogError::RunExists {
                    run_id: run_id.clone(),
                }
            } else {
                LogError::Io(e)
            }
        })?;

        // The run id doubles as started_at: both name the same instant.
        let meta = RunMeta {
            container: container.to_string(),
            mode: mode.to_string(),
            prompt: prompt.to_string(),
            started_at: run_id.clone(),
            ended_at: None,
        };
        write_meta(&dir, &meta).await?;

        let log = fs::OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(dir.join(EVENTS_FILE))
            .await?;

        Ok(Self {
            run_id,
            dir,
            meta,
            log,
            events: Vec::new(),
        })
    }

    /// Appends one event as a single JSON line, durably.
    ///
    /// The write is flushed and synced before this returns; a crash
    /// afterwards cannot lose the record. An event older than the last
    /// appended one is rejected, keeping the log non-decreasing in time.
    pub async fn append(&mut self, event: Event) -> Result<(), LogError> {
        if let Some(last) = self.events.last() {
            if event.timestamp() < last.timestamp() {
                return Err(LogError::OutOfOrder {
                    t: event.timestamp(),
                    last: last.timestamp(),
                });
            }
        }

        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        self.log.write_all(line.as_bytes()).await?;
        self.log.flush().await?;
        self.log.sync_data().await?;

        self.events.push(event);
        Ok(())
    }

    /// Marks the run as ended and rewrites the metadata record.
    ///
    /// Idempotent: a second call keeps the first end timestamp.
    pub async fn finalize(&mut self) -> Result<(), LogError> {
        if self.meta.ended_at.is_some() {
            return Ok(());
        }
        self.meta.ended_at = Some(utc_timestamp());
        write_meta(&self.dir, &self.meta).await
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.dir
    }

    /// Ordered transcript of everything appended so far.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn meta(&self) -> &RunMeta {
        &self.meta
    }

    pub fn events_path(&self) -> PathBuf {
        self.dir.join(EVENTS_FILE)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }
}

/// Writes the metadata record as pretty JSON, synced to disk.
async fn write_meta(dir: &Path, meta: &RunMeta) -> Result<(), LogError> {
    let json = serde_json::to_string_pretty(meta)?;
    let mut file = fs::File::create(dir.join(META_FILE)).await?;
    file.write_all(json.as_bytes()).await?;
    file.sync_all().await?;
    Ok(())
}
