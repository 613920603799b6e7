//! breakout-harness: protocol-driven orchestrator for containerized agent runs.
//!
//! This library drives an interactive command session against a running
//! container, records every step to an append-only JSONL event log, and
//! derives summary metrics from recorded runs.

// Core modules
pub mod cli;
pub mod driver;
pub mod error;
pub mod events;
pub mod executor;
pub mod protocol;
pub mod scoring;
pub mod session;

// Re-export commonly used error types
pub use error::{ExecutionError, LogError, ParseError, ScoreError};
