//! Command-line interface for breakout-harness.
//!
//! Provides the `run` subcommand for driving a live session and the
//! `score` subcommand for deriving metrics from a recorded run.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
