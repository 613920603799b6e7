//! CLI command definitions for breakout-harness.
//!
//! Two subcommands share one binary: `run` drives an interactive session
//! against a target container, `score` derives metrics from a recorded run.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use crate::driver::{create_source, DriveMode};
use crate::events::RunSession;
use crate::executor::{CommandExecutor, DockerTarget};
use crate::scoring;
use crate::session::{SessionLoop, StopReason};

/// Default target container name.
const DEFAULT_CONTAINER: &str = "breakout_agent";

/// Default root directory for run logs.
const DEFAULT_RUNS_DIR: &str = "runs";

/// Default per-command timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Protocol-driven orchestrator and scorer for containerized agent runs.
#[derive(Parser)]
#[command(name = "breakout-harness")]
#[command(about = "Drive and score protocol-disciplined agent sessions in a container")]
#[command(version)]
#[command(
    long_about = "breakout-harness runs an interactive command session against a running agent container.\n\nEvery step follows a fixed block protocol (Intent / Command / Expected / On-Error before execution, Observation / Inference / Next after) and is appended to a per-run JSONL event log that the score subcommand turns into summary metrics.\n\nExample usage:\n  breakout-harness run --container breakout_agent\n  breakout-harness score runs/2026-03-14T09-26-53.589793Z"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run an interactive session against the target container.
    Run(RunArgs),

    /// Score a recorded run and print the metrics report as JSON.
    Score(ScoreArgs),
}

/// Arguments for the run command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Name of the container commands are executed in.
    #[arg(short = 'c', long, env = "AGENT_CONTAINER", default_value = DEFAULT_CONTAINER)]
    pub container: String,

    /// Decision source mode ("manual"; automated modes are reserved).
    #[arg(short = 'm', long, env = "LLM_MODE", default_value = "manual")]
    pub mode: String,

    /// Root directory run logs are created under.
    #[arg(long, env = "RUNS_DIR", default_value = DEFAULT_RUNS_DIR)]
    pub runs_dir: PathBuf,

    /// File whose contents are recorded as the run objective.
    #[arg(short = 'p', long)]
    pub prompt_file: Option<PathBuf>,

    /// Per-command timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

/// Arguments for the score command.
#[derive(Parser, Debug)]
pub struct ScoreArgs {
    /// Run directory (or direct events.jsonl path) to score.
    pub run: PathBuf,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => {
            run_session_command(args).await?;
        }
        Commands::Score(args) => {
            run_score_command(args).await?;
        }
    }
    Ok(())
}

async fn run_session_command(args: RunArgs) -> anyhow::Result<()> {
    let mode: DriveMode = args.mode.parse().map_err(anyhow::Error::msg)?;
    let source = create_source(mode)?;

    let prompt = match &args.prompt_file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt file {}", path.display()))?,
        None => String::new(),
    };

    // The container must exist and be running before any run directory is
    // created; a dead target should not leave an empty log behind.
    let target = DockerTarget::connect(&args.container)?;
    target.verify().await?;

    let executor = CommandExecutor::new(Box::new(target))
        .with_timeout(Duration::from_secs(args.timeout_secs));

    let session = RunSession::create(&args.runs_dir, &args.container, mode.as_str(), &prompt)
        .await
        .context("Failed to create run directory")?;
    let run_dir = session.run_dir().to_path_buf();

    info!(
        run_id = session.run_id(),
        container = %args.container,
        mode = %mode,
        timeout_secs = args.timeout_secs,
        "Starting session"
    );

    let (interrupt_tx, interrupt_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt_tx.send(true);
        }
    });

    if !prompt.is_empty() {
        println!("Objective:\n{prompt}");
    }

    let summary = SessionLoop::new(source, executor, session, interrupt_rx)
        .run()
        .await
        .with_context(|| format!("Run aborted; partial log preserved in {}", run_dir.display()))?;

    if summary.stop == StopReason::Interrupted {
        println!("Interrupted.");
    }
    println!("Run complete. Logs in {}", summary.run_dir.display());
    Ok(())
}

async fn run_score_command(args: ScoreArgs) -> anyhow::Result<()> {
    let report = scoring::score(&args.run)
        .with_context(|| format!("Failed to score run at {}", args.run.display()))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_parses() {
        // Verify CLI definition is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_command_defaults() {
        let cli = Cli::try_parse_from(["breakout-harness", "run"]).expect("should parse");

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.container, DEFAULT_CONTAINER);
                assert_eq!(args.mode, "manual");
                assert_eq!(args.runs_dir, PathBuf::from(DEFAULT_RUNS_DIR));
                assert!(args.prompt_file.is_none());
                assert_eq!(args.timeout_secs, DEFAULT_TIMEOUT_SECS);
            }
            _ => panic!("Expected Run command"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_run_command_with_all_options() {
        let cli = Cli::try_parse_from([
            "breakout-harness",
            "run",
            "-c",
            "sandbox_1",
            "-m",
            "manual",
            "--runs-dir",
            "/tmp/runs",
            "-p",
            "objective.md",
            "--timeout-secs",
            "5",
            "--log-level",
            "debug",
        ])
        .expect("should parse");

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.container, "sandbox_1");
                assert_eq!(args.runs_dir, PathBuf::from("/tmp/runs"));
                assert_eq!(args.prompt_file, Some(PathBuf::from("objective.md")));
                assert_eq!(args.timeout_secs, 5);
            }
            _ => panic!("Expected Run command"),
        }
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_score_command_requires_run_path() {
        assert!(Cli::try_parse_from(["breakout-harness", "score"]).is_err());

        let cli =
            Cli::try_parse_from(["breakout-harness", "score", "runs/x"]).expect("should parse");
        match cli.command {
            Commands::Score(args) => assert_eq!(args.run, PathBuf::from("runs/x")),
            _ => panic!("Expected Score command"),
        }
    }
}
