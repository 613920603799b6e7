//! Decision sources: where the next protocol block comes from.
//!
//! The session loop is agnostic about who decides the next action. A
//! [`DecisionSource`] supplies raw pre-exec and post-exec block text and the
//! loop handles everything downstream. The interactive [`ManualConsole`]
//! reads from stdin; an automated policy is the designed extension point and
//! plugs in here without touching anything outside this module.

pub mod manual;

use async_trait::async_trait;

use crate::events::Event;
use crate::executor::CommandOutcome;

pub use manual::ManualConsole;

/// Supported decision source modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveMode {
    /// A human operator types protocol blocks interactively.
    Manual,
    /// Reserved: an automated policy conditions on the transcript.
    Automated,
}

impl DriveMode {
    /// Returns the name recorded in run metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            DriveMode::Manual => "manual",
            DriveMode::Automated => "auto",
        }
    }
}

impl std::fmt::Display for DriveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DriveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(DriveMode::Manual),
            "auto" | "policy" | "llm" => Ok(DriveMode::Automated),
            other => Err(format!("Unknown decision source mode: {}", other)),
        }
    }
}

/// Trait for decision sources.
///
/// `transcript` is the read-only history of events logged so far in the
/// current run; a policy implementation conditions on it, the manual
/// console ignores it.
#[async_trait]
pub trait DecisionSource: Send {
    /// Supplies the next pre-exec block text.
    ///
    /// `Ok(None)` ends the session gracefully (blank input in the
    /// interactive case).
    async fn next_action(&mut self, transcript: &[Event]) -> Result<Option<String>, DriverError>;

    /// Supplies the post-exec block text for the outcome just observed.
    ///
    /// `Ok(None)` skips the note for this turn.
    async fn next_note(
        &mut self,
        transcript: &[Event],
        outcome: &CommandOutcome,
    ) -> Result<Option<String>, DriverError>;

    /// Surfaces a rejected block back to the decision channel before the
    /// loop re-prompts.
    async fn report_error(&mut self, _message: &str) {}
}

/// Error type for decision source operations.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Decision source mode '{0}' is not implemented yet")]
    UnsupportedMode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Creates the decision source for the given mode.
///
/// The automated mode is recognized but reserved; selecting it fails here,
/// before any run directory is created.
pub fn create_source(mode: DriveMode) -> Result<Box<dyn DecisionSource>, DriverError> {
    match mode {
        DriveMode::Manual => Ok(Box::new(ManualConsole::new())),
        DriveMode::Automated => Err(DriverError::UnsupportedMode(mode.as_str().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("manual".parse::<DriveMode>().unwrap(), DriveMode::Manual);
        assert_eq!("MANUAL".parse::<DriveMode>().unwrap(), DriveMode::Manual);
        assert_eq!("auto".parse::<DriveMode>().unwrap(), DriveMode::Automated);
        assert_eq!("llm".parse::<DriveMode>().unwrap(), DriveMode::Automated);
        assert!("oracle".parse::<DriveMode>().is_err());
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(DriveMode::Manual.as_str(), "manual");
        assert_eq!(DriveMode::Automated.to_string(), "auto");
    }

    #[test]
    fn test_factory_rejects_reserved_mode() {
        assert!(create_source(DriveMode::Manual).is_ok());
        let err = create_source(DriveMode::Automated)
            .err()
            .expect("reserved mode must fail");
        assert!(matches!(err, DriverError::UnsupportedMode(mode) if mode == "auto"));
    }
}
