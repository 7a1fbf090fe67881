use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AbbrvError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Keyboard controller error: {0}")]
    Injection(String),

    #[error("Keyboard error: {0}")]
    Keyboard(String),

    #[error("Invalid abbreviation {abbreviation:?}: {reason}")]
    InvalidAbbreviation {
        abbreviation: String,
        reason: &'static str,
    },

    #[error("Invalid expansion: {0}")]
    InvalidExpansion(&'static str),

    #[error("Abbreviation '{0}' not found")]
    EntryNotFound(String),

    #[error("No entry at position {0}")]
    IndexOutOfRange(usize),

    #[error("Abbreviation '{0}' already exists")]
    DuplicateAbbreviation(String),

    #[error("Malformed data file: {0}")]
    Format(String),

    #[error("Daemon already running with PID {0}")]
    DaemonAlreadyRunning(u32),

    #[error("Daemon is not running")]
    DaemonNotRunning,

    #[error("Invalid PID in daemon file")]
    InvalidPid,

    #[error("Error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AbbrvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_abbreviation_message_names_the_text() {
        let err = AbbrvError::InvalidAbbreviation {
            abbreviation: "héllo".to_string(),
            reason: "characters must be ASCII",
        };
        assert_eq!(
            err.to_string(),
            "Invalid abbreviation \"héllo\": characters must be ASCII"
        );
    }

    #[test]
    fn io_errors_convert() {
        let err: AbbrvError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, AbbrvError::Io(_)));
    }
}
