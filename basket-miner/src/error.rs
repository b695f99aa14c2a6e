//! Error types for the basket-miner library.
//!
//! All fallible operations return [`MinerError`] through the crate-wide
//! [`Result`] alias. Every variant is fatal for the operation that raised it:
//! nothing in this crate skips a bad row or a bad output line.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for basket-miner.
#[derive(Error, Debug)]
pub enum MinerError {
    /// A source row could not be tokenized.
    #[error("Parse error at line {line} (byte {byte}): {message}")]
    Parse {
        /// 1-based source line of the offending record, header included
        line: u64,
        /// Byte offset of the offending record within the source
        byte: u64,
        /// Tokenizer message
        message: String,
    },

    /// A column required by the operation is not in the header row.
    #[error("Column '{column}' not found in header")]
    ColumnNotFound { column: String },

    /// `exec` was called before an input was provided.
    #[error("No input provided: set an input file or inline data before exec")]
    MissingInput,

    /// A second input was provided while another one is already set.
    #[error("Input already provided as {existing}, cannot also use {attempted}")]
    ConflictingInput {
        existing: &'static str,
        attempted: &'static str,
    },

    /// A caller-supplied argument is out of range or not applicable.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The external executable could not be started.
    #[error("Failed to spawn '{program}': {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external process exited without leaving a readable output file.
    #[error("Mining process failed (exit code {exit_code:?}): {message}")]
    ExecutionFailure {
        /// Exit code of the process, `None` if it was killed by a signal
        exit_code: Option<i32>,
        /// Declared output path
        output: PathBuf,
        message: String,
    },

    /// An output line matched none (or more than one) of the pattern grammars.
    #[error("Unrecognized output format at line {line_number}: {reason}: '{line}'")]
    UnrecognizedFormat {
        line_number: usize,
        line: String,
        reason: String,
    },

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error from serialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, MinerError>`.
pub type Result<T> = std::result::Result<T, MinerError>;

impl MinerError {
    /// Creates an unrecognized format error for the given output line.
    pub fn unrecognized(
        line_number: usize,
        line: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnrecognizedFormat {
            line_number,
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// Creates an execution failure error.
    pub fn execution_failure(
        exit_code: Option<i32>,
        output: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self::ExecutionFailure {
            exit_code,
            output: output.into(),
            message: message.into(),
        }
    }

    /// Returns the byte offset carried by a parse error.
    pub fn byte_offset(&self) -> Option<u64> {
        match self {
            Self::Parse { byte, .. } => Some(*byte),
            _ => None,
        }
    }
}

impl From<csv::Error> for MinerError {
    fn from(err: csv::Error) -> Self {
        let (line, byte) = err
            .position()
            .map(|pos| (pos.line(), pos.byte()))
            .unwrap_or((0, 0));
        let message = err.to_string();
        match err.into_kind() {
            // Keep I/O failures distinct from malformed rows.
            csv::ErrorKind::Io(io) => MinerError::Io(io),
            _ => MinerError::Parse {
                line,
                byte,
                message,
            },
        }
    }
}

impl From<serde_json::Error> for MinerError {
    fn from(err: serde_json::Error) -> Self {
        MinerError::Serialization(err.to_string())
    }
}

impl From<std::fmt::Error> for MinerError {
    fn from(err: std::fmt::Error) -> Self {
        MinerError::Internal(format!("Failed to format output: {err}"))
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<MinerError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.with_context(|| msg.to_string())
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| match e.into() {
            MinerError::Io(io) => {
                MinerError::Io(std::io::Error::new(io.kind(), format!("{}: {io}", f())))
            }
            MinerError::Configuration(inner) => {
                MinerError::Configuration(format!("{}: {inner}", f()))
            }
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_parse_error_display() {
        let err = MinerError::Parse {
            line: 3,
            byte: 42,
            message: "found record with 2 fields".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Parse error at line 3 (byte 42): found record with 2 fields"
        );
        assert_eq!(err.byte_offset(), Some(42));
    }

    #[test]
    fn test_spawn_error_keeps_source() {
        let err = MinerError::ProcessSpawn {
            program: "java".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("java"));
    }

    #[test]
    fn test_conflicting_input() {
        let err = MinerError::ConflictingInput {
            existing: "file",
            attempted: "string",
        };
        assert_eq!(
            err.to_string(),
            "Input already provided as file, cannot also use string"
        );
    }

    #[test]
    fn test_unrecognized_format() {
        let err = MinerError::unrecognized(7, "garbage text", "no grammar matched");
        assert!(err.to_string().contains("line 7"));
        assert!(err.to_string().contains("garbage text"));
        assert_eq!(err.byte_offset(), None);
    }

    #[test]
    fn test_error_context() {
        fn failing_operation() -> std::result::Result<(), std::io::Error> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }

        let err = failing_operation().context("Writing dataset").unwrap_err();
        assert!(err.to_string().contains("Writing dataset"));
        assert!(err.to_string().contains("disk full"));
    }
}
