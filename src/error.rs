//! Error type shared by every svanno command.

use std::io;
use thiserror::Error;

/// Errors that can occur while reading, annotating or writing records.
#[derive(Error, Debug)]
pub enum SvError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A window bound or a sorted stream moved backwards.
    #[error("Order violation in {context}: {attempted} comes after {previous}")]
    OrderViolation {
        context: String,
        previous: String,
        attempted: String,
    },

    #[error("Missing required attribute '{field}' on {feature} feature at line {line}")]
    MissingField {
        line: usize,
        field: &'static str,
        feature: String,
    },

    #[error("Unrecognized regulatory feature kind '{kind}' at line {line} (expected promoter or enhancer)")]
    UnrecognizedFeatureKind { line: usize, kind: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl SvError {
    /// True when the error is a closed downstream pipe (e.g. `| head`).
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, SvError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe)
    }
}

pub type Result<T> = std::result::Result<T, SvError>;
