//! Errors that halt processing of a trace run.
//!
//! Noise lines and linkage misses are not errors: the former are skipped and
//! the latter are counted in the run statistics.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    /// A marker keyword matched but one of its captures is missing or unusable.
    #[error("line {line_number}: malformed marker ({reason}): {text}")]
    MalformedMarker {
        line_number: u64,
        text: String,
        reason: String,
    },

    /// An end marker closes a frame that is nowhere on the open-frame stack.
    #[error("line {line_number}: end marker Nest={nest} {function} has no matching start")]
    UnmatchedEnd {
        nest: String,
        function: String,
        line_number: u64,
    },

    #[error("failed to read trace input: {0}")]
    Io(#[from] std::io::Error),
}

impl TraceError {
    pub fn malformed(line_number: u64, text: &str, reason: impl Into<String>) -> Self {
        Self::MalformedMarker {
            line_number,
            text: text.to_string(),
            reason: reason.into(),
        }
    }

    /// Line number the error was raised at, when there is one.
    pub fn line_number(&self) -> Option<u64> {
        match self {
            Self::MalformedMarker { line_number, .. } | Self::UnmatchedEnd { line_number, .. } => {
                Some(*line_number)
            }
            Self::Io(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TraceError>;
