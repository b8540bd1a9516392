// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the pipeline runtime

use std::fmt;

/// Result type alias using [`PipelineError`]
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Crate-wide error taxonomy.
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// An executor was constructed around a stage whose declared
    /// [`crate::stage::Policy`] doesn't match the executor kind.
    PolicyMismatch {
        /// The executor kind that rejected the stage (e.g. "Ordered").
        executor: &'static str,
        /// The stage's own name, for diagnostics.
        stage: String,
    },
    /// `Pipeline::add` was called after `start` had already begun.
    AlreadyStarted,
    /// A typed result accessor was used against a value of a different
    /// dynamic type.
    TypeMismatch {
        /// The result slot's name.
        name: String,
    },
    /// Graphics were queried for an image slot that was never written.
    NotFound {
        /// The image slot's name.
        name: String,
    },
    /// An ordered executor observed a frame id below its expected
    /// counter. Unrecoverable: indicates duplicate issuance.
    InvariantViolation(String),
    /// Configuration file present but malformed, or unreadable.
    Config(String),
    /// The visualizer sink's TCP listener failed to bind.
    Sink(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::PolicyMismatch { executor, stage } => {
                write!(f, "{executor} requires a matching policy, got stage '{stage}'")
            }
            PipelineError::AlreadyStarted => {
                write!(f, "pipeline already started; stages can't be added now")
            }
            PipelineError::TypeMismatch { name } => {
                write!(f, "result '{name}' accessed at the wrong type")
            }
            PipelineError::NotFound { name } => {
                write!(f, "image slot '{name}' was never written")
            }
            PipelineError::InvariantViolation(msg) => {
                write!(f, "invariant violation: {msg}")
            }
            PipelineError::Config(msg) => write!(f, "configuration error: {msg}"),
            PipelineError::Sink(msg) => write!(f, "visualizer sink error: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}
