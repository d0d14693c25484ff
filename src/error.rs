//! Error types for trueno-migrate
//!
//! Every failure propagates to the caller. Nothing in the copy engine catches
//! and suppresses an error; partially copied runs are a visible end state.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure class, used by callers to decide how to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Source run or experiment does not exist.
    NotFound,
    /// Creating or writing to a destination entity failed.
    DestinationWrite,
    /// Artifact download or upload failed after metadata was committed.
    ArtifactTransfer,
    /// Local IO, serialization or configuration problems.
    Infrastructure,
}

/// trueno-migrate error types
#[derive(Error, Debug)]
pub enum Error {
    /// Run does not exist in the tracking store
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// Experiment id does not exist in the tracking store
    #[error("Experiment not found: {0}")]
    ExperimentNotFound(String),

    /// No experiment carries the requested name
    #[error("Experiment not found by name: '{0}'")]
    ExperimentNameNotFound(String),

    /// An experiment with this name already exists
    #[error("Experiment already exists: '{0}'")]
    ExperimentExists(String),

    /// Name lookup matched more than one experiment
    #[error("Ambiguous experiment name '{name}': {count} experiments match")]
    AmbiguousExperiment {
        /// Requested name
        name: String,
        /// Number of matching experiments
        count: usize,
    },

    /// Write to a destination run was rejected
    #[error("Destination write failed for run {run_id}: {message}")]
    DestinationWrite {
        /// Run being written
        run_id: String,
        /// Reason reported by the store
        message: String,
    },

    /// Artifact transfer failed; destination metadata is already committed
    #[error("Artifact transfer failed from run {src_run_id} to run {dst_run_id}: {source}\nDestination run metadata is committed but artifacts are incomplete")]
    ArtifactTransfer {
        /// Source run id
        src_run_id: String,
        /// Destination run id, left artifact-incomplete
        dst_run_id: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Tracking URI scheme has no client implementation
    #[error("Unsupported tracking URI: {0}\nSupported schemes: file://<path>, <path>, memory:")]
    UnsupportedTrackingUri(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a destination write error.
    pub fn destination_write(run_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DestinationWrite {
            run_id: run_id.into(),
            message: message.into(),
        }
    }

    /// Failure class of this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::RunNotFound(_) | Self::ExperimentNotFound(_) | Self::ExperimentNameNotFound(_) => {
                ErrorCategory::NotFound
            }
            Self::DestinationWrite { .. }
            | Self::ExperimentExists(_)
            | Self::AmbiguousExperiment { .. } => ErrorCategory::DestinationWrite,
            Self::ArtifactTransfer { .. } => ErrorCategory::ArtifactTransfer,
            Self::UnsupportedTrackingUri(_)
            | Self::InvalidInput(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ErrorCategory::Infrastructure,
        }
    }

    /// Destination run left without a complete artifact tree, if any.
    #[must_use]
    pub fn artifact_incomplete_run(&self) -> Option<&str> {
        match self {
            Self::ArtifactTransfer { dst_run_id, .. } => Some(dst_run_id),
            _ => None,
        }
    }
}
