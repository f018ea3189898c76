//! Custom error types for the load generator.
//!
//! `LoadTestError` is the single error type surfaced by the load-generation core.
//! Capability traits at the remote seam (`DataFactoryAgent`, `NameService`) return
//! `anyhow::Result` like the hardware capability traits do; the core converts those
//! failures into typed variants that carry the context needed to reproduce a failure
//! (field name, artifact index and path, petition index).
//!
//! ## Error Hierarchy
//!
//! - **`UnreachableActor`** / **`ActorNotResponding`**: session establishment failed.
//!   Fatal, the process exits with [`EXIT_SESSION_FAILURE`].
//! - **`ConfigurationRejected`**: one configure sub-call failed. Stops the run.
//! - **`UnreadableArtifact`** / **`FrameRejected`**: one artifact could not be read or
//!   was refused by the actor. Always wrapped in **`SubmissionAborted`**.
//! - **`PetitionFailed`**: wraps any of the above with the petition ordinal.
//! - **`InvalidConfig`**, **`Document`**, **`Settings`**: the run never started.
//!
//! Nothing is retried anywhere. Every failure is fail-fast.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the load generator error type.
pub type AppResult<T> = std::result::Result<T, LoadTestError>;

/// Exit code for a failed session establishment or a missing/unknown sub-command.
pub const EXIT_SESSION_FAILURE: u8 = 255;

/// Exit code for an invalid configuration record, document or settings file.
pub const EXIT_INVALID_CONFIG: u8 = 2;

/// Exit code for a run that started but did not complete.
pub const EXIT_RUN_FAILURE: u8 = 1;

#[derive(Error, Debug)]
pub enum LoadTestError {
    #[error("cannot resolve actor '{instance}': {reason}")]
    UnreachableActor { instance: String, reason: String },

    #[error("actor '{instance}' is not responding: {reason}")]
    ActorNotResponding { instance: String, reason: String },

    #[error("actor rejected configuration field '{field}': {reason}")]
    ConfigurationRejected { field: String, reason: String },

    #[error("unreadable artifact {}: {reason}", path.display())]
    UnreadableArtifact { path: PathBuf, reason: String },

    #[error("actor rejected frame: {reason}")]
    FrameRejected { reason: String },

    #[error("submission aborted at artifact {index} ({})", path.display())]
    SubmissionAborted {
        index: usize,
        path: PathBuf,
        #[source]
        source: Box<LoadTestError>,
    },

    #[error("petition {index} failed")]
    PetitionFailed {
        index: u32,
        #[source]
        source: Box<LoadTestError>,
    },

    #[error("cannot list artifact directory {}", path.display())]
    ArtifactSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration validation error: {0}")]
    InvalidConfig(String),

    #[error("Configuration document error: {0}")]
    Document(#[from] serde_yaml::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] figment::Error),

    #[error("run cancelled")]
    Cancelled,
}

impl LoadTestError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::UnreachableActor { .. } | Self::ActorNotResponding { .. } => EXIT_SESSION_FAILURE,
            Self::InvalidConfig(_) | Self::Document(_) | Self::Settings(_) => EXIT_INVALID_CONFIG,
            _ => EXIT_RUN_FAILURE,
        }
    }

    /// Innermost typed cause, looking through petition/submission wrappers.
    pub fn root_cause(&self) -> &LoadTestError {
        match self {
            Self::PetitionFailed { source, .. } | Self::SubmissionAborted { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_failures_use_distinguished_exit_code() {
        let unreachable = LoadTestError::UnreachableActor {
            instance: "DF/MIRADASDFAgent".into(),
            reason: "not registered".into(),
        };
        let silent = LoadTestError::ActorNotResponding {
            instance: "DF/MIRADASDFAgent".into(),
            reason: "timeout".into(),
        };
        assert_eq!(unreachable.exit_code(), EXIT_SESSION_FAILURE);
        assert_eq!(silent.exit_code(), EXIT_SESSION_FAILURE);
    }

    #[test]
    fn nested_failure_reports_root_cause() {
        let err = LoadTestError::PetitionFailed {
            index: 3,
            source: Box::new(LoadTestError::SubmissionAborted {
                index: 1,
                path: PathBuf::from("/data/b_raw.fits"),
                source: Box::new(LoadTestError::UnreadableArtifact {
                    path: PathBuf::from("/data/b_raw.fits"),
                    reason: "missing END card".into(),
                }),
            }),
        };

        assert_eq!(err.exit_code(), EXIT_RUN_FAILURE);
        assert!(matches!(
            err.root_cause(),
            LoadTestError::UnreadableArtifact { .. }
        ));
        assert_eq!(err.to_string(), "petition 3 failed");
    }

    #[test]
    fn invalid_config_exit_code() {
        let err = LoadTestError::InvalidConfig("number_images must be >= 1".into());
        assert_eq!(err.exit_code(), EXIT_INVALID_CONFIG);
    }
}
