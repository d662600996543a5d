/// Pruning error types
use refprune_document::DocumentError;
use refprune_package::PackageError;
use std::path::PathBuf;
use thiserror::Error;

pub type PruneResult<T> = Result<T, PruneError>;

/// Engine-level failures
///
/// A trial build failing is not one of these: it is the signal that keeps a
/// reference.
#[derive(Debug, Error)]
pub enum PruneError {
    #[error("Manifest {path} is unreadable: {reason}")]
    ManifestUnreadable { path: PathBuf, reason: String },

    #[error("Builder {path} could not be launched: {error}")]
    BuilderUnavailable {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Project {project} already has build errors, see {log_path}")]
    BaselineBuildFailed { project: String, log_path: PathBuf },

    #[error("Build log {path} is unreadable: {error}")]
    BuildLogUnreadable {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Failed to write {path}: {error}")]
    CommitFailed { path: PathBuf, error: DocumentError },

    #[error("Failed to restore {path}, the file on disk may not build: {error}")]
    RestoreFailed { path: PathBuf, error: DocumentError },
}

impl PruneError {
    /// Create a manifest unreadable error
    pub fn manifest_unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ManifestUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a builder unavailable error
    pub fn builder_unavailable(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::BuilderUnavailable {
            path: path.into(),
            error,
        }
    }

    /// Create a build log unreadable error
    pub fn build_log_unreadable(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::BuildLogUnreadable {
            path: path.into(),
            error,
        }
    }

    /// Whether the project file on disk may be left in an unverified state
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RestoreFailed { .. })
    }
}

impl From<PackageError> for PruneError {
    fn from(error: PackageError) -> Self {
        match error {
            PackageError::Load { path, error } => Self::manifest_unreadable(path, error),
            PackageError::Write { path, error } => Self::CommitFailed { path, error },
        }
    }
}
