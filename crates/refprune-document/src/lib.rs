//! Manifest documents for refprune
//!
//! Loads project files (`*.csproj` and friends) and package manifests
//! (`packages.config`) into format-preserving snapshots:
//! - Every byte of the input is kept as a token span, so saving a document
//!   re-emits untouched content verbatim
//! - Elements are addressed by [`NodeId`] (an index into the node table),
//!   never by live references, so ids stay meaningful after removals
//! - Project-file queries (item groups, references, hint paths) live in
//!   [`project`]

pub mod document;
pub mod project;

pub use document::{Document, NodeId};
pub use project::ReferenceKind;

use std::path::PathBuf;

/// Document errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Failed to read {path}: {error}")]
    Read {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Failed to write {path}: {error}")]
    Write {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Malformed document at byte {position}: {message}")]
    Malformed { position: usize, message: String },

    #[error("Document has no root element")]
    MissingRoot,
}

impl DocumentError {
    /// Create a malformed-document error
    pub fn malformed(position: usize, message: impl ToString) -> Self {
        Self::Malformed {
            position,
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DocumentError>;
