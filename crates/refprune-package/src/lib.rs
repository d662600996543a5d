//! Package manifest synchronization
//!
//! A `packages.config` entry maps onto a reference's hint path through its
//! installation folder name:
//! - Entry: `<package id="CsvHelper" version="2.7.0" targetFramework="net45" />`
//! - Hint path: `..\packages\CsvHelper.2.7.0\lib\net40-client\CsvHelper.dll`
//!
//! The folder `CsvHelper.2.7.0` is `id + "." + version`. While references are
//! pruned, [`PackageSync`] remembers which packages back a reference that had
//! to stay, deletes the installation folders of packages whose references
//! were removed, and finally rewrites the manifest down to the kept set.

pub mod manifest;
pub mod sync;

pub use manifest::{PackageEntry, PackageManifest};
pub use sync::{FolderRemoval, PackageSync};

use refprune_document::DocumentError;
use std::path::PathBuf;

/// Package synchronization errors
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("Failed to load package manifest {path}: {error}")]
    Load { path: PathBuf, error: DocumentError },

    #[error("Failed to write package manifest {path}: {error}")]
    Write { path: PathBuf, error: DocumentError },
}

pub type Result<T> = std::result::Result<T, PackageError>;
