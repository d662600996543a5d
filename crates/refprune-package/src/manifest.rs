//! Package manifest (packages.config)

use crate::{PackageError, Result};
use refprune_document::{Document, NodeId};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

pub const PACKAGE: &str = "package";

/// One installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub id: String,
    pub version: String,
    node: NodeId,
}

impl PackageEntry {
    /// Installation folder name, `{id}.{version}`
    ///
    /// This is also the fragment looked for inside reference hint paths.
    pub fn folder_name(&self) -> String {
        format!("{}.{}", self.id, self.version)
    }
}

/// Loaded package manifest
#[derive(Debug, Clone)]
pub struct PackageManifest {
    path: PathBuf,
    document: Document,
    entries: Vec<PackageEntry>,
}

impl PackageManifest {
    /// Load a package manifest from file
    pub fn from_file(path: &Path) -> Result<Self> {
        let document = Document::from_file(path).map_err(|error| PackageError::Load {
            path: path.to_path_buf(),
            error,
        })?;
        Ok(Self::from_document(path, document))
    }

    /// Build the entry table from an already parsed document
    ///
    /// Entries without `id` or `version` are skipped; for duplicate
    /// `{id}.{version}` keys the first entry wins.
    pub fn from_document(path: &Path, document: Document) -> Self {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for node in document.find_all(PACKAGE) {
            let (Some(id), Some(version)) =
                (document.attribute(node, "id"), document.attribute(node, "version"))
            else {
                tracing::warn!(
                    "Skipping package entry without id/version in {}",
                    path.display()
                );
                continue;
            };

            let entry = PackageEntry {
                id: id.to_string(),
                version: version.to_string(),
                node,
            };
            if !seen.insert(entry.folder_name()) {
                tracing::warn!("Duplicate package entry {} ignored", entry.folder_name());
                continue;
            }
            entries.push(entry);
        }

        Self {
            path: path.to_path_buf(),
            document,
            entries,
        }
    }

    /// Manifest location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Package entries in document order
    pub fn entries(&self) -> &[PackageEntry] {
        &self.entries
    }

    /// First package whose folder name occurs inside `hint_path`
    ///
    /// Matching is plain substring containment, so a package whose folder
    /// name is a prefix of another's (`Foo.1.0` vs `Foo.1.0.1`) can match the
    /// wrong hint path. Document order decides between candidates.
    pub fn match_hint_path(&self, hint_path: &str) -> Option<&PackageEntry> {
        self.entries
            .iter()
            .find(|entry| hint_path.contains(&entry.folder_name()))
    }

    /// Drop every `package` element whose key is not in `keep`
    ///
    /// Returns the number of removed elements.
    pub fn retain_keys(&mut self, keep: &BTreeSet<String>) -> usize {
        let kept_nodes: HashSet<NodeId> = self
            .entries
            .iter()
            .filter(|entry| keep.contains(&entry.folder_name()))
            .map(|entry| entry.node)
            .collect();

        let mut removed = 0;
        for node in self.document.find_all(PACKAGE) {
            if !kept_nodes.contains(&node) && self.document.remove(node) {
                removed += 1;
            }
        }
        self.entries.retain(|entry| kept_nodes.contains(&entry.node));
        removed
    }

    /// Serialized manifest
    #[allow(clippy::inherent_to_string)]
    pub fn to_string(&self) -> String {
        self.document.to_string()
    }

    /// Write the manifest back to its file
    pub fn write_to_file(&self) -> Result<()> {
        self.document
            .write_to_file(&self.path)
            .map_err(|error| PackageError::Write {
                path: self.path.clone(),
                error,
            })
    }
}
