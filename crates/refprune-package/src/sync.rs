//! Kept-package tracking and package folder cleanup

use crate::manifest::PackageManifest;
use crate::Result;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Default package manifest file name
pub const DEFAULT_MANIFEST_NAME: &str = "packages.config";

/// What happened to a removed reference's package folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderRemoval {
    /// No hint path, no manifest, or no package matched the hint path
    NoMatch,
    /// Another reference still in the project points into the same package
    StillReferenced { package: String },
    /// The installation folder was deleted
    Deleted { package: String, path: PathBuf },
    /// Deleting the folder failed; the run carries on
    Failed {
        package: String,
        path: PathBuf,
        error: String,
    },
}

/// Package manifest synchronizer for one pruning run
#[derive(Debug)]
pub struct PackageSync {
    project_dir: PathBuf,
    manifest_path: PathBuf,
    manifest: Option<PackageManifest>,
    kept: BTreeSet<String>,
}

impl PackageSync {
    /// Synchronizer for the manifest named `manifest_name` next to `project_path`
    pub fn new(project_path: &Path, manifest_name: &str) -> Self {
        let project_dir = project_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let manifest_path = project_dir.join(manifest_name);
        Self {
            project_dir,
            manifest_path,
            manifest: None,
            kept: BTreeSet::new(),
        }
    }

    /// Path of the package manifest this synchronizer manages
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Whether a manifest has been loaded
    pub fn is_loaded(&self) -> bool {
        self.manifest.is_some()
    }

    /// Load the manifest if the file exists and it is not loaded yet
    ///
    /// Returns whether a manifest is available afterwards.
    pub fn load_if_present(&mut self) -> Result<bool> {
        if self.manifest.is_some() {
            return Ok(true);
        }
        if !self.manifest_path.exists() {
            tracing::debug!("No package manifest at {}", self.manifest_path.display());
            return Ok(false);
        }

        let manifest = PackageManifest::from_file(&self.manifest_path)?;
        tracing::debug!(
            "Loaded {} package entries from {}",
            manifest.entries().len(),
            self.manifest_path.display()
        );
        self.manifest = Some(manifest);
        Ok(true)
    }

    /// Record that the package behind `hint_path` is still in use
    ///
    /// Returns the package key if it was newly added to the kept set.
    pub fn mark_kept(&mut self, hint_path: Option<&str>) -> Option<String> {
        let hint_path = hint_path.filter(|hint| !hint.trim().is_empty())?;
        let key = self.manifest.as_ref()?.match_hint_path(hint_path)?.folder_name();
        if self.kept.insert(key.clone()) {
            tracing::debug!("Keeping package {}", key);
            Some(key)
        } else {
            None
        }
    }

    /// Delete the installation folder of the package behind `hint_path`
    ///
    /// `remaining_hint_paths` are the hint paths of every reference still in
    /// the project; a folder one of them points into is left alone.
    pub fn remove_unused(
        &self,
        hint_path: Option<&str>,
        remaining_hint_paths: &[String],
    ) -> FolderRemoval {
        let Some(hint_path) = hint_path.filter(|hint| !hint.trim().is_empty()) else {
            return FolderRemoval::NoMatch;
        };
        let Some(entry) = self
            .manifest
            .as_ref()
            .and_then(|manifest| manifest.match_hint_path(hint_path))
        else {
            return FolderRemoval::NoMatch;
        };

        let package = entry.folder_name();
        if remaining_hint_paths
            .iter()
            .any(|other| other.contains(&package))
        {
            tracing::debug!("Package {} still referenced, folder kept", package);
            return FolderRemoval::StillReferenced { package };
        }

        let path = package_folder(&self.project_dir, hint_path, &package);
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                tracing::info!("Deleted package folder {}", path.display());
                FolderRemoval::Deleted { package, path }
            }
            Err(e) => {
                tracing::warn!("Failed to delete package folder {}: {}", path.display(), e);
                FolderRemoval::Failed {
                    package,
                    path,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Package keys confirmed in use so far
    pub fn kept(&self) -> impl Iterator<Item = &str> {
        self.kept.iter().map(String::as_str)
    }

    /// Rewrite the manifest down to the kept packages
    ///
    /// Leaves the manifest untouched when nothing was confirmed kept. Returns
    /// whether the manifest was rewritten.
    pub fn flush(&mut self) -> Result<bool> {
        let Some(manifest) = self.manifest.as_mut() else {
            return Ok(false);
        };
        if self.kept.is_empty() {
            tracing::debug!("No kept packages, {} left untouched", manifest.path().display());
            return Ok(false);
        }

        let kept = std::mem::take(&mut self.kept);
        let removed = manifest.retain_keys(&kept);
        manifest.write_to_file()?;
        tracing::info!(
            "Rewrote {}: {} kept, {} removed",
            manifest.path().display(),
            kept.len(),
            removed
        );
        Ok(true)
    }
}

/// Installation folder: the hint path up to and including the package key,
/// resolved against the project directory
///
/// Drive (`C:\`), UNC (`\\server\share`) and `/` roots stay absolute.
/// `.` and `..` segments are folded away lexically.
fn package_folder(project_dir: &Path, hint_path: &str, package: &str) -> PathBuf {
    let end = hint_path.find(package).map_or(hint_path.len(), |at| at + package.len());
    let (root, rest) = split_root(&hint_path[..end]);
    let rooted = root.is_some();

    let mut path = root.unwrap_or_else(|| project_dir.to_path_buf());
    let floor = if rooted { path.components().count() } else { 0 };
    for part in rest.split(['\\', '/']).filter(|part| !part.is_empty()) {
        match part {
            "." => {}
            ".." => {
                let at_normal = matches!(path.components().next_back(), Some(Component::Normal(_)));
                if at_normal && path.components().count() > floor {
                    path.pop();
                } else if !rooted && !path.has_root() {
                    path.push(part);
                }
            }
            _ => path.push(part),
        }
    }
    path
}

/// Absolute root of a hint path, if it has one, and the remainder
fn split_root(prefix: &str) -> (Option<PathBuf>, &str) {
    let bytes = prefix.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return (Some(PathBuf::from(format!("{}:\\", &prefix[..1]))), &prefix[2..]);
    }
    for unc in [r"\\", "//"] {
        if let Some(rest) = prefix.strip_prefix(unc) {
            let mut parts = rest.splitn(3, ['\\', '/']);
            let server = parts.next().unwrap_or_default();
            let share = parts.next().unwrap_or_default();
            let rest = parts.next().unwrap_or_default();
            return (Some(PathBuf::from(format!(r"\\{server}\{share}\"))), rest);
        }
    }
    if let Some(rest) = prefix.strip_prefix(['\\', '/']) {
        return (Some(PathBuf::from("/")), rest);
    }
    (None, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(r"..\packages\Foo.1.0\lib\Foo.dll", "work/packages/Foo.1.0")]
    #[case("../packages/Foo.1.0/lib/Foo.dll", "work/packages/Foo.1.0")]
    #[case(r"packages\\Foo.1.0\lib", "work/proj/packages/Foo.1.0")]
    #[case(r".\packages\Foo.1.0\lib", "work/proj/packages/Foo.1.0")]
    #[case(r"..\..\..\packages\Foo.1.0\lib", "../packages/Foo.1.0")]
    fn test_package_folder(#[case] hint: &str, #[case] expected: &str) {
        let folder = package_folder(Path::new("work/proj"), hint, "Foo.1.0");
        let expected: PathBuf = expected.split('/').collect();
        assert_eq!(folder, expected);
    }

    #[rstest]
    #[case::drive(r"C:\packages\Foo.1.0\lib\Foo.dll", r"C:\")]
    #[case::drive_lowercase(r"d:\packages\Foo.1.0\lib\Foo.dll", r"d:\")]
    #[case::drive_with_parent(r"C:\tools\..\packages\Foo.1.0\lib\Foo.dll", r"C:\")]
    #[case::unc(r"\\srv\share\packages\Foo.1.0\lib\Foo.dll", r"\\srv\share\")]
    fn test_package_folder_keeps_absolute_root(#[case] hint: &str, #[case] root: &str) {
        let folder = package_folder(Path::new("work/proj"), hint, "Foo.1.0");
        assert_eq!(folder, PathBuf::from(root).join("packages").join("Foo.1.0"));
    }

    #[test]
    fn test_package_folder_parent_stops_at_root() {
        let folder = package_folder(Path::new("work/proj"), r"C:\..\packages\Foo.1.0", "Foo.1.0");
        assert_eq!(folder, PathBuf::from(r"C:\").join("packages").join("Foo.1.0"));
    }

    #[cfg(windows)]
    #[test]
    fn test_package_folder_windows_paths() {
        let project = Path::new(r"D:\src\App");
        assert_eq!(
            package_folder(project, r"C:\packages\Foo.1.0\lib\Foo.dll", "Foo.1.0"),
            PathBuf::from(r"C:\packages\Foo.1.0")
        );
        assert_eq!(
            package_folder(project, r"\\srv\share\packages\Foo.1.0\lib", "Foo.1.0"),
            PathBuf::from(r"\\srv\share\packages\Foo.1.0")
        );
        assert_eq!(
            package_folder(project, r"..\packages\Foo.1.0\lib", "Foo.1.0"),
            PathBuf::from(r"D:\src\packages\Foo.1.0")
        );
    }

    #[test]
    fn test_unloaded_sync_matches_nothing() {
        let mut sync = PackageSync::new(Path::new("proj/App.csproj"), DEFAULT_MANIFEST_NAME);
        assert_eq!(sync.manifest_path(), Path::new("proj/packages.config"));
        assert_eq!(sync.mark_kept(Some(r"..\packages\Foo.1.0\Foo.dll")), None);
        assert_eq!(
            sync.remove_unused(Some(r"..\packages\Foo.1.0\Foo.dll"), &[]),
            FolderRemoval::NoMatch
        );
        assert!(!sync.flush().unwrap());
    }
}
