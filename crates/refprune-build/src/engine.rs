//! Reference pruning engine
//!
//! One [`Pruner::run`] walks a project through
//! `Idle -> CheckingBaseline -> PruningReferences -> PruningProjectReferences
//! -> Finalizing -> Done`, ending in `Cancelled` or `Aborted` instead when
//! asked to stop or when something fails.
//!
//! Every trial reloads the project from disk, removes one entry, saves and
//! builds. A failing build restores the last known-good document before
//! anything else happens, so the file on disk is always either the original
//! or a version the builder accepted.

use crate::error::{PruneError, PruneResult};
use crate::events::{CancelToken, Decision, PruneEvent, PruneObserver};
use crate::oracle::BuildOracle;
use refprune_document::{project, Document, ReferenceKind};
use refprune_package::sync::DEFAULT_MANIFEST_NAME;
use refprune_package::{FolderRemoval, PackageSync};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    CheckingBaseline,
    PruningReferences,
    PruningProjectReferences,
    Finalizing,
    Done,
    Cancelled,
    Aborted,
}

impl RunState {
    fn pruning(kind: ReferenceKind) -> Self {
        match kind {
            ReferenceKind::Reference => Self::PruningReferences,
            ReferenceKind::ProjectReference => Self::PruningProjectReferences,
        }
    }

    /// Whether the run has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Aborted)
    }
}

/// Options for one pruning run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneOptions {
    /// Project file to prune in place
    pub project_path: PathBuf,
    /// Also synchronize the package manifest and delete unused package folders
    pub prune_packages: bool,
    /// Package manifest file name, looked up next to the project
    pub package_manifest_name: String,
}

impl PruneOptions {
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            prune_packages: false,
            package_manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
        }
    }

    pub fn with_packages(mut self, prune_packages: bool) -> Self {
        self.prune_packages = prune_packages;
        self
    }

    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.package_manifest_name = name.into();
        self
    }
}

/// A reference entry the run made a decision about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedReference {
    pub kind: ReferenceKind,
    pub name: String,
}

/// What a run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneSummary {
    /// Project name (file stem)
    pub project: String,
    pub project_path: PathBuf,
    pub removed: Vec<ResolvedReference>,
    pub kept: Vec<ResolvedReference>,
    /// Whether the package manifest was rewritten
    pub packages_rewritten: bool,
    pub deleted_folders: Vec<PathBuf>,
    pub cancelled: bool,
}

impl PruneSummary {
    fn new(project_path: &Path) -> Self {
        Self {
            project: project_name(project_path),
            project_path: project_path.to_path_buf(),
            removed: Vec::new(),
            kept: Vec::new(),
            packages_rewritten: false,
            deleted_folders: Vec::new(),
            cancelled: false,
        }
    }

    fn record(&mut self, kind: ReferenceKind, name: String, decision: Decision) {
        let entry = ResolvedReference { kind, name };
        match decision {
            Decision::Removed => self.removed.push(entry),
            Decision::Kept => self.kept.push(entry),
        }
    }
}

/// Outcome of a single trial
struct Trial {
    decision: Decision,
    folder: FolderRemoval,
}

enum Flow {
    Continue,
    Cancelled,
}

/// Drives one pruning run against a build oracle
pub struct Pruner<O: BuildOracle> {
    options: PruneOptions,
    oracle: O,
    sync: PackageSync,
    cancel: CancelToken,
    state: RunState,
}

impl<O: BuildOracle> Pruner<O> {
    pub fn new(options: PruneOptions, oracle: O) -> Self {
        let sync = PackageSync::new(&options.project_path, &options.package_manifest_name);
        Self {
            options,
            oracle,
            sync,
            cancel: CancelToken::new(),
            state: RunState::Idle,
        }
    }

    /// Token that stops the run at its next checkpoint when cancelled
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Use an existing token, e.g. one shared by several runs
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Prune the project, reporting progress to `observer`
    ///
    /// Returns the summary for both finished and cancelled runs. A baseline
    /// build failure is reported as a `BaselineFailed` event and then returned
    /// as [`PruneError::BaselineBuildFailed`].
    pub fn run(&mut self, observer: &mut dyn PruneObserver) -> PruneResult<PruneSummary> {
        let result = self.execute(observer);
        if result.is_err() {
            self.state = RunState::Aborted;
        }
        result
    }

    fn execute(&mut self, observer: &mut dyn PruneObserver) -> PruneResult<PruneSummary> {
        let path = self.options.project_path.clone();
        let mut summary = PruneSummary::new(&path);

        load_project(&path)?;
        if self.options.prune_packages {
            self.sync.load_if_present()?;
        }

        self.state = RunState::CheckingBaseline;
        tracing::info!("Checking baseline build of {}", path.display());
        let baseline = self.oracle.verify(&path)?;
        if !baseline.passed {
            observer.on_event(&PruneEvent::BaselineFailed {
                project: summary.project.clone(),
                log_path: baseline.log_path.clone(),
            });
            return Err(PruneError::BaselineBuildFailed {
                project: summary.project,
                log_path: baseline.log_path,
            });
        }

        for kind in ReferenceKind::all() {
            self.state = RunState::pruning(kind);
            if let Flow::Cancelled = self.prune_kind(kind, observer, &mut summary)? {
                tracing::info!("Pruning of {} cancelled", summary.project);
                self.state = RunState::Cancelled;
                summary.cancelled = true;
                observer.on_event(&PruneEvent::Cancelled {
                    project: summary.project.clone(),
                });
                return Ok(summary);
            }
        }

        self.state = RunState::Finalizing;
        if self.options.prune_packages {
            summary.packages_rewritten = self.sync.flush()?;
            observer.on_event(&PruneEvent::PackagesResolved {
                rewritten: summary.packages_rewritten,
            });
        }

        self.state = RunState::Done;
        tracing::info!(
            "Pruned {}: {} removed, {} kept",
            summary.project,
            summary.removed.len(),
            summary.kept.len()
        );
        observer.on_event(&PruneEvent::Done {
            project: summary.project.clone(),
        });
        Ok(summary)
    }

    fn prune_kind(
        &mut self,
        kind: ReferenceKind,
        observer: &mut dyn PruneObserver,
        summary: &mut PruneSummary,
    ) -> PruneResult<Flow> {
        let path = self.options.project_path.clone();
        observer.on_event(&PruneEvent::Progress(format!(
            "Resolving {}s in {}",
            kind,
            file_name(&path)
        )));

        let positions = project::group_positions(&load_project(&path)?, kind);
        for position in positions {
            if self.cancel.is_cancelled() {
                return Ok(Flow::Cancelled);
            }

            // Names, not node ids, survive the reloads between trials.
            let names = {
                let doc = load_project(&path)?;
                match project::group_at(&doc, position) {
                    Some(group) => project::entry_names(&doc, group),
                    None => continue,
                }
            };
            if names.is_empty() {
                continue;
            }

            observer.on_event(&PruneEvent::ReferenceCount {
                kind,
                count: names.len(),
            });

            for name in names {
                if self.cancel.is_cancelled() {
                    return Ok(Flow::Cancelled);
                }
                let Some(trial) = self.trial(kind, position, &name)? else {
                    continue;
                };

                observer.on_event(&PruneEvent::EntryResolved {
                    kind,
                    name: name.clone(),
                    decision: trial.decision,
                });
                if let FolderRemoval::Deleted { path, .. } = &trial.folder {
                    summary.deleted_folders.push(path.clone());
                }
                if trial.folder != FolderRemoval::NoMatch {
                    observer.on_event(&PruneEvent::PackageFolder(trial.folder));
                }
                summary.record(kind, name, trial.decision);
            }

            observer.on_event(&PruneEvent::GroupCompleted { kind });
        }

        Ok(Flow::Continue)
    }

    /// Try removing one entry; `None` if it is no longer in the project
    fn trial(&mut self, kind: ReferenceKind, position: usize, name: &str) -> PruneResult<Option<Trial>> {
        let path = self.options.project_path.clone();
        let known_good = load_project(&path)?;

        let Some(entry) = project::group_at(&known_good, position)
            .and_then(|group| project::find_entry(&known_good, group, name))
        else {
            tracing::debug!("{} {} no longer present, skipped", kind, name);
            return Ok(None);
        };
        let hint_path = project::hint_path(&known_good, entry);

        let mut candidate = known_good.clone();
        candidate.remove(entry);
        if let Err(error) = candidate.write_to_file(&path) {
            restore(&path, &known_good)?;
            return Err(PruneError::CommitFailed { path, error });
        }

        tracing::debug!("Trying without {} {}", kind, name);
        let verdict = match self.oracle.verify(&path) {
            Ok(verdict) => verdict,
            Err(e) => {
                restore(&path, &known_good)?;
                return Err(e);
            }
        };

        if verdict.passed {
            tracing::info!("Removed {} {}", kind, name);
            let remaining = project::hint_paths(&candidate);
            let folder = self.sync.remove_unused(hint_path.as_deref(), &remaining);
            Ok(Some(Trial {
                decision: Decision::Removed,
                folder,
            }))
        } else {
            restore(&path, &known_good)?;
            tracing::info!("Kept {} {}", kind, name);
            self.sync.mark_kept(hint_path.as_deref());
            Ok(Some(Trial {
                decision: Decision::Kept,
                folder: FolderRemoval::NoMatch,
            }))
        }
    }
}

fn load_project(path: &Path) -> PruneResult<Document> {
    Document::from_file(path).map_err(|e| PruneError::manifest_unreadable(path, e))
}

fn restore(path: &Path, known_good: &Document) -> PruneResult<()> {
    known_good.write_to_file(path).map_err(|error| {
        tracing::error!("Could not restore {}: {}", path.display(), error);
        PruneError::RestoreFailed {
            path: path.to_path_buf(),
            error,
        }
    })
}

fn project_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
