//! Terminal progress display for pruning runs

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use refprune_build::{Decision, PruneEvent, PruneObserver};
use refprune_package::FolderRemoval;

/// Renders engine events on stderr
///
/// One progress bar per reference group, one line per decision. Silent when
/// `quiet` (errors only) or when JSON goes to stdout.
pub struct Reporter {
    visible: bool,
    bar: Option<ProgressBar>,
}

impl Reporter {
    pub fn new(visible: bool) -> Self {
        Self { visible, bar: None }
    }

    fn line(&self, text: String) {
        if !self.visible {
            return;
        }
        match &self.bar {
            Some(bar) => bar.println(text),
            None => eprintln!("{}", text),
        }
    }

    fn start_group(&mut self, count: usize) {
        self.finish_group();
        if !self.visible {
            return;
        }
        let bar = ProgressBar::new(count as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        self.bar = Some(bar);
    }

    fn finish_group(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl PruneObserver for Reporter {
    fn on_event(&mut self, event: &PruneEvent) {
        match event {
            PruneEvent::BaselineFailed { project, log_path } => {
                self.finish_group();
                // Always shown: this is the reason nothing was pruned.
                eprintln!(
                    "{} {} has build errors before pruning, see {}",
                    "error:".red().bold(),
                    project,
                    log_path.display()
                );
            }
            PruneEvent::Progress(message) => self.line(message.bold().to_string()),
            PruneEvent::ReferenceCount { count, .. } => self.start_group(*count),
            PruneEvent::EntryResolved { name, decision, .. } => {
                if let Some(bar) = &self.bar {
                    bar.set_message(name.clone());
                    bar.inc(1);
                }
                let label = match decision {
                    Decision::Removed => "removed".green(),
                    Decision::Kept => "kept".dimmed(),
                };
                self.line(format!("  {:>7} {}", label, name));
            }
            PruneEvent::PackageFolder(removal) => match removal {
                FolderRemoval::Deleted { path, .. } => {
                    self.line(format!("  {:>7} {}", "deleted".green(), path.display()))
                }
                FolderRemoval::Failed { path, error, .. } => self.line(format!(
                    "  {} could not delete {}: {}",
                    "warning:".yellow().bold(),
                    path.display(),
                    error
                )),
                FolderRemoval::StillReferenced { package } => self.line(format!(
                    "  {:>7} {} (still referenced)",
                    "kept".dimmed(),
                    package
                )),
                FolderRemoval::NoMatch => {}
            },
            PruneEvent::GroupCompleted { .. } => self.finish_group(),
            PruneEvent::PackagesResolved { rewritten } => {
                if *rewritten {
                    self.line("Package manifest rewritten".to_string());
                } else {
                    self.line("Package manifest left untouched".dimmed().to_string());
                }
            }
            PruneEvent::Done { project } => {
                self.finish_group();
                self.line(format!("{} {}", "✓".green(), project));
            }
            PruneEvent::Cancelled { project } => {
                self.finish_group();
                self.line(format!(
                    "{} {} left at its last verified state",
                    "cancelled:".yellow().bold(),
                    project
                ));
            }
        }
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        self.finish_group();
    }
}
