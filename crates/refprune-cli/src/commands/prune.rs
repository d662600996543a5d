//! Prune command - remove references a project builds without

use crate::discovery::discover_projects;
use crate::reporter::Reporter;
use anyhow::{Context, Result};
use colored::*;
use refprune_build::{
    CancelToken, ProcessOracle, PruneError, PruneOptions, PruneSummary, Pruner,
};
use refprune_config::{Config, ConfigLoader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Project currently being pruned, shared with the Ctrl+C handler
pub type ActiveProject = Arc<Mutex<Option<PathBuf>>>;

/// Prune command arguments
#[derive(Debug, Default)]
pub struct PruneArgs {
    /// Project file, solution file or directory
    pub path: PathBuf,
    /// Builder executable (overrides configuration)
    pub builder: Option<PathBuf>,
    /// Package pruning switch (overrides configuration)
    pub packages: Option<bool>,
    /// Build log file (overrides configuration)
    pub log: Option<PathBuf>,
    /// Errors only
    pub quiet: bool,
    /// JSON summary on stdout
    pub json: bool,
}

/// How the command ended, when it did not fail outright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every project was pruned, or the run was cancelled
    Completed,
    /// At least one project already failed to build
    BaselineFailed,
}

/// A project that could not be pruned because it does not build
struct BaselineFailure {
    project: PathBuf,
    log_path: PathBuf,
}

/// Run the prune command
pub fn run(args: PruneArgs, cancel: CancelToken, active: ActiveProject) -> Result<Outcome> {
    let projects = discover_projects(&args.path)?;
    if projects.is_empty() {
        if args.json {
            println!("{}", serde_json::json!({ "projects": [], "baseline_failures": [] }));
        } else if !args.quiet {
            println!("{}", "No project files found.".yellow());
        }
        return Ok(Outcome::Completed);
    }

    let mut summaries: Vec<PruneSummary> = Vec::new();
    let mut failures: Vec<BaselineFailure> = Vec::new();

    for project in &projects {
        if cancel.is_cancelled() {
            tracing::info!("Skipping {} after cancellation", project.display());
            continue;
        }

        let config = project_config(project, &args)?;
        let builder = config
            .resolve_builder()
            .context("No builder configured; pass --builder or set REFPRUNE_BUILDER")?;
        tracing::debug!("Using builder {}", builder.display());

        let oracle = ProcessOracle::new(builder)
            .with_args(config.builder_args.clone())
            .with_log_path(&config.log_path);
        let options = PruneOptions::new(project)
            .with_packages(config.prune_packages)
            .with_manifest_name(&config.package_manifest);
        let mut pruner = Pruner::new(options, oracle).with_cancel_token(cancel.clone());
        let mut reporter = Reporter::new(!args.quiet && !args.json);

        set_active(&active, Some(project.clone()));
        let result = pruner.run(&mut reporter);
        set_active(&active, None);

        match result {
            Ok(summary) => summaries.push(summary),
            Err(PruneError::BaselineBuildFailed { log_path, .. }) => {
                failures.push(BaselineFailure {
                    project: project.clone(),
                    log_path,
                });
            }
            Err(e) => {
                if e.is_fatal() {
                    eprintln!(
                        "{} {} may be left in an unverified state",
                        "error:".red().bold(),
                        project.display()
                    );
                }
                return Err(e).with_context(|| format!("Failed to prune {}", project.display()));
            }
        }
    }

    if args.json {
        print_json(&summaries, &failures)?;
    } else if !args.quiet {
        print_summary(&summaries, &failures);
    }

    if failures.is_empty() {
        Ok(Outcome::Completed)
    } else {
        Ok(Outcome::BaselineFailed)
    }
}

fn set_active(active: &ActiveProject, project: Option<PathBuf>) {
    if let Ok(mut slot) = active.lock() {
        *slot = project;
    }
}

/// Effective configuration for one project, with command-line overrides applied
fn project_config(project: &Path, args: &PruneArgs) -> Result<Config> {
    let mut config = ConfigLoader::new()
        .load_for_project(project)
        .with_context(|| format!("Failed to load configuration for {}", project.display()))?;

    if let Some(builder) = &args.builder {
        config.builder = Some(builder.clone());
    }
    if let Some(packages) = args.packages {
        config.prune_packages = packages;
    }
    if let Some(log) = &args.log {
        config.log_path = log.clone();
    }
    Ok(config)
}

fn print_json(summaries: &[PruneSummary], failures: &[BaselineFailure]) -> Result<()> {
    let failures: Vec<_> = failures
        .iter()
        .map(|failure| {
            serde_json::json!({
                "project": failure.project.display().to_string(),
                "log_path": failure.log_path.display().to_string(),
            })
        })
        .collect();

    let output = serde_json::json!({
        "projects": summaries,
        "baseline_failures": failures,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_summary(summaries: &[PruneSummary], failures: &[BaselineFailure]) {
    println!();
    for summary in summaries {
        let status = if summary.cancelled {
            "cancelled".yellow()
        } else {
            "done".green()
        };
        println!(
            "{} [{}]: {} removed, {} kept",
            summary.project.bold(),
            status,
            summary.removed.len(),
            summary.kept.len()
        );
        for reference in &summary.removed {
            println!("  {} {} {}", "-".red(), reference.kind, reference.name);
        }
        if !summary.deleted_folders.is_empty() {
            println!(
                "  {} package folder(s) deleted",
                summary.deleted_folders.len()
            );
        }
    }

    for failure in failures {
        println!(
            "{} [{}]: see {}",
            failure.project.display().to_string().bold(),
            "build errors".red(),
            failure.log_path.display()
        );
    }
}
