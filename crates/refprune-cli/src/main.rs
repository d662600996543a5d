use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use refprune_build::CancelToken;
use commands::prune::ActiveProject;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;
mod discovery;
mod reporter;

/// Remove project references that a build does not need.
///
/// Every Reference and ProjectReference is removed in turn and the project is
/// rebuilt; the removal is kept only if the build still succeeds. The project
/// file on disk is always either the original or a version that built.
///
/// EXAMPLES:
///     refprune prune App/App.csproj            Prune one project
///     refprune prune Solution.sln --packages   Prune a solution, sync packages.config
///     refprune prune . --json                  Prune every project below here
///     refprune config App/App.csproj           Show the effective configuration
///
/// ENVIRONMENT VARIABLES:
///     REFPRUNE_BUILDER          Builder executable (e.g. MSBuild.exe)
///     REFPRUNE_PRUNE_PACKAGES   Set to 'true' to prune packages by default
///     REFPRUNE_BUILD_LOG        Build log file
///     RUST_LOG                  Log filter (e.g. refprune=debug)
///     NO_COLOR                  Set to disable colored output
#[derive(Parser)]
#[command(name = "refprune")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// More log output (-v info, -vv debug)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Errors only
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Prune unused references from projects
    ///
    /// PATH may be a project file (*.csproj, *.vbproj, *.fsproj, ...), a
    /// solution file, or a directory searched for project files. Press Ctrl+C
    /// once to stop after the build in progress.
    ///
    /// EXAMPLES:
    ///     refprune prune App.csproj --builder "C:\Program Files (x86)\MSBuild\14.0\Bin\MSBuild.exe"
    ///     refprune prune App.csproj --no-packages
    #[command(visible_alias = "p")]
    Prune {
        /// Project file, solution file or directory
        path: PathBuf,
        /// Builder executable
        #[arg(long, short = 'b')]
        builder: Option<PathBuf>,
        /// Sync packages.config and delete unused package folders
        #[arg(long, overrides_with = "no_packages")]
        packages: bool,
        /// Leave packages.config and package folders alone
        #[arg(long, overrides_with = "packages")]
        no_packages: bool,
        /// Build log file
        #[arg(long)]
        log: Option<PathBuf>,
        /// Print a JSON summary on stdout
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    ///
    /// Merges ~/.refprune/config.toml, the nearest refprune.toml and
    /// REFPRUNE_* variables, then reports which builder would be used.
    Config {
        /// Project file or directory to resolve configuration for
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    ///
    /// EXAMPLES:
    ///     refprune completions bash > ~/.local/share/bash-completion/completions/refprune
    ///     refprune completions zsh > ~/.zfunc/_refprune
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Log to stderr so stdout stays clean for --json
fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "refprune=error",
        (false, 0) => "refprune=warn",
        (false, 1) => "refprune=info",
        (false, _) => "refprune=debug",
    };
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default.into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

/// First Ctrl+C stops after the current build; a second one exits at once
fn install_cancel_handler(cancel: CancelToken, active: ActiveProject) -> Result<()> {
    ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            let project = active.lock().ok().and_then(|slot| slot.clone());
            eprintln!("\n{}", abort_message(project.as_deref()));
            std::process::exit(130);
        }
        eprintln!("\nCancelling after the current build...");
        cancel.cancel();
    })
    .context("Failed to set Ctrl+C handler")
}

/// Message for a hard abort, naming the project whose last edit is unverified
fn abort_message(project: Option<&Path>) -> String {
    match project {
        Some(project) => format!(
            "Aborted. {} may be left in an unverified state",
            project.display()
        ),
        None => "Aborted.".to_string(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Prune {
            path,
            builder,
            packages,
            no_packages,
            log,
            json,
        } => {
            let cancel = CancelToken::new();
            let active: ActiveProject = Arc::new(Mutex::new(None));
            install_cancel_handler(cancel.clone(), Arc::clone(&active))?;

            let args = commands::prune::PruneArgs {
                path,
                builder,
                packages: packages_flag(packages, no_packages),
                log,
                quiet: cli.quiet,
                json,
            };
            if commands::prune::run(args, cancel, active)? == commands::prune::Outcome::BaselineFailed {
                std::process::exit(2);
            }
        }
        Commands::Config { path, json } => {
            commands::config::run(&path, json)?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }

    Ok(())
}

/// `--packages` / `--no-packages`, or `None` to defer to configuration
fn packages_flag(packages: bool, no_packages: bool) -> Option<bool> {
    match (packages, no_packages) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}
