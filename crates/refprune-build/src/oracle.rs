//! Build oracle: runs the external builder and judges its log
//!
//! The contract with the builder is deliberately thin: the log file exists
//! or it does not, and its text contains `"error"` or it does not. Anything
//! inconclusive counts as a failed build, so an unsafe removal is never
//! accepted.

use crate::error::{PruneError, PruneResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Default build log file name (inside the system temp directory)
pub const DEFAULT_LOG_FILE: &str = "buildlog.txt";

/// Placeholder for the project path in builder arguments
pub const PROJECT_PLACEHOLDER: &str = "{project}";

/// Placeholder for the log path in builder arguments
pub const LOG_PLACEHOLDER: &str = "{log}";

/// Marker searched for in the build log (ordinal, case-sensitive)
pub const ERROR_MARKER: &str = "error";

/// MSBuild arguments: errors only, no logo, quiet file log
pub fn default_builder_args() -> Vec<String> {
    [
        PROJECT_PLACEHOLDER,
        "/clp:ErrorsOnly",
        "/nologo",
        "/m",
        "/flp:logfile={log};Verbosity=Quiet",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect()
}

/// Default build log location
pub fn default_log_path() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_LOG_FILE)
}

/// Resolve a relative path against the current directory
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Result of one build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Build finished without detectable errors
    pub passed: bool,
    /// Builder exit code (`None` if it was killed by a signal or faked)
    pub exit_code: Option<i32>,
    /// Where the build log was written
    pub log_path: PathBuf,
}

impl Verdict {
    /// A passing verdict
    pub fn passed(log_path: impl Into<PathBuf>) -> Self {
        Self {
            passed: true,
            exit_code: Some(0),
            log_path: log_path.into(),
        }
    }

    /// A failing verdict
    pub fn failed(log_path: impl Into<PathBuf>) -> Self {
        Self {
            passed: false,
            exit_code: Some(1),
            log_path: log_path.into(),
        }
    }
}

/// Decide whether a finished build had errors
///
/// A missing log means errors could not be ruled out. Otherwise the build
/// failed only if the exit status is non-zero and the log either mentions
/// `"error"` or is empty.
pub fn has_errors(exit_code: Option<i32>, log: Option<&str>) -> bool {
    let Some(log) = log else {
        return true;
    };
    exit_code != Some(0) && (log.contains(ERROR_MARKER) || log.is_empty())
}

/// Something that can tell whether a project builds
pub trait BuildOracle {
    /// Build the project file at `project` as it is on disk
    fn verify(&self, project: &Path) -> PruneResult<Verdict>;
}

impl<F> BuildOracle for F
where
    F: Fn(&Path) -> PruneResult<Verdict>,
{
    fn verify(&self, project: &Path) -> PruneResult<Verdict> {
        self(project)
    }
}

/// Oracle backed by an external builder process
#[derive(Debug, Clone)]
pub struct ProcessOracle {
    builder: PathBuf,
    args: Vec<String>,
    log_path: PathBuf,
    working_dir: PathBuf,
}

impl ProcessOracle {
    /// Oracle for the builder executable at `builder`
    ///
    /// A bare executable name is left for the `PATH` lookup; anything with a
    /// directory part is made absolute.
    pub fn new(builder: impl Into<PathBuf>) -> Self {
        let builder = builder.into();
        let builder = if builder.parent().is_some_and(|dir| !dir.as_os_str().is_empty()) {
            absolute(&builder)
        } else {
            builder
        };
        Self {
            builder,
            args: default_builder_args(),
            log_path: default_log_path(),
            working_dir: std::env::temp_dir(),
        }
    }

    /// Set the argument template
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Set the build log path
    pub fn with_log_path(mut self, log_path: impl Into<PathBuf>) -> Self {
        self.log_path = absolute(&log_path.into());
        self
    }

    /// Set the builder's working directory
    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = working_dir.into();
        self
    }

    /// Builder executable
    pub fn builder(&self) -> &Path {
        &self.builder
    }

    /// Build log path
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Arguments with placeholders filled in
    ///
    /// The builder runs in its own working directory, so the project path is
    /// passed absolute.
    pub fn expand_args(&self, project: &Path) -> Vec<String> {
        let project = absolute(project).display().to_string();
        let log = self.log_path.display().to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(PROJECT_PLACEHOLDER, &project)
                    .replace(LOG_PLACEHOLDER, &log)
            })
            .collect()
    }

    fn clear_log(&self) -> PruneResult<()> {
        match fs::remove_file(&self.log_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PruneError::build_log_unreadable(&self.log_path, e)),
        }
    }

    fn read_log(&self) -> PruneResult<Option<String>> {
        match fs::read(&self.log_path) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PruneError::build_log_unreadable(&self.log_path, e)),
        }
    }
}

impl BuildOracle for ProcessOracle {
    fn verify(&self, project: &Path) -> PruneResult<Verdict> {
        self.clear_log()?;

        let args = self.expand_args(project);
        tracing::debug!("Running {} {}", self.builder.display(), args.join(" "));

        let status = Command::new(&self.builder)
            .args(&args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| PruneError::builder_unavailable(&self.builder, e))?;

        // The log stays on disk for inspection; the next run clears it.
        let log = self.read_log()?;
        let exit_code = status.code();
        let passed = !has_errors(exit_code, log.as_deref());

        tracing::debug!(
            "Build of {} {} (exit {:?})",
            project.display(),
            if passed { "passed" } else { "failed" },
            exit_code
        );

        Ok(Verdict {
            passed,
            exit_code,
            log_path: self.log_path.clone(),
        })
    }
}
