//! Process oracle tests using shell scripts as fake builders
//!
//! Each script is run as `sh <script> <project> <log>`, mirroring the
//! `{project}` and `{log}` placeholders of a real builder invocation.

#![cfg(unix)]

use pretty_assertions::assert_eq;
use refprune_build::{BuildOracle, ProcessOracle, PruneError};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    temp: TempDir,
    project: PathBuf,
    log: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("App.csproj");
        fs::write(&project, "<Project />").unwrap();
        let log = temp.path().join("buildlog.txt");
        Self { temp, project, log }
    }

    fn oracle(&self, script: &str) -> ProcessOracle {
        let script_path = self.temp.path().join("build.sh");
        fs::write(&script_path, script).unwrap();
        ProcessOracle::new("/bin/sh")
            .with_args(vec![
                script_path.display().to_string(),
                "{project}".to_string(),
                "{log}".to_string(),
            ])
            .with_log_path(&self.log)
            .with_working_dir(self.temp.path())
    }
}

#[test]
fn test_missing_builder_is_unavailable() {
    let fixture = Fixture::new();
    let oracle = ProcessOracle::new(fixture.temp.path().join("no-such-msbuild"))
        .with_log_path(&fixture.log);

    let err = oracle.verify(&fixture.project).unwrap_err();
    assert!(matches!(err, PruneError::BuilderUnavailable { .. }));
}

#[test]
fn test_clean_build_passes() {
    let fixture = Fixture::new();
    let oracle = fixture.oracle("printf '' > \"$2\"\nexit 0\n");

    let verdict = oracle.verify(&fixture.project).unwrap();
    assert!(verdict.passed);
    assert_eq!(verdict.exit_code, Some(0));
    assert_eq!(verdict.log_path, fixture.log);
}

#[test]
fn test_error_in_log_fails() {
    let fixture = Fixture::new();
    let oracle = fixture.oracle(
        "echo 'Program.cs(3,7): error CS0246: The type or namespace could not be found' > \"$2\"\nexit 1\n",
    );

    let verdict = oracle.verify(&fixture.project).unwrap();
    assert!(!verdict.passed);
    assert_eq!(verdict.exit_code, Some(1));
}

#[test]
fn test_missing_log_fails() {
    let fixture = Fixture::new();
    let oracle = fixture.oracle("exit 0\n");

    let verdict = oracle.verify(&fixture.project).unwrap();
    assert!(!verdict.passed);
}

#[test]
fn test_empty_log_with_failure_status_fails() {
    let fixture = Fixture::new();
    let oracle = fixture.oracle(": > \"$2\"\nexit 1\n");

    assert!(!oracle.verify(&fixture.project).unwrap().passed);
}

#[test]
fn test_stale_log_is_cleared_before_build() {
    let fixture = Fixture::new();
    fs::write(&fixture.log, "error MSB4019: stale result\n").unwrap();
    let oracle = fixture.oracle("echo 'warning MSB3245' >> \"$2\"\nexit 1\n");

    let verdict = oracle.verify(&fixture.project).unwrap();
    assert!(verdict.passed);
    assert_eq!(fs::read_to_string(&fixture.log).unwrap(), "warning MSB3245\n");
}

#[test]
fn test_placeholders_and_working_dir() {
    let fixture = Fixture::new();
    let oracle = fixture.oracle("printf '%s|%s' \"$1\" \"$(pwd)\" > \"$2\"\nexit 0\n");

    oracle.verify(&fixture.project).unwrap();

    let log = fs::read_to_string(&fixture.log).unwrap();
    let (project, cwd) = log.split_once('|').unwrap();
    assert_eq!(Path::new(project), fixture.project.as_path());
    assert_eq!(
        fs::canonicalize(cwd).unwrap(),
        fs::canonicalize(fixture.temp.path()).unwrap()
    );
}
