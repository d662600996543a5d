//! Project discovery
//!
//! Turns the path given on the command line into the list of project files
//! to prune: a project file itself, the projects listed in a solution file,
//! or every project file below a directory.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directories that never hold projects worth pruning
const SKIPPED_DIRS: &[&str] = &["bin", "obj", "packages", "node_modules"];

/// Project files to prune for `path`, in a stable order
///
/// Paths come back absolute: the builder does not run in the current directory.
pub fn discover_projects(path: &Path) -> Result<Vec<PathBuf>> {
    let path = &std::path::absolute(path)
        .with_context(|| format!("Failed to resolve {}", path.display()))?;
    if path.is_dir() {
        return Ok(projects_in_dir(path));
    }
    if !path.exists() {
        bail!("{} does not exist", path.display());
    }
    if has_extension(path, "sln") {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read solution {}", path.display()))?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        return Ok(parse_solution(&content, dir));
    }
    if is_project_file(path) {
        return Ok(vec![path.to_path_buf()]);
    }
    bail!(
        "{} is not a project file, solution file or directory",
        path.display()
    )
}

/// Whether the file looks like an MSBuild project (`*.csproj`, `*.vbproj`, ...)
pub fn is_project_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.len() > "proj".len() && ext.to_ascii_lowercase().ends_with("proj"))
}

/// Project paths listed in a solution file, resolved against `sln_dir`
///
/// Entries look like
/// `Project("{FAE04EC0-...}") = "App", "src\App\App.csproj", "{GUID}"`.
/// Solution folders use the same syntax but do not point at project files.
pub fn parse_solution(content: &str, sln_dir: &Path) -> Vec<PathBuf> {
    content
        .lines()
        .filter(|line| line.trim_start().starts_with("Project("))
        .filter_map(|line| {
            let (_, rhs) = line.split_once('=')?;
            let relative = rhs.split(',').nth(1)?.trim().trim_matches('"');
            let path = resolve_relative(sln_dir, relative);
            is_project_file(&path).then_some(path)
        })
        .collect()
}

fn projects_in_dir(dir: &Path) -> Vec<PathBuf> {
    let mut projects: Vec<PathBuf> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_project_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    projects.sort();
    projects
}

fn is_skipped(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.')
        || SKIPPED_DIRS
            .iter()
            .any(|skipped| name.eq_ignore_ascii_case(skipped))
}

/// Solution paths use `\`; split on both separators so they work everywhere
fn resolve_relative(base: &Path, relative: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for part in relative.split(['\\', '/']).filter(|part| !part.is_empty()) {
        path.push(part);
    }
    path
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    const SOLUTION: &str = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
# Visual Studio 14
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "App", "src\App\App.csproj", "{11111111-1111-1111-1111-111111111111}"
EndProject
Project("{2150E333-8FDC-42A3-9474-1A3956D46DE8}") = "Solution Items", "Solution Items", "{22222222-2222-2222-2222-222222222222}"
EndProject
Project("{F184B08F-C81C-45F6-A57F-5ABD9991F28F}") = "Legacy", "src\Legacy\Legacy.vbproj", "{33333333-3333-3333-3333-333333333333}"
EndProject
Global
EndGlobal
"#;

    #[rstest]
    #[case("App.csproj", true)]
    #[case("App.vbproj", true)]
    #[case("App.FSPROJ", true)]
    #[case("App.proj", false)]
    #[case("App.sln", false)]
    #[case("App", false)]
    fn test_is_project_file(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_project_file(Path::new(name)), expected);
    }

    #[test]
    fn test_parse_solution_skips_folders() {
        let projects = parse_solution(SOLUTION, Path::new("repo"));
        assert_eq!(
            projects,
            vec![
                ["repo", "src", "App", "App.csproj"].iter().collect::<PathBuf>(),
                ["repo", "src", "Legacy", "Legacy.vbproj"].iter().collect::<PathBuf>(),
            ]
        );
    }

    #[test]
    fn test_directory_walk_skips_build_output() {
        let temp = TempDir::new().unwrap();
        for path in [
            "src/App/App.csproj",
            "src/Core/Core.csproj",
            "src/App/obj/Generated.csproj",
            "packages/Tool.1.0.0/tool.csproj",
            ".git/hooks/x.csproj",
            "README.md",
        ] {
            let full = temp.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, "<Project />").unwrap();
        }

        let projects = discover_projects(temp.path()).unwrap();
        assert_eq!(
            projects,
            vec![
                temp.path().join("src/App/App.csproj"),
                temp.path().join("src/Core/Core.csproj"),
            ]
        );
    }

    #[test]
    fn test_single_project_file() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("App.csproj");
        fs::write(&project, "<Project />").unwrap();
        assert_eq!(discover_projects(&project).unwrap(), vec![project]);
    }

    #[test]
    fn test_rejects_other_files() {
        let temp = TempDir::new().unwrap();
        let readme = temp.path().join("README.md");
        fs::write(&readme, "").unwrap();
        assert!(discover_projects(&readme).is_err());
        assert!(discover_projects(&temp.path().join("missing.csproj")).is_err());
    }
}
