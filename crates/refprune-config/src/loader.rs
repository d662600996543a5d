//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::GlobalConfig;
use crate::project::{ProjectConfig, PROJECT_CONFIG_FILE};
use crate::{ConfigError, ConfigResult};
use refprune_build::oracle::{default_builder_args, default_log_path};
use refprune_package::sync::DEFAULT_MANIFEST_NAME;
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};

/// Builder executable, overrides `[builder] path`
pub const ENV_BUILDER: &str = "REFPRUNE_BUILDER";
/// Package pruning switch, overrides `[packages] prune`
pub const ENV_PRUNE_PACKAGES: &str = "REFPRUNE_PRUNE_PACKAGES";
/// Build log file, overrides `[log] path`
pub const ENV_BUILD_LOG: &str = "REFPRUNE_BUILD_LOG";

/// MSBuild install locations, newest first
const MSBUILD_LOCATIONS: &[&str] = &[
    r"C:\Program Files (x86)\MSBuild\14.0\Bin\MSBuild.exe",
    r"C:\Program Files (x86)\MSBuild\14.0\Bin\amd64\MSBuild.exe",
    r"C:\Program Files (x86)\MSBuild\12.0\Bin\MSBuild.exe",
    r"C:\Program Files (x86)\MSBuild\12.0\Bin\amd64\MSBuild.exe",
    r"C:\Windows\Microsoft.NET\Framework64\v4.0.30319\MSBuild.exe",
    r"C:\Windows\Microsoft.NET\Framework\v4.0.30319\MSBuild.exe",
    r"C:\Windows\Microsoft.NET\Framework64\v3.5\MSBuild.exe",
    r"C:\Windows\Microsoft.NET\Framework\v3.5\MSBuild.exe",
    r"C:\Windows\Microsoft.NET\Framework64\v2.0.50727\MSBuild.exe",
    r"C:\Windows\Microsoft.NET\Framework\v2.0.50727\MSBuild.exe",
];

#[cfg(windows)]
const BUILDER_NAMES: &[&str] = &["MSBuild.exe"];
#[cfg(not(windows))]
const BUILDER_NAMES: &[&str] = &["msbuild", "xbuild"];

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.refprune/config.toml) - lowest priority
/// 2. Project config (refprune.toml) - overrides global
/// 3. Environment variables (REFPRUNE_*) - overrides project
/// 4. CLI flags - highest priority (handled by caller)
pub struct ConfigLoader {
    /// Global config path, resolved from the home directory unless set
    global_config_path: Option<PathBuf>,
}

/// Effective configuration for one project
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Config {
    /// Explicit builder executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builder: Option<PathBuf>,

    /// Locations probed when no builder is set (empty: platform defaults)
    pub builder_candidates: Vec<PathBuf>,

    /// Builder argument template
    pub builder_args: Vec<String>,

    /// Whether to synchronize the package manifest
    pub prune_packages: bool,

    /// Package manifest file name
    pub package_manifest: String,

    /// Build log file
    pub log_path: PathBuf,

    /// The refprune.toml that contributed to this configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Read the global configuration from `path` instead of the home directory
    pub fn with_global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Load configuration for a project file (or a directory of projects)
    ///
    /// Walks up from the project's directory to find refprune.toml, merges it
    /// over the global config and applies environment overrides.
    pub fn load_for_project(&mut self, project_path: &Path) -> ConfigResult<Config> {
        let start_dir = if project_path.is_dir() {
            project_path.to_path_buf()
        } else {
            match project_path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            }
        };

        let (config_file, project_config) = self.find_project_config(&start_dir)?;
        let mut settings = self.load_global_config()?.settings();
        settings.merge(&project_config);

        let mut config = Config::from_settings(&settings);
        config.config_file = config_file;
        self.apply_env_overrides(config)
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let mut settings = self.load_global_config()?.settings();
        settings.merge(&project_config);

        let mut config = Config::from_settings(&settings);
        config.config_file = Some(config_path.to_path_buf());
        self.apply_env_overrides(config)
    }

    /// Find project configuration by walking up directory tree
    ///
    /// Returns (config_file, project_config); defaults if none is found
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.is_file() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(config_path), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Load global configuration, defaults if there is none
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => match GlobalConfig::global_config_path() {
                Ok(path) => {
                    self.global_config_path = Some(path.clone());
                    path
                }
                Err(ConfigError::HomeNotFound) => return Ok(GlobalConfig::default()),
                Err(e) => return Err(e),
            },
        };

        // Global config is optional - if it doesn't exist, return default
        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, mut config: Config) -> ConfigResult<Config> {
        if let Some(builder) = env_value(ENV_BUILDER) {
            config.builder = Some(PathBuf::from(builder));
        }

        if let Some(prune) = env_value(ENV_PRUNE_PACKAGES) {
            config.prune_packages = parse_bool(ENV_PRUNE_PACKAGES, &prune)?;
        }

        if let Some(log) = env_value(ENV_BUILD_LOG) {
            config.log_path = PathBuf::from(log);
        }

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Effective values for merged settings, defaults for everything unset
    pub fn from_settings(settings: &ProjectConfig) -> Self {
        let builder = settings.builder.clone().unwrap_or_default();
        let packages = settings.packages.clone().unwrap_or_default();

        Self {
            builder: builder.path,
            builder_candidates: builder.candidates,
            builder_args: builder.args.unwrap_or_else(default_builder_args),
            prune_packages: packages.prune.unwrap_or(false),
            package_manifest: packages
                .manifest
                .unwrap_or_else(|| DEFAULT_MANIFEST_NAME.to_string()),
            log_path: settings
                .log
                .as_ref()
                .and_then(|log| log.path.clone())
                .unwrap_or_else(default_log_path),
            config_file: None,
        }
    }

    /// Locations searched when no builder is set explicitly
    pub fn search_locations(&self) -> Vec<PathBuf> {
        if self.builder_candidates.is_empty() {
            default_builder_candidates()
        } else {
            self.builder_candidates.clone()
        }
    }

    /// The builder to run: the explicit one, else the first existing candidate
    pub fn resolve_builder(&self) -> ConfigResult<PathBuf> {
        if let Some(builder) = &self.builder {
            return Ok(builder.clone());
        }

        let searched = self.search_locations();
        match searched.iter().find(|candidate| candidate.is_file()) {
            Some(found) => Ok(found.clone()),
            None => Err(ConfigError::BuilderNotFound { searched }),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_settings(&ProjectConfig::default())
    }
}

/// Platform builder locations: the MSBuild installs on Windows, then PATH
pub fn default_builder_candidates() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = if cfg!(windows) {
        MSBUILD_LOCATIONS.iter().map(PathBuf::from).collect()
    } else {
        Vec::new()
    };

    if let Some(path) = env::var_os("PATH") {
        for dir in env::split_paths(&path) {
            candidates.extend(BUILDER_NAMES.iter().map(|name| dir.join(name)));
        }
    }
    candidates
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(field: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid_value(
            field,
            format!("expected a boolean, got '{}'", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn loader(temp: &TempDir) -> ConfigLoader {
        ConfigLoader::new().with_global_config_path(temp.path().join("global.toml"))
    }

    #[rstest]
    #[case("true", true)]
    #[case("YES", true)]
    #[case("1", true)]
    #[case("off", false)]
    #[case("0", false)]
    fn test_parse_bool(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(parse_bool("x", value).unwrap(), expected);
    }

    #[test]
    fn test_parse_bool_rejects_garbage() {
        assert!(parse_bool(ENV_PRUNE_PACKAGES, "maybe").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.builder, None);
        assert!(!config.prune_packages);
        assert_eq!(config.package_manifest, "packages.config");
        assert_eq!(config.builder_args, default_builder_args());
        assert_eq!(config.log_path, default_log_path());
    }

    #[test]
    #[serial]
    fn test_no_config_files() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("App.csproj");

        let config = loader(&temp).load_for_project(&project).unwrap();
        assert_eq!(config.config_file, None);
        assert!(!config.prune_packages);
    }

    #[test]
    #[serial]
    fn test_env_override_prune_packages() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(PROJECT_CONFIG_FILE),
            "[packages]\nprune = false\n",
        )
        .unwrap();

        env::set_var(ENV_PRUNE_PACKAGES, "true");
        let result = loader(&temp).load_for_project(&temp.path().join("App.csproj"));
        env::remove_var(ENV_PRUNE_PACKAGES);

        assert!(result.unwrap().prune_packages);
    }

    #[test]
    fn test_resolve_explicit_builder() {
        let config = Config {
            builder: Some(PathBuf::from("/opt/mono/bin/msbuild")),
            ..Config::default()
        };
        assert_eq!(
            config.resolve_builder().unwrap(),
            PathBuf::from("/opt/mono/bin/msbuild")
        );
    }

    #[test]
    fn test_resolve_first_existing_candidate() {
        let temp = TempDir::new().unwrap();
        let second = temp.path().join("msbuild-12");
        let third = temp.path().join("msbuild-4");
        fs::write(&second, "").unwrap();
        fs::write(&third, "").unwrap();

        let config = Config {
            builder_candidates: vec![temp.path().join("msbuild-14"), second.clone(), third],
            ..Config::default()
        };
        assert_eq!(config.resolve_builder().unwrap(), second);
    }

    #[test]
    fn test_resolve_without_candidates_fails() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            builder_candidates: vec![temp.path().join("missing")],
            ..Config::default()
        };

        match config.resolve_builder() {
            Err(ConfigError::BuilderNotFound { searched }) => assert_eq!(searched.len(), 1),
            other => panic!("expected BuilderNotFound, got {:?}", other),
        }
    }
}
