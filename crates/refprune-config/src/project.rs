//! Project Configuration (refprune.toml)
//!
//! Handles configuration stored in `refprune.toml` next to a project file or
//! in one of its parent directories. The same sections are accepted in the
//! global configuration.

use crate::{ConfigError, ConfigResult};
use refprune_build::oracle::PROJECT_PLACEHOLDER;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = "refprune.toml";

/// Project configuration from refprune.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Build tool settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builder: Option<BuilderConfig>,

    /// Package manifest settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packages: Option<PackagesConfig>,

    /// Build log settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<LogConfig>,
}

/// Build tool settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BuilderConfig {
    /// Builder executable; skips discovery when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Locations probed in order when no path is set
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<PathBuf>,

    /// Argument template, with `{project}` and `{log}` placeholders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

/// Package manifest settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct PackagesConfig {
    /// Synchronize packages.config and delete unused package folders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prune: Option<bool>,

    /// Manifest file name (default: "packages.config")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
}

/// Build log settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Build log file (default: buildlog.txt in the temp directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl ProjectConfig {
    /// Load project configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(builder) = &self.builder {
            builder.validate()?;
        }

        if let Some(manifest) = self.packages.as_ref().and_then(|p| p.manifest.as_ref()) {
            if manifest.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    "packages.manifest",
                    "manifest name cannot be empty",
                ));
            }
        }

        if let Some(path) = self.log.as_ref().and_then(|l| l.path.as_ref()) {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidPath(path.clone()));
            }
        }

        Ok(())
    }

    /// Merge another configuration into this one
    /// Other config takes precedence for values it sets
    pub fn merge(&mut self, other: &ProjectConfig) {
        if let Some(builder) = &other.builder {
            self.builder.get_or_insert_with(Default::default).merge(builder);
        }
        if let Some(packages) = &other.packages {
            let target = self.packages.get_or_insert_with(Default::default);
            if packages.prune.is_some() {
                target.prune = packages.prune;
            }
            if packages.manifest.is_some() {
                target.manifest = packages.manifest.clone();
            }
        }
        if let Some(log) = &other.log {
            if log.path.is_some() {
                self.log.get_or_insert_with(Default::default).path = log.path.clone();
            }
        }
    }
}

impl BuilderConfig {
    /// Validate builder settings
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(path) = &self.path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidPath(path.clone()));
            }
        }

        if let Some(args) = &self.args {
            if args.is_empty() {
                return Err(ConfigError::invalid_value(
                    "builder.args",
                    "argument list cannot be empty",
                ));
            }
            if !args.iter().any(|arg| arg.contains(PROJECT_PLACEHOLDER)) {
                return Err(ConfigError::invalid_value(
                    "builder.args",
                    format!("must contain the {} placeholder", PROJECT_PLACEHOLDER),
                ));
            }
        }

        Ok(())
    }

    fn merge(&mut self, other: &BuilderConfig) {
        if other.path.is_some() {
            self.path = other.path.clone();
        }
        if !other.candidates.is_empty() {
            self.candidates = other.candidates.clone();
        }
        if other.args.is_some() {
            self.args = other.args.clone();
        }
    }
}
