//! Bundler configuration (packlet.toml)
//!
//! The file is optional. Command-line overrides replace file fields one by
//! one; what is still unset afterwards falls back to the defaults below,
//! except `entry`, which is required.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use packlet_analyzer::{normalize, ModuleId};

use crate::error::ConfigError;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "packlet.toml";

pub const DEFAULT_OUTPUT_PATH: &str = "./dist";

pub const DEFAULT_OUTPUT_FILENAME: &str = "bundle.js";

/// How module bodies are embedded in the artifact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyStyle {
    /// Body is the function's statements
    #[default]
    Function,
    /// The module function is a string literal compiled by indirect `eval`,
    /// tagged with `//# sourceURL`
    Eval,
}

/// Contents of a config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundlerConfig {
    /// Entry source file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<PathBuf>,

    #[serde(default)]
    pub output: OutputConfig,
}

/// `[output]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Output directory (default: "./dist")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Artifact file name (default: "bundle.js")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<BodyStyle>,
}

/// Values given on the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub entry: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub filename: Option<String>,
    pub style: Option<BodyStyle>,
}

/// Fully merged configuration with absolute paths
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub entry: PathBuf,
    pub output_dir: PathBuf,
    pub filename: String,
    pub style: BodyStyle,
}

impl BundlerConfig {
    /// Load a config file from disk
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse config text; `path` is only used in error messages
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the config for a run.
    ///
    /// An explicit path must exist. Without one, `packlet.toml` in `cwd` is
    /// used when present and an empty config otherwise.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => {
                let path = cwd.join(path);
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path));
                }
                Self::from_file(&path)
            }
            None => {
                let path = cwd.join(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Self::from_file(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply command-line overrides field by field
    pub fn merge(mut self, overrides: ConfigOverrides) -> Self {
        if overrides.entry.is_some() {
            self.entry = overrides.entry;
        }
        if overrides.output_path.is_some() {
            self.output.path = overrides.output_path;
        }
        if overrides.filename.is_some() {
            self.output.filename = overrides.filename;
        }
        if overrides.style.is_some() {
            self.output.style = overrides.style;
        }
        self
    }

    /// Fill in defaults and make paths absolute against `cwd`
    pub fn resolve(self, cwd: &Path) -> Result<ResolvedConfig, ConfigError> {
        let entry = self.entry.ok_or(ConfigError::MissingEntry)?;

        let filename = self
            .output
            .filename
            .unwrap_or_else(|| DEFAULT_OUTPUT_FILENAME.to_string());
        if filename.is_empty() || filename.contains(['/', '\\']) || filename == "." || filename == ".." {
            return Err(ConfigError::InvalidFilename(filename));
        }

        let output_dir = self
            .output
            .path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH));

        Ok(ResolvedConfig {
            entry: normalize(&cwd.join(entry)),
            output_dir: normalize(&cwd.join(output_dir)),
            filename,
            style: self.output.style.unwrap_or_default(),
        })
    }
}

impl ResolvedConfig {
    /// Full path of the artifact
    pub fn output_file(&self) -> PathBuf {
        self.output_dir.join(&self.filename)
    }

    /// Identifier of the entry module (no extension defaulting)
    pub fn entry_id(&self) -> ModuleId {
        ModuleId::new(&self.entry)
    }
}
