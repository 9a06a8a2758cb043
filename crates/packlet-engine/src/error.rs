//! Error types for bundling
//!
//! Every error is fatal for the current build; nothing is retried.

use std::io;
use std::path::PathBuf;

use packlet_analyzer::{AnalyzeError, ModuleId};
use thiserror::Error;

/// Errors in loading or merging configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Failed to read the config file
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// No entry after merging file and command line
    #[error("No entry point configured (set `entry` in the config file or pass --entry)")]
    MissingEntry,

    #[error("Invalid output filename: '{0}'")]
    InvalidFilename(String),

    #[error("Cannot determine working directory: {0}")]
    WorkingDirectory(#[source] io::Error),
}

/// Errors in producing or writing the artifact
#[derive(Debug, Error)]
pub enum EmitError {
    /// The entry module has no descriptor
    #[error("Entry module {0} is not among the bundled modules")]
    EntryNotBundled(ModuleId),

    #[error("Failed to create output directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write bundle to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors that abort a build
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A reachable module's source could not be read
    #[error("Cannot read module {id}{}: {source}", imported_by(.importer))]
    Resolution {
        id: ModuleId,
        importer: Option<ModuleId>,
        #[source]
        source: io::Error,
    },

    /// The analyzer failed on one module
    #[error("Failed to analyze {id}: {source}")]
    Analysis {
        id: ModuleId,
        #[source]
        source: AnalyzeError,
    },

    #[error(transparent)]
    Emit(#[from] EmitError),
}

fn imported_by(importer: &Option<ModuleId>) -> String {
    match importer {
        Some(importer) => format!(" (imported by {})", importer),
        None => String::new(),
    }
}

/// Result type for builds
pub type BuildResult<T> = Result<T, BuildError>;
