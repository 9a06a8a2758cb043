//! Packlet Bundling Engine
//!
//! - **Graph**: breadth-first module discovery (`graph`)
//! - **Emit**: the self-executing CommonJS runtime artifact (`emit`)
//! - **Bundler**: config in, artifact on disk (`bundler`)
//!
//! # Example
//!
//! ```rust,ignore
//! use packlet_engine::{Bundler, BundlerConfig, ConfigOverrides, SilentReporter};
//!
//! let cwd = std::env::current_dir()?;
//! let config = BundlerConfig::load(None, &cwd)?
//!     .merge(ConfigOverrides::default())
//!     .resolve(&cwd)?;
//! let summary = Bundler::new(config).run(&mut SilentReporter)?;
//! println!("{} modules -> {}", summary.modules, summary.output.display());
//! ```

#![warn(rust_2018_idioms)]

pub mod bundler;
pub mod config;
pub mod emit;
pub mod error;
pub mod graph;
pub mod report;

pub use bundler::{BundleSummary, Bundler};
pub use config::{
    BodyStyle, BundlerConfig, ConfigOverrides, OutputConfig, ResolvedConfig, DEFAULT_CONFIG_FILE,
    DEFAULT_OUTPUT_FILENAME, DEFAULT_OUTPUT_PATH,
};
pub use emit::RuntimeEmitter;
pub use error::{BuildError, BuildResult, ConfigError, EmitError};
pub use graph::{BundleGraph, GraphBuilder, ModuleDescriptor};
pub use report::{BuildEvent, BuildReporter, RecordingReporter, SilentReporter};

pub use packlet_analyzer::{ModuleId, SkippedImport};
