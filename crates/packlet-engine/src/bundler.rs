//! Build orchestration
//!
//! Graph discovery, then emission, then a single write of the artifact.
//! Any failure before the write leaves the output location untouched.

use std::fs;
use std::path::{Path, PathBuf};

use packlet_analyzer::{EsAnalyzer, SourceAnalyzer};

use crate::config::ResolvedConfig;
use crate::emit::RuntimeEmitter;
use crate::error::{BuildResult, EmitError};
use crate::graph::{BundleGraph, GraphBuilder};
use crate::report::BuildReporter;

/// Outcome of a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
    /// Path the artifact was written to
    pub output: PathBuf,
    /// Number of bundled modules
    pub modules: usize,
    /// Artifact size in bytes
    pub bytes: usize,
    /// Number of non-relative imports left out
    pub warnings: usize,
}

/// Drives one build for a resolved configuration
#[derive(Debug, Clone)]
pub struct Bundler<A = EsAnalyzer> {
    config: ResolvedConfig,
    builder: GraphBuilder<A>,
}

impl Bundler<EsAnalyzer> {
    pub fn new(config: ResolvedConfig) -> Self {
        Self::with_analyzer(config, EsAnalyzer)
    }
}

impl<A: SourceAnalyzer> Bundler<A> {
    pub fn with_analyzer(config: ResolvedConfig, analyzer: A) -> Self {
        Self {
            config,
            builder: GraphBuilder::new(analyzer),
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Build the graph and emit the artifact text without writing it.
    pub fn bundle(&self, reporter: &mut dyn BuildReporter) -> BuildResult<(BundleGraph, String)> {
        let entry = self.config.entry_id();
        let graph = self.builder.build(&entry, reporter)?;
        let artifact = RuntimeEmitter::new(self.config.style).emit(&graph.modules, &entry)?;
        Ok((graph, artifact))
    }

    /// Build, emit and write the artifact.
    pub fn run(&self, reporter: &mut dyn BuildReporter) -> BuildResult<BundleSummary> {
        let (graph, artifact) = self.bundle(reporter)?;

        let output = self.config.output_file();
        write_artifact(&self.config.output_dir, &output, &artifact)?;
        reporter.bundle_written(&output, artifact.len());

        Ok(BundleSummary {
            output,
            modules: graph.len(),
            bytes: artifact.len(),
            warnings: graph.skipped.len(),
        })
    }
}

/// Write through a sibling temporary file so readers never see a partial
/// artifact at `path`.
fn write_artifact(dir: &Path, path: &Path, contents: &str) -> Result<(), EmitError> {
    fs::create_dir_all(dir).map_err(|source| EmitError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    let result = fs::write(&temp, contents).and_then(|()| fs::rename(&temp, path));
    if let Err(source) = result {
        let _ = fs::remove_file(&temp);
        return Err(EmitError::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}
