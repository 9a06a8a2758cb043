//! Build progress reporting
//!
//! The engine never writes to the terminal itself. Front ends implement
//! [`BuildReporter`] and receive events as the build proceeds.

use std::path::Path;

use packlet_analyzer::{ModuleId, SkippedImport};

/// Receives build progress events. All methods default to doing nothing.
pub trait BuildReporter {
    /// The build starts from `entry`
    fn entry(&mut self, _entry: &ModuleId) {}

    /// `id` is about to be read and analyzed
    fn processing(&mut self, _id: &ModuleId) {}

    /// `dependency` was seen for the first time while processing `importer`
    fn dependency_found(&mut self, _importer: &ModuleId, _dependency: &ModuleId) {}

    /// A non-relative import was left out of the bundle
    fn warning(&mut self, _skipped: &SkippedImport) {}

    /// Traversal finished with `modules` descriptors
    fn graph_built(&mut self, _modules: usize) {}

    /// The artifact was written
    fn bundle_written(&mut self, _path: &Path, _bytes: usize) {}
}

/// Reporter that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl BuildReporter for SilentReporter {}

/// Reporter that records events, for tests and tooling
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingReporter {
    pub events: Vec<BuildEvent>,
}

/// One recorded [`BuildReporter`] call
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    Entry(ModuleId),
    Processing(ModuleId),
    DependencyFound { importer: ModuleId, dependency: ModuleId },
    Warning(SkippedImport),
    GraphBuilt(usize),
    BundleWritten { path: std::path::PathBuf, bytes: usize },
}

impl BuildReporter for RecordingReporter {
    fn entry(&mut self, entry: &ModuleId) {
        self.events.push(BuildEvent::Entry(entry.clone()));
    }

    fn processing(&mut self, id: &ModuleId) {
        self.events.push(BuildEvent::Processing(id.clone()));
    }

    fn dependency_found(&mut self, importer: &ModuleId, dependency: &ModuleId) {
        self.events.push(BuildEvent::DependencyFound {
            importer: importer.clone(),
            dependency: dependency.clone(),
        });
    }

    fn warning(&mut self, skipped: &SkippedImport) {
        self.events.push(BuildEvent::Warning(skipped.clone()));
    }

    fn graph_built(&mut self, modules: usize) {
        self.events.push(BuildEvent::GraphBuilt(modules));
    }

    fn bundle_written(&mut self, path: &Path, bytes: usize) {
        self.events.push(BuildEvent::BundleWritten {
            path: path.to_path_buf(),
            bytes,
        });
    }
}

impl RecordingReporter {
    /// Identifiers from `processing` events, in order
    pub fn processed(&self) -> Vec<ModuleId> {
        self.events
            .iter()
            .filter_map(|event| match event {
                BuildEvent::Processing(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<&SkippedImport> {
        self.events
            .iter()
            .filter_map(|event| match event {
                BuildEvent::Warning(skipped) => Some(skipped),
                _ => None,
            })
            .collect()
    }
}
