//! Module graph discovery
//!
//! Breadth-first traversal from the entry module. Each identifier is queued
//! at most once, so cycles terminate and shared modules are analyzed once.

use std::collections::VecDeque;
use std::fs;

use packlet_analyzer::{EsAnalyzer, ModuleId, SkippedImport, SourceAnalyzer};
use rustc_hash::FxHashSet;

use crate::error::{BuildError, BuildResult};
use crate::report::BuildReporter;

/// One analyzed module
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDescriptor {
    pub id: ModuleId,
    /// Resolved dependencies in source order, duplicates kept
    pub dependencies: Vec<ModuleId>,
    /// Transformed `(require, module, exports)` body
    pub body: String,
}

/// Result of one traversal
#[derive(Debug, Clone, Default)]
pub struct BundleGraph {
    /// Descriptors in breadth-first discovery order, entry first
    pub modules: Vec<ModuleDescriptor>,
    /// Non-relative imports left out, in the order they were met
    pub skipped: Vec<SkippedImport>,
}

impl BundleGraph {
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.iter().map(|module| &module.id)
    }

    pub fn get(&self, id: &ModuleId) -> Option<&ModuleDescriptor> {
        self.modules.iter().find(|module| &module.id == id)
    }
}

/// Builds the set of modules reachable from an entry
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder<A = EsAnalyzer> {
    analyzer: A,
}

impl<A: SourceAnalyzer> GraphBuilder<A> {
    pub fn new(analyzer: A) -> Self {
        Self { analyzer }
    }

    /// Discover every module reachable from `entry`.
    ///
    /// Fails on the first module that cannot be read or analyzed; nothing
    /// is returned for a partial graph.
    pub fn build(
        &self,
        entry: &ModuleId,
        reporter: &mut dyn BuildReporter,
    ) -> BuildResult<BundleGraph> {
        reporter.entry(entry);

        let mut graph = BundleGraph::default();
        // Pending ids with the module that first requested them
        let mut queue: VecDeque<(ModuleId, Option<ModuleId>)> = VecDeque::new();
        let mut visited: FxHashSet<ModuleId> = FxHashSet::default();

        queue.push_back((entry.clone(), None));
        visited.insert(entry.clone());

        while let Some((id, importer)) = queue.pop_front() {
            reporter.processing(&id);

            let source =
                fs::read_to_string(id.as_path()).map_err(|source| BuildError::Resolution {
                    id: id.clone(),
                    importer,
                    source,
                })?;

            let analysis = self
                .analyzer
                .analyze(&source, &id)
                .map_err(|source| BuildError::Analysis {
                    id: id.clone(),
                    source,
                })?;

            for skipped in analysis.skipped {
                reporter.warning(&skipped);
                graph.skipped.push(skipped);
            }

            for dependency in &analysis.dependencies {
                if visited.insert(dependency.clone()) {
                    reporter.dependency_found(&id, dependency);
                    queue.push_back((dependency.clone(), Some(id.clone())));
                }
            }

            graph.modules.push(ModuleDescriptor {
                id,
                dependencies: analysis.dependencies,
                body: analysis.body,
            });
        }

        reporter.graph_built(graph.len());
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{BuildEvent, RecordingReporter, SilentReporter};
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, name: &str, source: &str) -> ModuleId {
        let path = root.join(name);
        fs::write(&path, source).unwrap();
        ModuleId::new(path)
    }

    fn build(entry: &ModuleId) -> BuildResult<BundleGraph> {
        GraphBuilder::<EsAnalyzer>::default().build(entry, &mut SilentReporter)
    }

    #[test]
    fn test_single_module() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.js", "console.log('a');\n");

        let graph = build(&a).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.modules[0].id, a);
        assert!(graph.modules[0].dependencies.is_empty());
    }

    #[test]
    fn test_breadth_first_order() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.js", "import './b';\nimport './c';\n");
        let b = write(temp.path(), "b.js", "import './d';\n");
        let c = write(temp.path(), "c.js", "import './d';\n");
        let d = write(temp.path(), "d.js", "export const d = 1;\n");

        let graph = build(&a).unwrap();
        let order: Vec<&ModuleId> = graph.ids().collect();
        assert_eq!(order, vec![&a, &b, &c, &d]);
    }

    #[test]
    fn test_chain_order() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.js", "require('./b');\n");
        let b = write(temp.path(), "b.js", "require('./c');\n");
        let c = write(temp.path(), "c.js", "module.exports = 1;\n");

        let graph = build(&a).unwrap();
        assert_eq!(graph.ids().cloned().collect::<Vec<_>>(), vec![a, b, c]);
    }

    #[test]
    fn test_cycle_terminates() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.js", "require('./b');\n");
        let b = write(temp.path(), "b.js", "require('./a');\n");

        let graph = build(&a).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.get(&b).unwrap().dependencies, vec![a.clone()]);
    }

    #[test]
    fn test_self_import() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.js", "require('./a.js');\n");

        let graph = build(&a).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.modules[0].dependencies, vec![a]);
    }

    #[test]
    fn test_duplicate_dependencies_preserved() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.js", "require('./b');\nrequire('./b.js');\n");
        let b = write(temp.path(), "b.js", "");

        let graph = build(&a).unwrap();
        assert_eq!(graph.modules[0].dependencies, vec![b.clone(), b]);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_non_relative_skipped() {
        let temp = TempDir::new().unwrap();
        let a = write(
            temp.path(),
            "a.js",
            "import React from 'react';\nconst _ = require('lodash');\nrequire('lodash');\n",
        );

        let mut reporter = RecordingReporter::default();
        let graph = GraphBuilder::new(EsAnalyzer).build(&a, &mut reporter).unwrap();

        assert_eq!(graph.len(), 1);
        assert!(graph.modules[0].dependencies.is_empty());
        assert_eq!(graph.skipped.len(), 3);
        assert_eq!(reporter.warnings().len(), 3);
    }

    #[test]
    fn test_missing_dependency_is_resolution_error() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.js", "import './missing';\n");

        match build(&a) {
            Err(BuildError::Resolution { id, importer, .. }) => {
                assert_eq!(id, ModuleId::new(temp.path().join("missing.js")));
                assert_eq!(importer, Some(a));
            }
            other => panic!("expected resolution error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_entry_is_resolution_error() {
        let temp = TempDir::new().unwrap();
        let entry = ModuleId::new(temp.path().join("nope.js"));

        assert!(matches!(
            build(&entry),
            Err(BuildError::Resolution { importer: None, .. })
        ));
    }

    #[test]
    fn test_parse_failure_names_module() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.js", "require('./b');\n");
        let b = write(temp.path(), "b.js", "export {;\n");

        match build(&a) {
            Err(err @ BuildError::Analysis { .. }) => {
                assert!(err.to_string().contains(&b.to_string()));
            }
            other => panic!("expected analysis error, got {:?}", other),
        }
    }

    #[test]
    fn test_progress_events() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.js", "require('./b');\nrequire('./b');\n");
        let b = write(temp.path(), "b.js", "require('./a');\n");

        let mut reporter = RecordingReporter::default();
        GraphBuilder::new(EsAnalyzer).build(&a, &mut reporter).unwrap();

        assert_eq!(
            reporter.events,
            vec![
                BuildEvent::Entry(a.clone()),
                BuildEvent::Processing(a.clone()),
                BuildEvent::DependencyFound {
                    importer: a.clone(),
                    dependency: b.clone(),
                },
                BuildEvent::Processing(b),
                BuildEvent::GraphBuilt(2),
            ]
        );
    }
}
