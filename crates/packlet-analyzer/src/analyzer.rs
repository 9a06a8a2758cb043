//! The analyzer seam consumed by the graph builder.

use thiserror::Error;

use crate::deps::{extract_dependencies, Dependencies, SkippedImport};
use crate::id::ModuleId;
use crate::parser::{parse, ParseError, Program};
use crate::transform::{transform, TransformError};

/// Failure to analyze one module.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyzeError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),
}

/// Everything the graph builder needs from one module.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub dependencies: Vec<ModuleId>,
    pub skipped: Vec<SkippedImport>,
    pub body: String,
}

/// Converts source text into dependencies and an executable body.
pub trait SourceAnalyzer {
    type Ast;

    fn parse(&self, text: &str) -> Result<Self::Ast, ParseError>;

    /// Resolved dependencies of `owner` in source order, plus the
    /// non-relative requests that were left out.
    fn extract_dependencies(&self, ast: &Self::Ast, owner: &ModuleId) -> Dependencies;

    /// Rewrite the module into a `(require, module, exports)` body whose
    /// requests refer to normalized identifiers.
    fn transform(
        &self,
        ast: &Self::Ast,
        owner: &ModuleId,
        dependencies: &[ModuleId],
    ) -> Result<String, TransformError>;

    /// Parse, extract and transform in one go.
    fn analyze(&self, text: &str, owner: &ModuleId) -> Result<Analysis, AnalyzeError> {
        let ast = self.parse(text)?;
        let Dependencies { ids, skipped } = self.extract_dependencies(&ast, owner);
        let body = self.transform(&ast, owner, &ids)?;
        Ok(Analysis {
            dependencies: ids,
            skipped,
            body,
        })
    }
}

/// Analyzer for JavaScript modules (ES module syntax and CommonJS).
#[derive(Debug, Clone, Copy, Default)]
pub struct EsAnalyzer;

impl SourceAnalyzer for EsAnalyzer {
    type Ast = Program;

    fn parse(&self, text: &str) -> Result<Program, ParseError> {
        parse(text)
    }

    fn extract_dependencies(&self, ast: &Program, owner: &ModuleId) -> Dependencies {
        extract_dependencies(ast, owner)
    }

    fn transform(
        &self,
        ast: &Program,
        owner: &ModuleId,
        dependencies: &[ModuleId],
    ) -> Result<String, TransformError> {
        transform(ast, owner, dependencies)
    }
}
