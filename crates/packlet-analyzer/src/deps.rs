//! Dependency extraction.

use std::fmt;

use crate::id::{resolve_specifier, ModuleId};
use crate::parser::Program;

/// A non-relative specifier left out of the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedImport {
    pub specifier: String,
    pub owner: ModuleId,
    pub line: u32,
}

impl fmt::Display for SkippedImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Skipping non-relative import '{}' in {}:{}",
            self.specifier, self.owner, self.line
        )
    }
}

/// Result of dependency extraction for one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    /// Resolved identifiers in source order, duplicates kept
    pub ids: Vec<ModuleId>,
    /// One entry per non-relative request
    pub skipped: Vec<SkippedImport>,
}

/// Collect the modules `program` loads, resolved against `owner`.
///
/// Import declarations, re-exports and `require("...")` calls are all
/// considered, in the order they appear in the source.
pub fn extract_dependencies(program: &Program, owner: &ModuleId) -> Dependencies {
    let mut deps = Dependencies::default();

    for request in program.requests() {
        match resolve_specifier(&request.specifier, owner) {
            Some(id) => deps.ids.push(id),
            None => deps.skipped.push(SkippedImport {
                specifier: request.specifier.clone(),
                owner: owner.clone(),
                line: request.span.line,
            }),
        }
    }

    deps
}
