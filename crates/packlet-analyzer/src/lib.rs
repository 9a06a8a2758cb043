//! Packlet Source Analyzer
//!
//! Turns one JavaScript file into what the bundler needs from it:
//! - **Parsing**: lexer and module-level parser (`lexer`, `parser`)
//! - **Dependencies**: relative requests resolved to [`ModuleId`]s (`deps`)
//! - **Transform**: the file rewritten as a `(require, module, exports)`
//!   body (`transform`), with imported names resolved per scope (`scope`)
//!
//! # Example
//!
//! ```rust,ignore
//! use packlet_analyzer::{EsAnalyzer, ModuleId, SourceAnalyzer};
//!
//! let owner = ModuleId::new("/project/src/index.js");
//! let analysis = EsAnalyzer.analyze("import { add } from './math';", &owner)?;
//! assert_eq!(analysis.dependencies, vec![ModuleId::new("/project/src/math.js")]);
//! ```

#![warn(rust_2018_idioms)]

pub mod analyzer;
pub mod deps;
pub mod id;
pub mod lexer;
pub mod parser;
mod scope;
pub mod token;
pub mod transform;

pub use analyzer::{Analysis, AnalyzeError, EsAnalyzer, SourceAnalyzer};
pub use deps::{extract_dependencies, Dependencies, SkippedImport};
pub use id::{is_relative_specifier, normalize, resolve_specifier, ModuleId, DEFAULT_EXTENSION};
pub use lexer::{LexError, Lexer};
pub use parser::{parse, ModuleItem, ParseError, Program};
pub use token::{Lexeme, Span, Token};
pub use transform::{quote_js_string, transform, TransformError};
