//! CommonJS transform.
//!
//! Rewrites a parsed module into a body for the `(require, module, exports)`
//! contract. All edits replace spans recorded by the parser; nothing here
//! searches the text.

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::id::{resolve_specifier, ModuleId};
use crate::parser::{ExportDecl, ImportBinding, ModuleItem, ModuleRequest, Program};
use crate::scope::{find_references, ReferenceKind};
use crate::token::Span;

/// Errors produced while rewriting a module body.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// A relative request resolved to an id missing from the dependency list
    #[error("'{specifier}' resolves to {id}, which is not a known dependency")]
    UnknownDependency { specifier: String, id: ModuleId },

    #[error("Overlapping rewrites at {line}:{column}")]
    OverlappingEdit { line: u32, column: u32 },
}

/// Prefix of the temporaries holding required export objects.
const IMPORT_TEMP: &str = "__packlet_import_";

/// Quote `value` as a JavaScript string literal.
///
/// JSON string syntax is valid JavaScript; U+2028 and U+2029 are escaped as
/// well so the literal is safe in any script context.
pub fn quote_js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string())
        .to_string()
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

/// Rewrite `program` into a module body.
///
/// `dependencies` must contain every relative request the program makes,
/// resolved the same way as [`crate::deps::extract_dependencies`] resolves
/// them.
pub fn transform(
    program: &Program,
    owner: &ModuleId,
    dependencies: &[ModuleId],
) -> Result<String, TransformError> {
    let mut rewriter = Rewriter {
        owner,
        known: dependencies.iter().collect(),
        edits: Vec::new(),
        getters: Vec::new(),
        hoisted: Vec::new(),
        imports: FxHashMap::default(),
        temps: 0,
    };

    rewriter.strip_header(&program.source);
    for item in &program.items {
        rewriter.visit(item)?;
    }
    rewriter.rewrite_references(program);

    let mut out = String::with_capacity(program.source.len() + 256);
    if program.has_module_syntax() {
        out.push_str("\"use strict\";\n");
        out.push_str("Object.defineProperty(exports, \"__esModule\", { value: true });\n");
        for (exported, local) in &rewriter.getters {
            let value = rewriter
                .imports
                .get(local)
                .map_or(local.as_str(), |binding| binding.access.as_str());
            out.push_str(&format!(
                "Object.defineProperty(exports, {}, {{ enumerable: true, get: function () {{ return {}; }} }});\n",
                quote_js_string(exported),
                value
            ));
        }
        for line in &rewriter.hoisted {
            out.push_str(line);
            out.push('\n');
        }
    }
    apply_edits(&program.source, rewriter.edits, &mut out)?;
    Ok(out)
}

struct Edit {
    span: Span,
    text: String,
}

/// Where an imported name is read from.
struct ImportAccess {
    /// Expression yielding the current value
    access: String,
    /// `access` is a property read; calls must not pass its object as `this`
    is_member: bool,
}

struct Rewriter<'a> {
    owner: &'a ModuleId,
    known: FxHashSet<&'a ModuleId>,
    edits: Vec<Edit>,
    /// Exported name and the local it reads, declared before any require
    getters: Vec<(String, String)>,
    /// Requires for import/re-export declarations
    hoisted: Vec<String>,
    /// Imported local names
    imports: FxHashMap<String, ImportAccess>,
    temps: usize,
}

impl<'a> Rewriter<'a> {
    /// Drop the byte order mark and hashbang line; neither is valid inside a
    /// function body.
    fn strip_header(&mut self, source: &str) {
        let mut offset = 0;
        if source.starts_with('\u{feff}') {
            offset = '\u{feff}'.len_utf8();
            self.remove(Span::new(0, offset, 1, 1));
        }
        if source[offset..].starts_with("#!") {
            let end = source[offset..]
                .find('\n')
                .map_or(source.len(), |i| offset + i);
            self.remove(Span::new(offset, end, 1, 1));
        }
    }

    fn visit(&mut self, item: &ModuleItem) -> Result<(), TransformError> {
        match item {
            ModuleItem::Require(request) => {
                // Package requests stay byte-identical
                if let Some(key) = self.resolve(request)? {
                    self.replace(request.span, quote_js_string(&key));
                }
            }
            ModuleItem::Import(decl) => {
                self.remove(decl.span);
                let key = self.request_key(&decl.request)?;
                if decl.bindings.is_empty() {
                    self.hoisted
                        .push(format!("require({});", quote_js_string(&key)));
                    return Ok(());
                }
                let temp = self.require_temp(&key);
                for binding in &decl.bindings {
                    let (local, access, is_member) = match binding {
                        ImportBinding::Default(local) => {
                            let interop = format!("{}_default", temp);
                            self.hoisted.push(format!(
                                "var {interop} = {temp} && {temp}.__esModule ? {temp} : {{ default: {temp} }};"
                            ));
                            (local, format!("{}.default", interop), true)
                        }
                        ImportBinding::Namespace(local) => (local, temp.clone(), false),
                        ImportBinding::Named { imported, local } => {
                            (local, member(&temp, imported), true)
                        }
                    };
                    self.imports
                        .insert(local.clone(), ImportAccess { access, is_member });
                }
            }
            ModuleItem::Export(decl) => self.visit_export(decl)?,
        }
        Ok(())
    }

    fn visit_export(&mut self, decl: &ExportDecl) -> Result<(), TransformError> {
        match decl {
            ExportDecl::Declaration { keyword, names } => {
                self.remove(*keyword);
                for name in names {
                    self.export_getter(name, name.clone());
                }
            }
            ExportDecl::DefaultDeclaration { prefix, name } => {
                self.remove(*prefix);
                self.export_getter("default", name.clone());
            }
            ExportDecl::DefaultExpression { prefix } => {
                self.replace(*prefix, "exports.default =".to_string());
            }
            ExportDecl::Named { span, specifiers } => {
                self.remove(*span);
                for spec in specifiers {
                    self.export_getter(&spec.exported, spec.local.clone());
                }
            }
            ExportDecl::From {
                span,
                specifiers,
                request,
            } => {
                self.remove(*span);
                let key = self.request_key(request)?;
                let temp = self.require_temp(&key);
                for spec in specifiers {
                    self.export_getter(&spec.exported, member(&temp, &spec.local));
                }
            }
            ExportDecl::All { span, request } => {
                self.remove(*span);
                let key = self.request_key(request)?;
                let temp = self.require_temp(&key);
                self.hoisted.push(format!(
                    "Object.keys({temp}).forEach(function (key) {{ \
                     if (key === \"default\" || key === \"__esModule\" || Object.prototype.hasOwnProperty.call(exports, key)) return; \
                     Object.defineProperty(exports, key, {{ enumerable: true, get: function () {{ return {temp}[key]; }} }}); }});"
                ));
            }
            ExportDecl::Namespace {
                span,
                name,
                request,
            } => {
                self.remove(*span);
                let key = self.request_key(request)?;
                let temp = self.require_temp(&key);
                self.export_getter(name, temp);
            }
        }
        Ok(())
    }

    /// Replace every read of an imported name with a read of the exporter's
    /// current value.
    fn rewrite_references(&mut self, program: &Program) {
        if self.imports.is_empty() {
            return;
        }
        let names: FxHashSet<&str> = self.imports.keys().map(String::as_str).collect();
        let references = find_references(program, &names);
        // Tokens inside removed declarations (`export { a }`) are not code
        let rewritten: Vec<Span> = self.edits.iter().map(|edit| edit.span).collect();

        for reference in references {
            let lexeme = &program.tokens[reference.index];
            let start = lexeme.span.start;
            if rewritten.iter().any(|span| span.start <= start && start < span.end) {
                continue;
            }
            let Some(name) = lexeme.token.ident() else {
                continue;
            };
            let Some(binding) = self.imports.get(name) else {
                continue;
            };
            let text = match reference.kind {
                ReferenceKind::Call if binding.is_member => format!("(0, {})", binding.access),
                ReferenceKind::Read | ReferenceKind::Call => binding.access.clone(),
                ReferenceKind::Shorthand => format!("{}: {}", name, binding.access),
            };
            self.replace(lexeme.span, text);
        }
    }

    /// Runtime key for a relative request, `None` for package requests.
    fn resolve(&self, request: &ModuleRequest) -> Result<Option<String>, TransformError> {
        match resolve_specifier(&request.specifier, self.owner) {
            Some(id) if self.known.contains(&id) => Ok(Some(id.key())),
            Some(id) => Err(TransformError::UnknownDependency {
                specifier: request.specifier.clone(),
                id,
            }),
            None => Ok(None),
        }
    }

    /// Runtime key for a request: the normalized id for relative specifiers,
    /// the specifier itself otherwise.
    fn request_key(&self, request: &ModuleRequest) -> Result<String, TransformError> {
        Ok(self
            .resolve(request)?
            .unwrap_or_else(|| request.specifier.clone()))
    }

    fn require_temp(&mut self, key: &str) -> String {
        let temp = format!("{}{}", IMPORT_TEMP, self.temps);
        self.temps += 1;
        self.hoisted
            .push(format!("var {} = require({});", temp, quote_js_string(key)));
        temp
    }

    fn export_getter(&mut self, exported: &str, local: String) {
        self.getters.push((exported.to_string(), local));
    }

    fn remove(&mut self, span: Span) {
        self.replace(span, String::new());
    }

    fn replace(&mut self, span: Span, text: String) {
        self.edits.push(Edit { span, text });
    }
}

/// Property access on `object`, using dot syntax when `name` allows it.
fn member(object: &str, name: &str) -> String {
    let mut chars = name.chars();
    let is_identifier = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');

    if is_identifier {
        format!("{}.{}", object, name)
    } else {
        format!("{}[{}]", object, quote_js_string(name))
    }
}

fn apply_edits(source: &str, mut edits: Vec<Edit>, out: &mut String) -> Result<(), TransformError> {
    edits.sort_by_key(|edit| edit.span.start);

    let mut cursor = 0;
    for edit in edits {
        if edit.span.start < cursor {
            return Err(TransformError::OverlappingEdit {
                line: edit.span.line,
                column: edit.span.column,
            });
        }
        out.push_str(&source[cursor..edit.span.start]);
        out.push_str(&edit.text);
        cursor = edit.span.end;
    }
    out.push_str(&source[cursor..]);
    Ok(())
}
