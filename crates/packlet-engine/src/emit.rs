//! Runtime emitter
//!
//! Serializes module descriptors into one self-invoking script. The loader
//! below is a small CommonJS implementation: a per-artifact cache, module
//! records registered before their body runs (so cycles see the partial
//! exports), and eviction when a body throws.

use packlet_analyzer::{quote_js_string, ModuleId};

use crate::config::BodyStyle;
use crate::error::EmitError;
use crate::graph::ModuleDescriptor;

const RUNTIME_PRELUDE: &str = r#"(function (modules) {
  var cache = {};
  var hasOwn = Object.prototype.hasOwnProperty;

  function require(id) {
    if (hasOwn.call(cache, id)) {
      return cache[id].exports;
    }
    if (!hasOwn.call(modules, id)) {
      var error = new Error("Cannot find module '" + id + "'");
      error.code = "MODULE_NOT_FOUND";
      throw error;
    }
    var module = { id: id, exports: {} };
    cache[id] = module;
    try {
      modules[id].call(module.exports, require, module, module.exports);
    } catch (error) {
      delete cache[id];
      throw error;
    }
    return module.exports;
  }

"#;

const MODULE_PARAMS: &str = "function (require, module, exports) {\n";

/// Produces the bundle artifact text
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeEmitter {
    style: BodyStyle,
}

impl RuntimeEmitter {
    pub fn new(style: BodyStyle) -> Self {
        Self { style }
    }

    /// Emit the artifact for `modules`, ending with `require(entry)`.
    ///
    /// Module entries keep the order of `modules`.
    pub fn emit(&self, modules: &[ModuleDescriptor], entry: &ModuleId) -> Result<String, EmitError> {
        if !modules.iter().any(|module| &module.id == entry) {
            return Err(EmitError::EntryNotBundled(entry.clone()));
        }

        let capacity = RUNTIME_PRELUDE.len()
            + modules
                .iter()
                .map(|module| module.body.len() + module.id.key().len() * 2 + 64)
                .sum::<usize>();
        let mut out = String::with_capacity(capacity);

        out.push_str(RUNTIME_PRELUDE);
        out.push_str("  return require(");
        out.push_str(&quote_js_string(&entry.key()));
        out.push_str(");\n})({\n");

        for (i, module) in modules.iter().enumerate() {
            if i > 0 {
                out.push_str(",\n");
            }
            self.emit_module(module, &mut out);
        }

        out.push_str("\n});\n");
        Ok(out)
    }

    fn emit_module(&self, module: &ModuleDescriptor, out: &mut String) {
        let key = module.id.key();
        out.push_str(&quote_js_string(&key));
        out.push_str(": ");

        match self.style {
            BodyStyle::Function => {
                out.push_str(MODULE_PARAMS);
                out.push_str(&module.body);
                // A trailing line comment must not swallow the closing brace
                if !module.body.ends_with('\n') {
                    out.push('\n');
                }
                out.push('}');
            }
            BodyStyle::Eval => {
                // The whole function is compiled, so a top-level `return` in a
                // CommonJS body stays legal. Indirect eval keeps the loader's
                // locals out of the module's scope.
                let source = format!(
                    "({}{}\n}})\n//# sourceURL={}",
                    MODULE_PARAMS, module.body, key
                );
                out.push_str("(0, eval)(");
                out.push_str(&quote_js_string(&source));
                out.push(')');
            }
        }
    }
}
