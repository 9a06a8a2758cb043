//! Runtime semantics of emitted bundles
//!
//! Each test bundles a small project and executes the artifact with `node`.
//! Tests return early when `node` is not installed.

use packlet_engine::{BodyStyle, BundleSummary, Bundler, ResolvedConfig, SilentReporter};
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn node_available() -> bool {
    Command::new("node")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn project(files: &[(&str, &str)]) -> TempDir {
    let temp = TempDir::new().unwrap();
    for (name, source) in files {
        let path = temp.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, source).unwrap();
    }
    temp
}

fn bundle(root: &Path, entry: &str, style: BodyStyle) -> BundleSummary {
    let config = ResolvedConfig {
        entry: root.join(entry),
        output_dir: root.join("dist"),
        filename: "bundle.js".to_string(),
        style,
    };
    Bundler::new(config).run(&mut SilentReporter).unwrap()
}

/// Run the artifact and return its stdout; panics with stderr on failure.
fn execute(summary: &BundleSummary) -> String {
    let output = Command::new("node").arg(&summary.output).output().unwrap();
    assert!(
        output.status.success(),
        "bundle failed:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn test_single_module_runs_once() {
    if !node_available() {
        return;
    }
    let temp = project(&[("a.js", "console.log('A');\n")]);

    let summary = bundle(temp.path(), "a.js", BodyStyle::Function);
    assert_eq!(summary.modules, 1);
    assert_eq!(execute(&summary), "A\n");
}

#[test]
fn test_nested_requires_complete_inner_first() {
    if !node_available() {
        return;
    }
    let temp = project(&[
        ("a.js", "console.log('A start');\nrequire('./b');\nconsole.log('A end');\n"),
        ("b.js", "console.log('B start');\nrequire('./c');\nconsole.log('B end');\n"),
        ("c.js", "console.log('C');\n"),
    ]);

    let summary = bundle(temp.path(), "a.js", BodyStyle::Function);
    assert_eq!(summary.modules, 3);
    assert_eq!(
        execute(&summary),
        "A start\nB start\nC\nB end\nA end\n"
    );
}

#[test]
fn test_cycle_sees_partial_exports() {
    if !node_available() {
        return;
    }
    let temp = project(&[
        (
            "a.js",
            r#"console.log('a start');
exports.name = 'a';
const b = require('./b');
console.log('a: same=' + (b.a === exports));
exports.done = true;
"#,
        ),
        (
            "b.js",
            r#"const a = require('./a');
console.log('b: name=' + a.name + ' done=' + a.done);
exports.a = a;
"#,
        ),
    ]);

    let summary = bundle(temp.path(), "a.js", BodyStyle::Function);
    assert_eq!(summary.modules, 2);
    assert_eq!(
        execute(&summary),
        "a start\nb: name=a done=undefined\na: same=true\n"
    );
}

#[test]
fn test_cached_module_is_same_object() {
    if !node_available() {
        return;
    }
    let temp = project(&[
        (
            "main.js",
            "const x = require('./counter');\nconst y = require('./counter.js');\nx.count++;\nconsole.log(x === y, y.count);\n",
        ),
        ("counter.js", "console.log('counter init');\nmodule.exports = { count: 0 };\n"),
    ]);

    let summary = bundle(temp.path(), "main.js", BodyStyle::Function);
    assert_eq!(execute(&summary), "counter init\ntrue 1\n");
}

#[test]
fn test_failed_module_is_evicted() {
    if !node_available() {
        return;
    }
    let temp = project(&[
        (
            "main.js",
            r#"try {
  require('./flaky');
} catch (e) {
  console.log('caught ' + e.message);
}
console.log('attempts ' + require('./flaky').attempts);
"#,
        ),
        (
            "flaky.js",
            r#"globalThis.__attempts = (globalThis.__attempts || 0) + 1;
if (globalThis.__attempts === 1) throw new Error('boom');
module.exports = { attempts: globalThis.__attempts };
"#,
        ),
    ]);

    let summary = bundle(temp.path(), "main.js", BodyStyle::Function);
    assert_eq!(execute(&summary), "caught boom\nattempts 2\n");
}

#[test]
fn test_package_import_not_bundled() {
    if !node_available() {
        return;
    }
    let temp = project(&[(
        "main.js",
        r#"try {
  require('left-pad');
} catch (e) {
  console.log(e.code + ': ' + e.message);
}
"#,
    )]);

    let summary = bundle(temp.path(), "main.js", BodyStyle::Function);
    assert_eq!(summary.warnings, 1);
    assert_eq!(
        execute(&summary),
        "MODULE_NOT_FOUND: Cannot find module 'left-pad'\n"
    );
}

#[test]
fn test_es_modules() {
    if !node_available() {
        return;
    }
    let temp = project(&[
        (
            "src/index.js",
            r#"import { config, getMessage } from './message.js';
import { capitalize, formatMessage } from './utils';
import * as utils from './utils';
import greet from './greet';

function main() {
  console.log(formatMessage(capitalize(getMessage())));
  console.log(`${config.name} ${config.version}`);
  console.log(typeof utils.capitalize, greet('bundle'));
}

main();

export { main };
"#,
        ),
        (
            "src/message.js",
            r#"export function getMessage() {
  return 'hello from packlet';
}

export const config = {
  name: 'packlet',
  version: '1.0.0'
};
"#,
        ),
        (
            "src/utils.js",
            r#"export function formatMessage(message) {
  return `[msg] ${message}`;
}

export const capitalize = (str) => str.charAt(0).toUpperCase() + str.slice(1);
"#,
        ),
        ("src/greet.js", "export default function greet(name) {\n  return `hi ${name}`;\n}\n"),
    ]);

    let expected = "[msg] Hello from packlet\npacklet 1.0.0\nfunction hi bundle\n";
    let summary = bundle(temp.path(), "src/index.js", BodyStyle::Function);
    assert_eq!(summary.modules, 4);
    assert_eq!(execute(&summary), expected);

    let summary = bundle(temp.path(), "src/index.js", BodyStyle::Eval);
    assert_eq!(execute(&summary), expected);
}

#[test]
fn test_es_module_cycle_with_functions() {
    if !node_available() {
        return;
    }
    let temp = project(&[
        (
            "main.js",
            r#"import { callB, funcA } from './circular-a.js';
import { callA, funcB } from './circular-b.js';

console.log(funcA(), funcB(), callB(), callA());
"#,
        ),
        (
            "circular-a.js",
            r#"import { funcB } from './circular-b.js';

export function funcA() {
  return 'A';
}

export function callB() {
  return 'A->' + funcB();
}
"#,
        ),
        (
            "circular-b.js",
            r#"import { funcA } from './circular-a.js';

export function funcB() {
  return 'B';
}

export function callA() {
  return 'B->' + funcA();
}
"#,
        ),
    ]);

    let summary = bundle(temp.path(), "main.js", BodyStyle::Function);
    assert_eq!(summary.modules, 3);
    assert_eq!(execute(&summary), "A B A->B B->A\n");
}

#[test]
fn test_default_interop_and_reexports() {
    if !node_available() {
        return;
    }
    let temp = project(&[
        (
            "main.js",
            r#"import legacy from './legacy';
import answer, { twice, ns, value } from './facade';

console.log(legacy.kind, answer, twice(value), Object.keys(ns).join(','));
"#,
        ),
        ("legacy.js", "module.exports = { kind: 'cjs' };\n"),
        (
            "facade.js",
            r#"export * from './math';
export * as ns from './math';
export { default } from './answer';
"#,
        ),
        ("math.js", "export const value = 21;\nexport function twice(n) { return n * 2; }\n"),
        ("answer.js", "export default 42;\n"),
    ]);

    let summary = bundle(temp.path(), "main.js", BodyStyle::Function);
    assert_eq!(execute(&summary), "cjs 42 42 value,twice\n");
}

#[test]
fn test_es_module_cycle_reads_const_export() {
    if !node_available() {
        return;
    }
    let temp = project(&[
        (
            "a.js",
            "import { b } from './b';\nexport const a = 'A';\nconsole.log(b());\n",
        ),
        (
            "b.js",
            "import { a } from './a';\nexport function b() {\n  return 'b sees ' + a;\n}\n",
        ),
    ]);

    for style in [BodyStyle::Function, BodyStyle::Eval] {
        let summary = bundle(temp.path(), "a.js", style);
        assert_eq!(execute(&summary), "b sees A\n");
    }
}

#[test]
fn test_named_imports_are_live() {
    if !node_available() {
        return;
    }
    let temp = project(&[
        (
            "main.js",
            r#"import { count, inc } from './counter';
import * as counter from './counter';
console.log(count);
inc();
inc();
console.log(count, counter.count);
const copy = { count };
console.log(copy.count);
"#,
        ),
        (
            "counter.js",
            "export let count = 0;\nexport function inc() {\n  count += 1;\n}\n",
        ),
    ]);

    let summary = bundle(temp.path(), "main.js", BodyStyle::Function);
    assert_eq!(execute(&summary), "0\n2 2\n2\n");
}

#[test]
fn test_local_bindings_shadow_imports() {
    if !node_available() {
        return;
    }
    let temp = project(&[
        (
            "main.js",
            r#"import { name } from './name';
function greet(name) {
  return 'hi ' + name;
}
const pick = (list) => list.map((name) => name.toUpperCase());
console.log(greet('local'), pick(['x']).join(), name);
"#,
        ),
        ("name.js", "export const name = 'imported';\n"),
    ]);

    let summary = bundle(temp.path(), "main.js", BodyStyle::Function);
    assert_eq!(execute(&summary), "hi local X imported\n");
}

#[test]
fn test_eval_style_allows_top_level_return() {
    if !node_available() {
        return;
    }
    let temp = project(&[
        ("main.js", "console.log(require('./early').state);\n"),
        (
            "early.js",
            "module.exports = { state: 'early' };\nif (module.exports) return;\nmodule.exports.state = 'late';\n",
        ),
    ]);

    for style in [BodyStyle::Function, BodyStyle::Eval] {
        let summary = bundle(temp.path(), "main.js", style);
        assert_eq!(execute(&summary), "early\n");
    }
}

#[test]
fn test_hashbang_entry() {
    if !node_available() {
        return;
    }
    let temp = project(&[("cli.js", "#!/usr/bin/env node\nconsole.log('ok');\n")]);

    let summary = bundle(temp.path(), "cli.js", BodyStyle::Function);
    assert_eq!(execute(&summary), "ok\n");
}
