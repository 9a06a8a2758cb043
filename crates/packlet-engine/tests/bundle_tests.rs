//! End-to-end bundling tests
//!
//! Config file on disk -> merged config -> artifact on disk.

use packlet_engine::{
    BuildError, BuildEvent, Bundler, BundlerConfig, ConfigError, ConfigOverrides, ModuleId,
    RecordingReporter, SilentReporter,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(root: &Path, name: &str, source: &str) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, source).unwrap();
}

/// Quoted module keys in emission order.
fn artifact_keys(artifact: &str) -> Vec<String> {
    artifact
        .lines()
        .filter_map(|line| line.strip_suffix(": function (require, module, exports) {"))
        .map(|key| key.trim_matches('"').to_string())
        .collect()
}

#[test]
fn test_bundle_from_config_file() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "packlet.toml",
        "entry = './src/index.js'\n\n[output]\npath = './build'\nfilename = 'app.js'\n",
    );
    write(temp.path(), "src/index.js", "import { a } from './a';\nimport './b';\nconsole.log(a);\n");
    write(temp.path(), "src/a.js", "export const a = require('./shared');\n");
    write(temp.path(), "src/b.js", "require('./shared');\n");
    write(temp.path(), "src/shared.js", "module.exports = 'shared';\n");

    let config = BundlerConfig::load(None, temp.path())
        .unwrap()
        .merge(ConfigOverrides::default())
        .resolve(temp.path())
        .unwrap();
    let summary = Bundler::new(config).run(&mut SilentReporter).unwrap();

    assert_eq!(summary.output, temp.path().join("build/app.js"));
    assert_eq!(summary.modules, 4);

    let artifact = fs::read_to_string(&summary.output).unwrap();
    let src = temp.path().join("src");
    let expected: Vec<String> = ["index.js", "a.js", "b.js", "shared.js"]
        .iter()
        .map(|name| ModuleId::new(src.join(name)).key())
        .collect();
    assert_eq!(artifact_keys(&artifact), expected);
}

#[test]
fn test_cli_overrides_beat_config_file() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "packlet.toml", "entry = './missing.js'\n");
    write(temp.path(), "real.js", "console.log('real');\n");

    let config = BundlerConfig::load(None, temp.path())
        .unwrap()
        .merge(ConfigOverrides {
            entry: Some(PathBuf::from("real.js")),
            filename: Some("out.js".to_string()),
            ..Default::default()
        })
        .resolve(temp.path())
        .unwrap();
    let summary = Bundler::new(config).run(&mut SilentReporter).unwrap();

    assert_eq!(summary.output, temp.path().join("dist/out.js"));
    assert_eq!(summary.modules, 1);
}

#[test]
fn test_missing_entry_before_any_discovery() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "packlet.toml", "[output]\npath = './out'\n");

    let err = BundlerConfig::load(None, temp.path())
        .unwrap()
        .merge(ConfigOverrides::default())
        .resolve(temp.path())
        .unwrap_err();

    assert!(matches!(err, ConfigError::MissingEntry));
    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_package_imports_excluded_with_warnings() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "index.js",
        "import React from 'react';\nimport { x } from './x';\nconst r = require('react');\n",
    );
    write(temp.path(), "x.js", "export const x = 1;\n");

    let config = BundlerConfig::default()
        .merge(ConfigOverrides {
            entry: Some(PathBuf::from("index.js")),
            ..Default::default()
        })
        .resolve(temp.path())
        .unwrap();
    let mut reporter = RecordingReporter::default();
    let summary = Bundler::new(config).run(&mut reporter).unwrap();

    assert_eq!(summary.modules, 2);
    assert_eq!(summary.warnings, 2);
    let warnings = reporter.warnings();
    let warned: Vec<(&str, u32)> = warnings
        .iter()
        .map(|w| (w.specifier.as_str(), w.line))
        .collect();
    assert_eq!(warned, vec![("react", 1), ("react", 3)]);

    let artifact = fs::read_to_string(&summary.output).unwrap();
    assert!(artifact_keys(&artifact).iter().all(|key| !key.contains("react")));
    assert!(matches!(
        reporter.events.last(),
        Some(BuildEvent::BundleWritten { bytes, .. }) if *bytes == summary.bytes
    ));
}

#[test]
fn test_analysis_error_names_module() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "index.js", "import './bad';\n");
    write(temp.path(), "bad.js", "const s = `unterminated;\n");

    let config = BundlerConfig::default()
        .merge(ConfigOverrides {
            entry: Some(PathBuf::from("index.js")),
            ..Default::default()
        })
        .resolve(temp.path())
        .unwrap();
    let err = Bundler::new(config).run(&mut SilentReporter).unwrap_err();

    assert!(matches!(err, BuildError::Analysis { .. }));
    assert!(err.to_string().contains("bad.js"), "got: {}", err);
    assert!(!temp.path().join("dist").exists());
}

#[test]
fn test_bundle_demo_project() {
    let demo = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/basic");
    let out = TempDir::new().unwrap();

    let config = BundlerConfig::load(None, &demo)
        .unwrap()
        .merge(ConfigOverrides {
            output_path: Some(out.path().to_path_buf()),
            ..Default::default()
        })
        .resolve(&demo)
        .unwrap();
    let summary = Bundler::new(config).run(&mut SilentReporter).unwrap();

    // index, message, utils, ping, pong (ping and pong import each other)
    assert_eq!(summary.modules, 5);
    assert_eq!(summary.warnings, 0);
    assert!(summary.output.starts_with(out.path()));
}
