//! `packlet`: bundle an entry module and its relative imports.

use std::path::{Path, PathBuf};

use packlet_engine::{
    BodyStyle, BuildReporter, BuildResult, BundleSummary, Bundler, BundlerConfig, ConfigError,
    ConfigOverrides, ModuleId, ResolvedConfig, SkippedImport,
};

use crate::output::StyledOutput;

/// Options collected from the command line
#[derive(Debug, Default)]
pub struct BundleArgs {
    pub config: Option<PathBuf>,
    pub entry: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub filename: Option<String>,
    pub style: Option<BodyStyle>,
    pub quiet: bool,
}

pub fn execute(args: BundleArgs, out: &mut StyledOutput) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().map_err(ConfigError::WorkingDirectory)?;
    let quiet = args.quiet;
    let config = resolve_config(args, &cwd)?;

    let mut reporter = TerminalReporter {
        out,
        cwd: &cwd,
        quiet,
    };
    reporter.configuration(&config);

    let summary = Bundler::new(config).run(&mut reporter)?;
    reporter.finished(&summary);
    Ok(())
}

/// Config file merged with the command-line overrides. Fails before any
/// module is read.
fn resolve_config(args: BundleArgs, cwd: &Path) -> BuildResult<ResolvedConfig> {
    let config = BundlerConfig::load(args.config.as_deref(), cwd)?
        .merge(ConfigOverrides {
            entry: args.entry,
            output_path: args.output,
            filename: args.filename,
            style: args.style,
        })
        .resolve(cwd)?;
    Ok(config)
}

/// Prints build progress to the terminal.
struct TerminalReporter<'a> {
    out: &'a mut StyledOutput,
    cwd: &'a Path,
    quiet: bool,
}

impl TerminalReporter<'_> {
    /// Path relative to the working directory when it is inside it.
    fn display(&self, path: &Path) -> String {
        path.strip_prefix(self.cwd)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    fn detail(&mut self, label: &str, value: &str) {
        if self.quiet {
            return;
        }
        self.out.dim(label);
        self.out.plain(value);
        self.out.newline();
    }

    fn configuration(&mut self, config: &ResolvedConfig) {
        if self.quiet {
            return;
        }
        self.out.bold("Configuration");
        self.out.newline();
        let entry = self.display(&config.entry);
        let output = self.display(&config.output_file());
        self.detail("  entry:  ", &entry);
        self.detail("  output: ", &output);
        self.out.newline();
    }

    fn finished(&mut self, summary: &BundleSummary) {
        if !self.quiet {
            self.out.success("Build complete");
            if summary.warnings > 0 {
                let noun = if summary.warnings == 1 { "warning" } else { "warnings" };
                self.out.warning(&format!(" ({} {})", summary.warnings, noun));
            }
            self.out.newline();
        }
        self.out.flush();
    }
}

impl BuildReporter for TerminalReporter<'_> {
    fn entry(&mut self, entry: &ModuleId) {
        let entry = self.display(entry.as_path());
        self.detail("Entry: ", &entry);
    }

    fn processing(&mut self, id: &ModuleId) {
        if self.quiet {
            return;
        }
        self.out.info("Processing: ");
        let path = self.display(id.as_path());
        self.out.plain(&path);
        self.out.newline();
    }

    fn dependency_found(&mut self, _importer: &ModuleId, dependency: &ModuleId) {
        let dependency = self.display(dependency.as_path());
        self.detail("  Found dependency: ", &dependency);
    }

    fn warning(&mut self, skipped: &SkippedImport) {
        let owner = self.display(skipped.owner.as_path());
        self.out.stderr_warning(&format!(
            "Skipping non-relative import '{}' in {}:{}",
            skipped.specifier, owner, skipped.line
        ));
    }

    fn graph_built(&mut self, modules: usize) {
        if self.quiet {
            return;
        }
        self.out.newline();
        let noun = if modules == 1 { "module" } else { "modules" };
        self.out.plain(&format!("Bundled {} {}", modules, noun));
        self.out.newline();
    }

    fn bundle_written(&mut self, path: &Path, bytes: usize) {
        let path = self.display(path);
        self.detail("Output: ", &path);
        self.detail("Size:   ", &format_size(bytes));
    }
}

/// Size in kilobytes with two decimals.
fn format_size(bytes: usize) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use packlet_engine::BuildError;
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(100), "0.10 KB");
    }

    #[test]
    fn test_config_failures_are_build_errors() {
        let temp = TempDir::new().unwrap();

        let err = resolve_config(BundleArgs::default(), temp.path()).unwrap_err();
        assert!(matches!(err, BuildError::Config(ConfigError::MissingEntry)));

        let args = BundleArgs {
            config: Some(PathBuf::from("missing.toml")),
            ..Default::default()
        };
        let err = resolve_config(args, temp.path()).unwrap_err();
        assert!(matches!(err, BuildError::Config(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_overrides_applied() {
        let temp = TempDir::new().unwrap();
        let args = BundleArgs {
            entry: Some(PathBuf::from("main.js")),
            filename: Some("app.js".to_string()),
            style: Some(BodyStyle::Eval),
            ..Default::default()
        };

        let config = resolve_config(args, temp.path()).unwrap();
        assert_eq!(config.entry, temp.path().join("main.js"));
        assert_eq!(config.output_file(), temp.path().join("dist/app.js"));
        assert_eq!(config.style, BodyStyle::Eval);
    }
}
