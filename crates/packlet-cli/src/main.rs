//! Packlet command-line bundler
//!
//! Reads `packlet.toml` (if present), applies command-line overrides,
//! bundles the entry module and writes the artifact.

mod commands;
mod output;

use clap::{Parser, ValueEnum};
use packlet_engine::BodyStyle;
use std::path::PathBuf;

use commands::bundle::{self, BundleArgs};
use output::{resolve_color_choice, StyledOutput};

#[derive(Parser)]
#[command(name = "packlet")]
#[command(about = "Bundle a JavaScript program and its relative imports into one file", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: packlet.toml in the working directory, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Entry source file
    #[arg(short, long)]
    entry: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output file name
    #[arg(short, long)]
    filename: Option<String>,

    /// How module bodies are embedded in the bundle
    #[arg(long, value_enum)]
    style: Option<StyleArg>,

    /// Colorize output
    #[arg(long, value_parser = ["auto", "always", "never"])]
    color: Option<String>,

    /// Only print warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StyleArg {
    /// Module bodies as function statements
    Function,
    /// Module bodies as eval'd strings with sourceURL comments
    Eval,
}

impl From<StyleArg> for BodyStyle {
    fn from(style: StyleArg) -> Self {
        match style {
            StyleArg::Function => BodyStyle::Function,
            StyleArg::Eval => BodyStyle::Eval,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let mut out = StyledOutput::new(resolve_color_choice(cli.color.as_deref()));

    let args = BundleArgs {
        config: cli.config,
        entry: cli.entry,
        output: cli.output,
        filename: cli.filename,
        style: cli.style.map(BodyStyle::from),
        quiet: cli.quiet,
    };

    if let Err(e) = bundle::execute(args, &mut out) {
        out.stderr_error(&e.to_string());
        std::process::exit(1);
    }
}
