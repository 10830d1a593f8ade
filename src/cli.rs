//! CLI front-end: a thin translation layer from command-line flags to
//! [`crate::config::LinkerConfig`]. Scanning, linking, and analysis all live
//! in the library; this module only parses argv and renders output.

use std::fmt;

use camino::Utf8PathBuf;
use clap::Parser;

use crate::config::LinkerConfig;

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

#[derive(Parser)]
#[command(name = "cairo-linker")]
#[command(author = "Nethermind")]
#[command(version)]
#[command(about = "Static symbol linker and CFG/dataflow analyzer for Cairo source trees")]
#[command(long_about = "
Scans one or more directories for `.cairo` source files, recovers their
declared structure without invoking the Cairo compiler, links cross-file
imports against a symbol table, and — when --analyze is set — builds a
control-flow graph and runs dataflow analysis over every function with a
body.

Examples:
  # Link a single project, stubbing unresolved imports
  cairo-linker src/

  # Fail instead of stubbing, and run dataflow analysis
  cairo-linker --no-stub --analyze src/

  # Emit YAML instead of JSON
  cairo-linker --format yaml src/
")]
pub struct Args {
    /// One or more directories to scan for `.cairo` files
    #[arg(required = true, value_hint = clap::ValueHint::DirPath)]
    pub roots: Vec<Utf8PathBuf>,

    /// Fail on unresolved imports instead of synthesizing stub modules
    #[arg(long, default_value_t = false)]
    pub no_stub: bool,

    /// Include files under `tests/`, `test_*.cairo`, `*_test.cairo` that are
    /// excluded by default
    #[arg(long, default_value_t = false)]
    pub include_tests: bool,

    /// Build CFGs and run the dataflow analyzer over every function body
    #[arg(long, default_value_t = false)]
    pub analyze: bool,

    /// Cap on the number of entry-to-exit paths enumerated per CFG
    #[arg(long, value_name = "N", default_value_t = 100)]
    pub max_paths: usize,

    /// Output format for the report
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

impl Args {
    pub fn to_config(&self) -> LinkerConfig {
        LinkerConfig {
            stub_missing: !self.no_stub,
            exclude_tests: !self.include_tests,
            analyze: self.analyze,
            max_paths: self.max_paths,
        }
    }
}
