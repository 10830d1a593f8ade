//! # cairo-linker
//!
//! A static symbol linker and CFG/dataflow analyzer for Cairo smart-contract
//! source trees. It recovers declared structure (contracts, interfaces,
//! components, modules) with a lexical/regex parser — the Cairo compiler is
//! never invoked — links cross-file imports against a symbol table modeled
//! on a GOT/PLT, and, for functions with bodies, builds control-flow graphs
//! and runs classical dataflow analyses: def-use chains, storage
//! read/write tracking, external-call discovery, and uninitialized-use /
//! dead-definition warnings.
//!
//! This is not a type checker, not a borrow checker, and does not execute
//! anything; it trades soundness for the ability to run over source trees
//! that don't fully resolve or even compile.
//!
//! ## Example
//!
//! ```rust,no_run
//! use camino::Utf8PathBuf;
//! use cairo_linker::config::LinkerConfig;
//! use cairo_linker::pipeline;
//!
//! # fn main() -> cairo_linker::error::Result<()> {
//! let config = LinkerConfig { analyze: true, ..LinkerConfig::default() };
//! let outcome = pipeline::run(&[Utf8PathBuf::from("src")], &config)?;
//! println!("{}", outcome.report.to_json()?);
//! # Ok(())
//! # }
//! ```

/// Control-flow graph construction and derived queries (dominators, path
/// enumeration).
pub mod cfg;

/// Command-line argument parsing and translation to [`config::LinkerConfig`].
pub mod cli;

/// Run configuration shared by the library and the binary.
pub mod config;

/// Reaching-definitions dataflow analysis over a built CFG.
pub mod dataflow;

/// Fatal-error taxonomy.
pub mod error;

/// Import resolution (Pass 2 of the Symbol Table / Linker / Stub Synthesizer
/// pipeline).
pub mod linker;

/// Shared data model for declared entities, statements, and parse results.
pub mod model;

/// Lexical parser (files) and statement parser (function bodies).
pub mod parser;

/// The orchestrator that threads Scan → Parse → Symbol Table → Link/Stub →
/// optional analysis into a [`report::Report`].
pub mod pipeline;

/// Output tree assembly and JSON/YAML rendering.
pub mod report;

/// File Scanner: enumerates `.cairo` files and derives module paths.
pub mod scanner;

/// Stub Synthesizer (Pass 3): placeholder modules for unresolved imports.
pub mod stub;

/// The frozen symbol table (the GOT) and its builder.
pub mod symtab;
