//! Run configuration. Mirrors the "Configuration options recognized by the
//! core" in the external interface — constructed directly for library use,
//! or translated from [`crate::cli::Args`] for the binary.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Enable Pass 3: materialize a placeholder module for every import
    /// that Pass 2 couldn't resolve.
    pub stub_missing: bool,
    /// Apply the test-file exclusion rules during scanning.
    pub exclude_tests: bool,
    /// Run the CFG builder and dataflow analyzer over every function with a
    /// body.
    pub analyze: bool,
    /// Cap on the number of entry-to-exit paths enumerated per CFG.
    pub max_paths: usize,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        LinkerConfig {
            stub_missing: true,
            exclude_tests: true,
            analyze: false,
            max_paths: 100,
        }
    }
}
