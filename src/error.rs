//! Fatal-error taxonomy.
//!
//! Everything a Cairo source file can do "wrong" is *data* per [`crate::model::ParseError`]
//! and [`crate::model::Warning`] — recorded on the owning [`crate::model::ContractInfo`],
//! never raised. The only conditions that stop the run entirely live here.

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkerError {
    #[error("[E001] input root does not exist: {0}")]
    RootNotFound(Utf8PathBuf),

    #[error("[E002] input root is not a directory: {0}")]
    RootNotADirectory(Utf8PathBuf),

    #[error("[E003] failed to read {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[E004] {path} is not valid UTF-8")]
    InvalidUtf8 { path: Utf8PathBuf },

    #[error("[E005] failed to render JSON report: {0}")]
    JsonRender(#[from] serde_json::Error),

    #[error("[E006] failed to render YAML report: {0}")]
    YamlRender(#[from] serde_yaml::Error),

    #[error("[E007] run failed: {0} unresolved import(s) with stub_missing=false")]
    UnresolvedImports(usize),
}

impl LinkerError {
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::RootNotFound(_) => "E001",
            Self::RootNotADirectory(_) => "E002",
            Self::Io { .. } => "E003",
            Self::InvalidUtf8 { .. } => "E004",
            Self::JsonRender(_) => "E005",
            Self::YamlRender(_) => "E006",
            Self::UnresolvedImports(_) => "E007",
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkerError>;
