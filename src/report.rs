//! Reporter: assembles the external output tree and renders it as JSON
//! (authoritative shape) or YAML (faithful rendering of the same shape).

use std::collections::BTreeMap;

use serde::Serialize;

use camino::Utf8PathBuf;

use crate::cfg::CfgSummary;
use crate::dataflow::{AnalysisWarning, DefUseChain, ExternalCall, StorageAccess};
use crate::error::Result;
use crate::model::ContractInfo;
use crate::scanner::ModulePathFallback;
use crate::stub::StubReport;

/// A file the scanner found but the pipeline couldn't read. An unreadable
/// file is non-fatal on its own — recorded here at the run level rather
/// than on any `ContractInfo`, since no entity was ever parsed from it.
#[derive(Debug, Clone, Serialize)]
pub struct IoFailure {
    pub path: Utf8PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub total_files: usize,
    pub total_contracts: usize,
    pub stubbing_enabled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub module_path_fallbacks: Vec<ModulePathFallback>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub io_errors: Vec<IoFailure>,
}

/// The `dataflow` sub-object of a per-function analysis record. `warnings`
/// lives as a sibling of this on [`FunctionAnalysis`], not inside it —
/// `pipeline` splits `DataflowOutput` apart to land the fields in the right
/// place.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDataflow {
    pub def_use_chains: Vec<DefUseChain>,
    pub storage_accesses: Vec<StorageAccess>,
    pub external_calls: Vec<ExternalCall>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionAnalysis {
    pub function_name: String,
    pub has_body: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfg: Option<CfgSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataflow: Option<FunctionDataflow>,
    pub warnings: Vec<AnalysisWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractAnalysis {
    pub contract_name: String,
    pub functions: Vec<FunctionAnalysis>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: RunMetadata,
    /// Keyed by contract name. A `BTreeMap` rather than the
    /// module-path-keyed `SymbolTable` — two top-level entities sharing a
    /// name (from different modules) collapse to one entry, last-inserted
    /// wins. Module paths stay available on each `ContractInfo` itself.
    pub contracts: BTreeMap<String, ContractInfo>,
    pub stub_report: StubReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Vec<ContractAnalysis>>,
}

impl Report {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
