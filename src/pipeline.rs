//! Pipeline: the one orchestrator that threads Scan → Parse → Symbol Table →
//! Linker/Stub Synthesizer → optional CFG/Dataflow analysis, in that strict
//! pass order, into a [`Report`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use camino::Utf8PathBuf;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::cfg::Cfg;
use crate::config::LinkerConfig;
use crate::dataflow;
use crate::error::{LinkerError, Result};
use crate::model::{ErrorKind, FileParse};
use crate::parser;
use crate::report::{
    ContractAnalysis, FunctionAnalysis, FunctionDataflow, IoFailure, Report, RunMetadata,
};
use crate::scanner;
use crate::stub;
use crate::symtab::SymbolTableBuilder;

/// What a completed run produced, plus the exit status the binary should
/// use: 0 on success including the stubbed-import case, non-zero when
/// `stub_missing=false` left an unresolved import or any input file was
/// unreadable.
pub struct RunOutcome {
    pub report: Report,
    pub exit_code: i32,
}

/// One function queued for CFG/dataflow analysis, with everything its
/// analysis needs copied out of the symbol table so the parallel stage below
/// doesn't have to share `Rc<RefCell<_>>` across threads.
struct FnJob {
    contract_name: String,
    function_name: String,
    params: Vec<String>,
    imported_symbols: BTreeSet<String>,
    body_text: Option<String>,
    body_start_line: usize,
}

pub fn run(roots: &[Utf8PathBuf], config: &LinkerConfig) -> Result<RunOutcome> {
    for root in roots {
        let meta = fs::metadata(root.as_std_path())
            .map_err(|_| LinkerError::RootNotFound(root.clone()))?;
        if !meta.is_dir() {
            return Err(LinkerError::RootNotADirectory(root.clone()));
        }
    }

    let scan_result = scanner::scan(roots, config.exclude_tests);
    info!(
        "scan complete: {} file(s) across {} root(s)",
        scan_result.files.len(),
        roots.len()
    );

    // Pass 1, parallelized: each file only ever writes its own `FileParse`.
    // `par_iter().map(...).collect()` preserves input order, so no explicit
    // re-sort is needed before symbol-table insertion.
    let parse_results: Vec<std::result::Result<FileParse, IoFailure>> = scan_result
        .files
        .par_iter()
        .map(|f| {
            debug!("parsing {}", f.file_path);
            fs::read_to_string(f.file_path.as_std_path())
                .map(|text| parser::parse_file(&f.file_path, &f.module_path, &text))
                .map_err(|e| IoFailure {
                    path: f.file_path.clone(),
                    message: e.to_string(),
                })
        })
        .collect();

    let mut io_errors = Vec::new();
    let mut file_parses = Vec::with_capacity(parse_results.len());
    for r in parse_results {
        match r {
            Ok(fp) => file_parses.push(fp),
            Err(failure) => {
                warn!("failed to read {}: {}", failure.path, failure.message);
                io_errors.push(failure);
            }
        }
    }
    info!(
        "pass 1 complete: {} file(s) parsed, {} unreadable",
        file_parses.len(),
        io_errors.len()
    );

    // Symbol-table insertion is the sequential, post-batched write needed
    // to keep "first wins on duplicate" well defined. File-level
    // parse errors are attached to the file's own module entity (always the
    // last one `parser::file::parse_file` pushes) before insertion, since
    // that's the one `ContractInfo` guaranteed to exist for every file.
    let mut builder = SymbolTableBuilder::new();
    for mut fp in file_parses {
        if let Some(root_entity) = fp.entities.last_mut() {
            root_entity.parse_errors.extend(fp.parse_errors.drain(..));
        }
        builder.insert_all(fp.entities);
    }
    let table = builder.freeze();

    let stub_report = stub::link_and_stub(&table, config.stub_missing);
    info!(
        "pass 2/3 complete: {} resolved, {} stubbed",
        stub_report.total_resolved, stub_report.total_stubs
    );

    let mut unresolved_count = 0usize;
    for contract_rc in table.values() {
        let contract = contract_rc.borrow();
        unresolved_count += contract
            .parse_errors
            .iter()
            .filter(|e| e.kind == ErrorKind::UnresolvedImport)
            .count();
    }

    let analysis = if config.analyze {
        let mut jobs = Vec::new();
        let mut contract_names: BTreeSet<String> = BTreeSet::new();
        for (_, contract_rc) in table.iter() {
            let contract = contract_rc.borrow();
            contract_names.insert(contract.name.clone());
            let imported_symbols: BTreeSet<String> = contract
                .imports
                .iter()
                .flat_map(|imp| imp.symbols.iter().cloned())
                .collect();
            for f in &contract.functions {
                jobs.push(FnJob {
                    contract_name: contract.name.clone(),
                    function_name: f.name.clone(),
                    params: f.params.iter().map(|p| p.name.clone()).collect(),
                    imported_symbols: imported_symbols.clone(),
                    body_text: f.body.as_ref().map(|b| b.text.clone()),
                    body_start_line: f.body.as_ref().map(|b| b.start_line).unwrap_or(f.line),
                });
            }
        }

        let max_paths = config.max_paths;
        let results: Vec<(String, FunctionAnalysis)> = jobs
            .par_iter()
            .map(|job| {
                let (cfg_summary, dataflow_output) = match &job.body_text {
                    Some(text) => {
                        debug!("analyzing {}::{}", job.contract_name, job.function_name);
                        let stmts = parser::parse_statements(text, job.body_start_line);
                        let cfg = Cfg::build(&stmts);
                        let (_, truncated) = cfg.enumerate_paths(max_paths);
                        if truncated {
                            debug!(
                                "path enumeration for {}::{} truncated at {max_paths} paths",
                                job.contract_name, job.function_name
                            );
                        }
                        let out = dataflow::analyze(&cfg, &job.params, &job.imported_symbols);
                        (Some(cfg.summary()), Some(out))
                    }
                    None => (None, None),
                };

                let (dataflow, warnings) = match dataflow_output {
                    Some(out) => (
                        Some(FunctionDataflow {
                            def_use_chains: out.def_use_chains,
                            storage_accesses: out.storage_accesses,
                            external_calls: out.external_calls,
                        }),
                        out.warnings,
                    ),
                    None => (None, Vec::new()),
                };

                (
                    job.contract_name.clone(),
                    FunctionAnalysis {
                        function_name: job.function_name.clone(),
                        has_body: job.body_text.is_some(),
                        cfg: cfg_summary,
                        dataflow,
                        warnings,
                    },
                )
            })
            .collect();

        // Re-sorted into `(contract_name, function_name)` order,
        // independent of whatever order the parallel stage finished in.
        let mut grouped: BTreeMap<String, Vec<FunctionAnalysis>> = BTreeMap::new();
        for name in contract_names {
            grouped.entry(name).or_default();
        }
        for (contract_name, fa) in results {
            grouped.entry(contract_name).or_default().push(fa);
        }
        for functions in grouped.values_mut() {
            functions.sort_by(|a, b| a.function_name.cmp(&b.function_name));
        }
        info!("analysis complete: {} function(s) examined", jobs.len());

        Some(
            grouped
                .into_iter()
                .map(|(contract_name, functions)| ContractAnalysis {
                    contract_name,
                    functions,
                })
                .collect(),
        )
    } else {
        None
    };

    let mut contracts = BTreeMap::new();
    for (_, contract_rc) in table.iter() {
        let contract = contract_rc.borrow();
        contracts.insert(contract.name.clone(), contract.clone());
    }

    let metadata = RunMetadata {
        total_files: scan_result.files.len(),
        total_contracts: table.len(),
        stubbing_enabled: config.stub_missing,
        module_path_fallbacks: scan_result.fallbacks,
        io_errors,
    };

    let exit_code =
        if (!config.stub_missing && unresolved_count > 0) || !metadata.io_errors.is_empty() {
            1
        } else {
            0
        };

    Ok(RunOutcome {
        report: Report {
            metadata,
            contracts,
            stub_report,
            analysis,
        },
        exit_code,
    })
}
