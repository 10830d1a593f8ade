//! End-to-end coverage of the full pipeline (scan → parse → link/stub →
//! optional analyze → report) against `tempfile::TempDir` fixtures rather
//! than checked-in fixture files.

use camino::Utf8PathBuf;
use std::fs;
use tempfile::TempDir;

use cairo_linker::config::LinkerConfig;
use cairo_linker::dataflow::{AccessType, WarningKind};
use cairo_linker::model::{ErrorKind, ModulePath};
use cairo_linker::pipeline;

fn write_file(root: &camino::Utf8Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
}

fn root(tmp: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap()
}

#[test]
fn linker_resolves_local_import_across_files() {
    let tmp = TempDir::new().unwrap();
    let r = root(&tmp);
    write_file(
        &r,
        "src/a/foo.cairo",
        "#[starknet::contract]\nmod Foo {\n    fn f() {}\n}\n",
    );
    write_file(
        &r,
        "src/b/bar.cairo",
        "use crate::a::foo::Foo;\n#[starknet::contract]\nmod Bar {\n}\n",
    );

    let outcome = pipeline::run(&[r], &LinkerConfig::default()).unwrap();
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.report.stub_report.total_stubs, 0);

    for key in ["foo", "Foo", "bar", "Bar"] {
        assert!(
            outcome.report.contracts.contains_key(key),
            "missing contract named `{key}`"
        );
    }
    // The `use` line precedes `mod Bar { ... }`, so it attaches to the
    // file-level module entity (`bar`), not the nested contract.
    let bar_file = &outcome.report.contracts["bar"];
    assert_eq!(bar_file.imports.len(), 1);
    assert!(bar_file.imports[0].resolved);
    assert!(!bar_file.imports[0].stub_created);
}

#[test]
fn external_import_is_stubbed() {
    let tmp = TempDir::new().unwrap();
    let r = root(&tmp);
    write_file(
        &r,
        "src/m.cairo",
        "use core::array::ArrayTrait;\nmod M {\n}\n",
    );

    let outcome = pipeline::run(&[r], &LinkerConfig::default()).unwrap();
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.report.stub_report.total_stubs, 1);
    assert!(outcome
        .report
        .stub_report
        .stubbed_modules
        .iter()
        .any(|m| m.as_str() == "core::array"));

    let m = &outcome.report.contracts["m"];
    assert!(!m.imports[0].resolved);
    assert!(m.imports[0].stub_created);
    assert!(m.stub_modules.contains_key(&ModulePath::new("core::array")));
}

#[test]
fn unresolved_import_fails_when_stubbing_disabled() {
    let tmp = TempDir::new().unwrap();
    let r = root(&tmp);
    write_file(
        &r,
        "src/m.cairo",
        "use core::array::ArrayTrait;\nmod M {\n}\n",
    );

    let config = LinkerConfig {
        stub_missing: false,
        ..LinkerConfig::default()
    };
    let outcome = pipeline::run(&[r], &config).unwrap();
    assert_ne!(outcome.exit_code, 0);

    let m = &outcome.report.contracts["m"];
    assert!(!m.imports[0].resolved);
    assert!(!m.imports[0].stub_created);
    assert_eq!(m.parse_errors[0].kind, ErrorKind::UnresolvedImport);
}

#[test]
fn branching_function_has_one_branch_node_and_one_exit() {
    let tmp = TempDir::new().unwrap();
    let r = root(&tmp);
    write_file(
        &r,
        "src/lib.cairo",
        "#[starknet::contract]\nmod C {\n    fn f(x: felt252) -> felt252 {\n        if x {\n            return 1;\n        } else {\n            return 2;\n        }\n    }\n}\n",
    );

    let config = LinkerConfig {
        analyze: true,
        ..LinkerConfig::default()
    };
    let outcome = pipeline::run(&[r], &config).unwrap();
    let analysis = outcome.report.analysis.unwrap();
    let c = analysis.iter().find(|a| a.contract_name == "C").unwrap();
    let f = c.functions.iter().find(|f| f.function_name == "f").unwrap();
    let cfg = f.cfg.as_ref().unwrap();

    let branches = cfg
        .nodes
        .iter()
        .filter(|n| matches!(n.kind, cairo_linker::cfg::CfgNodeKind::Branch))
        .count();
    assert_eq!(branches, 1);
    assert_eq!(cfg.exit_nodes.len(), 1);
}

#[test]
fn storage_read_and_write_are_detected_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let r = root(&tmp);
    write_file(
        &r,
        "src/lib.cairo",
        "#[starknet::contract]\nmod C {\n    #[external(v0)]\n    fn g(self: @ContractState) {\n        let v = self.storage.balance.read();\n        self.storage.balance.write(v + 1);\n    }\n}\n",
    );

    let config = LinkerConfig {
        analyze: true,
        ..LinkerConfig::default()
    };
    let outcome = pipeline::run(&[r], &config).unwrap();
    let analysis = outcome.report.analysis.unwrap();
    let c = analysis.iter().find(|a| a.contract_name == "C").unwrap();
    let g = c.functions.iter().find(|f| f.function_name == "g").unwrap();
    let dataflow = g.dataflow.as_ref().unwrap();

    assert_eq!(dataflow.storage_accesses.len(), 2);
    assert_eq!(dataflow.storage_accesses[0].access_type, AccessType::Read);
    assert_eq!(dataflow.storage_accesses[1].access_type, AccessType::Write);
    assert!(dataflow
        .storage_accesses
        .iter()
        .all(|a| a.storage_var == "balance"));

    let chain = dataflow
        .def_use_chains
        .iter()
        .find(|c| c.variable == "v")
        .unwrap();
    assert_eq!(chain.defs.len(), 1);
    assert_eq!(chain.uses.len(), 1);

    assert!(g.warnings.is_empty());
}

#[test]
fn uninitialized_use_is_flagged_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let r = root(&tmp);
    write_file(
        &r,
        "src/lib.cairo",
        "#[starknet::contract]\nmod C {\n    fn h(cond: felt252) -> felt252 {\n        let x;\n        if cond {\n            x = 1;\n        }\n        return x;\n    }\n}\n",
    );

    let config = LinkerConfig {
        analyze: true,
        ..LinkerConfig::default()
    };
    let outcome = pipeline::run(&[r], &config).unwrap();
    let analysis = outcome.report.analysis.unwrap();
    let c = analysis.iter().find(|a| a.contract_name == "C").unwrap();
    let h = c.functions.iter().find(|f| f.function_name == "h").unwrap();

    assert!(h
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::UninitializedUse && w.variable == "x"));
}

#[test]
fn deterministic_output_across_repeated_runs() {
    let tmp = TempDir::new().unwrap();
    let r = root(&tmp);
    write_file(
        &r,
        "src/lib.cairo",
        "#[starknet::contract]\nmod C {\n    fn g(self: @ContractState) {\n        let v = self.storage.balance.read();\n        self.storage.balance.write(v + 1);\n    }\n}\n",
    );

    let config = LinkerConfig {
        analyze: true,
        ..LinkerConfig::default()
    };
    let first = pipeline::run(&[r.clone()], &config)
        .unwrap()
        .report
        .to_json()
        .unwrap();
    let second = pipeline::run(&[r], &config).unwrap().report.to_json().unwrap();
    assert_eq!(first, second);
}

// A resolvable import never gets stubbed, even when the module it points
// at lives in a different file scanned in the same run.
#[test]
fn import_resolved_across_files_is_never_stubbed() {
    let tmp = TempDir::new().unwrap();
    let r = root(&tmp);
    write_file(&r, "src/m.cairo", "use helper::Thing;\nmod M {\n}\n");
    write_file(
        &r,
        "src/helper.cairo",
        "#[starknet::contract]\nmod Thing {\n}\n",
    );

    let outcome = pipeline::run(&[r], &LinkerConfig::default()).unwrap();
    assert_eq!(outcome.report.stub_report.total_stubs, 0);
    let m = &outcome.report.contracts["m"];
    assert!(m.imports[0].resolved);
}

// Files under `tests/` are excluded by default and included with
// `--include-tests`.
#[test]
fn test_directory_exclusion_is_configurable() {
    let tmp = TempDir::new().unwrap();
    let r = root(&tmp);
    write_file(&r, "src/lib.cairo", "mod C {\n}\n");
    write_file(&r, "tests/test_c.cairo", "mod CTest {\n}\n");

    let default_outcome = pipeline::run(&[r.clone()], &LinkerConfig::default()).unwrap();
    assert_eq!(default_outcome.report.metadata.total_files, 1);

    let config = LinkerConfig {
        exclude_tests: false,
        ..LinkerConfig::default()
    };
    let included_outcome = pipeline::run(&[r], &config).unwrap();
    assert_eq!(included_outcome.report.metadata.total_files, 2);
}
