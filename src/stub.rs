//! Stub Synthesizer (Pass 3): for every import Pass 2 couldn't resolve,
//! materializes a placeholder module so downstream consumers see a uniform
//! `ContractInfo` shape regardless of whether the real module was ever
//! scanned.

use std::collections::BTreeSet;

use log::info;

use crate::linker;
use crate::model::{ContractInfo, ErrorKind, ModulePath, ParseError};
use crate::symtab::SymbolTable;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StubReport {
    pub total_stubs: usize,
    pub total_resolved: usize,
    pub total_symbols: usize,
    pub stubbed_modules: Vec<ModulePath>,
}

/// Strips a leading `crate::`/`super::` the same way the Linker strips them
/// before lookup, since that's the path a synthesized placeholder actually
/// stands in for.
fn stub_key(path: &ModulePath) -> ModulePath {
    let raw = path.as_str();
    let stripped = raw
        .strip_prefix("crate::")
        .or_else(|| raw.strip_prefix("super::"))
        .unwrap_or(raw);
    ModulePath::new(stripped)
}

/// The module a stub stands in for, plus the symbol it carries if one could
/// be inferred. A single `use a::b::c;` with no explicit symbol list is
/// ambiguous on its own (`c` could be a nested module or an imported item);
/// since nothing in the table ever matched it to disambiguate, the trailing
/// segment is assumed to name the symbol and the rest the module — the same
/// call the Linker makes when a table entry confirms it, just made blind
/// here. A path with an explicit brace-list, or with only one segment, is
/// used as the key verbatim.
fn stub_key_and_symbol(path: &ModulePath, had_explicit_symbols: bool) -> (ModulePath, Option<String>) {
    let key = stub_key(path);
    if had_explicit_symbols {
        return (key, None);
    }
    match key.split_last() {
        Some((module, symbol)) => (module, Some(symbol)),
        None => (key, None),
    }
}

/// Runs Pass 2 (import resolution) and, if `stub_missing`, Pass 3 (stub
/// synthesis) over every contract in `table`. Mutates imports and
/// `stub_modules` in place; returns run-wide stub statistics.
pub fn link_and_stub(table: &SymbolTable, stub_missing: bool) -> StubReport {
    let mut report = StubReport::default();
    let mut stubbed: BTreeSet<ModulePath> = BTreeSet::new();

    for contract_rc in table.values() {
        let mut contract = contract_rc.borrow_mut();
        let import_count = contract.imports.len();
        for i in 0..import_count {
            let path = contract.imports[i].path.clone();
            let existing_symbols = contract.imports[i].symbols.clone();
            let resolution = linker::resolve(&path, &existing_symbols, table);

            if resolution.resolved {
                contract.imports[i].symbols = resolution.symbols.clone();
                report.total_symbols += contract.imports[i].symbols.len();
                contract.imports[i].resolved = true;
                report.total_resolved += 1;
                continue;
            }

            if stub_missing {
                let (key, inferred_symbol) =
                    stub_key_and_symbol(&path, !existing_symbols.is_empty());
                contract.imports[i].symbols = match inferred_symbol {
                    Some(symbol) => vec![symbol],
                    None => resolution.symbols.clone(),
                };
                report.total_symbols += contract.imports[i].symbols.len();

                let stub = contract
                    .stub_modules
                    .entry(key.clone())
                    .or_insert_with(|| {
                        info!("synthesizing stub for unresolved module `{key}`");
                        std::rc::Rc::new(std::cell::RefCell::new(ContractInfo::stub(key.clone())))
                    })
                    .clone();
                let _ = stub;
                contract.imports[i].stub_created = true;
                stubbed.insert(key);
            } else {
                contract.imports[i].symbols = resolution.symbols.clone();
                report.total_symbols += contract.imports[i].symbols.len();
                let message = format!("unresolved import `{path}`");
                let line = contract.imports[i].line;
                contract.parse_errors.push(ParseError::new(
                    ErrorKind::UnresolvedImport,
                    message,
                    Some(line),
                ));
            }
        }
    }

    report.total_stubs = stubbed.len();
    report.stubbed_modules = stubbed.into_iter().collect();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;
    use crate::symtab::SymbolTableBuilder;

    #[test]
    fn stubs_external_import() {
        let mut builder = SymbolTableBuilder::new();
        let mut m = ContractInfo::new("m", ModulePath::new("m"), EntityKind::Module);
        m.imports.push(crate::model::ImportInfo {
            path: ModulePath::new("core::array::ArrayTrait"),
            symbols: Vec::new(),
            line: 1,
            resolved: false,
            stub_created: false,
        });
        builder.insert(m);
        let table = builder.freeze();

        let report = link_and_stub(&table, true);
        assert_eq!(report.total_stubs, 1);
        assert!(report.stubbed_modules.contains(&ModulePath::new("core::array")));

        let entry = table.get(&ModulePath::new("m")).unwrap().borrow();
        assert!(entry.imports[0].stub_created);
        assert!(!entry.imports[0].resolved);
        assert!(entry.stub_modules.contains_key(&ModulePath::new("core::array")));
    }

    #[test]
    fn unresolved_without_stubbing_becomes_parse_error() {
        let mut builder = SymbolTableBuilder::new();
        let mut m = ContractInfo::new("m", ModulePath::new("m"), EntityKind::Module);
        m.imports.push(crate::model::ImportInfo {
            path: ModulePath::new("core::array::ArrayTrait"),
            symbols: Vec::new(),
            line: 1,
            resolved: false,
            stub_created: false,
        });
        builder.insert(m);
        let table = builder.freeze();

        let report = link_and_stub(&table, false);
        assert_eq!(report.total_stubs, 0);
        let entry = table.get(&ModulePath::new("m")).unwrap().borrow();
        assert!(!entry.imports[0].stub_created);
        assert_eq!(entry.parse_errors.len(), 1);
        assert_eq!(entry.parse_errors[0].kind, ErrorKind::UnresolvedImport);
    }

    #[test]
    fn duplicate_imports_of_same_module_share_stub() {
        let mut builder = SymbolTableBuilder::new();
        let mut m = ContractInfo::new("m", ModulePath::new("m"), EntityKind::Module);
        for _ in 0..2 {
            m.imports.push(crate::model::ImportInfo {
                path: ModulePath::new("core::array::ArrayTrait"),
                symbols: Vec::new(),
                line: 1,
                resolved: false,
                stub_created: false,
            });
        }
        builder.insert(m);
        let table = builder.freeze();
        link_and_stub(&table, true);

        let entry = table.get(&ModulePath::new("m")).unwrap().borrow();
        assert_eq!(entry.stub_modules.len(), 1);
        assert!(std::rc::Rc::ptr_eq(
            &entry.stub_modules[&ModulePath::new("core::array")],
            &entry.stub_modules[&ModulePath::new("core::array")]
        ));
    }
}
