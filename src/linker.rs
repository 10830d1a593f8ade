//! Linker (Pass 2): resolves each recorded import against the frozen symbol
//! table.

use log::debug;

use crate::model::ModulePath;
use crate::symtab::SymbolTable;

/// The verdict for one import after running the resolution algorithm.
pub struct Resolution {
    /// `true` iff a symbol table entry was found for some prefix of the
    /// import path.
    pub resolved: bool,
    /// The module path actually matched in the table (the resolved prefix),
    /// present only when `resolved` is true.
    pub resolved_module: Option<ModulePath>,
    /// Symbols to record on the import: the explicit brace-list if the
    /// import already had one, otherwise the suffix stripped off to find a
    /// match.
    pub symbols: Vec<String>,
}

/// Runs the four-step resolution algorithm for one import.
///
/// 1. Strip a leading `crate::`; a leading `super::` is stripped too but
///    short-circuits straight to unresolved (`super` paths are treated as
///    unresolvable-external — this analyzer never walks back out to a
///    parent module it hasn't already indexed).
/// 2. Look up the literal (stripped) path.
/// 3. On a miss, progressively strip trailing segments and retry; the
///    first hit wins, with the stripped tail recorded as the symbol list
///    when the import didn't already have an explicit one.
/// 4. Otherwise unresolved.
pub fn resolve(path: &ModulePath, existing_symbols: &[String], table: &SymbolTable) -> Resolution {
    let raw = path.as_str();

    if let Some(rest) = raw.strip_prefix("super::").or_else(|| {
        if raw == "super" {
            Some("")
        } else {
            None
        }
    }) {
        debug!("import `{raw}` is a `super::` reference; treating as unresolvable-external");
        let _ = rest;
        return Resolution {
            resolved: false,
            resolved_module: None,
            symbols: existing_symbols.to_vec(),
        };
    }

    let stripped = raw.strip_prefix("crate::").unwrap_or(raw);
    let candidate = ModulePath::new(stripped);

    if table.contains(&candidate) {
        return Resolution {
            resolved: true,
            resolved_module: Some(candidate),
            symbols: existing_symbols.to_vec(),
        };
    }

    let mut segments: Vec<&str> = candidate.segments();
    let mut tail: Vec<String> = Vec::new();
    while segments.len() > 1 {
        let dropped = segments.pop().unwrap();
        tail.insert(0, dropped.to_string());
        let prefix = ModulePath::new(segments.join("::"));
        if table.contains(&prefix) {
            let symbols = if existing_symbols.is_empty() {
                tail
            } else {
                existing_symbols.to_vec()
            };
            return Resolution {
                resolved: true,
                resolved_module: Some(prefix),
                symbols,
            };
        }
    }

    Resolution {
        resolved: false,
        resolved_module: None,
        symbols: existing_symbols.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContractInfo, EntityKind};
    use crate::symtab::SymbolTableBuilder;

    fn table_with(paths: &[&str]) -> SymbolTable {
        let mut builder = SymbolTableBuilder::new();
        for p in paths {
            builder.insert(ContractInfo::new(*p, ModulePath::new(*p), EntityKind::Module));
        }
        builder.freeze()
    }

    #[test]
    fn literal_hit_resolves() {
        let table = table_with(&["a::foo"]);
        let res = resolve(&ModulePath::new("crate::a::foo"), &[], &table);
        assert!(res.resolved);
        assert_eq!(res.resolved_module.unwrap().as_str(), "a::foo");
    }

    #[test]
    fn suffix_strip_finds_symbol_owner() {
        let table = table_with(&["a::b"]);
        let res = resolve(&ModulePath::new("a::b::Foo"), &[], &table);
        assert!(res.resolved);
        assert_eq!(res.symbols, vec!["Foo".to_string()]);
    }

    #[test]
    fn unresolved_external_is_recorded_as_such() {
        let table = table_with(&["a::b"]);
        let res = resolve(&ModulePath::new("core::array::ArrayTrait"), &[], &table);
        assert!(!res.resolved);
    }

    #[test]
    fn super_path_is_never_resolved() {
        let table = table_with(&["a::b"]);
        let res = resolve(&ModulePath::new("super::b"), &[], &table);
        assert!(!res.resolved);
    }
}
