//! Symbol Table: the GOT. Pass 1 is single-writer; once built, the table is
//! frozen into an immutable view for the remainder of the run.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::warn;

use crate::model::{ContractInfo, ModulePath, Warning};

/// Builder for Pass 1. Consumes parsed entities one at a time; on a
/// duplicate key keeps the first insertion and records a warning on it.
#[derive(Default)]
pub struct SymbolTableBuilder {
    entries: BTreeMap<ModulePath, Rc<RefCell<ContractInfo>>>,
}

impl SymbolTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entity` under its own `module_path`. Returns `false` (and
    /// records a `duplicate_symbol` warning on the kept entry) if the key
    /// was already taken.
    pub fn insert(&mut self, entity: ContractInfo) -> bool {
        let key = entity.module_path.clone();
        if let Some(existing) = self.entries.get(&key) {
            warn!("duplicate symbol table key `{key}`; keeping first declaration");
            existing.borrow_mut().warnings.push(Warning {
                message: format!(
                    "duplicate declaration for `{key}` ignored (kept the first one seen)"
                ),
                line: None,
            });
            return false;
        }
        self.entries.insert(key, Rc::new(RefCell::new(entity)));
        true
    }

    /// Inserts every entity produced by parsing one file, in order.
    pub fn insert_all(&mut self, entities: Vec<ContractInfo>) {
        for entity in entities {
            self.insert(entity);
        }
    }

    /// Freezes Pass 1 into an immutable-keyset view. Entries remain interior-
    /// mutable (the Linker and Stub Synthesizer mutate `resolved`,
    /// `stub_created`, and `stub_modules` in place) but no key may be added
    /// or removed after this point.
    pub fn freeze(self) -> SymbolTable {
        SymbolTable {
            entries: self.entries,
        }
    }
}

/// The frozen symbol table: a read-only mapping from module path to the
/// shared `ContractInfo` for that path. Pass 2 (the Linker) and Pass 3 (the
/// Stub Synthesizer) only ever look entries up here; they never insert.
pub struct SymbolTable {
    entries: BTreeMap<ModulePath, Rc<RefCell<ContractInfo>>>,
}

impl SymbolTable {
    pub fn get(&self, path: &ModulePath) -> Option<&Rc<RefCell<ContractInfo>>> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &ModulePath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ModulePath, &Rc<RefCell<ContractInfo>>)> {
        self.entries.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &Rc<RefCell<ContractInfo>>> {
        self.entries.values()
    }
}
