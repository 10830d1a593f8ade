//! Shared data model: the shapes every other module reads and writes.
//!
//! These types are serialized directly into the output tree described by
//! the external interface (no separate DTO layer) — see [`crate::report`].

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use camino::Utf8PathBuf;
use serde::Serialize;

/// A `::`-separated module path, derived from a file's location relative to
/// its nearest `src/` ancestor (or the scan root, if none exists).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ModulePath(pub String);

impl ModulePath {
    pub fn new(path: impl Into<String>) -> Self {
        ModulePath(path.into())
    }

    pub fn join(&self, segment: &str) -> ModulePath {
        if self.0.is_empty() {
            ModulePath(segment.to_string())
        } else {
            ModulePath(format!("{}::{}", self.0, segment))
        }
    }

    pub fn segments(&self) -> Vec<&str> {
        self.0.split("::").filter(|s| !s.is_empty()).collect()
    }

    /// Drops the final `::`-segment. Empty for a single-segment path.
    pub fn parent(&self) -> ModulePath {
        let mut segs = self.segments();
        segs.pop();
        ModulePath(segs.join("::"))
    }

    /// Returns `self` with its trailing segment stripped, and that segment,
    /// or `None` if `self` has only one segment.
    pub fn split_last(&self) -> Option<(ModulePath, String)> {
        let mut segs = self.segments();
        let last = segs.pop()?.to_string();
        Some((ModulePath(segs.join("::")), last))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModulePath({:?})", self.0)
    }
}

/// What kind of top-level declaration a [`ContractInfo`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Contract,
    Interface,
    Trait,
    Component,
    Module,
    Stub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    External,
    View,
    Internal,
}

/// A single `name: type` parameter or return slot. Parameters that fail to
/// split on `:` are recorded with an empty `name` and the whole text as `ty`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    pub name: String,
    pub ty: String,
}

/// The raw captured text of a function body, plus its starting line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionBody {
    pub text: String,
    pub start_line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionInfo {
    pub name: String,
    pub visibility: Visibility,
    pub params: Vec<Param>,
    pub returns: Vec<String>,
    pub decorators: Vec<String>,
    pub line: usize,
    pub is_stub: bool,
    pub body: Option<FunctionBody>,
}

impl FunctionInfo {
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageVar {
    pub name: String,
    pub ty: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventInfo {
    pub name: String,
    pub line: usize,
}

/// A single `use` declaration as written, plus the linker's verdict on it.
///
/// Invariant (after Pass 2, with `stub_missing = true`):
/// `resolved ^ stub_created` — see [`crate::linker`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportInfo {
    pub path: ModulePath,
    pub symbols: Vec<String>,
    pub line: usize,
    pub resolved: bool,
    pub stub_created: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    IoError,
    ParseError,
    UnresolvedImport,
    DuplicateSymbol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    pub line: Option<usize>,
}

impl ParseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, line: Option<usize>) -> Self {
        ParseError {
            kind,
            message: message.into(),
            line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub message: String,
    pub line: Option<usize>,
}

/// A top-level declared entity: a contract, interface, trait, component,
/// plain module, or a synthesized stub standing in for an unresolved import.
///
/// All five real kinds and the stub share this one shape, tagged by `kind`
/// — a closed sum over a discriminant, not an inheritance hierarchy.
#[derive(Debug, Clone, Serialize)]
pub struct ContractInfo {
    pub name: String,
    pub module_path: ModulePath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<Utf8PathBuf>,
    pub kind: EntityKind,
    pub functions: Vec<FunctionInfo>,
    pub storage_vars: Vec<StorageVar>,
    pub events: Vec<EventInfo>,
    pub imports: Vec<ImportInfo>,
    pub stub_modules: BTreeMap<ModulePath, Rc<RefCell<ContractInfo>>>,
    pub unresolved_calls: BTreeSet<String>,
    pub unresolved_types: BTreeSet<String>,
    pub parse_errors: Vec<ParseError>,
    pub warnings: Vec<Warning>,
}

impl ContractInfo {
    pub fn new(name: impl Into<String>, module_path: ModulePath, kind: EntityKind) -> Self {
        ContractInfo {
            name: name.into(),
            module_path,
            file_path: None,
            kind,
            functions: Vec::new(),
            storage_vars: Vec::new(),
            events: Vec::new(),
            imports: Vec::new(),
            stub_modules: BTreeMap::new(),
            unresolved_calls: BTreeSet::new(),
            unresolved_types: BTreeSet::new(),
            parse_errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn stub(module_path: ModulePath) -> Self {
        let name = module_path.as_str().to_string();
        ContractInfo::new(name, module_path, EntityKind::Stub)
    }
}

impl PartialEq for ContractInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.module_path == other.module_path
            && self.file_path == other.file_path
            && self.kind == other.kind
            && self.functions == other.functions
            && self.storage_vars == other.storage_vars
            && self.events == other.events
            && self.imports == other.imports
    }
}

/// A single file's output from the lexical parser, before it has been
/// attached to a [`ContractInfo`] and inserted into the symbol table.
#[derive(Debug, Clone)]
pub struct FileParse {
    pub file_path: Utf8PathBuf,
    pub module_path: ModulePath,
    /// Top-level entities declared in this file, keyed by their
    /// fully-qualified path.
    pub entities: Vec<ContractInfo>,
    pub parse_errors: Vec<ParseError>,
}

/// A single classified line (or folded multi-line construct) inside a
/// function body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub text: String,
    pub line: usize,
    pub kind: StatementKind,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub defined: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub used: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callee: Option<String>,
    /// `true` when `callee` was reached through a `foo.bar(...)` dotted
    /// path with `foo != self` — the dataflow analyzer treats this shape
    /// (`dispatcher.method(...)`) as an external call regardless of import
    /// resolution.
    #[serde(skip_serializing_if = "is_false")]
    pub qualified_call: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_member: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// For a `Call` statement, the call's own argument expressions in
    /// source order — the receiver of a qualified call is not one of
    /// these. Empty for every other statement kind.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Statement {
    pub fn new(text: impl Into<String>, line: usize, kind: StatementKind) -> Self {
        Statement {
            text: text.into(),
            line,
            kind,
            defined: BTreeSet::new(),
            used: BTreeSet::new(),
            callee: None,
            qualified_call: false,
            storage_member: None,
            condition: None,
            arguments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Assignment,
    LetBinding,
    StorageRead,
    StorageWrite,
    Call,
    Return,
    If,
    Else,
    Loop,
    While,
    For,
    Break,
    Continue,
    BlockOpen,
    BlockClose,
    MatchArm,
    Other,
}
