//! Lexical Parser: turns a single file's raw text into a [`FileParse`] by
//! pattern-matching over lines. This is deliberately not a grammar — an
//! unrecognized construct is skipped with a recorded warning, never aborts
//! the file.

use camino::Utf8PathBuf;
use lazy_static::lazy_static;
use regex::Regex;

use crate::model::{
    ContractInfo, EntityKind, ErrorKind, EventInfo, FileParse, FunctionBody, FunctionInfo,
    ImportInfo, ModulePath, Param, ParseError, StorageVar, Visibility,
};
use crate::parser::util::{
    find_matching_brace, find_matching_paren, line_at, line_starts, split_name_type,
    split_top_level_commas,
};

lazy_static! {
    static ref CONTRACT_ATTR_RE: Regex = Regex::new(r"^#\[starknet::contract\]\s*$").unwrap();
    static ref INTERFACE_ATTR_RE: Regex = Regex::new(r"^#\[starknet::interface\]\s*$").unwrap();
    static ref COMPONENT_ATTR_RE: Regex = Regex::new(r"^#\[starknet::component\]\s*$").unwrap();
    static ref STORAGE_ATTR_RE: Regex = Regex::new(r"^#\[storage\]\s*$").unwrap();
    static ref EVENT_ATTR_RE: Regex = Regex::new(r"^#\[event\]\s*$").unwrap();
    static ref EXTERNAL_ATTR_RE: Regex = Regex::new(r"^#\[external(\(.*\))?\]\s*$").unwrap();
    static ref VIEW_ATTR_RE: Regex = Regex::new(r"^#\[view\]\s*$").unwrap();
    static ref GENERIC_ATTR_RE: Regex = Regex::new(r"^#\[.*\]\s*$").unwrap();

    static ref MOD_RE: Regex =
        Regex::new(r"^(pub\s+)?mod\s+([A-Za-z_][A-Za-z0-9_]*)\s*\{").unwrap();
    static ref TRAIT_RE: Regex =
        Regex::new(r"^(pub\s+)?trait\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap();
    // The parameter list is matched separately via `find_matching_paren`
    // since it can itself contain parenthesized types (tuples), which a
    // single non-recursive regex can't balance.
    static ref FN_HEAD_RE: Regex =
        Regex::new(r"^(pub\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap();
    static ref FN_TAIL_RE: Regex = Regex::new(r"^\s*(->\s*(.+?))?\s*(\{|;)").unwrap();
    static ref STRUCT_RE: Regex =
        Regex::new(r"^(pub\s+)?struct\s+([A-Za-z_][A-Za-z0-9_]*)\s*\{").unwrap();
    static ref ENUM_RE: Regex =
        Regex::new(r"^(pub\s+)?enum\s+([A-Za-z_][A-Za-z0-9_]*)\s*\{").unwrap();
    static ref USE_BRACE_RE: Regex =
        Regex::new(r"^use\s+([A-Za-z_][A-Za-z0-9_:]*)::\{([^}]*)\}\s*;").unwrap();
    static ref USE_SINGLE_RE: Regex =
        Regex::new(r"^use\s+([A-Za-z_][A-Za-z0-9_:]*)\s*;").unwrap();
}

/// Parses one file's text into a [`FileParse`]. `module_path` is the path
/// already derived by the scanner from the file's location.
pub fn parse_file(file_path: &Utf8PathBuf, module_path: &ModulePath, text: &str) -> FileParse {
    let mut errors = Vec::new();

    let mut root = ContractInfo::new(
        module_path.segments().last().copied().unwrap_or("").to_string(),
        module_path.clone(),
        EntityKind::Module,
    );
    root.file_path = Some(file_path.clone());

    let mut entities = Vec::new();
    let mut cursor = 0usize;
    let mut pending_decorators: Vec<(String, usize)> = Vec::new();

    scan(
        text,
        0,
        &mut cursor,
        module_path,
        file_path,
        &mut pending_decorators,
        &mut root,
        &mut entities,
        &mut errors,
        0,
    );

    entities.push(root);

    FileParse {
        file_path: file_path.clone(),
        module_path: module_path.clone(),
        entities,
        parse_errors: errors,
    }
}

/// Recursively scans `text` from `*cursor` onward, populating `into` (the
/// entity whose body this text belongs to — either the file-level module or
/// a just-opened contract/interface/component/trait/module) with whatever
/// functions, storage vars, events, and imports are found directly in it,
/// and appending any nested contract/interface/component/module
/// declarations it meets to `entities`.
///
/// `line_offset` is `0` for the outermost call (line numbers in `text` are
/// already absolute) and `base_line - 1` for a block whose content was
/// sliced out of an outer buffer starting at `base_line`. `depth` bounds
/// recursion into nested bodies to one level, per the lexical-parser
/// contract.
#[allow(clippy::too_many_arguments)]
fn scan(
    text: &str,
    line_offset: usize,
    cursor: &mut usize,
    module_path: &ModulePath,
    file_path: &Utf8PathBuf,
    pending_decorators: &mut Vec<(String, usize)>,
    into: &mut ContractInfo,
    entities: &mut Vec<ContractInfo>,
    errors: &mut Vec<ParseError>,
    depth: u32,
) {
    let starts = line_starts(text);
    let bytes = text.as_bytes();
    while *cursor < bytes.len() {
        let line_start = *cursor;
        let line_end = text[line_start..]
            .find('\n')
            .map(|i| line_start + i)
            .unwrap_or(bytes.len());
        let raw_line = &text[line_start..line_end];
        let trimmed = raw_line.trim();
        let line_no = line_offset + line_at(&starts, line_start);
        *cursor = (line_end + 1).min(bytes.len());

        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }

        if CONTRACT_ATTR_RE.is_match(trimmed) {
            pending_decorators.push(("starknet::contract".to_string(), line_no));
            continue;
        }
        if INTERFACE_ATTR_RE.is_match(trimmed) {
            pending_decorators.push(("starknet::interface".to_string(), line_no));
            continue;
        }
        if COMPONENT_ATTR_RE.is_match(trimmed) {
            pending_decorators.push(("starknet::component".to_string(), line_no));
            continue;
        }
        if STORAGE_ATTR_RE.is_match(trimmed) {
            pending_decorators.push(("storage".to_string(), line_no));
            continue;
        }
        if EVENT_ATTR_RE.is_match(trimmed) {
            pending_decorators.push(("event".to_string(), line_no));
            continue;
        }
        if EXTERNAL_ATTR_RE.is_match(trimmed) {
            pending_decorators.push(("external".to_string(), line_no));
            continue;
        }
        if VIEW_ATTR_RE.is_match(trimmed) {
            pending_decorators.push(("view".to_string(), line_no));
            continue;
        }
        if GENERIC_ATTR_RE.is_match(trimmed) {
            pending_decorators.push((trimmed.to_string(), line_no));
            continue;
        }

        // `#[starknet::contract]`/`interface`/`component` must be followed
        // within 3 lines by the declaration they tag; anything further away
        // silently expires (tolerant parsing).
        let recent_marker = |name: &str| -> bool {
            pending_decorators
                .iter()
                .rev()
                .take(3)
                .any(|(d, _)| d == name)
        };

        if let Some(caps) = MOD_RE.captures(trimmed) {
            let name = caps.get(2).unwrap().as_str().to_string();
            let kind = if recent_marker("starknet::contract") {
                EntityKind::Contract
            } else if recent_marker("starknet::component") {
                EntityKind::Component
            } else {
                EntityKind::Module
            };
            let open_byte = line_start + raw_line.find('{').unwrap();
            handle_block(
                text, cursor, module_path, file_path, &name, kind, open_byte, line_no, entities,
                errors, depth,
            );
            pending_decorators.clear();
            continue;
        }

        if let Some(caps) = TRAIT_RE.captures(trimmed) {
            let name = caps.get(2).unwrap().as_str().to_string();
            let kind = if recent_marker("starknet::interface") {
                EntityKind::Interface
            } else {
                EntityKind::Trait
            };
            if let Some(brace_col) = raw_line.find('{') {
                let open_byte = line_start + brace_col;
                handle_block(
                    text, cursor, module_path, file_path, &name, kind, open_byte, line_no,
                    entities, errors, depth,
                );
            } else {
                // Trait declarations without a body (forward declarations)
                // are recorded as empty entities.
                let path = module_path.join(&name);
                let mut entity = ContractInfo::new(name, path, kind);
                entity.file_path = Some(file_path.clone());
                entities.push(entity);
            }
            pending_decorators.clear();
            continue;
        }

        if STORAGE_ATTR_RE.is_match(trimmed) || recent_marker("storage") {
            if let Some(caps) = STRUCT_RE.captures(trimmed) {
                let open_byte = line_start + raw_line.find('{').unwrap();
                let close_byte = match find_matching_brace(text, open_byte) {
                    Some(c) => c,
                    None => {
                        errors.push(ParseError::new(
                            ErrorKind::ParseError,
                            format!("unclosed storage block `{}`", caps.get(2).unwrap().as_str()),
                            Some(line_no),
                        ));
                        pending_decorators.clear();
                        continue;
                    }
                };
                let body = &text[open_byte + 1..close_byte];
                let body_start_line = line_offset + line_at(&starts, open_byte + 1);
                into.storage_vars
                    .extend(parse_storage_fields(body, body_start_line));
                *cursor = (close_byte + 1).min(bytes.len());
                pending_decorators.clear();
                continue;
            }
        }

        if recent_marker("event") {
            let name = STRUCT_RE
                .captures(trimmed)
                .or_else(|| ENUM_RE.captures(trimmed))
                .map(|c| c.get(2).unwrap().as_str().to_string());
            if let Some(name) = name {
                if let Some(brace_col) = raw_line.find('{') {
                    let open_byte = line_start + brace_col;
                    if let Some(close_byte) = find_matching_brace(text, open_byte) {
                        *cursor = (close_byte + 1).min(bytes.len());
                    }
                }
                into.events.push(EventInfo { name, line: line_no });
                pending_decorators.clear();
                continue;
            }
        }

        if let Some(caps) = USE_BRACE_RE.captures(trimmed) {
            let base = caps.get(1).unwrap().as_str();
            let symbols: Vec<String> = caps
                .get(2)
                .unwrap()
                .as_str()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            into.imports.push(ImportInfo {
                path: ModulePath::new(base),
                symbols,
                line: line_no,
                resolved: false,
                stub_created: false,
            });
            pending_decorators.clear();
            continue;
        }
        if let Some(caps) = USE_SINGLE_RE.captures(trimmed) {
            // Whether the trailing segment is a module or an imported symbol
            // is undecidable here (`use a::b;` vs `use a::b::Foo;` look the
            // same shape-wise); the full literal path is recorded as
            // written and the Linker's progressive suffix-stripping sorts
            // out the symbol/module boundary.
            let full = caps.get(1).unwrap().as_str();
            into.imports.push(ImportInfo {
                path: ModulePath::new(full),
                symbols: Vec::new(),
                line: line_no,
                resolved: false,
                stub_created: false,
            });
            pending_decorators.clear();
            continue;
        }

        if let Some(head) = FN_HEAD_RE.captures(trimmed) {
            let open_rel = head.get(0).unwrap().end() - 1;
            let parsed = find_matching_paren(trimmed, open_rel).and_then(|close_rel| {
                let tail = &trimmed[close_rel + 1..];
                FN_TAIL_RE
                    .captures(tail)
                    .map(|tail_caps| (close_rel, tail_caps))
            });

            if let Some((close_rel, tail_caps)) = parsed {
                let is_pub = head.get(1).is_some();
                let name = head.get(2).unwrap().as_str().to_string();
                let params_text = &trimmed[open_rel + 1..close_rel];
                let returns_text = tail_caps.get(2).map(|m| m.as_str().to_string());
                let terminator = tail_caps.get(3).unwrap().as_str();

                let mut visibility = Visibility::Internal;
                let mut decorators = Vec::new();
                let mut visibility_set = false;
                for (d, _) in pending_decorators.iter() {
                    decorators.push(format!("#[{d}]"));
                    if d == "external" {
                        visibility = Visibility::External;
                        visibility_set = true;
                    } else if d == "view" {
                        visibility = Visibility::View;
                        visibility_set = true;
                    }
                }
                if is_pub && !visibility_set {
                    visibility = Visibility::External;
                }

                let params = split_top_level_commas(params_text)
                    .into_iter()
                    .map(|p| {
                        let (name, ty) = split_name_type(&p);
                        Param { name, ty }
                    })
                    .collect();
                let returns = returns_text
                    .map(|r| split_top_level_commas(&r))
                    .unwrap_or_default();

                let body = if terminator == "{" {
                    let open_byte = line_start + raw_line.rfind('{').unwrap();
                    match find_matching_brace(text, open_byte) {
                        Some(close_byte) => {
                            let body_text = text[open_byte + 1..close_byte].to_string();
                            let body_start_line = line_offset + line_at(&starts, open_byte + 1);
                            *cursor = (close_byte + 1).min(bytes.len());
                            Some(FunctionBody {
                                text: body_text,
                                start_line: body_start_line,
                            })
                        }
                        None => {
                            errors.push(ParseError::new(
                                ErrorKind::ParseError,
                                format!("unclosed function body `{name}`"),
                                Some(line_no),
                            ));
                            None
                        }
                    }
                } else {
                    None
                };

                into.functions.push(FunctionInfo {
                    name,
                    visibility,
                    params,
                    returns,
                    decorators,
                    line: line_no,
                    is_stub: false,
                    body,
                });
                pending_decorators.clear();
                continue;
            }
        }

        // Unrecognized line: tolerated, no warning noise for ordinary
        // expression-level lines outside any recognized shape.
        pending_decorators.clear();
    }
}

/// Handles a brace-delimited top-level entity: captures its body, recurses
/// one level into it to pick up nested functions/storage/events/imports,
/// and pushes the resulting entity onto `entities`.
#[allow(clippy::too_many_arguments)]
fn handle_block(
    text: &str,
    cursor: &mut usize,
    module_path: &ModulePath,
    file_path: &Utf8PathBuf,
    name: &str,
    kind: EntityKind,
    open_byte: usize,
    line_no: usize,
    entities: &mut Vec<ContractInfo>,
    errors: &mut Vec<ParseError>,
    depth: u32,
) {
    let close_byte = match find_matching_brace(text, open_byte) {
        Some(c) => c,
        None => {
            errors.push(ParseError::new(
                ErrorKind::ParseError,
                format!("unclosed block for `{name}`"),
                Some(line_no),
            ));
            *cursor = text.len();
            return;
        }
    };

    let path = module_path.join(name);
    let mut entity = ContractInfo::new(name.to_string(), path.clone(), kind);
    entity.file_path = Some(file_path.clone());

    if depth < 1 {
        let outer_starts = line_starts(text);
        let base_line = line_at(&outer_starts, open_byte + 1);
        let inner = &text[open_byte + 1..close_byte];
        let mut inner_cursor = 0usize;
        let mut inner_decorators = Vec::new();
        scan(
            inner,
            base_line.saturating_sub(1),
            &mut inner_cursor,
            &path,
            file_path,
            &mut inner_decorators,
            &mut entity,
            entities,
            errors,
            depth + 1,
        );
    }

    *cursor = (close_byte + 1).min(text.len());
    entities.push(entity);
}

fn parse_storage_fields(body: &str, start_line: usize) -> Vec<StorageVar> {
    let mut vars = Vec::new();
    let starts = line_starts(body);
    for piece in split_top_level_commas(body) {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        let (name, ty) = split_name_type(piece);
        if name.is_empty() {
            continue;
        }
        let offset = body.find(piece).unwrap_or(0);
        let line = start_line + line_at(&starts, offset).saturating_sub(1);
        vars.push(StorageVar { name, ty, line });
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> Utf8PathBuf {
        Utf8PathBuf::from(p)
    }

    #[test]
    fn parses_contract_with_function_and_storage() {
        let text = "#[starknet::contract]\nmod Foo {\n    #[storage]\n    struct Storage {\n        balance: felt252,\n    }\n\n    #[external(v0)]\n    fn get(self: @ContractState) -> felt252 {\n        self.storage.balance.read()\n    }\n}\n";
        let fp = parse_file(&path("src/foo.cairo"), &ModulePath::new("foo"), text);
        let contract = fp
            .entities
            .iter()
            .find(|e| e.kind == EntityKind::Contract)
            .expect("contract entity");
        assert_eq!(contract.name, "Foo");
        assert_eq!(contract.storage_vars.len(), 1);
        assert_eq!(contract.storage_vars[0].name, "balance");
        assert_eq!(contract.functions.len(), 1);
        assert_eq!(contract.functions[0].visibility, Visibility::External);
        assert!(contract.functions[0].has_body());
    }

    #[test]
    fn parses_imports() {
        let text = "use crate::a::foo::Foo;\nuse core::array::{ArrayTrait, Array};\nmod Bar {\n}\n";
        let fp = parse_file(&path("src/bar.cairo"), &ModulePath::new("bar"), text);
        let module = fp
            .entities
            .iter()
            .find(|e| e.name == "bar")
            .expect("file module");
        assert_eq!(module.imports.len(), 2);
        assert_eq!(module.imports[1].symbols, vec!["ArrayTrait", "Array"]);
    }

    #[test]
    fn function_with_tuple_typed_parameter_is_recognized() {
        let text = "fn pair(x: (u8, u8)) -> u8 {\n    x\n}\n";
        let fp = parse_file(&path("src/pair.cairo"), &ModulePath::new("pair"), text);
        let module = fp
            .entities
            .iter()
            .find(|e| e.name == "pair")
            .expect("file module");
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.functions[0].params.len(), 1);
        assert_eq!(module.functions[0].params[0].name, "x");
        assert_eq!(module.functions[0].params[0].ty, "(u8, u8)");
        assert!(module.functions[0].has_body());
    }

    #[test]
    fn records_unclosed_function_body() {
        let text = "fn broken() {\n    let x = 1;\n";
        let fp = parse_file(&path("src/broken.cairo"), &ModulePath::new("broken"), text);
        assert!(!fp.parse_errors.is_empty());
    }

    #[test]
    fn bare_fn_without_body_is_stubbed_signature() {
        let text = "trait IFoo {\n    fn get(self: @ContractState) -> felt252;\n}\n";
        let fp = parse_file(&path("src/trait.cairo"), &ModulePath::new("trait"), text);
        let t = fp
            .entities
            .iter()
            .find(|e| e.kind == EntityKind::Trait)
            .expect("trait entity");
        assert_eq!(t.functions.len(), 1);
        assert!(!t.functions[0].has_body());
    }
}
