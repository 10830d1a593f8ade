//! Statement Parser: folds a function body's raw text into a flat, ordered
//! sequence of classified [`Statement`]s with absolute line numbers.

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::{Statement, StatementKind};
use crate::parser::util::{
    find_matching_brace, line_at, line_starts, names_in_expr, split_top_level_commas,
};

lazy_static! {
    static ref LET_WITH_INIT_RE: Regex =
        Regex::new(r"^let\s+(?:mut\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*(?::[^=]+)?=\s*(.+)$").unwrap();
    static ref ASSIGN_RE: Regex =
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.+)$").unwrap();
    static ref STORAGE_READ_RE: Regex =
        Regex::new(r"^self\.storage\.([A-Za-z_][A-Za-z0-9_]*)\.read\s*\((.*)\)$").unwrap();
    static ref STORAGE_WRITE_RE: Regex =
        Regex::new(r"^self\.storage\.([A-Za-z_][A-Za-z0-9_]*)\.write\s*\((.*)\)$").unwrap();
    static ref CALL_RE: Regex = Regex::new(
        r"^([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*\((.*)\)$"
    )
    .unwrap();
    static ref RETURN_RE: Regex = Regex::new(r"^return(?:\s+(.+))?$").unwrap();
    static ref IF_RE: Regex = Regex::new(r"^if\s+(.+)$").unwrap();
    static ref WHILE_RE: Regex = Regex::new(r"^while\s+(.+)$").unwrap();
    static ref FOR_RE: Regex =
        Regex::new(r"^for\s+([A-Za-z_][A-Za-z0-9_]*)\s+in\s+(.+)$").unwrap();
}

/// Parses `body` (raw text captured between a function's braces) into a
/// flat ordered statement list, with line numbers absolute in the original
/// file. `start_line` is the line number of the opening `{`.
pub fn parse_statements(body: &str, start_line: usize) -> Vec<Statement> {
    let mut out = Vec::new();
    scan_block(body, start_line, &mut out);
    out
}

fn scan_block(text: &str, start_line: usize, out: &mut Vec<Statement>) {
    let starts = line_starts(text);
    let mut pos = 0usize;
    let len = text.len();

    while pos < len {
        pos = skip_ws_and_comments(text, pos);
        if pos >= len {
            break;
        }
        if text.as_bytes()[pos] == b'}' {
            // Stray close at this nesting level; tolerate and move on.
            let line = start_line + count_newlines(&starts, pos);
            out.push(Statement::new("}", line, StatementKind::BlockClose));
            pos += 1;
            continue;
        }

        match scan_to_delim(text, pos) {
            Some((idx, delim)) => {
                let header = collapse(&text[pos..idx]);
                let header_line = start_line + count_newlines(&starts, pos);

                if delim == b'{' {
                    let open_byte = idx;
                    let close_byte = match find_matching_brace(text, open_byte) {
                        Some(c) => c,
                        None => {
                            // Unterminated block; record what we have and bail.
                            if !header.is_empty() {
                                out.push(classify_block_header(&header, header_line));
                            }
                            return;
                        }
                    };
                    out.push(classify_block_header(&header, header_line));
                    out.push(Statement::new("{", header_line, StatementKind::BlockOpen));
                    let inner = &text[open_byte + 1..close_byte];
                    let inner_start_line = start_line + count_newlines(&starts, open_byte + 1);
                    scan_block(inner, inner_start_line, out);
                    let close_line = start_line + count_newlines(&starts, close_byte);
                    out.push(Statement::new("}", close_line, StatementKind::BlockClose));
                    pos = close_byte + 1;
                } else {
                    // `;` or `,` terminated, or a stray `}`.
                    if !header.is_empty() {
                        out.push(classify_terminated(&header, header_line));
                    }
                    pos = idx + 1;
                }
            }
            None => {
                let header = collapse(&text[pos..]);
                let header_line = start_line + count_newlines(&starts, pos);
                if !header.is_empty() {
                    out.push(classify_terminated(&header, header_line));
                }
                break;
            }
        }
    }
}

fn collapse(s: &str) -> String {
    s.replace('\n', " ").trim().to_string()
}

fn count_newlines(starts: &[usize], pos: usize) -> usize {
    line_at(starts, pos).saturating_sub(1)
}

fn skip_ws_and_comments(text: &str, mut pos: usize) -> usize {
    let bytes = text.as_bytes();
    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos + 1 < bytes.len() && bytes[pos] == b'/' && bytes[pos + 1] == b'/' {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }
        if pos + 1 < bytes.len() && bytes[pos] == b'/' && bytes[pos + 1] == b'*' {
            pos += 2;
            while pos + 1 < bytes.len() && !(bytes[pos] == b'*' && bytes[pos + 1] == b'/') {
                pos += 1;
            }
            pos = (pos + 2).min(bytes.len());
            continue;
        }
        break;
    }
    pos
}

/// Scans forward from `start` for the first top-level `;`, `,`, `{`, or `}`,
/// skipping string/comment content and anything nested inside `()`/`[]`.
fn scan_to_delim(text: &str, start: usize) -> Option<(usize, u8)> {
    let bytes = text.as_bytes();
    let mut i = start;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while i < bytes.len() {
        let c = bytes[i];
        if in_line_comment {
            if c == b'\n' {
                in_line_comment = false;
            }
            i += 1;
            continue;
        }
        if in_block_comment {
            if c == b'*' && bytes.get(i + 1) == Some(&b'/') {
                in_block_comment = false;
                i += 2;
                continue;
            }
            i += 1;
            continue;
        }
        if in_string {
            if c == b'\\' {
                i += 2;
                continue;
            }
            if c == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            b'"' => {
                in_string = true;
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                in_line_comment = true;
                i += 2;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                in_block_comment = true;
                i += 2;
            }
            b'(' | b'[' => {
                depth += 1;
                i += 1;
            }
            b')' | b']' => {
                depth -= 1;
                i += 1;
            }
            b'{' | b'}' | b';' | b',' if depth <= 0 => return Some((i, c)),
            _ => i += 1,
        }
    }
    None
}

fn classify_block_header(header: &str, line: usize) -> Statement {
    if header.contains("=>") {
        let mut st = Statement::new(header, line, StatementKind::MatchArm);
        st.condition = Some(header.to_string());
        return st;
    }
    if let Some(caps) = IF_RE.captures(header) {
        let cond = caps.get(1).unwrap().as_str().to_string();
        let mut st = Statement::new(header, line, StatementKind::If);
        st.used = names_in_expr(&cond);
        st.condition = Some(cond);
        return st;
    }
    if header.starts_with("else") {
        let mut st = Statement::new(header, line, StatementKind::Else);
        let rest = header["else".len()..].trim();
        if let Some(cond) = rest.strip_prefix("if ") {
            st.used = names_in_expr(cond);
            st.condition = Some(cond.trim().to_string());
        }
        return st;
    }
    if header.trim() == "loop" {
        return Statement::new(header, line, StatementKind::Loop);
    }
    if let Some(caps) = WHILE_RE.captures(header) {
        let cond = caps.get(1).unwrap().as_str().to_string();
        let mut st = Statement::new(header, line, StatementKind::While);
        st.used = names_in_expr(&cond);
        st.condition = Some(cond);
        return st;
    }
    if let Some(caps) = FOR_RE.captures(header) {
        let var = caps.get(1).unwrap().as_str().to_string();
        let iterable = caps.get(2).unwrap().as_str().to_string();
        let mut st = Statement::new(header, line, StatementKind::For);
        st.defined.insert(var);
        st.used = names_in_expr(&iterable);
        st.condition = Some(iterable);
        return st;
    }
    Statement::new(header, line, StatementKind::Other)
}

/// Sets `used` (and `storage_member`, if applicable) for a `let`/assignment
/// initializer expression. When the whole expression is a storage
/// read/write call, its receiver path (`self`, `storage`, the member name)
/// must not leak into `used` as if they were ordinary variables — only the
/// call's own arguments are real uses, and the storage access itself is
/// recorded separately by the dataflow analyzer scanning raw statement text.
fn apply_storage_or_expr_used(st: &mut Statement, expr: &str) {
    let trimmed = expr.trim();
    if let Some(caps) = STORAGE_WRITE_RE.captures(trimmed) {
        st.storage_member = Some(caps.get(1).unwrap().as_str().to_string());
        st.used = names_in_expr(caps.get(2).unwrap().as_str());
        return;
    }
    if let Some(caps) = STORAGE_READ_RE.captures(trimmed) {
        st.storage_member = Some(caps.get(1).unwrap().as_str().to_string());
        st.used = names_in_expr(caps.get(2).unwrap().as_str());
        return;
    }
    st.used = names_in_expr(expr);
}

fn classify_terminated(header: &str, line: usize) -> Statement {
    if header.contains("=>") {
        let mut st = Statement::new(header, line, StatementKind::MatchArm);
        st.condition = Some(header.to_string());
        return st;
    }
    if header == "break" {
        return Statement::new(header, line, StatementKind::Break);
    }
    if header == "continue" {
        return Statement::new(header, line, StatementKind::Continue);
    }
    if let Some(caps) = RETURN_RE.captures(header) {
        let mut st = Statement::new(header, line, StatementKind::Return);
        if let Some(expr) = caps.get(1) {
            st.used = names_in_expr(expr.as_str());
        }
        return st;
    }
    if let Some(caps) = LET_WITH_INIT_RE.captures(header) {
        let name = caps.get(1).unwrap().as_str().to_string();
        let expr = caps.get(2).unwrap().as_str().to_string();
        let mut st = Statement::new(header, line, StatementKind::LetBinding);
        st.defined.insert(name);
        apply_storage_or_expr_used(&mut st, &expr);
        return st;
    }
    // A bare `let x;` with no initializer doesn't match the `let_binding`
    // shape (which requires `= EXPR`) and falls through to `other` below,
    // recording no definition. That's load-bearing: it's what lets
    // uninitialized-use detection see `x` as genuinely undefined on every
    // path that doesn't later assign it.
    if let Some(caps) = STORAGE_WRITE_RE.captures(header) {
        let member = caps.get(1).unwrap().as_str().to_string();
        let args = caps.get(2).unwrap().as_str().to_string();
        let mut st = Statement::new(header, line, StatementKind::StorageWrite);
        st.storage_member = Some(member);
        st.used = names_in_expr(&args);
        return st;
    }
    if let Some(caps) = STORAGE_READ_RE.captures(header) {
        let member = caps.get(1).unwrap().as_str().to_string();
        let mut st = Statement::new(header, line, StatementKind::StorageRead);
        st.storage_member = Some(member);
        return st;
    }
    if let Some(caps) = ASSIGN_RE.captures(header) {
        let name = caps.get(1).unwrap().as_str().to_string();
        let expr = caps.get(2).unwrap().as_str().to_string();
        let mut st = Statement::new(header, line, StatementKind::Assignment);
        st.defined.insert(name);
        apply_storage_or_expr_used(&mut st, &expr);
        return st;
    }
    if let Some(caps) = CALL_RE.captures(header) {
        let callee_path = caps.get(1).unwrap().as_str();
        let args = caps.get(2).unwrap().as_str().to_string();
        let callee = callee_path.rsplit('.').next().unwrap_or(callee_path).to_string();
        let mut st = Statement::new(header, line, StatementKind::Call);
        st.used = names_in_expr(&args);
        st.arguments = split_top_level_commas(&args);
        if let Some((object, _)) = callee_path.split_once('.') {
            if object != "self" {
                st.used.insert(object.to_string());
                st.qualified_call = true;
            }
        }
        st.callee = Some(callee);
        return st;
    }
    Statement::new(header, line, StatementKind::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_let_and_storage_write() {
        let body = "let v = self.storage.balance.read();\nself.storage.balance.write(v + 1);\n";
        let stmts = parse_statements(body, 1);
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].kind, StatementKind::LetBinding);
        assert!(stmts[0].defined.contains("v"));
        assert_eq!(stmts[1].kind, StatementKind::StorageWrite);
        assert_eq!(stmts[1].storage_member.as_deref(), Some("balance"));
        assert!(stmts[1].used.contains("v"));
    }

    #[test]
    fn classifies_branching() {
        let body = "if x {\n    return 1;\n} else {\n    return 2;\n}\n";
        let stmts = parse_statements(body, 1);
        assert_eq!(stmts[0].kind, StatementKind::If);
        assert!(stmts.iter().any(|s| s.kind == StatementKind::Else));
        assert_eq!(
            stmts.iter().filter(|s| s.kind == StatementKind::Return).count(),
            2
        );
    }

    #[test]
    fn uninitialized_let_then_conditional_assignment() {
        let body = "let x;\nif cond {\n    x = 1;\n}\nreturn x;\n";
        let stmts = parse_statements(body, 1);
        // Bare `let x;` has no initializer, so it's `other` with no
        // `defined` — the only real definition of `x` is the conditional
        // assignment.
        assert_eq!(stmts[0].kind, StatementKind::Other);
        assert!(stmts[0].defined.is_empty());
        assert!(stmts.iter().any(|s| s.kind == StatementKind::Assignment));
    }

    #[test]
    fn emits_block_markers_around_loop_body() {
        let body = "loop {\n    break;\n}\n";
        let stmts = parse_statements(body, 1);
        let kinds: Vec<_> = stmts.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StatementKind::Loop,
                StatementKind::BlockOpen,
                StatementKind::Break,
                StatementKind::BlockClose,
            ]
        );
    }

    #[test]
    fn ignores_comments() {
        let body = "// a comment\nlet x = 1; // trailing\n";
        let stmts = parse_statements(body, 1);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].line, 2);
    }
}
