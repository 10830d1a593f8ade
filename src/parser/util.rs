//! Low-level text helpers shared by the lexical parser and the statement
//! parser: brace matching that ignores string/comment content, line/byte
//! offset bookkeeping, and identifier extraction.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

/// Byte offset of the start of every line in `text`, in order. Used to map
/// a byte offset (as produced by [`find_matching_brace`]) back to a 1-based
/// line number.
pub fn line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (idx, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            starts.push(idx + 1);
        }
    }
    starts
}

/// 1-based line number containing byte offset `pos`.
pub fn line_at(line_starts: &[usize], pos: usize) -> usize {
    match line_starts.binary_search(&pos) {
        Ok(idx) => idx + 1,
        Err(idx) => idx, // idx-1 is the containing start; 1-based => idx
    }
}

/// Finds the index of the `}` matching the `{` at `open_idx` (which must be
/// the byte `{`), ignoring brace characters inside `"…"` string literals,
/// `//` line comments, and `/* … */` block comments.
pub fn find_matching_brace(text: &str, open_idx: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    debug_assert_eq!(bytes.get(open_idx), Some(&b'{'));
    let mut depth: i32 = 0;
    let mut i = open_idx;
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
            b'"' => in_string = true,
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                in_line_comment = true;
                i += 2;
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                in_block_comment = true;
                i += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Finds the index of the `)` matching the `(` at `open_idx`, ignoring
/// paren characters inside `"…"` string literals — mirrors
/// `find_matching_brace` but for parentheses, needed because a parameter
/// list can itself contain a parenthesized type (a tuple).
pub fn find_matching_paren(text: &str, open_idx: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    debug_assert_eq!(bytes.get(open_idx), Some(&b'('));
    let mut depth: i32 = 0;
    let mut i = open_idx;
    let mut in_string = false;

    while i < bytes.len() {
        let c = bytes[i];
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
            b'"' => in_string = true,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

lazy_static! {
    static ref IDENT_RE: Regex = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap();
    static ref KEYWORDS: HashSet<&'static str> = [
        "let", "mut", "fn", "if", "else", "loop", "while", "for", "in", "return", "break",
        "continue", "match", "mod", "use", "struct", "enum", "trait", "impl", "pub",
        "super", "crate", "true", "false", "ref", "as", "const", "static", "extern", "type",
        "where", "with", "of",
    ]
    .into_iter()
    .collect();
}

/// Tokens matching `[A-Za-z_][A-Za-z0-9_]*` that are neither language
/// keywords nor immediately followed by `(` (callees are excluded from
/// uses) — the "names-in-EXPR" rule from the statement extraction table.
pub fn names_in_expr(expr: &str) -> std::collections::BTreeSet<String> {
    let mut names = std::collections::BTreeSet::new();
    for m in IDENT_RE.find_iter(expr) {
        let word = m.as_str();
        if KEYWORDS.contains(word) {
            continue;
        }
        let after = expr[m.end()..].trim_start();
        if after.starts_with('(') {
            continue;
        }
        names.insert(word.to_string());
    }
    names
}

/// Splits `s` on top-level commas, respecting `()`, `[]`, `<>`, and `{}`
/// nesting (used for both parameter lists and storage-struct fields).
pub fn split_top_level_commas(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    let chars: Vec<char> = s.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '(' | '[' | '<' | '{' => depth += 1,
            ')' | ']' | '>' | '}' => depth -= 1,
            ',' if depth == 0 => {
                let part: String = chars[start..i].iter().collect();
                parts.push(part.trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail: String = chars[start..].iter().collect();
    let tail = tail.trim();
    if !tail.is_empty() {
        parts.push(tail.to_string());
    }
    parts
}

/// Splits a `name: type`-shaped piece on its first top-level `:`. Anything
/// that fails to split is returned with an empty name and the whole string
/// as the type.
pub fn split_name_type(piece: &str) -> (String, String) {
    let mut depth = 0i32;
    let chars: Vec<char> = piece.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '(' | '[' | '<' | '{' => depth += 1,
            ')' | ']' | '>' | '}' => depth -= 1,
            ':' if depth == 0 => {
                let name: String = chars[..i].iter().collect();
                let ty: String = chars[i + 1..].iter().collect();
                let name = name.trim();
                if name.is_empty() {
                    break;
                }
                return (name.to_string(), ty.trim().to_string());
            }
            _ => {}
        }
    }
    (String::new(), piece.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_brace_across_lines() {
        let text = "fn f() {\n let x = 1;\n}\n";
        let open = text.find('{').unwrap();
        let close = find_matching_brace(text, open).unwrap();
        assert_eq!(&text[close..=close], "}");
    }

    #[test]
    fn ignores_braces_in_strings_and_comments() {
        let text = "fn f() {\n let s = \"}\"; // }\n /* } */ let y = 2;\n}\n";
        let open = text.find('{').unwrap();
        let close = find_matching_brace(text, open).unwrap();
        let body = &text[open + 1..close];
        assert!(body.contains("let y = 2;"));
    }

    #[test]
    fn names_in_expr_excludes_callees_and_keywords() {
        let names = names_in_expr("foo(bar) + baz - if self");
        assert!(names.contains("bar"));
        assert!(names.contains("baz"));
        assert!(names.contains("self"));
        assert!(!names.contains("foo"));
        assert!(!names.contains("if"));
    }

    #[test]
    fn find_matching_paren_skips_nested_parens() {
        let text = "fn f(x: (u8, u8)) {";
        let open = text.find('(').unwrap();
        let close = find_matching_paren(text, open).unwrap();
        assert_eq!(&text[close..=close], ")");
        assert_eq!(&text[open + 1..close], "x: (u8, u8)");
    }

    #[test]
    fn split_top_level_commas_respects_nesting() {
        let parts = split_top_level_commas("a: felt252, b: Array<felt252, u8>, c: (u8, u8)");
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn split_name_type_handles_malformed() {
        assert_eq!(
            split_name_type("x: felt252"),
            ("x".to_string(), "felt252".to_string())
        );
        assert_eq!(
            split_name_type("garbage"),
            (String::new(), "garbage".to_string())
        );
    }
}
