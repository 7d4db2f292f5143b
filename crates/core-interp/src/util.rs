//! Small text-shape helpers for direct-mode statement parsing.
//!
//! `core-compiler` has its own private versions of these (splitting on
//! top-level commas/keywords outside quotes and parens) for the subset of
//! statements it turns into bytecode. The direct-mode dispatcher here
//! needs the same shape-matching for the commands that never compile —
//! `LIST`, `RUN "file"`, `OPEN ... AS #n`, a multi-variable `INPUT`, and
//! so on — so it carries its own copy rather than reaching into a
//! sibling crate's internals.

use core_compiler::PrintSepOp;

pub fn is_simple_ident(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() {
        return false;
    }
    let core = s.strip_suffix('$').unwrap_or(s);
    let mut chars = core.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric())
}

/// Splits `text` on `,` at paren depth 0, outside quoted strings.
pub fn split_top_level_commas(text: &str) -> Vec<&str> {
    split_top_level_on(text, |c| c == ',')
}

fn split_top_level_on(text: &str, is_delim: impl Fn(char) -> bool) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut in_string = false;
    for (i, ch) in text.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth -= 1,
            c if !in_string && depth == 0 && is_delim(c) => {
                out.push(&text[start..i]);
                start = i + ch.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&text[start..]);
    out
}

/// Splits a `NAME` or `NAME(args)` target into its name and, when present,
/// the unparsed text between the parens.
pub fn split_name_and_args(text: &str) -> Option<(&str, Option<&str>)> {
    let text = text.trim();
    match text.find('(') {
        Some(paren) if text.ends_with(')') => {
            let name = text[..paren].trim();
            if !is_simple_ident(name) {
                return None;
            }
            Some((name, Some(&text[paren + 1..text.len() - 1])))
        }
        Some(_) => None,
        None => {
            if !is_simple_ident(text) {
                return None;
            }
            Some((text, None))
        }
    }
}

pub fn find_top_level_eq(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut in_string = false;
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_string = !in_string,
            b'(' if !in_string => depth += 1,
            b')' if !in_string => depth -= 1,
            b'=' if !in_string && depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Finds an ASCII keyword at the top level of `s`: outside quoted strings
/// and not embedded in a longer identifier.
pub fn find_top_level_keyword(s: &str, kw: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                in_string = !in_string;
                i += 1;
            }
            _ if !in_string && s[i..].starts_with(kw) => {
                let before_ok = i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
                let after = i + kw.len();
                let after_ok = after >= bytes.len() || !bytes[after].is_ascii_alphanumeric();
                if before_ok && after_ok {
                    return Some(i);
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// The first word of a statement, used to dispatch on its command. `?`
/// and `PR.` are recognized `PRINT` aliases.
pub fn leading_keyword(stmt: &str) -> &str {
    let trimmed = stmt.trim_start();
    if trimmed.starts_with('?') {
        return &trimmed[..1];
    }
    if trimmed.len() >= 3 && trimmed[..3].eq_ignore_ascii_case("PR.") {
        return &trimmed[..3];
    }
    let end = trimmed.find(|c: char| c.is_whitespace() || c == ':').unwrap_or(trimmed.len());
    &trimmed[..end]
}

/// Splits a `PRINT` argument list into `(text, trailing_separator)` pairs,
/// identically to the compiler's own item splitter (spec.md §4.D PRINT
/// separator rules: `,` tabs to the next print zone, `;` concatenates with
/// no space, a trailing separator suppresses the newline).
pub fn split_print_items(rest: &str) -> Vec<(String, Option<PrintSepOp>)> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Vec::new();
    }
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_string = false;
    for ch in rest.chars() {
        match ch {
            '"' => {
                in_string = !in_string;
                current.push(ch);
            }
            '(' if !in_string => {
                depth += 1;
                current.push(ch);
            }
            ')' if !in_string => {
                depth -= 1;
                current.push(ch);
            }
            ',' if !in_string && depth == 0 => {
                items.push((current.trim().to_string(), Some(PrintSepOp::Comma)));
                current.clear();
            }
            ';' if !in_string && depth == 0 => {
                items.push((current.trim().to_string(), Some(PrintSepOp::Semicolon)));
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() || items.is_empty() {
        items.push((current.trim().to_string(), None));
    }
    items
}

/// Strips one layer of matching double quotes, used for a literal string
/// operand to `RUN`/`LOAD`/`SAVE`/`OPEN`.
pub fn strip_quotes(s: &str) -> Option<&str> {
    let s = s.trim();
    let s = s.strip_prefix('"')?;
    s.strip_suffix('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_commas_outside_parens_and_strings() {
        let parts = split_top_level_commas(r#"A(1,2), "x,y", B"#);
        assert_eq!(parts, vec!["A(1,2)", " \"x,y\"", " B"]);
    }

    #[test]
    fn finds_then_else_ignoring_identifiers() {
        let s = "X > ATHENA THEN PRINT 1 ELSE PRINT 2";
        let then = find_top_level_keyword(s, "THEN").unwrap();
        assert_eq!(&s[then..then + 4], "THEN");
    }

    #[test]
    fn leading_keyword_recognizes_print_aliases() {
        assert_eq!(leading_keyword("? 1"), "?");
        assert_eq!(leading_keyword("PR. 1"), "PR.");
        assert_eq!(leading_keyword("PRINT 1"), "PRINT");
    }
}
