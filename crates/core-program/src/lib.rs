//! Program store (spec component C): a line-numbered source map plus a
//! DATA-statement pool rebuilt from it on every mutation.

use core_value::{BasicError, ErrorCode, Value};
use std::collections::BTreeMap;

/// Strips embedded control characters, collapses CRLF/CR to nothing (a
/// program line is single-line source text; any trailing line terminator
/// the caller forwarded is noise), and uppercases identifiers that lie
/// outside string literals. Characters inside a quoted string, including
/// the quotes themselves, are passed through untouched.
pub fn normalize_line(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_string = false;
    for ch in raw.chars() {
        match ch {
            '\r' | '\n' => continue,
            '"' => {
                in_string = !in_string;
                out.push(ch);
            }
            c if c.is_control() => continue,
            c if in_string => out.push(c),
            c => out.push(c.to_ascii_uppercase()),
        }
    }
    out
}

/// Mapping from line number to normalized source text, with DATA items
/// extracted in ascending line order into a read-cursor-backed pool.
/// Lookups use `BTreeMap`'s own ordered structure in place of a separately
/// maintained sorted index: both give O(log N) line lookup and ordered
/// iteration, and keeping one less parallel structure in sync removes a
/// whole class of off-by-one bugs during insert/delete.
#[derive(Default)]
pub struct ProgramStore {
    lines: BTreeMap<u32, String>,
    data_pool: Vec<String>,
    data_cursor: usize,
}

impl ProgramStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores or deletes line `n` depending on whether `code` is empty
    /// after normalization, then rebuilds the DATA pool from scratch.
    pub fn edit_line(&mut self, n: u32, code: &str) {
        let normalized = normalize_line(code);
        if normalized.trim().is_empty() {
            self.lines.remove(&n);
        } else {
            self.lines.insert(n, normalized);
        }
        self.rebuild_data_pool();
    }

    pub fn get(&self, n: u32) -> Option<&str> {
        self.lines.get(&n).map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.data_pool.clear();
        self.data_cursor = 0;
    }

    /// Smallest line number strictly greater than `current`, or 0 if the
    /// program has no further lines. A `current` of 0 returns the first
    /// line, which is how the dispatcher starts a fresh `RUN`.
    pub fn find_next_line(&self, current: u32) -> u32 {
        self.lines
            .range((std::ops::Bound::Excluded(current), std::ops::Bound::Unbounded))
            .next()
            .map(|(&n, _)| n)
            .unwrap_or(0)
    }

    pub fn first_line(&self) -> u32 {
        self.lines.keys().next().copied().unwrap_or(0)
    }

    pub fn lines(&self) -> impl Iterator<Item = (u32, &str)> {
        self.lines.iter().map(|(&n, s)| (n, s.as_str()))
    }

    /// A stable fingerprint of the stored program, used by the compiler to
    /// skip recompilation across `RUN` invocations when nothing changed.
    pub fn fingerprint(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for (n, src) in &self.lines {
            n.hash(&mut hasher);
            src.hash(&mut hasher);
        }
        hasher.finish()
    }

    fn rebuild_data_pool(&mut self) {
        self.data_pool.clear();
        self.data_cursor = 0;
        for (_, src) in self.lines.iter() {
            for stmt in split_top_level_colons(src) {
                if let Some(items) = data_items(&stmt) {
                    self.data_pool.extend(items);
                }
            }
        }
    }

    /// Advances the DATA cursor and returns the next item, or
    /// `OUT_OF_DATA` once the pool is exhausted.
    pub fn read_next_data(&mut self) -> Result<String, BasicError> {
        match self.data_pool.get(self.data_cursor) {
            Some(item) => {
                self.data_cursor += 1;
                Ok(item.clone())
            }
            None => Err(BasicError::new(ErrorCode::OutOfData, "out of DATA")),
        }
    }

    pub fn restore(&mut self) {
        self.data_cursor = 0;
    }

    pub fn data_len(&self) -> usize {
        self.data_pool.len()
    }
}

/// Splits a source line into colon-separated statements the way the
/// statement dispatcher and the bytecode compiler both need (spec.md
/// §4.D): a `REM` statement swallows the rest of the line as one comment,
/// and once an `IF ... THEN` is seen the remainder of the line is kept as
/// a single atomic statement — "colons inside do not split further" — so
/// the `IF` handler itself is responsible for any further colon-joined
/// sub-statements in its taken branch.
pub fn split_statements(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut chars = line.char_indices().peekable();
    while let Some((_, ch)) = chars.next() {
        match ch {
            '"' => {
                in_string = !in_string;
                current.push(ch);
            }
            ':' if !in_string => {
                let word = first_word_upper(&current);
                if word == "REM" {
                    current.push(ch);
                    continue;
                }
                out.push(std::mem::take(&mut current));
            }
            _ if !in_string => {
                current.push(ch);
                let word = first_word_upper(&current);
                if word == "REM" || (word == "IF" && contains_top_level_then(&current)) {
                    // Swallow the remainder of the physical line verbatim.
                    for (_, rest_ch) in chars.by_ref() {
                        current.push(rest_ch);
                    }
                    break;
                }
            }
            _ => current.push(ch),
        }
    }
    out.push(current);
    out
}

fn first_word_upper(stmt: &str) -> String {
    stmt.trim_start()
        .split(|c: char| c.is_whitespace() || c == ':')
        .next()
        .unwrap_or("")
        .to_ascii_uppercase()
}

/// Whether `stmt` (an in-progress `IF` statement) already contains a
/// top-level `THEN` keyword outside of any string literal.
fn contains_top_level_then(stmt: &str) -> bool {
    let upper = stmt.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                in_string = !in_string;
                i += 1;
            }
            b'T' if !in_string && upper[i..].starts_with("THEN") => {
                let before_ok = i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
                let after = i + 4;
                let after_ok = after >= bytes.len() || !bytes[after].is_ascii_alphanumeric();
                if before_ok && after_ok {
                    return true;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    false
}

/// Splits `line` on `:` at the top level, leaving colons inside quoted
/// strings untouched. Does not special-case `REM`/`THEN`; that belongs to
/// the statement dispatcher, which reassembles trailing text itself when a
/// statement calls for slurping the remainder of the line.
fn split_top_level_colons(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    for ch in line.chars() {
        match ch {
            '"' => {
                in_string = !in_string;
                current.push(ch);
            }
            ':' if !in_string => {
                out.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    out.push(current);
    out
}

/// If `stmt` is a `DATA` statement, returns its comma-separated items with
/// surrounding whitespace trimmed and one layer of quotes stripped from
/// quoted items; otherwise `None`.
fn data_items(stmt: &str) -> Option<Vec<String>> {
    let trimmed = stmt.trim_start();
    let rest = trimmed.strip_prefix("DATA")?;
    if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with(',') {
        return None;
    }
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    for ch in rest.chars() {
        match ch {
            '"' => in_string = !in_string,
            ',' if !in_string => {
                items.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    items.push(current.trim().to_string());
    Some(items)
}

/// Coerces a raw DATA-pool item (spec.md §6 scenario 5: `DATA 1,2,"HI"`)
/// into a typed `Value` for the `READ` target. A quoted item has its
/// surrounding quotes stripped regardless of target type; an unquoted item
/// parses as a number for a numeric target and is a `TYPE_MISMATCH` if it
/// doesn't parse, or is used verbatim for a string target.
pub fn coerce_data_item(raw: &str, is_string_target: bool) -> Result<Value, BasicError> {
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    if is_string_target {
        return Ok(Value::Str(unquoted.into()));
    }
    unquoted
        .trim()
        .parse::<f64>()
        .map(Value::Num)
        .map_err(|_| BasicError::new(ErrorCode::TypeMismatch, format!("DATA item `{raw}` is not numeric")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_crlf_and_uppercases_outside_strings() {
        assert_eq!(normalize_line("print \"hi\"\r\n"), "PRINT \"hi\"");
    }

    #[test]
    fn normalize_leaves_string_contents_case_intact() {
        assert_eq!(normalize_line("PRINT \"Hello World\""), "PRINT \"Hello World\"");
    }

    #[test]
    fn edit_line_overwrite_and_delete() {
        let mut store = ProgramStore::new();
        store.edit_line(10, "PRINT 1");
        assert_eq!(store.get(10), Some("PRINT 1"));
        store.edit_line(10, "PRINT 2");
        assert_eq!(store.get(10), Some("PRINT 2"));
        store.edit_line(10, "");
        assert_eq!(store.get(10), None);
        assert!(store.is_empty());
    }

    #[test]
    fn find_next_line_skips_gaps_and_wraps_to_zero() {
        let mut store = ProgramStore::new();
        store.edit_line(10, "REM a");
        store.edit_line(30, "REM b");
        assert_eq!(store.find_next_line(0), 10);
        assert_eq!(store.find_next_line(10), 30);
        assert_eq!(store.find_next_line(30), 0);
    }

    #[test]
    fn data_pool_rebuilds_in_line_order_across_statements() {
        let mut store = ProgramStore::new();
        store.edit_line(20, "DATA 4,5");
        store.edit_line(10, "DATA 1,2,3");
        assert_eq!(store.data_len(), 5);
        assert_eq!(store.read_next_data().unwrap(), "1");
        assert_eq!(store.read_next_data().unwrap(), "2");
        store.restore();
        assert_eq!(store.read_next_data().unwrap(), "1");
    }

    #[test]
    fn data_items_ignore_commas_inside_quotes() {
        let mut store = ProgramStore::new();
        store.edit_line(10, "DATA \"A,B\",C");
        assert_eq!(store.data_len(), 2);
        assert_eq!(store.read_next_data().unwrap(), "\"A,B\"");
    }

    #[test]
    fn read_past_end_of_pool_is_out_of_data() {
        let mut store = ProgramStore::new();
        store.edit_line(10, "DATA 1");
        store.read_next_data().unwrap();
        assert!(store.read_next_data().is_err());
    }

    #[test]
    fn fingerprint_changes_when_a_line_is_edited() {
        let mut store = ProgramStore::new();
        store.edit_line(10, "PRINT 1");
        let a = store.fingerprint();
        store.edit_line(10, "PRINT 2");
        let b = store.fingerprint();
        assert_ne!(a, b);
    }

    #[test]
    fn split_statements_splits_plain_colons() {
        assert_eq!(split_statements("A=1:B=2:C=3"), vec!["A=1", "B=2", "C=3"]);
    }

    #[test]
    fn split_statements_keeps_colons_inside_quotes() {
        assert_eq!(split_statements("PRINT \"A:B\":PRINT C"), vec!["PRINT \"A:B\"", "PRINT C"]);
    }

    #[test]
    fn split_statements_rem_swallows_trailing_colons() {
        let parts = split_statements("PRINT 1:REM a comment: with colons");
        assert_eq!(parts, vec!["PRINT 1", "REM a comment: with colons"]);
    }

    #[test]
    fn split_statements_if_then_swallows_rest_of_line() {
        let parts = split_statements("IF X=1 THEN PRINT 1:PRINT 2 ELSE PRINT 3");
        assert_eq!(parts, vec!["IF X=1 THEN PRINT 1:PRINT 2 ELSE PRINT 3"]);
    }

    #[test]
    fn split_statements_leading_stmt_before_if_still_splits() {
        let parts = split_statements("X=1:IF X=1 THEN Y=2:Z=3");
        assert_eq!(parts, vec!["X=1", "IF X=1 THEN Y=2:Z=3"]);
    }

    #[test]
    fn coerce_data_item_strips_quotes_for_string_target() {
        assert_eq!(coerce_data_item("\"HI\"", true).unwrap(), Value::Str("HI".into()));
        assert_eq!(coerce_data_item("HI", true).unwrap(), Value::Str("HI".into()));
    }

    #[test]
    fn coerce_data_item_parses_numeric_target() {
        assert_eq!(coerce_data_item("42", false).unwrap(), Value::Num(42.0));
        assert_eq!(coerce_data_item(" 3.5 ", false).unwrap(), Value::Num(3.5));
    }

    #[test]
    fn coerce_data_item_non_numeric_is_type_mismatch() {
        assert!(matches!(coerce_data_item("ABC", false), Err(e) if e.code == ErrorCode::TypeMismatch));
    }
}
