/// The separator, if any, that followed a `PRINT` item in the source.
/// Only the last item in a statement may legally have `None` — every
/// interior item is followed by a comma or semicolon by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintSep {
    Comma,
    Semicolon,
}

/// Renders a `PRINT` item list into the text to emit plus whether the
/// statement's own trailing newline should be suppressed (spec.md §8:
/// trailing `;` or `,` both suppress it, `,` additionally emits a 4-space
/// tab first, and an item list with no trailing separator prints a plain
/// newline — including the empty list, i.e. a bare `PRINT`).
pub fn format_print(items: &[(String, Option<PrintSep>)]) -> (String, bool) {
    let mut out = String::new();
    for (text, sep) in items {
        out.push_str(text);
        if sep == &Some(PrintSep::Comma) {
            out.push_str("    ");
        }
    }
    let suppress_newline = matches!(items.last(), Some((_, Some(_))));
    (out, suppress_newline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_print_emits_newline() {
        let (text, suppress) = format_print(&[]);
        assert_eq!(text, "");
        assert!(!suppress);
    }

    #[test]
    fn trailing_semicolon_suppresses_newline_with_no_space() {
        let (text, suppress) = format_print(&[("HI".into(), Some(PrintSep::Semicolon))]);
        assert_eq!(text, "HI");
        assert!(suppress);
    }

    #[test]
    fn trailing_comma_emits_tab_and_suppresses_newline() {
        let (text, suppress) = format_print(&[("HI".into(), Some(PrintSep::Comma))]);
        assert_eq!(text, "HI    ");
        assert!(suppress);
    }

    #[test]
    fn interior_separators_join_without_extra_newline() {
        let (text, suppress) = format_print(&[
            ("A".into(), Some(PrintSep::Semicolon)),
            ("B".into(), Some(PrintSep::Comma)),
            ("C".into(), None),
        ]);
        assert_eq!(text, "AB    C");
        assert!(!suppress);
    }
}
