use core_value::{format_number, BasicError, ErrorCode};
use unicode_segmentation::UnicodeSegmentation;

/// Grapheme-cluster count, matching `LEN`'s "rune-aware" contract: a
/// combining-mark sequence or an emoji with skin-tone modifiers counts as
/// one character, the same way a user editing the string would count it.
pub fn len(s: &str) -> i64 {
    s.graphemes(true).count() as i64
}

pub fn chr_dollar(code: f64) -> Result<String, BasicError> {
    let code = code as u32;
    char::from_u32(code)
        .map(|c| c.to_string())
        .ok_or_else(|| BasicError::new(ErrorCode::IllegalArgument, format!("CHR$({code}) is not a valid character code")))
}

pub fn left_dollar(s: &str, n: f64) -> Result<String, BasicError> {
    let n = non_negative_count(n)?;
    Ok(s.graphemes(true).take(n).collect())
}

pub fn right_dollar(s: &str, n: f64) -> Result<String, BasicError> {
    let n = non_negative_count(n)?;
    let graphemes: Vec<&str> = s.graphemes(true).collect();
    let start = graphemes.len().saturating_sub(n);
    Ok(graphemes[start..].concat())
}

/// `MID$(s, start[, len])`, 1-based `start`. Omitted `len` takes the rest
/// of the string. A `start` beyond the string's length yields "".
pub fn mid_dollar(s: &str, start: f64, len: Option<f64>) -> Result<String, BasicError> {
    let start = non_negative_count(start)?;
    if start == 0 {
        return Err(BasicError::new(ErrorCode::IllegalArgument, "MID$ start must be >= 1"));
    }
    let graphemes: Vec<&str> = s.graphemes(true).collect();
    let from = start - 1;
    if from >= graphemes.len() {
        return Ok(String::new());
    }
    let take = match len {
        Some(l) => non_negative_count(l)?,
        None => graphemes.len() - from,
    };
    let to = (from + take).min(graphemes.len());
    Ok(graphemes[from..to].concat())
}

pub fn str_dollar(n: f64) -> String {
    format_number(n)
}

/// Parses the leading numeric prefix of `s`, classic-BASIC style: leading
/// whitespace is skipped, parsing stops at the first character that can't
/// extend a valid number, and a string with no numeric prefix yields 0.
pub fn val(s: &str) -> f64 {
    let trimmed = s.trim_start();
    let bytes = trimmed.as_bytes();
    let mut i = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' => {
                seen_digit = true;
                i += 1;
            }
            b'.' if !seen_dot => {
                seen_dot = true;
                i += 1;
            }
            _ => break,
        }
    }
    if !seen_digit {
        return 0.0;
    }
    trimmed[..i].parse::<f64>().unwrap_or(0.0)
}

fn non_negative_count(n: f64) -> Result<usize, BasicError> {
    if n < 0.0 || !n.is_finite() {
        return Err(BasicError::new(ErrorCode::IllegalArgument, "expected a non-negative count"));
    }
    Ok(n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_counts_grapheme_clusters_not_bytes() {
        assert_eq!(len("hi"), 2);
        assert_eq!(len("é"), 1); // single precomposed grapheme
    }

    #[test]
    fn left_and_right_slice_by_graphemes() {
        assert_eq!(left_dollar("HELLO", 3.0).unwrap(), "HEL");
        assert_eq!(right_dollar("HELLO", 3.0).unwrap(), "LLO");
        assert_eq!(left_dollar("HI", 10.0).unwrap(), "HI");
    }

    #[test]
    fn mid_dollar_defaults_to_rest_of_string() {
        assert_eq!(mid_dollar("HELLO", 2.0, None).unwrap(), "ELLO");
        assert_eq!(mid_dollar("HELLO", 2.0, Some(2.0)).unwrap(), "EL");
        assert_eq!(mid_dollar("HELLO", 99.0, None).unwrap(), "");
    }

    #[test]
    fn chr_dollar_rejects_invalid_code_points() {
        assert_eq!(chr_dollar(65.0).unwrap(), "A");
        assert!(chr_dollar(0x110000 as f64).is_err());
    }

    #[test]
    fn val_parses_leading_numeric_prefix_and_stops_at_junk() {
        assert_eq!(val("42abc"), 42.0);
        assert_eq!(val("  -3.5xyz"), -3.5);
        assert_eq!(val("xyz"), 0.0);
    }

    #[test]
    fn str_dollar_uses_minimal_digit_formatting() {
        assert_eq!(str_dollar(3.0), "3");
        assert_eq!(str_dollar(3.5), "3.5");
    }
}
