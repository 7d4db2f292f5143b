/// Fixed set of built-in function names. A `NAME(args)` form is a function
/// call exactly when `NAME` appears here; every other `NAME(args)` is array
/// indexing (spec.md §4.B: "A function call is distinguished from an array
/// access by name").
pub const FUNCTION_NAMES: &[&str] = &[
    "ABS", "SGN", "INT", "SIN", "COS", "TAN", "ATN", "ASIN", "ACOS", "ATAN", "EXP", "LOG",
    "LOG10", "SQR", "SQRT", "RND", "LEN", "CHR$", "LEFT$", "RIGHT$", "MID$", "STR$", "VAL",
    "EOF", "KEYSTATE", "KEYPRESSED", "COLLISION",
];

pub fn is_function_name(name: &str) -> bool {
    FUNCTION_NAMES.contains(&name)
}

/// Pure functions eligible for compile-time constant folding (spec.md
/// §4.B). Deliberately a superset of the numeric builtins enumerated in
/// the built-in function library (spec.md §4.H also lists `SGN`/`RND`,
/// which are excluded here since folding a random draw or a
/// discontinuous sign function at compile time would be observably wrong
/// or simply pointless).
pub const FOLDABLE_FUNCTIONS: &[&str] = &[
    "ABS", "INT", "SIN", "COS", "TAN", "ASIN", "ACOS", "ATAN", "LOG", "LOG10", "EXP", "SQR", "SQRT",
];

pub fn is_foldable_function(name: &str) -> bool {
    FOLDABLE_FUNCTIONS.contains(&name)
}
