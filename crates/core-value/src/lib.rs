//! Value and structured-error model (spec component A).
//!
//! A [`Value`] is a tagged union of a 64-bit float or an interned string.
//! Every fallible operation elsewhere in the workspace returns
//! `Result<T, BasicError>` rather than a bare string, so a line number,
//! command name, and usage hint can always be attached before the error
//! reaches the user.

mod variables;

pub use variables::VariableTable;

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

pub const TRUE: f64 = -1.0;
pub const FALSE: f64 = 0.0;

/// A BASIC runtime value: either a number or an interned, immutable string.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Str(Rc<str>),
}

impl Value {
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn num(n: f64) -> Self {
        Value::Num(n)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Num(_))
    }

    pub fn as_num(&self) -> Result<f64, BasicError> {
        match self {
            Value::Num(n) => Ok(*n),
            Value::Str(_) => Err(BasicError::new(
                ErrorCode::TypeMismatch,
                "expected a numeric value, found a string",
            )),
        }
    }

    pub fn as_str(&self) -> Result<&str, BasicError> {
        match self {
            Value::Str(s) => Ok(s),
            Value::Num(_) => Err(BasicError::new(
                ErrorCode::TypeMismatch,
                "expected a string value, found a number",
            )),
        }
    }

    pub fn truthy(&self) -> Result<bool, BasicError> {
        Ok(self.as_num()? != FALSE)
    }

    pub fn from_bool(b: bool) -> Self {
        Value::Num(if b { TRUE } else { FALSE })
    }

    /// Default value for a variable name that has never been assigned:
    /// numeric 0 for plain names, empty string for `$`-suffixed names.
    pub fn default_for_name(name: &str) -> Self {
        if name.ends_with('$') {
            Value::Str(Rc::from(""))
        } else {
            Value::Num(0.0)
        }
    }

    /// Minimal-digit numeric formatting used by PRINT/STR$/concatenation.
    pub fn display_string(&self) -> Rc<str> {
        match self {
            Value::Str(s) => s.clone(),
            Value::Num(n) => Rc::from(format_number(*n)),
        }
    }
}

/// Formats a float the way classic BASIC does: integral values print with
/// no trailing `.0`, and otherwise the shortest round-tripping decimal is
/// used (Rust's default `{}` formatter already produces the shortest
/// round-tripping representation, so only the integral special case needs
/// explicit handling).
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NAN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "INF".to_string() } else { "-INF".to_string() };
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl Value {
    pub fn add(&self, other: &Value) -> Result<Value, BasicError> {
        match (self, other) {
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                let mut s = String::with_capacity(16);
                s.push_str(&self.display_string());
                s.push_str(&other.display_string());
                Ok(Value::Str(Rc::from(s)))
            }
            (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a + b)),
        }
    }

    pub fn sub(&self, other: &Value) -> Result<Value, BasicError> {
        Ok(Value::Num(self.as_num()? - other.as_num()?))
    }

    pub fn mul(&self, other: &Value) -> Result<Value, BasicError> {
        Ok(Value::Num(self.as_num()? * other.as_num()?))
    }

    pub fn div(&self, other: &Value) -> Result<Value, BasicError> {
        let (a, b) = (self.as_num()?, other.as_num()?);
        if b == 0.0 {
            return Err(BasicError::new(ErrorCode::DivisionByZero, "division by zero"));
        }
        Ok(Value::Num(a / b))
    }

    pub fn modulo(&self, other: &Value) -> Result<Value, BasicError> {
        let (a, b) = (self.as_num()?, other.as_num()?);
        if b == 0.0 {
            return Err(BasicError::new(ErrorCode::DivisionByZero, "division by zero"));
        }
        // Classical BASIC MOD: remainder takes the sign of the divisor.
        let r = a - b * (a / b).floor();
        Ok(Value::Num(if b > 0.0 && r < 0.0 { r + b } else { r }))
    }

    pub fn pow(&self, other: &Value) -> Result<Value, BasicError> {
        Ok(Value::Num(self.as_num()?.powf(other.as_num()?)))
    }

    pub fn neg(&self) -> Result<Value, BasicError> {
        Ok(Value::Num(-self.as_num()?))
    }

    pub fn not(&self) -> Result<Value, BasicError> {
        Ok(Value::from_bool(self.as_num()? == FALSE))
    }

    pub fn and(&self, other: &Value) -> Result<Value, BasicError> {
        Ok(Value::from_bool(self.truthy()? && other.truthy()?))
    }

    pub fn or(&self, other: &Value) -> Result<Value, BasicError> {
        Ok(Value::from_bool(self.truthy()? || other.truthy()?))
    }

    fn compare(&self, other: &Value) -> Result<Ordering, BasicError> {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => {
                a.partial_cmp(b).ok_or_else(|| BasicError::new(ErrorCode::TypeMismatch, "NaN is not comparable"))
            }
            (Value::Str(a), Value::Str(b)) => Ok(a.as_ref().cmp(b.as_ref())),
            _ => Err(BasicError::new(
                ErrorCode::TypeMismatch,
                "comparison requires operands of the same type",
            )),
        }
    }

    pub fn eq_basic(&self, other: &Value) -> Result<Value, BasicError> {
        Ok(Value::from_bool(self.compare(other)? == Ordering::Equal))
    }
    pub fn ne_basic(&self, other: &Value) -> Result<Value, BasicError> {
        Ok(Value::from_bool(self.compare(other)? != Ordering::Equal))
    }
    pub fn lt_basic(&self, other: &Value) -> Result<Value, BasicError> {
        Ok(Value::from_bool(self.compare(other)? == Ordering::Less))
    }
    pub fn le_basic(&self, other: &Value) -> Result<Value, BasicError> {
        Ok(Value::from_bool(self.compare(other)? != Ordering::Greater))
    }
    pub fn gt_basic(&self, other: &Value) -> Result<Value, BasicError> {
        Ok(Value::from_bool(self.compare(other)? == Ordering::Greater))
    }
    pub fn ge_basic(&self, other: &Value) -> Result<Value, BasicError> {
        Ok(Value::from_bool(self.compare(other)? != Ordering::Less))
    }
}

/// Broad error category, rendered uppercase in user-visible messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Syntax,
    Evaluation,
    Runtime,
    Resource,
    Io,
    System,
    Command,
}

impl ErrorCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::Syntax => "SYNTAX ERROR",
            ErrorCategory::Evaluation => "EVALUATION ERROR",
            ErrorCategory::Runtime => "EXECUTION ERROR",
            ErrorCategory::Resource => "RESOURCE ERROR",
            ErrorCategory::Io => "I/O ERROR",
            ErrorCategory::System => "SYSTEM ERROR",
            ErrorCategory::Command => "COMMAND ERROR",
        }
    }
}

/// Stable, matchable error codes. `thiserror` gives each variant a `Display`
/// derived from the attribute message, which doubles as the friendly text
/// shown to the user (spec.md "codes map to friendly messages through a
/// lookup table; unknown codes render as-is" — the lookup table here is the
/// enum's `Display` impl itself, since the domain is closed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorCode {
    #[error("MISSING CLOSING QUOTE")]
    MissingQuotes,
    #[error("UNEXPECTED TOKEN")]
    UnexpectedToken,
    #[error("EXPECTED AN EXPRESSION")]
    ExpectedExpression,
    #[error("UNKNOWN VARIABLE")]
    UnknownVariable,
    #[error("UNKNOWN FUNCTION")]
    UnknownFunction,
    #[error("ARRAY INDEX IS NOT NUMERIC")]
    ArrayIndexNotNumeric,
    #[error("DIVISION BY ZERO")]
    DivisionByZero,
    #[error("TYPE MISMATCH")]
    TypeMismatch,
    #[error("NEXT WITHOUT FOR")]
    NextWithoutFor,
    #[error("FOR/NEXT VARIABLE MISMATCH")]
    ForNextMismatch,
    #[error("RETURN WITHOUT GOSUB")]
    ReturnWithoutGosub,
    #[error("GOSUB DEPTH EXCEEDED")]
    GosubDepthExceeded,
    #[error("FOR LOOP DEPTH EXCEEDED")]
    ForLoopDepthExceeded,
    #[error("OPERAND STACK OVERFLOW")]
    StackOverflow,
    #[error("OPERAND STACK UNDERFLOW")]
    StackUnderflow,
    #[error("LINE NOT FOUND")]
    LineNotFound,
    #[error("FILE NOT FOUND")]
    FileNotFound,
    #[error("END OF FILE")]
    EndOfFile,
    #[error("FILE MODE ERROR")]
    FileMode,
    #[error("MESSAGE SEND FAILED")]
    MessageSendFailed,
    #[error("EXECUTION CANCELLED")]
    ExecutionCancelled,
    #[error("BAD COMMAND USAGE")]
    CommandUsage,
    #[error("REDO FROM START")]
    RedoFromStart,
    #[error("ILLEGAL ARGUMENT")]
    IllegalArgument,
    #[error("OUT OF DATA")]
    OutOfData,
}

/// A structured error: category, stable code, message, and the
/// line/command/direct-mode context the dispatcher decorates it with.
#[derive(Debug, Clone)]
pub struct BasicError {
    pub category: ErrorCategory,
    pub code: ErrorCode,
    pub message: String,
    pub command: Option<String>,
    pub usage_hint: Option<String>,
    pub line_number: Option<u32>,
    pub direct_mode: bool,
}

impl BasicError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            category: default_category(code),
            code,
            message: message.into(),
            command: None,
            usage_hint: None,
            line_number: None,
            direct_mode: false,
        }
    }

    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_usage_hint(mut self, hint: impl Into<String>) -> Self {
        self.usage_hint = Some(hint.into());
        self
    }

    /// Decorates the error with a line number/command if it does not
    /// already carry one (the dispatcher never overwrites a more specific
    /// origin reported by a nested call).
    pub fn decorate(mut self, line_number: u32, command: &str) -> Self {
        if self.line_number.is_none() {
            self.line_number = Some(line_number);
        }
        if self.command.is_none() {
            self.command = Some(command.to_string());
        }
        self
    }

    pub fn in_direct_mode(mut self) -> Self {
        self.direct_mode = true;
        self
    }
}

fn default_category(code: ErrorCode) -> ErrorCategory {
    use ErrorCode::*;
    match code {
        MissingQuotes | UnexpectedToken | ExpectedExpression => ErrorCategory::Syntax,
        UnknownVariable | UnknownFunction | ArrayIndexNotNumeric | TypeMismatch | DivisionByZero => {
            ErrorCategory::Evaluation
        }
        NextWithoutFor | ForNextMismatch | ReturnWithoutGosub | LineNotFound | ExecutionCancelled
        | RedoFromStart | IllegalArgument | OutOfData => ErrorCategory::Runtime,
        GosubDepthExceeded | ForLoopDepthExceeded | StackOverflow | StackUnderflow => {
            ErrorCategory::Resource
        }
        FileNotFound | EndOfFile | FileMode => ErrorCategory::Io,
        MessageSendFailed => ErrorCategory::System,
        CommandUsage => ErrorCategory::Command,
    }
}

impl fmt::Display for BasicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let category = self.category.label();
        if self.direct_mode {
            write!(f, "{category}: {}", self.message)?;
            if let Some(hint) = &self.usage_hint {
                write!(f, "\nUSAGE: {hint}")?;
            }
            Ok(())
        } else {
            let line = self.line_number.unwrap_or(0);
            write!(f, "{category} IN LINE {line}: {}", self.message.to_uppercase())
        }
    }
}

impl std::error::Error for BasicError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_formatting_drops_trailing_zero() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(3.5), "3.5");
        assert_eq!(format_number(-0.0), "0");
    }

    #[test]
    fn string_concat_via_plus() {
        let a = Value::str("HI ");
        let b = Value::num(5.0);
        let r = a.add(&b).unwrap();
        assert_eq!(&*r.display_string(), "HI 5");
    }

    #[test]
    fn numeric_arithmetic_requires_numbers() {
        let a = Value::str("x");
        let b = Value::num(1.0);
        assert!(matches!(a.sub(&b), Err(e) if e.code == ErrorCode::TypeMismatch));
    }

    #[test]
    fn division_by_zero_is_structured() {
        let a = Value::num(1.0);
        let b = Value::num(0.0);
        let err = a.div(&b).unwrap_err();
        assert_eq!(err.code, ErrorCode::DivisionByZero);
    }

    #[test]
    fn mod_sign_follows_divisor_classical_basic() {
        let a = Value::num(-7.0);
        let b = Value::num(3.0);
        let r = a.modulo(&b).unwrap().as_num().unwrap();
        assert_eq!(r, 2.0);
    }

    #[test]
    fn comparisons_require_matching_types() {
        let a = Value::num(1.0);
        let b = Value::str("1");
        assert!(matches!(a.eq_basic(&b), Err(e) if e.code == ErrorCode::TypeMismatch));
    }

    #[test]
    fn basic_truthiness_is_exactly_neg_one_or_zero() {
        assert_eq!(Value::from_bool(true).as_num().unwrap(), -1.0);
        assert_eq!(Value::from_bool(false).as_num().unwrap(), 0.0);
    }

    #[test]
    fn direct_mode_display_includes_usage_hint() {
        let err = BasicError::new(ErrorCode::CommandUsage, "bad args")
            .with_usage_hint("RUN [\"filename\"]")
            .in_direct_mode();
        let s = err.to_string();
        assert!(s.starts_with("COMMAND ERROR: bad args"));
        assert!(s.contains("USAGE: RUN"));
    }

    #[test]
    fn program_mode_display_includes_line_number() {
        let err = BasicError::new(ErrorCode::DivisionByZero, "division by zero").decorate(10, "LET");
        assert_eq!(err.to_string(), "EVALUATION ERROR IN LINE 10: division by zero");
    }

    #[test]
    fn decorate_does_not_overwrite_existing_line() {
        let err = BasicError::new(ErrorCode::DivisionByZero, "division by zero")
            .decorate(10, "LET")
            .decorate(99, "PRINT");
        assert_eq!(err.line_number, Some(10));
        assert_eq!(err.command.as_deref(), Some("LET"));
    }
}
