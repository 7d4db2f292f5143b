//! Built-in function library (spec component H): math, string, and RNG
//! functions are pure and live entirely in this crate; keyboard state,
//! file EOF, and sprite collision queries need state owned elsewhere
//! (the key-state map in `core-session`, the file-handle table and
//! sprite pixel cache in `core-io`), so those three are expressed here as
//! a narrow [`BuiltinHost`] trait that the caller supplies an
//! implementation of.

mod numeric;
mod rng;
mod string;

pub use numeric::{abs, acos, asin, atn, cos, exp, int, log, log10, sgn, sin, sqr, tan};
pub use rng::RandomState;
pub use string::{chr_dollar, left_dollar, len, mid_dollar, right_dollar, str_dollar, val};

use core_value::{BasicError, ErrorCode, Value};

/// State a caller must provide for the three built-ins this crate cannot
/// compute on its own.
pub trait BuiltinHost {
    fn keystate(&self, key_name: &str) -> bool;
    fn keypressed(&self, key_name: &str) -> bool;
    fn eof(&self, handle: i64) -> Result<bool, BasicError>;
    /// `COLLISION(id)` passes `other = None` (any collision); `COLLISION(id, other)`
    /// tests against one specific sprite.
    fn collision(&self, id: i64, other: Option<i64>) -> Result<bool, BasicError>;
}

/// Dispatches a call to any function in [`core_lexer::FUNCTION_NAMES`]
/// (pass-through compile-time-folded calls never reach here; this is the
/// interpreter/VM's runtime fallback). `name` must already be uppercased.
pub fn call(name: &str, args: &[Value], rng: &mut RandomState, host: &dyn BuiltinHost) -> Result<Value, BasicError> {
    match name {
        "ABS" | "SGN" | "INT" | "SIN" | "COS" | "TAN" | "ATN" | "ASIN" | "ACOS" | "ATAN" | "EXP" | "LOG" | "LOG10"
        | "SQR" | "SQRT" => call_numeric(name, one_num_arg(name, args)?),
        "RND" => {
            let n = args.first().map(|v| v.as_num()).transpose()?.unwrap_or(0.0);
            Ok(Value::Num(rng.sample(n)))
        }
        "LEN" => Ok(Value::Num(len(&one_str_arg(name, args)?) as f64)),
        "CHR$" => Ok(Value::Str(chr_dollar(one_num_arg(name, args)?)?.into())),
        "LEFT$" => {
            let (s, n) = str_and_num(name, args)?;
            Ok(Value::Str(left_dollar(&s, n)?.into()))
        }
        "RIGHT$" => {
            let (s, n) = str_and_num(name, args)?;
            Ok(Value::Str(right_dollar(&s, n)?.into()))
        }
        "MID$" => {
            if args.len() < 2 || args.len() > 3 {
                return Err(BasicError::new(ErrorCode::CommandUsage, "MID$ requires 2 or 3 arguments"));
            }
            let s = args[0].as_str()?.to_string();
            let start = args[1].as_num()?;
            let len_arg = args.get(2).map(|v| v.as_num()).transpose()?;
            Ok(Value::Str(mid_dollar(&s, start, len_arg)?.into()))
        }
        "STR$" => Ok(Value::Str(str_dollar(one_num_arg(name, args)?).into())),
        "VAL" => Ok(Value::Num(val(&one_str_arg(name, args)?))),
        "EOF" => Ok(Value::from_bool(host.eof(one_num_arg(name, args)? as i64)?)),
        "KEYSTATE" => Ok(Value::from_bool(host.keystate(&one_str_arg(name, args)?))),
        "KEYPRESSED" => Ok(Value::from_bool(host.keypressed(&one_str_arg(name, args)?))),
        "COLLISION" => {
            if args.is_empty() || args.len() > 2 {
                return Err(BasicError::new(ErrorCode::CommandUsage, "COLLISION requires 1 or 2 arguments"));
            }
            let id = args[0].as_num()? as i64;
            let other = args.get(1).map(|v| v.as_num()).transpose()?.map(|n| n as i64);
            Ok(Value::from_bool(host.collision(id, other)?))
        }
        _ => Err(BasicError::new(ErrorCode::UnknownFunction, format!("unknown function {name}"))),
    }
}

fn call_numeric(name: &str, n: f64) -> Result<Value, BasicError> {
    let result = match name {
        "ABS" => abs(n),
        "SGN" => sgn(n),
        "INT" => int(n),
        "SIN" => sin(n),
        "COS" => cos(n),
        "TAN" => tan(n),
        "ATN" | "ATAN" => atn(n),
        "ASIN" => asin(n),
        "ACOS" => acos(n),
        "EXP" => exp(n),
        "LOG" => log(n)?,
        "LOG10" => log10(n)?,
        "SQR" | "SQRT" => sqr(n)?,
        _ => unreachable!("dispatched only for the numeric function set"),
    };
    Ok(Value::Num(result))
}

fn one_num_arg(name: &str, args: &[Value]) -> Result<f64, BasicError> {
    match args {
        [v] => v.as_num(),
        _ => Err(BasicError::new(ErrorCode::CommandUsage, format!("{name} requires exactly one argument"))),
    }
}

fn one_str_arg(name: &str, args: &[Value]) -> Result<String, BasicError> {
    match args {
        [v] => v.as_str().map(str::to_string),
        _ => Err(BasicError::new(ErrorCode::CommandUsage, format!("{name} requires exactly one argument"))),
    }
}

fn str_and_num(name: &str, args: &[Value]) -> Result<(String, f64), BasicError> {
    match args {
        [s, n] => Ok((s.as_str()?.to_string(), n.as_num()?)),
        _ => Err(BasicError::new(ErrorCode::CommandUsage, format!("{name} requires exactly two arguments"))),
    }
}
