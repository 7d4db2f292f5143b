//! Direct-mode expression evaluation over a [`core_lexer::Expr`].
//!
//! The bytecode VM evaluates expressions by compiling them to a flat
//! `Op` sequence first; direct-mode statements and every `Op::Fallback`
//! hand-off never go through the compiler, so they need a tree-walking
//! twin of the VM's own arithmetic/comparison rules. Both ultimately
//! bottom out in the same `Value` methods and the same `core_builtins::call`
//! dispatch table, so the two evaluators can never disagree on a result —
//! only on how they got there.

use core_builtins::{call, RandomState};
use core_lexer::{BinOp, Expr, UnOp};
use core_value::{BasicError, ErrorCode, Value, VariableTable};
use core_vm::VmHost;

pub fn eval_expr<H: VmHost>(
    expr: &Expr,
    vars: &mut VariableTable,
    rng: &mut RandomState,
    host: &H,
) -> Result<Value, BasicError> {
    match expr {
        Expr::Num(n) => Ok(Value::Num(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Pi => Ok(Value::Num(std::f64::consts::PI)),
        Expr::InkeyDollar => Ok(Value::Str(host.inkey())),
        Expr::Var(name) => vars.get_scalar(name),
        Expr::ArrayRef(name, subscripts) => {
            let idx = eval_subscripts(subscripts, vars, rng, host)?;
            vars.get_array(name, &idx)
        }
        Expr::Call(name, args) => {
            let mut values = Vec::with_capacity(args.len());
            for a in args {
                values.push(eval_expr(a, vars, rng, host)?);
            }
            call(name, &values, rng, host)
        }
        Expr::Unary(op, inner) => {
            let v = eval_expr(inner, vars, rng, host)?;
            match op {
                UnOp::Neg => v.neg(),
                UnOp::Not => v.not(),
                UnOp::Plus => v.as_num().map(Value::Num),
            }
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = eval_expr(lhs, vars, rng, host)?;
            let r = eval_expr(rhs, vars, rng, host)?;
            apply_binop(*op, &l, &r)
        }
    }
}

fn eval_subscripts<H: VmHost>(
    subscripts: &[Expr],
    vars: &mut VariableTable,
    rng: &mut RandomState,
    host: &H,
) -> Result<Vec<usize>, BasicError> {
    let mut idx = Vec::with_capacity(subscripts.len());
    for s in subscripts {
        let v = eval_expr(s, vars, rng, host)?.as_num()?;
        if v < 0.0 || v.fract() != 0.0 {
            return Err(BasicError::new(ErrorCode::ArrayIndexNotNumeric, "array index is not numeric"));
        }
        idx.push(v as usize);
    }
    Ok(idx)
}

/// An L-value's evaluated index plus whatever name/kind it binds to, used
/// by `LET`/`INPUT`/`READ` to assign into a scalar or array target without
/// re-parsing the left-hand side twice.
#[derive(Clone)]
pub enum LValue {
    Scalar(std::rc::Rc<str>),
    Array(std::rc::Rc<str>, Vec<usize>),
}

pub fn eval_lvalue<H: VmHost>(
    expr: &Expr,
    vars: &mut VariableTable,
    rng: &mut RandomState,
    host: &H,
) -> Result<LValue, BasicError> {
    match expr {
        Expr::Var(name) => Ok(LValue::Scalar(name.clone())),
        Expr::ArrayRef(name, subscripts) => {
            let idx = eval_subscripts(subscripts, vars, rng, host)?;
            Ok(LValue::Array(name.clone(), idx))
        }
        _ => Err(BasicError::new(ErrorCode::UnexpectedToken, "left-hand side is not assignable")),
    }
}

pub fn store_lvalue(vars: &mut VariableTable, target: &LValue, value: Value) -> Result<(), BasicError> {
    match target {
        LValue::Scalar(name) => {
            vars.set_scalar(name, value);
            Ok(())
        }
        LValue::Array(name, idx) => vars.set_array(name, idx, value),
    }
}

fn apply_binop(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, BasicError> {
    match op {
        BinOp::Add => lhs.add(rhs),
        BinOp::Sub => lhs.sub(rhs),
        BinOp::Mul => lhs.mul(rhs),
        BinOp::Div => lhs.div(rhs),
        BinOp::Mod => lhs.modulo(rhs),
        BinOp::Pow => lhs.pow(rhs),
        BinOp::Eq => lhs.eq_basic(rhs),
        BinOp::Ne => lhs.ne_basic(rhs),
        BinOp::Lt => lhs.lt_basic(rhs),
        BinOp::Le => lhs.le_basic(rhs),
        BinOp::Gt => lhs.gt_basic(rhs),
        BinOp::Ge => lhs.ge_basic(rhs),
        BinOp::And => lhs.and(rhs),
        BinOp::Or => lhs.or(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_builtins::BuiltinHost;
    use std::rc::Rc;

    struct NullHost;
    impl BuiltinHost for NullHost {
        fn keystate(&self, _k: &str) -> bool {
            false
        }
        fn keypressed(&self, _k: &str) -> bool {
            false
        }
        fn eof(&self, _h: i64) -> Result<bool, BasicError> {
            Ok(true)
        }
        fn collision(&self, _id: i64, _other: Option<i64>) -> Result<bool, BasicError> {
            Ok(false)
        }
    }
    impl VmHost for NullHost {
        fn inkey(&self) -> Rc<str> {
            Rc::from("")
        }
    }

    #[test]
    fn evaluates_arithmetic_and_function_calls() {
        let mut vars = VariableTable::new();
        let mut rng = RandomState::new(1);
        let host = NullHost;
        let expr = core_lexer::parse("ABS(-3) + 2 * 4").unwrap();
        let v = eval_expr(&expr, &mut vars, &mut rng, &host).unwrap();
        assert_eq!(v, Value::Num(11.0));
    }

    #[test]
    fn array_ref_auto_dims_like_the_vm() {
        let mut vars = VariableTable::new();
        let mut rng = RandomState::new(1);
        let host = NullHost;
        let expr = core_lexer::parse("A(3)").unwrap();
        let v = eval_expr(&expr, &mut vars, &mut rng, &host).unwrap();
        assert_eq!(v, Value::Num(0.0));
    }
}
