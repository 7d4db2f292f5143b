use crate::ast::{BinOp, Expr, UnOp};
use crate::functions::is_foldable_function;
use core_value::Value;

/// Constant-folds an expression AST containing only literals, `PI`, and a
/// whitelist of pure functions (spec.md §4.B). Folding never fails: any
/// subexpression that can't be reduced (a variable, `INKEY$`, a
/// non-whitelisted or wrong-arity function call, or a runtime error such
/// as division by zero) is left in place for the VM/interpreter to
/// evaluate normally.
pub fn fold_expr(expr: Expr) -> Expr {
    match expr {
        Expr::Num(_) | Expr::Str(_) => expr,
        Expr::Pi => Expr::Num(std::f64::consts::PI),
        Expr::InkeyDollar => expr,
        Expr::Var(_) | Expr::ArrayRef(_, _) => expr,
        Expr::Unary(op, inner) => {
            let inner = fold_expr(*inner);
            if let Expr::Num(n) = inner {
                match op {
                    UnOp::Neg => return Expr::Num(-n),
                    UnOp::Plus => return Expr::Num(n),
                    UnOp::Not => return Expr::Num(Value::from_bool(n == core_value::FALSE).as_num().unwrap()),
                }
            }
            Expr::Unary(op, Box::new(inner))
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = fold_expr(*lhs);
            let rhs = fold_expr(*rhs);
            if let (Some(a), Some(b)) = (as_value(&lhs), as_value(&rhs)) {
                if let Some(folded) = apply_binop(op, &a, &b) {
                    return folded;
                }
            }
            Expr::Binary(op, Box::new(lhs), Box::new(rhs))
        }
        Expr::Call(name, args) => {
            let folded_args: Vec<Expr> = args.into_iter().map(fold_expr).collect();
            if is_foldable_function(&name) && folded_args.len() == 1 {
                if let Expr::Num(n) = folded_args[0] {
                    if let Some(result) = eval_math_fn(&name, n) {
                        return Expr::Num(result);
                    }
                }
            }
            Expr::Call(name, folded_args)
        }
    }
}

fn as_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Num(n) => Some(Value::Num(*n)),
        Expr::Str(s) => Some(Value::Str(s.clone())),
        _ => None,
    }
}

fn apply_binop(op: BinOp, a: &Value, b: &Value) -> Option<Expr> {
    let result = match op {
        BinOp::Add => a.add(b),
        BinOp::Sub => a.sub(b),
        BinOp::Mul => a.mul(b),
        BinOp::Div => a.div(b),
        BinOp::Mod => a.modulo(b),
        BinOp::Pow => a.pow(b),
        BinOp::Eq => a.eq_basic(b),
        BinOp::Ne => a.ne_basic(b),
        BinOp::Lt => a.lt_basic(b),
        BinOp::Le => a.le_basic(b),
        BinOp::Gt => a.gt_basic(b),
        BinOp::Ge => a.ge_basic(b),
        BinOp::And => a.and(b),
        BinOp::Or => a.or(b),
    };
    match result.ok()? {
        Value::Num(n) => Some(Expr::Num(n)),
        Value::Str(s) => Some(Expr::Str(s)),
    }
}

/// Out-of-domain literals (e.g. `SQR(-1)`, `LOG(0)`) are deliberately left
/// unfolded: the runtime builtin raises a structured `ILLEGAL_ARGUMENT`
/// error for these, and folding to `NaN` here would silently diverge from
/// that at compile time.
fn eval_math_fn(name: &str, n: f64) -> Option<f64> {
    let result = match name {
        "ABS" => n.abs(),
        "INT" => n.floor(),
        "SIN" => n.sin(),
        "COS" => n.cos(),
        "TAN" => n.tan(),
        "ASIN" => n.asin(),
        "ACOS" => n.acos(),
        "ATAN" => n.atan(),
        "LOG" => n.ln(),
        "LOG10" => n.log10(),
        "EXP" => n.exp(),
        "SQR" | "SQRT" => n.sqrt(),
        _ => return None,
    };
    if result.is_nan() {
        None
    } else {
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn fold(src: &str) -> Expr {
        let toks = tokenize(src).unwrap();
        let expr = Parser::parse_expr_complete(&toks).unwrap();
        fold_expr(expr)
    }

    #[test]
    fn folds_pure_arithmetic_to_a_single_literal() {
        assert_eq!(fold("1+2*3"), Expr::Num(7.0));
    }

    #[test]
    fn folds_whitelisted_math_function() {
        assert_eq!(fold("ABS(-5)"), Expr::Num(5.0));
    }

    #[test]
    fn does_not_fold_variable_references() {
        assert!(matches!(fold("X+1"), Expr::Binary(_, _, _)));
    }

    #[test]
    fn does_not_fold_inkey_dollar() {
        assert_eq!(fold("INKEY$"), Expr::InkeyDollar);
    }

    #[test]
    fn runtime_result_matches_compile_time_fold_bit_exact() {
        // spec.md §8 invariant: evaluating `e` at runtime yields the same
        // numeric result as constant-folding `e` at compile time.
        let folded = fold("SQR(2)*3-1");
        let runtime = (2f64.sqrt()) * 3.0 - 1.0;
        assert_eq!(folded, Expr::Num(runtime));
    }

    #[test]
    fn pi_folds_to_the_mathematical_constant() {
        assert_eq!(fold("PI"), Expr::Num(std::f64::consts::PI));
    }

    #[test]
    fn not_truthiness_matches_classic_basic() {
        assert_eq!(fold("NOT 0"), Expr::Num(-1.0));
        assert_eq!(fold("NOT 5"), Expr::Num(0.0));
        assert_eq!(fold("NOT -1"), Expr::Num(0.0));
    }
}
