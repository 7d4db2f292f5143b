use crate::op::Op;
use core_lexer::Expr;

/// Emits one expression as a postfix sequence of stack operations: each
/// operand is pushed before the operator that consumes it, so the VM
/// never needs to look ahead.
pub fn emit_expr(expr: &Expr, out: &mut Vec<Op>) {
    match expr {
        Expr::Num(n) => out.push(Op::PushNum(*n)),
        Expr::Str(s) => out.push(Op::PushStr(s.clone())),
        Expr::Pi => out.push(Op::PushPi),
        Expr::InkeyDollar => out.push(Op::PushInkey),
        Expr::Var(name) => out.push(Op::LoadVar(name.clone())),
        Expr::ArrayRef(name, args) => {
            for a in args {
                emit_expr(a, out);
            }
            out.push(Op::LoadArray(name.clone(), args.len()));
        }
        Expr::Call(name, args) => {
            for a in args {
                emit_expr(a, out);
            }
            out.push(Op::CallBuiltin(name.clone(), args.len()));
        }
        Expr::Unary(op, inner) => {
            emit_expr(inner, out);
            out.push(Op::Un(*op));
        }
        Expr::Binary(op, lhs, rhs) => {
            emit_expr(lhs, out);
            emit_expr(rhs, out);
            out.push(Op::Bin(*op));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_lexer::parse;

    #[test]
    fn emits_operands_before_operator() {
        let expr = parse("X+1").unwrap();
        let mut out = Vec::new();
        emit_expr(&expr, &mut out);
        assert_eq!(out, vec![Op::LoadVar("X".into()), Op::PushNum(1.0), Op::Bin(core_lexer::BinOp::Add)]);
    }

    #[test]
    fn array_ref_pushes_indices_before_load() {
        let expr = parse("A(1,2)").unwrap();
        let mut out = Vec::new();
        emit_expr(&expr, &mut out);
        assert_eq!(out, vec![Op::PushNum(1.0), Op::PushNum(2.0), Op::LoadArray("A".into(), 2)]);
    }
}
