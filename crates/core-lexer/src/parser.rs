use crate::ast::{BinOp, Expr, UnOp};
use crate::functions::is_function_name;
use crate::token::{Token, TokenKind};
use core_value::{BasicError, ErrorCode};

/// Recursive-descent (precedence-climbing) parser implementing the exact
/// BASIC precedence ladder from spec.md §4.B, lowest to highest:
/// `OR -> AND -> (=, <>) -> (<, <=, >, >=) -> (+, -) -> (*, /, MOD) -> ^
/// (right-assoc) -> unary (+, -, NOT) -> primary`.
pub struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse_expr_complete(tokens: &'t [Token]) -> Result<Expr, BasicError> {
        let mut p = Parser::new(tokens);
        let expr = p.parse_or()?;
        p.expect_eof()?;
        Ok(expr)
    }

    /// Parses one expression from the front of `tokens` without requiring
    /// the rest to be consumed, returning how many tokens it used. Lets a
    /// statement-level parser (e.g. `FOR var = start TO end`) embed an
    /// expression and keep scanning the remaining keywords itself.
    pub fn parse_prefix(tokens: &'t [Token]) -> Result<(Expr, usize), BasicError> {
        let mut p = Parser::new(tokens);
        let expr = p.parse_or()?;
        Ok((expr, p.pos))
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn advance(&mut self) -> TokenKind {
        let k = self.tokens[self.pos].kind.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        k
    }

    fn expect_eof(&self) -> Result<(), BasicError> {
        if matches!(self.peek(), TokenKind::Eof) {
            Ok(())
        } else {
            Err(BasicError::new(ErrorCode::UnexpectedToken, "unexpected trailing tokens"))
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), BasicError> {
        if self.peek() == kind {
            self.advance();
            Ok(())
        } else {
            Err(BasicError::new(ErrorCode::UnexpectedToken, format!("expected {kind:?}")))
        }
    }

    pub fn parse_or(&mut self) -> Result<Expr, BasicError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), TokenKind::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, BasicError> {
        let mut lhs = self.parse_equality()?;
        while matches!(self.peek(), TokenKind::And) {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, BasicError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                TokenKind::Eq => BinOp::Eq,
                TokenKind::Ne => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, BasicError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, BasicError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, BasicError> {
        let mut lhs = self.parse_power()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Mod => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_power()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// `^` is right-associative (spec.md §9 Open Question (a)): `2^3^2`
    /// parses as `2^(3^2)`, achieved by recursing back into `parse_power`
    /// on the right-hand side instead of looping.
    fn parse_power(&mut self) -> Result<Expr, BasicError> {
        let lhs = self.parse_unary()?;
        if matches!(self.peek(), TokenKind::Caret) {
            self.advance();
            let rhs = self.parse_power()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, BasicError> {
        match self.peek() {
            TokenKind::Minus => {
                self.advance();
                Ok(Expr::Unary(UnOp::Neg, Box::new(self.parse_unary()?)))
            }
            TokenKind::Plus => {
                self.advance();
                Ok(Expr::Unary(UnOp::Plus, Box::new(self.parse_unary()?)))
            }
            TokenKind::Not => {
                self.advance();
                Ok(Expr::Unary(UnOp::Not, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, BasicError> {
        let mut args = Vec::new();
        if matches!(self.peek(), TokenKind::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.peek() {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RParen => {
                    self.advance();
                    break;
                }
                _ => return Err(BasicError::new(ErrorCode::UnexpectedToken, "expected `,` or `)`")),
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, BasicError> {
        match self.peek().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Num(n))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                self.advance();
                if &*name == "PI" {
                    return Ok(Expr::Pi);
                }
                if &*name == "INKEY$" {
                    return Ok(Expr::InkeyDollar);
                }
                if matches!(self.peek(), TokenKind::LParen) {
                    self.advance();
                    let args = self.parse_args()?;
                    if is_function_name(&name) {
                        if &*name == "MID$" && !(args.len() == 2 || args.len() == 3) {
                            return Err(BasicError::new(
                                ErrorCode::CommandUsage,
                                "MID$ requires 2 or 3 arguments",
                            ));
                        }
                        Ok(Expr::Call(name, args))
                    } else {
                        Ok(Expr::ArrayRef(name, args))
                    }
                } else {
                    Ok(Expr::Var(name))
                }
            }
            other => Err(BasicError::new(ErrorCode::ExpectedExpression, format!("expected an expression, found {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use std::rc::Rc;

    fn parse(src: &str) -> Expr {
        let toks = tokenize(src).unwrap();
        Parser::parse_expr_complete(&toks).unwrap()
    }

    #[test]
    fn pow_right_associative() {
        let expr = parse("2^3^2");
        match expr {
            Expr::Binary(BinOp::Pow, lhs, rhs) => {
                assert_eq!(*lhs, Expr::Num(2.0));
                assert!(matches!(*rhs, Expr::Binary(BinOp::Pow, _, _)));
            }
            other => panic!("expected right-associative power, got {other:?}"),
        }
    }

    #[test]
    fn precedence_ladder_mul_over_add() {
        let expr = parse("1+2*3");
        match expr {
            Expr::Binary(BinOp::Add, lhs, rhs) => {
                assert_eq!(*lhs, Expr::Num(1.0));
                assert!(matches!(*rhs, Expr::Binary(BinOp::Mul, _, _)));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn relational_binds_looser_than_additive() {
        let expr = parse("1+2>3");
        assert!(matches!(expr, Expr::Binary(BinOp::Gt, _, _)));
    }

    #[test]
    fn or_binds_loosest() {
        let expr = parse("A AND B OR C");
        assert!(matches!(expr, Expr::Binary(BinOp::Or, _, _)));
    }

    #[test]
    fn array_ref_vs_function_call_by_name() {
        assert!(matches!(parse("ABS(X)"), Expr::Call(_, _)));
        assert!(matches!(parse("A(1,2)"), Expr::ArrayRef(_, _)));
    }

    #[test]
    fn mid_dollar_requires_two_or_three_args() {
        let toks = tokenize("MID$(A$,1)").unwrap();
        assert!(Parser::parse_expr_complete(&toks).is_ok());
        let toks = tokenize("MID$(A$)").unwrap();
        assert!(Parser::parse_expr_complete(&toks).is_err());
    }

    #[test]
    fn pi_and_inkey_are_nullary_literals() {
        assert_eq!(parse("PI"), Expr::Pi);
        assert_eq!(parse("INKEY$"), Expr::InkeyDollar);
    }

    #[test]
    fn unary_not_parses_as_prefix_operator() {
        let expr = parse("NOT A");
        assert!(matches!(expr, Expr::Unary(UnOp::Not, _)));
    }

    #[test]
    fn parse_prefix_stops_at_trailing_keyword_and_reports_consumed_tokens() {
        let toks = tokenize("I = 1 TO 10").unwrap();
        let (expr, consumed) = Parser::parse_prefix(&toks).unwrap();
        assert_eq!(expr, Expr::Var(Rc::from("I")));
        assert_eq!(consumed, 1);
        let (expr2, consumed2) = Parser::parse_prefix(&toks[consumed + 1..]).unwrap();
        assert_eq!(expr2, Expr::Num(1.0));
        assert_eq!(consumed2, 1);
    }
}
