//! Lexer & expression parser (spec component B): tokenizer, Pratt-style
//! precedence-climbing parser, AST, and a compile-time constant-folding
//! pass. [`ExprCache`](core_cache::ExprCache) from `core-cache` is the
//! natural home for memoizing `parse_cached` results keyed by source text.

mod ast;
mod fold;
mod functions;
mod lexer;
mod parser;
mod token;

pub use ast::{BinOp, Expr, UnOp};
pub use fold::fold_expr;
pub use functions::{is_foldable_function, is_function_name, FOLDABLE_FUNCTIONS, FUNCTION_NAMES};
pub use lexer::tokenize;
pub use parser::Parser;
pub use token::{Token, TokenKind};

use core_cache::ExprCache;
use core_value::BasicError;

/// Tokenizes, parses, and constant-folds `src`, returning the final AST.
/// This is the non-cached entry point; callers evaluating the same
/// expression text repeatedly (e.g. inside a `FOR` loop body) should go
/// through [`CachedParser`] instead.
pub fn parse(src: &str) -> Result<Expr, BasicError> {
    let tokens = tokenize(src)?;
    let expr = Parser::parse_expr_complete(&tokens)?;
    Ok(fold_expr(expr))
}

/// Wraps an [`ExprCache`] keyed by expression source text. A cache hit on
/// identical source text returns an identical AST (spec.md §8 invariant);
/// a parse error is never cached, so a transient syntax error doesn't
/// poison future attempts at the same text after a program edit.
pub struct CachedParser {
    cache: ExprCache<Expr>,
}

impl CachedParser {
    pub fn new(capacity: usize) -> Self {
        Self { cache: ExprCache::new(capacity) }
    }

    pub fn parse_cached(&mut self, src: &str) -> Result<Expr, BasicError> {
        if let Some(cached) = self.cache.get(src) {
            return Ok(cached);
        }
        let expr = parse(src)?;
        self.cache.insert(src, expr.clone());
        Ok(expr)
    }

    pub fn stats(&self) -> core_cache::ExprCacheStats {
        self.cache.stats()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_parser_hit_returns_identical_ast() {
        let mut cp = CachedParser::new(8);
        let a = cp.parse_cached("1+2*3").unwrap();
        let b = cp.parse_cached("1+2*3").unwrap();
        assert_eq!(a, b);
        assert_eq!(cp.stats().hits, 1);
    }

    #[test]
    fn parse_and_fold_top_level() {
        assert_eq!(parse("2^3^2").unwrap(), Expr::Num(512.0));
    }
}
