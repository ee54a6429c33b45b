//! Recursive-descent parser producing resolved expression trees.

use crate::ast::{Expr, Func};
use crate::error::{ExprError, ExprResult};
use crate::lexer::{Spanned, Token, tokenize};

/// Parse `src`, resolving every identifier through `resolve`.
///
/// `resolve` returns the symbol slot for a name, or an error (normally
/// [`ExprError::UndeclaredSymbol`]). Function names are matched against the
/// fixed [`Func`] library before resolution.
pub fn parse<F>(src: &str, resolve: F) -> ExprResult<Expr>
where
    F: FnMut(&str) -> ExprResult<usize>,
{
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        src,
        tokens,
        pos: 0,
        resolve,
    };
    if parser.tokens.is_empty() {
        return Err(parser.error(0, "empty expression"));
    }
    let expr = parser.expr()?;
    if let Some(tok) = parser.tokens.get(parser.pos) {
        return Err(parser.error(tok.pos, "unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser<'a, F> {
    src: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    resolve: F,
}

impl<F> Parser<'_, F>
where
    F: FnMut(&str) -> ExprResult<usize>,
{
    fn error(&self, pos: usize, what: impl Into<String>) -> ExprError {
        ExprError::Parse {
            expr: self.src.to_string(),
            pos,
            what: what.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn here(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|s| s.pos)
            .unwrap_or(self.src.len())
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|s| s.token.clone());
        self.pos += 1;
        tok
    }

    fn expect(&mut self, want: Token, what: &str) -> ExprResult<()> {
        let at = self.here();
        match self.bump() {
            Some(tok) if tok == want => Ok(()),
            _ => Err(self.error(at, format!("expected {what}"))),
        }
    }

    fn expr(&mut self) -> ExprResult<Expr> {
        let mut lhs = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    lhs = Expr::Sub(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn term(&mut self) -> ExprResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    lhs = Expr::Mul(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    lhs = Expr::Div(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> ExprResult<Expr> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    // Right-associative: a^b^c == a^(b^c); -a^b == -(a^b).
    fn power(&mut self) -> ExprResult<Expr> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Caret) {
            self.pos += 1;
            let exp = self.unary()?;
            return Ok(Expr::Pow(Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> ExprResult<Expr> {
        let at = self.here();
        match self.bump() {
            Some(Token::Num(v)) => Ok(Expr::Const(v)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    let func = Func::from_name(&name).ok_or_else(|| ExprError::UnknownFunction {
                        name: name.clone(),
                        expr: self.src.to_string(),
                    })?;
                    self.pos += 1;
                    let arg = self.expr()?;
                    if self.peek() == Some(&Token::Comma) {
                        return Err(self.error(self.here(), "functions take one argument"));
                    }
                    self.expect(Token::RParen, "')'")?;
                    return Ok(Expr::Call(func, Box::new(arg)));
                }
                let slot = (self.resolve)(&name)?;
                Ok(Expr::Sym(slot))
            }
            Some(_) => Err(self.error(at, "expected number, symbol or '('")),
            None => Err(self.error(at, "unexpected end of expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Resolves single lowercase letters to slots a=0, b=1, ...
    fn letters(src: &str) -> ExprResult<Expr> {
        parse(src, |name| {
            let c = name.as_bytes()[0];
            if name.len() == 1 && c.is_ascii_lowercase() {
                Ok((c - b'a') as usize)
            } else {
                Err(ExprError::UndeclaredSymbol {
                    name: name.to_string(),
                    expr: src.to_string(),
                })
            }
        })
    }

    fn s(i: usize) -> Box<Expr> {
        Box::new(Expr::Sym(i))
    }

    #[test]
    fn precedence() {
        let e = letters("a + b * c").unwrap();
        assert_eq!(e, Expr::Add(s(0), Box::new(Expr::Mul(s(1), s(2)))));
    }

    #[test]
    fn left_associative_subtraction() {
        let e = letters("a - b - c").unwrap();
        assert_eq!(e, Expr::Sub(Box::new(Expr::Sub(s(0), s(1))), s(2)));
    }

    #[test]
    fn power_binds_tighter_than_negation() {
        let e = letters("-a^2").unwrap();
        assert_eq!(
            e,
            Expr::Neg(Box::new(Expr::Pow(s(0), Box::new(Expr::Const(2.0)))))
        );
    }

    #[test]
    fn power_is_right_associative() {
        let e = letters("a^b^c").unwrap();
        assert_eq!(e, Expr::Pow(s(0), Box::new(Expr::Pow(s(1), s(2)))));
    }

    #[test]
    fn function_call() {
        let e = letters("sqrt(a * 2)").unwrap();
        assert_eq!(
            e,
            Expr::Call(Func::Sqrt, Box::new(Expr::Mul(s(0), Box::new(Expr::Const(2.0)))))
        );
    }

    #[test]
    fn undeclared_symbol_propagates() {
        let err = letters("a + pmx").unwrap_err();
        assert!(matches!(err, ExprError::UndeclaredSymbol { ref name, .. } if name == "pmx"));
    }

    #[test]
    fn unknown_function() {
        let err = letters("gamma(a)").unwrap_err();
        assert!(matches!(err, ExprError::UnknownFunction { .. }));
    }

    #[test]
    fn malformed_inputs() {
        assert!(letters("").is_err());
        assert!(letters("a +").is_err());
        assert!(letters("(a + b").is_err());
        assert!(letters("a b").is_err());
        assert!(letters("sin(a, b)").is_err());
    }
}
