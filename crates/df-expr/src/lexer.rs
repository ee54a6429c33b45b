//! Tokenizer for equation text.

use crate::error::{ExprError, ExprResult};

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    /// Both `^` and `**`.
    Caret,
    LParen,
    RParen,
    Comma,
}

/// Token plus its byte offset in the source, for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub pos: usize,
    pub token: Token,
}

/// Split `src` into tokens. Whitespace (including newlines) is skipped.
pub fn tokenize(src: &str) -> ExprResult<Vec<Spanned>> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    let err = |pos: usize, what: String| ExprError::Parse {
        expr: src.to_string(),
        pos,
        what,
    };

    while i < bytes.len() {
        let c = bytes[i] as char;
        let start = i;
        let token = match c {
            c if c.is_ascii_whitespace() => {
                i += 1;
                continue;
            }
            '+' => {
                i += 1;
                Token::Plus
            }
            '-' => {
                i += 1;
                Token::Minus
            }
            '*' => {
                if bytes.get(i + 1) == Some(&b'*') {
                    i += 2;
                    Token::Caret
                } else {
                    i += 1;
                    Token::Star
                }
            }
            '/' => {
                i += 1;
                Token::Slash
            }
            '^' => {
                i += 1;
                Token::Caret
            }
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            c if c.is_ascii_digit() || c == '.' => {
                i = scan_number(bytes, i);
                let text = &src[start..i];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| err(start, format!("invalid number '{text}'")))?;
                Token::Num(value)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                Token::Ident(src[start..i].to_string())
            }
            other => return Err(err(start, format!("unexpected character '{other}'"))),
        };
        out.push(Spanned { pos: start, token });
    }

    Ok(out)
}

/// Advance over `digits [. digits] [(e|E) [+|-] digits]`.
fn scan_number(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn operators_and_idents() {
        assert_eq!(
            kinds("pnl * plim_zi - pout"),
            vec![
                Token::Ident("pnl".into()),
                Token::Star,
                Token::Ident("plim_zi".into()),
                Token::Minus,
                Token::Ident("pout".into()),
            ]
        );
    }

    #[test]
    fn double_star_is_power() {
        assert_eq!(
            kinds("x**2"),
            vec![Token::Ident("x".into()), Token::Caret, Token::Num(2.0)]
        );
    }

    #[test]
    fn scientific_numbers() {
        assert_eq!(kinds("1e-4"), vec![Token::Num(1e-4)]);
        assert_eq!(kinds("2.5E+3"), vec![Token::Num(2500.0)]);
        assert_eq!(kinds(".5"), vec![Token::Num(0.5)]);
    }

    #[test]
    fn bad_character() {
        let err = tokenize("a $ b").unwrap_err();
        assert!(matches!(err, ExprError::Parse { pos: 2, .. }));
    }

    #[test]
    fn bad_number() {
        assert!(tokenize("1.2.3").is_err());
    }
}
