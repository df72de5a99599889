//! Parser for the canonical expression text form.
//!
//! Grammar:
//!
//! ```text
//! expr   := call | number | ident
//! call   := ident '(' expr (',' expr)* ')'
//! number := '-'? digits ('.' digits)? (('e' | 'E') '-'? digits)?
//! ```
//!
//! A number with a decimal point, an exponent or a leading minus sign is a
//! constant; a bare non-negative integer is a window.

use crate::tree::Expr;
use forja_traits::{ForjaError, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Ident(&'a str),
    Number(&'a str),
    Open,
    Close,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token<'_>)>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'(' => {
                tokens.push((i, Token::Open));
                i += 1;
            }
            b')' => {
                tokens.push((i, Token::Close));
                i += 1;
            }
            b',' => {
                tokens.push((i, Token::Comma));
                i += 1;
            }
            b'-' | b'0'..=b'9' | b'.' => {
                let start = i;
                i += 1;
                while i < bytes.len() {
                    let d = bytes[i];
                    let exponent_sign =
                        (d == b'-' || d == b'+') && matches!(bytes[i - 1], b'e' | b'E');
                    if d.is_ascii_digit() || d == b'.' || d == b'e' || d == b'E' || exponent_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push((start, Token::Number(&input[start..i])));
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push((start, Token::Ident(&input[start..i])));
            }
            _ => {
                return Err(ForjaError::Parse(format!(
                    "unexpected character {:?} at offset {i}",
                    c as char
                )));
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<(usize, Token<'a>)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<(usize, Token<'a>)> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, wanted: &Token<'_>) -> Result<()> {
        match self.next() {
            Some((_, ref token)) if token == wanted => Ok(()),
            Some((offset, token)) => Err(ForjaError::Parse(format!(
                "expected {wanted:?}, found {token:?} at offset {offset}"
            ))),
            None => Err(ForjaError::Parse(format!(
                "expected {wanted:?}, found end of input"
            ))),
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        match self.next() {
            Some((_, Token::Ident(name))) => {
                if self.peek() != Some(&Token::Open) {
                    return Ok(Expr::column(name));
                }
                self.pos += 1;
                let mut args = vec![self.expr()?];
                while self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    args.push(self.expr()?);
                }
                self.expect(&Token::Close)?;
                Ok(Expr::apply(name, args))
            }
            Some((offset, Token::Number(text))) => number(text, offset),
            Some((offset, token)) => Err(ForjaError::Parse(format!(
                "unexpected {token:?} at offset {offset}"
            ))),
            None => Err(ForjaError::Parse("unexpected end of input".into())),
        }
    }
}

fn number(text: &str, offset: usize) -> Result<Expr> {
    let is_constant = text.contains(['.', 'e', 'E']) || text.starts_with('-');
    if is_constant {
        text.parse::<f64>()
            .map(Expr::constant)
            .map_err(|e| ForjaError::Parse(format!("bad constant {text:?} at offset {offset}: {e}")))
    } else {
        text.parse::<usize>()
            .map(Expr::window)
            .map_err(|e| ForjaError::Parse(format!("bad window {text:?} at offset {offset}: {e}")))
    }
}

/// Parses the canonical text form produced by `Expr`'s `Display`.
///
/// # Errors
///
/// Returns [`ForjaError::Parse`] for malformed text or trailing input.
pub fn parse_expr(input: &str) -> Result<Expr> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
    };
    let expr = parser.expr()?;
    if let Some((offset, token)) = parser.tokens.get(parser.pos) {
        return Err(ForjaError::Parse(format!(
            "trailing {token:?} at offset {offset}"
        )));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;

    #[test]
    fn test_parse_nested() {
        let text = "sanitize(clip(ts_zscore(sanitize(ts_mean(Close, 10)), 20), 3.0))";
        let expr = parse_expr(text).unwrap();
        assert_eq!(expr.to_string(), text);
        assert_eq!(expr.height(), 5);
    }

    #[test]
    fn test_windows_and_constants() {
        let expr = parse_expr("mul(Close, -1)").unwrap();
        assert_eq!(expr.node(2), &Node::Constant(-1.0));

        let expr = parse_expr("ts_delay(return, 5)").unwrap();
        assert_eq!(expr.node(2), &Node::Window(5));

        let expr = parse_expr("add(Close, 1e-3)").unwrap();
        assert_eq!(expr.node(2), &Node::Constant(0.001));
    }

    #[test]
    fn test_whitespace_is_ignored() {
        let expr = parse_expr("  add( Close ,Volume )").unwrap();
        assert_eq!(expr.to_string(), "add(Close, Volume)");
    }

    #[test]
    fn test_lone_terminal() {
        assert_eq!(parse_expr("Close").unwrap(), Expr::column("Close"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_expr("").is_err());
        assert!(parse_expr("add(Close, Volume").is_err());
        assert!(parse_expr("add(Close,, Volume)").is_err());
        assert!(parse_expr("Close Volume").is_err());
        assert!(parse_expr("add(Close; Volume)").is_err());
        assert!(parse_expr("mul(Close, 1.2.3)").is_err());
    }
}
