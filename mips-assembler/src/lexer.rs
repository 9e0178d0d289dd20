//! Tokenizer for one line of assembly source.
//!
//! Lines are tokenized independently; `#` starts a comment that runs
//! to the end of the line.

use logos::{Lexer, Logos};
use thiserror::Error;

/// A unit of information in assembly source
#[derive(Debug, Logos, PartialEq, Clone)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"#.*")]
#[logos(error = LexError)]
pub enum Token {
    /// A directive name, leading dot stripped (e.g. `.word`)
    #[regex(r"\.[A-Za-z]+", |lx| lx.slice()[1..].to_string())]
    Directive(String),

    /// A `$`-prefixed register mnemonic, kept as text until encoding
    #[regex(r"\$[A-Za-z0-9]+", |lx| lx.slice().to_string())]
    Register(String),

    /// A decimal (possibly negative) or hexadecimal integer literal
    #[regex(r"-?[0-9]+", parse_decimal)]
    #[regex(r"0[xX][0-9A-Fa-f]+", parse_hex)]
    Number(i64),

    /// A label or instruction mnemonic
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lx| lx.slice().to_string())]
    Ident(String),

    /// A double-quoted string literal, quotes stripped
    #[regex(r#""[^"]*""#, parse_string)]
    Str(String),

    /// Ends a label declaration
    #[token(":")]
    Colon,

    /// Commas terminate operand tokens
    #[token(",")]
    Comma,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,
}

/// Any errors raised while lexing a source line
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("integer literal out of range")]
    IntegerOutOfRange,
    #[default]
    #[error("unrecognized token")]
    UnrecognizedToken,
}

fn parse_decimal(lx: &mut Lexer<'_, Token>) -> Result<i64, LexError> {
    lx.slice().parse().map_err(|_| LexError::IntegerOutOfRange)
}

fn parse_hex(lx: &mut Lexer<'_, Token>) -> Result<i64, LexError> {
    i64::from_str_radix(&lx.slice()[2..], 16).map_err(|_| LexError::IntegerOutOfRange)
}

fn parse_string(lx: &mut Lexer<'_, Token>) -> String {
    let slice = lx.slice();
    slice[1..slice.len() - 1].to_string()
}

/// Tokenize one source line
pub fn tokenize(line: &str) -> Result<Vec<Token>, LexError> {
    Token::lexer(line).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_line() {
        let tokens = tokenize("    addi $t0, $zero, 42").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("addi".to_string()),
                Token::Register("$t0".to_string()),
                Token::Comma,
                Token::Register("$zero".to_string()),
                Token::Comma,
                Token::Number(42),
            ]
        );
    }

    #[test]
    fn label_and_comment() {
        let tokens = tokenize("loop: bne $t0, $t1, loop # spin").unwrap();
        assert_eq!(tokens[0], Token::Ident("loop".to_string()));
        assert_eq!(tokens[1], Token::Colon);
        assert_eq!(*tokens.last().unwrap(), Token::Ident("loop".to_string()));
    }

    #[test]
    fn memory_operand() {
        let tokens = tokenize("lw $t0, 8($sp)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("lw".to_string()),
                Token::Register("$t0".to_string()),
                Token::Comma,
                Token::Number(8),
                Token::LParen,
                Token::Register("$sp".to_string()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn numeric_literals() {
        assert_eq!(tokenize("-10").unwrap(), vec![Token::Number(-10)]);
        assert_eq!(tokenize("0x1F").unwrap(), vec![Token::Number(0x1F)]);
        assert_eq!(tokenize("0XAB").unwrap(), vec![Token::Number(0xAB)]);
    }

    #[test]
    fn string_literal_keeps_spaces() {
        let tokens = tokenize(r#".asciiz "Hello, world!""#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Directive("asciiz".to_string()),
                Token::Str("Hello, world!".to_string()),
            ]
        );
    }

    #[test]
    fn comment_only_line_is_empty() {
        assert_eq!(tokenize("# just a comment").unwrap(), vec![]);
        assert_eq!(tokenize("").unwrap(), vec![]);
    }

    #[test]
    fn bad_token() {
        assert!(tokenize("addi $t0, $t0, @").is_err());
    }
}
