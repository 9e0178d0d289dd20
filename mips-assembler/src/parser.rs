//! Parses tokenized source lines into labeled statements.

use crate::lexer::{LexError, Token};
use logos::Logos;
use std::fmt;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// An error produced while assembling, tagged with its source line
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {kind}")]
pub struct AssemblyError {
    pub line: u32,
    pub kind: AssemblyErrorKind,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssemblyErrorKind {
    #[error("{0}")]
    Syntax(#[from] LexError),
    #[error("unknown instruction `{0}`")]
    UnknownMnemonic(String),
    #[error("unknown directive `.{0}`")]
    UnknownDirective(String),
    #[error("`{0}` expects {1} operand(s)")]
    WrongOperandCount(String, usize),
    #[error("malformed operand")]
    MalformedOperand,
    #[error("invalid immediate `{0}`")]
    InvalidImmediate(i64),
    #[error("undefined label `{0}`")]
    UndefinedLabel(String),
    #[error("duplicate label `{0}`")]
    DuplicateLabel(String),
    #[error("expected a string literal")]
    ExpectedString,
    #[error("expected a number")]
    ExpectedNumber,
}

/// The parsed form of one source line, before layout
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedLine {
    pub label: Option<String>,
    pub statement: Option<Statement>,
    /// First error found on the line. The statement is then a sized
    /// placeholder, so the label and the layout survive the error.
    pub error: Option<AssemblyErrorKind>,
}

/// A source line that survived the first pass, with its layout
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    pub label: Option<String>,
    pub statement: Statement,
    /// 1-based line number in the source text
    pub number: u32,
    pub address: u32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Instruction {
        mnemonic: String,
        operands: Vec<Operand>,
    },
    Directive(Directive),
    /// A statement that failed to parse but still claims the bytes
    /// its line would have filled
    Unparsed { size: u32 },
}

impl Statement {
    /// Bytes this statement occupies in the image. The first pass
    /// lays out addresses with this; the second pass must emit
    /// exactly as many bytes.
    pub fn size(&self) -> u32 {
        match self {
            Statement::Instruction { .. } => 4,
            Statement::Directive(directive) => directive.size(),
            Statement::Unparsed { size } => *size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Byte(Vec<Value>),
    Half(Vec<Value>),
    Word(Vec<Value>),
    Ascii(String),
    Asciiz(String),
    Space(u32),
}

impl Directive {
    pub fn size(&self) -> u32 {
        match self {
            Directive::Byte(values) => values.len() as u32,
            Directive::Half(values) => 2 * values.len() as u32,
            Directive::Word(values) => 4 * values.len() as u32,
            Directive::Ascii(string) => string.len() as u32,
            Directive::Asciiz(string) => string.len() as u32 + 1,
            Directive::Space(size) => *size,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Directive::Byte(_) => "byte",
            Directive::Half(_) => "half",
            Directive::Word(_) => "word",
            Directive::Ascii(_) => "ascii",
            Directive::Asciiz(_) => "asciiz",
            Directive::Space(_) => "space",
        }
    }
}

/// One instruction operand
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A register mnemonic, resolved to an index at encode time
    Register(String),
    Value(Value),
    /// An `offset(base)` memory operand
    Memory { offset: i64, base: String },
}

/// An immediate position: a numeric literal or a label reference
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(i64),
    Symbol(String),
}

/// Parse one source line into an optional label and statement.
///
/// A line that fails to parse is never dropped: its label and its
/// claim on the address space are recovered from the tokens that did
/// lex, and the error is reported through [`ParsedLine::error`].
pub fn parse_line(text: &str) -> ParsedLine {
    // Collect tokens up to the first lex error; the prefix is still
    // good enough for label and statement-shape detection.
    let mut tokens = Vec::new();
    let mut error = None;
    for result in Token::lexer(text) {
        match result {
            Ok(token) => tokens.push(token),
            Err(lex_error) => {
                error = Some(AssemblyErrorKind::Syntax(lex_error));
                break;
            }
        }
    }

    let (label, rest) = match tokens.as_slice() {
        [Token::Ident(name), Token::Colon, rest @ ..] => (Some(name.clone()), rest),
        rest => (None, rest),
    };

    let statement = match rest {
        [] => None,
        [Token::Directive(name), args @ ..] => match parse_directive(name, args) {
            Ok(directive) if error.is_none() => Some(Statement::Directive(directive)),
            Ok(directive) => Some(Statement::Unparsed {
                size: directive.size(),
            }),
            Err(kind) => {
                let size = directive_placeholder_size(name, args);
                if error.is_none() {
                    error = Some(kind);
                }
                Some(Statement::Unparsed { size })
            }
        },
        [Token::Ident(mnemonic), operands @ ..] => match parse_operands(operands) {
            Ok(operands) if error.is_none() => Some(Statement::Instruction {
                mnemonic: mnemonic.clone(),
                operands,
            }),
            Ok(_) => Some(Statement::Unparsed { size: 4 }),
            Err(kind) => {
                if error.is_none() {
                    error = Some(kind);
                }
                Some(Statement::Unparsed { size: 4 })
            }
        },
        _ => {
            // Junk where a mnemonic belongs; sized like an instruction
            if error.is_none() {
                error = Some(AssemblyErrorKind::MalformedOperand);
            }
            Some(Statement::Unparsed { size: 4 })
        }
    };

    ParsedLine {
        label,
        statement,
        error,
    }
}

/// Best-effort size for a directive whose arguments did not parse,
/// counted from the argument tokens the way the first pass counts
/// well-formed arguments.
fn directive_placeholder_size(name: &str, args: &[Token]) -> u32 {
    let values = args
        .iter()
        .filter(|token| !matches!(token, Token::Comma))
        .count() as u32;

    match name {
        "byte" => values,
        "half" => 2 * values,
        "word" => 4 * values,
        "ascii" | "asciiz" => {
            let length = args
                .iter()
                .find_map(|token| match token {
                    Token::Str(string) => Some(string.len() as u32),
                    _ => None,
                })
                .unwrap_or(0);
            if name == "asciiz" {
                length + 1
            } else {
                length
            }
        }
        "space" => args
            .iter()
            .find_map(|token| match token {
                Token::Number(size) if *size >= 0 => Some(*size as u32),
                _ => None,
            })
            .unwrap_or(0),
        _ => 0,
    }
}

fn parse_directive(name: &str, args: &[Token]) -> Result<Directive, AssemblyErrorKind> {
    match name {
        "byte" => Ok(Directive::Byte(parse_values(args)?)),
        "half" => Ok(Directive::Half(parse_values(args)?)),
        "word" => Ok(Directive::Word(parse_values(args)?)),
        "ascii" => Ok(Directive::Ascii(parse_string_arg(args)?)),
        "asciiz" => Ok(Directive::Asciiz(parse_string_arg(args)?)),
        "space" => match args {
            [] => Ok(Directive::Space(0)),
            [Token::Number(size)] if *size >= 0 => Ok(Directive::Space(*size as u32)),
            _ => Err(AssemblyErrorKind::ExpectedNumber),
        },
        other => Err(AssemblyErrorKind::UnknownDirective(other.to_string())),
    }
}

fn parse_values(args: &[Token]) -> Result<Vec<Value>, AssemblyErrorKind> {
    let mut values = Vec::new();
    let mut args = args.iter().peekable();

    while let Some(token) = args.next() {
        match token {
            Token::Number(value) => values.push(Value::Number(*value)),
            Token::Ident(name) => values.push(Value::Symbol(name.clone())),
            _ => return Err(AssemblyErrorKind::ExpectedNumber),
        }

        if let Some(Token::Comma) = args.peek() {
            args.next();
        }
    }

    Ok(values)
}

fn parse_string_arg(args: &[Token]) -> Result<String, AssemblyErrorKind> {
    match args {
        [] => Ok(String::new()),
        [Token::Str(string)] => Ok(string.clone()),
        _ => Err(AssemblyErrorKind::ExpectedString),
    }
}

fn parse_operands(tokens: &[Token]) -> Result<Vec<Operand>, AssemblyErrorKind> {
    let mut operands = Vec::new();
    let mut tokens = tokens.iter().peekable();

    while let Some(token) = tokens.next() {
        let operand = match token {
            Token::Register(name) => Operand::Register(name.clone()),
            Token::Ident(name) => Operand::Value(Value::Symbol(name.clone())),
            Token::Number(offset) => {
                if let Some(Token::LParen) = tokens.peek() {
                    tokens.next();
                    let base = match tokens.next() {
                        Some(Token::Register(name)) => name.clone(),
                        _ => return Err(AssemblyErrorKind::MalformedOperand),
                    };
                    match tokens.next() {
                        Some(Token::RParen) => {}
                        _ => return Err(AssemblyErrorKind::MalformedOperand),
                    }
                    Operand::Memory {
                        offset: *offset,
                        base,
                    }
                } else {
                    Operand::Value(Value::Number(*offset))
                }
            }
            _ => return Err(AssemblyErrorKind::MalformedOperand),
        };
        operands.push(operand);

        if let Some(Token::Comma) = tokens.peek() {
            tokens.next();
        }
    }

    Ok(operands)
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Instruction { mnemonic, operands } => {
                f.write_str(mnemonic)?;
                for (i, operand) in operands.iter().enumerate() {
                    if i == 0 {
                        write!(f, " {}", operand)?;
                    } else {
                        write!(f, ", {}", operand)?;
                    }
                }
                Ok(())
            }
            Statement::Directive(directive) => write!(f, "{}", directive),
            Statement::Unparsed { .. } => f.write_str("<invalid>"),
        }
    }
}

impl Display for Directive {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.name())?;
        match self {
            Directive::Byte(values) | Directive::Half(values) | Directive::Word(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i == 0 {
                        write!(f, " {}", value)?;
                    } else {
                        write!(f, ", {}", value)?;
                    }
                }
                Ok(())
            }
            Directive::Ascii(string) | Directive::Asciiz(string) => write!(f, " \"{}\"", string),
            Directive::Space(size) => write!(f, " {}", size),
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(name) => f.write_str(name),
            Operand::Value(value) => write!(f, "{}", value),
            Operand::Memory { offset, base } => write!(f, "{}({})", offset, base),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(number) => write!(f, "{}", number),
            Value::Symbol(symbol) => f.write_str(symbol),
        }
    }
}
