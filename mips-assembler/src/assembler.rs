//! The two-pass assembler.
//!
//! The first pass parses lines, lays out addresses, and binds labels;
//! the second pass encodes instructions and emits directive bytes.
//! Forward references are free because operands are only evaluated in
//! the second pass.

use crate::parser::{
    parse_line, AssemblyError, AssemblyErrorKind, Directive, Operand, SourceLine, Statement, Value,
};
use log::{trace, warn};
use mips_types::{op_spec, BadRegister, Category, Instruction, OpSpec, Register};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::iter;

/// Translates assembly text into a flat byte image.
///
/// Assembly errors accumulate in a list instead of aborting; callers
/// check [`Assembler::has_errors`] before using the produced bytes.
/// Invalid register names fail fast during encoding.
#[derive(Debug, Default)]
pub struct Assembler {
    labels: HashMap<String, u32>,
    errors: Vec<AssemblyError>,
    entry: Option<u32>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// First pass: parse the source, lay out addresses, bind labels
    pub fn parse(&mut self, source: &str) -> Vec<SourceLine> {
        let mut lines = Vec::new();
        let mut current_address = 0u32;

        for (index, text) in source.lines().enumerate() {
            let number = index as u32 + 1;
            let parsed = parse_line(text);

            // A line that failed to parse still binds its label and
            // claims its size through a placeholder statement
            if let Some(kind) = parsed.error {
                self.errors.push(AssemblyError { line: number, kind });
            }

            if let Some(label) = parsed.label.clone() {
                self.bind_label(label, current_address, number);
            }

            if let Some(statement) = parsed.statement {
                let size = statement.size();
                lines.push(SourceLine {
                    label: parsed.label,
                    statement,
                    number,
                    address: current_address,
                    size,
                });
                current_address = current_address.wrapping_add(size);
            }
        }

        trace!("Labels after first pass: {:?}", self.labels);
        lines
    }

    /// Second pass: encode instructions and emit directive data
    pub fn assemble(&mut self, lines: &[SourceLine]) -> Result<Vec<u8>, BadRegister> {
        let mut binary = Vec::new();

        for line in lines {
            match &line.statement {
                Statement::Directive(directive) => {
                    self.emit_directive(directive, line, &mut binary)
                }
                Statement::Instruction { mnemonic, operands } => {
                    let word = self.encode_instruction(mnemonic, operands, line)?;
                    binary.extend_from_slice(&word.to_le_bytes());
                }
                // Reported in the first pass; zero-fill its bytes
                Statement::Unparsed { size } => {
                    binary.extend(iter::repeat(0).take(*size as usize))
                }
            }
        }

        Ok(binary)
    }

    /// Run both passes over a source string
    pub fn assemble_text(&mut self, source: &str) -> Result<Vec<u8>, BadRegister> {
        let lines = self.parse(source);
        self.assemble(&lines)
    }

    /// The address of the `main` label, if the source had one
    pub fn entry(&self) -> Option<u32> {
        self.entry
    }

    /// The entry address for the binary header; 0 when `main` is absent
    pub fn entry_address(&self) -> u32 {
        self.entry.unwrap_or(0)
    }

    pub fn labels(&self) -> &HashMap<String, u32> {
        &self.labels
    }

    pub fn errors(&self) -> &[AssemblyError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Bind a label to an address. The first binding wins; later
    /// bindings of the same name are reported as errors.
    fn bind_label(&mut self, label: String, address: u32, number: u32) {
        match self.labels.entry(label) {
            Entry::Occupied(occupied) => {
                let label = occupied.key().clone();
                self.errors.push(AssemblyError {
                    line: number,
                    kind: AssemblyErrorKind::DuplicateLabel(label),
                });
            }
            Entry::Vacant(vacant) => {
                if vacant.key().as_str() == "main" {
                    self.entry = Some(address);
                }
                vacant.insert(address);
            }
        }
    }

    fn error(&mut self, line: &SourceLine, kind: AssemblyErrorKind) {
        self.errors.push(AssemblyError {
            line: line.number,
            kind,
        });
    }

    /// Resolve an immediate position: a known label resolves to its
    /// address, otherwise the literal value is used.
    fn resolve_value(&mut self, value: &Value, line: &SourceLine) -> i64 {
        match value {
            Value::Number(number) => *number,
            Value::Symbol(name) => match self.labels.get(name) {
                Some(&address) => i64::from(address),
                None => {
                    self.error(line, AssemblyErrorKind::UndefinedLabel(name.clone()));
                    0
                }
            },
        }
    }

    /// Truncate a value to 16 bits (two's complement for negatives)
    fn immediate_16(&self, value: i64, line: &SourceLine) -> u16 {
        if !(-0x8000..=0xFFFF).contains(&value) {
            warn!("line {}: immediate {} truncated to 16 bits", line.number, value);
        }
        (value & 0xFFFF) as u16
    }

    fn emit_directive(&mut self, directive: &Directive, line: &SourceLine, binary: &mut Vec<u8>) {
        match directive {
            Directive::Byte(values) => {
                for value in values {
                    let value = self.resolve_value(value, line);
                    if !(-0x80..=0xFF).contains(&value) {
                        warn!("line {}: .byte truncates {}", line.number, value);
                    }
                    binary.push(value as u8);
                }
            }
            Directive::Half(values) => {
                for value in values {
                    let value = self.resolve_value(value, line);
                    if !(-0x8000..=0xFFFF).contains(&value) {
                        warn!("line {}: .half truncates {}", line.number, value);
                    }
                    binary.extend_from_slice(&(value as u16).to_le_bytes());
                }
            }
            Directive::Word(values) => {
                for value in values {
                    let value = self.resolve_value(value, line);
                    if !(i64::from(i32::MIN)..=i64::from(u32::MAX)).contains(&value) {
                        warn!("line {}: .word truncates {}", line.number, value);
                    }
                    binary.extend_from_slice(&(value as u32).to_le_bytes());
                }
            }
            Directive::Ascii(string) => binary.extend_from_slice(string.as_bytes()),
            Directive::Asciiz(string) => {
                binary.extend_from_slice(string.as_bytes());
                binary.push(0);
            }
            Directive::Space(size) => binary.extend(iter::repeat(0).take(*size as usize)),
        }
    }

    /// Build and encode one instruction per its category's operand
    /// contract. Layout errors emit a zero word so later addresses
    /// stay correct; bad register names abort immediately.
    fn encode_instruction(
        &mut self,
        mnemonic: &str,
        operands: &[Operand],
        line: &SourceLine,
    ) -> Result<u32, BadRegister> {
        let spec = match op_spec(mnemonic) {
            Some(spec) => spec,
            None => {
                self.error(line, AssemblyErrorKind::UnknownMnemonic(mnemonic.to_string()));
                return Ok(0);
            }
        };

        let word = match spec.category {
            Category::ArithLogic => match operands {
                [Operand::Register(rd), Operand::Register(rs), Operand::Register(rt)] => {
                    Instruction::r_type(spec, register(rs)?, register(rt)?, register(rd)?, 0)
                        .encode()
                }
                _ => self.bad_operands(spec, 3, line),
            },
            Category::Shift => match operands {
                [Operand::Register(rd), Operand::Register(rt), Operand::Value(amount)] => {
                    let amount = self.resolve_value(amount, line);
                    if !(0..=31).contains(&amount) {
                        self.error(line, AssemblyErrorKind::InvalidImmediate(amount));
                    }
                    Instruction::r_type(
                        spec,
                        Register::ZERO,
                        register(rt)?,
                        register(rd)?,
                        (amount & 0x1F) as u8,
                    )
                    .encode()
                }
                _ => self.bad_operands(spec, 3, line),
            },
            Category::ShiftReg => match operands {
                [Operand::Register(rd), Operand::Register(rt), Operand::Register(rs)] => {
                    Instruction::r_type(spec, register(rs)?, register(rt)?, register(rd)?, 0)
                        .encode()
                }
                _ => self.bad_operands(spec, 3, line),
            },
            Category::DivMult => match operands {
                [Operand::Register(rs), Operand::Register(rt)] => {
                    Instruction::r_type(spec, register(rs)?, register(rt)?, Register::ZERO, 0)
                        .encode()
                }
                _ => self.bad_operands(spec, 2, line),
            },
            Category::JumpReg | Category::MoveTo => match operands {
                [Operand::Register(rs)] => {
                    Instruction::r_type(spec, register(rs)?, Register::ZERO, Register::ZERO, 0)
                        .encode()
                }
                _ => self.bad_operands(spec, 1, line),
            },
            Category::MoveFrom => match operands {
                [Operand::Register(rd)] => {
                    Instruction::r_type(spec, Register::ZERO, Register::ZERO, register(rd)?, 0)
                        .encode()
                }
                _ => self.bad_operands(spec, 1, line),
            },
            Category::ArithLogicImm => match operands {
                [Operand::Register(rt), Operand::Register(rs), Operand::Value(immediate)] => {
                    let immediate = self.resolve_value(immediate, line);
                    let immediate = self.immediate_16(immediate, line);
                    Instruction::i_type(spec, register(rs)?, register(rt)?, immediate).encode()
                }
                _ => self.bad_operands(spec, 3, line),
            },
            Category::LoadImm => match operands {
                [Operand::Register(rt), Operand::Value(immediate)] => {
                    let immediate = self.resolve_value(immediate, line);
                    let immediate = self.immediate_16(immediate, line);
                    Instruction::i_type(spec, Register::ZERO, register(rt)?, immediate).encode()
                }
                _ => self.bad_operands(spec, 2, line),
            },
            Category::Branch => match operands {
                [Operand::Register(rs), Operand::Register(rt), Operand::Value(target)] => {
                    let offset = self.branch_offset(target, line);
                    Instruction::i_type(spec, register(rs)?, register(rt)?, offset).encode()
                }
                _ => self.bad_operands(spec, 3, line),
            },
            Category::BranchZero => match operands {
                [Operand::Register(rs), Operand::Value(target)] => {
                    let offset = self.branch_offset(target, line);
                    Instruction::i_type(spec, register(rs)?, Register::ZERO, offset).encode()
                }
                _ => self.bad_operands(spec, 2, line),
            },
            Category::LoadStore => match operands {
                [Operand::Register(rt), Operand::Memory { offset, base }] => {
                    let offset = self.immediate_16(*offset, line);
                    Instruction::i_type(spec, register(base)?, register(rt)?, offset).encode()
                }
                _ => self.bad_operands(spec, 2, line),
            },
            Category::Jump => match operands {
                [Operand::Value(target)] => {
                    let target = self.resolve_value(target, line) as u32;
                    Instruction::j_type(spec, target >> 2).encode()
                }
                _ => self.bad_operands(spec, 1, line),
            },
            Category::Trap => match operands {
                [Operand::Value(code)] => {
                    let code = self.resolve_value(code, line);
                    let code = self.immediate_16(code, line);
                    Instruction::i_type(spec, Register::ZERO, Register::ZERO, code).encode()
                }
                _ => self.bad_operands(spec, 1, line),
            },
        };

        Ok(word)
    }

    /// Branch offsets are relative to the instruction after the
    /// branch and counted in words.
    fn branch_offset(&mut self, target: &Value, line: &SourceLine) -> u16 {
        let target = self.resolve_value(target, line);
        (((target - i64::from(line.address) - 4) >> 2) & 0xFFFF) as u16
    }

    fn bad_operands(&mut self, spec: OpSpec, expected: usize, line: &SourceLine) -> u32 {
        self.error(
            line,
            AssemblyErrorKind::WrongOperandCount(spec.mnemonic.to_string(), expected),
        );
        0
    }
}

fn register(name: &str) -> Result<Register, BadRegister> {
    Register::from_name(name)
}
