use crate::constants::*;
use crate::register::Register;
use std::fmt;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// The three MIPS instruction encodings
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    R,
    I,
    J,
}

impl Format {
    /// The format is fully determined by the operation code
    pub fn of(op_code: u8) -> Format {
        match op_code {
            OP_R_TYPE => Format::R,
            OP_J | OP_JAL => Format::J,
            _ => Format::I,
        }
    }
}

/// Execution category, the dispatch tag for the processor
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Category {
    ArithLogic,
    DivMult,
    Shift,
    ShiftReg,
    JumpReg,
    MoveFrom,
    MoveTo,
    ArithLogicImm,
    LoadImm,
    Branch,
    BranchZero,
    LoadStore,
    Jump,
    Trap,
}

impl Category {
    /// Whether instructions of this category set the program counter
    /// themselves instead of falling through to the next instruction.
    pub fn transfers_control(self) -> bool {
        matches!(
            self,
            Category::Jump | Category::JumpReg | Category::Branch | Category::BranchZero
        )
    }
}

/// A word that does not correspond to any known instruction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown operation code 0x{0:02x}")]
    UnknownOpCode(u8),
    #[error("unknown R-type function code 0x{0:02x}")]
    UnknownFunction(u8),
}

/// Static encoding data for one mnemonic
#[derive(Copy, Clone, Debug)]
pub struct OpSpec {
    pub mnemonic: &'static str,
    pub op_code: u8,
    pub function: u8,
    pub category: Category,
}

/// Look up the encoding data for a mnemonic
pub fn op_spec(mnemonic: &str) -> Option<OpSpec> {
    let (mnemonic, op_code, function, category) = match mnemonic {
        "sll" => ("sll", OP_R_TYPE, FUNCTION_SLL, Category::Shift),
        "srl" => ("srl", OP_R_TYPE, FUNCTION_SRL, Category::Shift),
        "sra" => ("sra", OP_R_TYPE, FUNCTION_SRA, Category::Shift),
        "sllv" => ("sllv", OP_R_TYPE, FUNCTION_SLLV, Category::ShiftReg),
        "srlv" => ("srlv", OP_R_TYPE, FUNCTION_SRLV, Category::ShiftReg),
        "srav" => ("srav", OP_R_TYPE, FUNCTION_SRAV, Category::ShiftReg),
        "jr" => ("jr", OP_R_TYPE, FUNCTION_JR, Category::JumpReg),
        "jalr" => ("jalr", OP_R_TYPE, FUNCTION_JALR, Category::JumpReg),
        "mfhi" => ("mfhi", OP_R_TYPE, FUNCTION_MFHI, Category::MoveFrom),
        "mthi" => ("mthi", OP_R_TYPE, FUNCTION_MTHI, Category::MoveTo),
        "mflo" => ("mflo", OP_R_TYPE, FUNCTION_MFLO, Category::MoveFrom),
        "mtlo" => ("mtlo", OP_R_TYPE, FUNCTION_MTLO, Category::MoveTo),
        "mult" => ("mult", OP_R_TYPE, FUNCTION_MULT, Category::DivMult),
        "multu" => ("multu", OP_R_TYPE, FUNCTION_MULTU, Category::DivMult),
        "div" => ("div", OP_R_TYPE, FUNCTION_DIV, Category::DivMult),
        "divu" => ("divu", OP_R_TYPE, FUNCTION_DIVU, Category::DivMult),
        "add" => ("add", OP_R_TYPE, FUNCTION_ADD, Category::ArithLogic),
        "addu" => ("addu", OP_R_TYPE, FUNCTION_ADDU, Category::ArithLogic),
        "sub" => ("sub", OP_R_TYPE, FUNCTION_SUB, Category::ArithLogic),
        "subu" => ("subu", OP_R_TYPE, FUNCTION_SUBU, Category::ArithLogic),
        "and" => ("and", OP_R_TYPE, FUNCTION_AND, Category::ArithLogic),
        "or" => ("or", OP_R_TYPE, FUNCTION_OR, Category::ArithLogic),
        "xor" => ("xor", OP_R_TYPE, FUNCTION_XOR, Category::ArithLogic),
        "nor" => ("nor", OP_R_TYPE, FUNCTION_NOR, Category::ArithLogic),
        "slt" => ("slt", OP_R_TYPE, FUNCTION_SLT, Category::ArithLogic),
        "sltu" => ("sltu", OP_R_TYPE, FUNCTION_SLTU, Category::ArithLogic),
        "j" => ("j", OP_J, 0, Category::Jump),
        "jal" => ("jal", OP_JAL, 0, Category::Jump),
        "beq" => ("beq", OP_BEQ, 0, Category::Branch),
        "bne" => ("bne", OP_BNE, 0, Category::Branch),
        "blez" => ("blez", OP_BLEZ, 0, Category::BranchZero),
        "bgtz" => ("bgtz", OP_BGTZ, 0, Category::BranchZero),
        "addi" => ("addi", OP_ADDI, 0, Category::ArithLogicImm),
        "addiu" => ("addiu", OP_ADDIU, 0, Category::ArithLogicImm),
        "slti" => ("slti", OP_SLTI, 0, Category::ArithLogicImm),
        "sltiu" => ("sltiu", OP_SLTIU, 0, Category::ArithLogicImm),
        "andi" => ("andi", OP_ANDI, 0, Category::ArithLogicImm),
        "ori" => ("ori", OP_ORI, 0, Category::ArithLogicImm),
        "xori" => ("xori", OP_XORI, 0, Category::ArithLogicImm),
        "llo" => ("llo", OP_LLO, 0, Category::LoadImm),
        "lhi" => ("lhi", OP_LHI, 0, Category::LoadImm),
        "trap" => ("trap", OP_TRAP, 0, Category::Trap),
        "lb" => ("lb", OP_LB, 0, Category::LoadStore),
        "lh" => ("lh", OP_LH, 0, Category::LoadStore),
        "lw" => ("lw", OP_LW, 0, Category::LoadStore),
        "lbu" => ("lbu", OP_LBU, 0, Category::LoadStore),
        "lhu" => ("lhu", OP_LHU, 0, Category::LoadStore),
        "sb" => ("sb", OP_SB, 0, Category::LoadStore),
        "sh" => ("sh", OP_SH, 0, Category::LoadStore),
        "sw" => ("sw", OP_SW, 0, Category::LoadStore),
        _ => return None,
    };

    Some(OpSpec {
        mnemonic,
        op_code,
        function,
        category,
    })
}

/// Classify an operation/function code pair into a mnemonic and category
fn classify(op_code: u8, function: u8) -> Result<(&'static str, Category), DecodeError> {
    if op_code == OP_R_TYPE {
        let entry = match function {
            FUNCTION_SLL => ("sll", Category::Shift),
            FUNCTION_SRL => ("srl", Category::Shift),
            FUNCTION_SRA => ("sra", Category::Shift),
            FUNCTION_SLLV => ("sllv", Category::ShiftReg),
            FUNCTION_SRLV => ("srlv", Category::ShiftReg),
            FUNCTION_SRAV => ("srav", Category::ShiftReg),
            FUNCTION_JR => ("jr", Category::JumpReg),
            FUNCTION_JALR => ("jalr", Category::JumpReg),
            FUNCTION_MFHI => ("mfhi", Category::MoveFrom),
            FUNCTION_MTHI => ("mthi", Category::MoveTo),
            FUNCTION_MFLO => ("mflo", Category::MoveFrom),
            FUNCTION_MTLO => ("mtlo", Category::MoveTo),
            FUNCTION_MULT => ("mult", Category::DivMult),
            FUNCTION_MULTU => ("multu", Category::DivMult),
            FUNCTION_DIV => ("div", Category::DivMult),
            FUNCTION_DIVU => ("divu", Category::DivMult),
            FUNCTION_ADD => ("add", Category::ArithLogic),
            FUNCTION_ADDU => ("addu", Category::ArithLogic),
            FUNCTION_SUB => ("sub", Category::ArithLogic),
            FUNCTION_SUBU => ("subu", Category::ArithLogic),
            FUNCTION_AND => ("and", Category::ArithLogic),
            FUNCTION_OR => ("or", Category::ArithLogic),
            FUNCTION_XOR => ("xor", Category::ArithLogic),
            FUNCTION_NOR => ("nor", Category::ArithLogic),
            FUNCTION_SLT => ("slt", Category::ArithLogic),
            FUNCTION_SLTU => ("sltu", Category::ArithLogic),
            _ => return Err(DecodeError::UnknownFunction(function)),
        };
        Ok(entry)
    } else {
        let entry = match op_code {
            OP_J => ("j", Category::Jump),
            OP_JAL => ("jal", Category::Jump),
            OP_BEQ => ("beq", Category::Branch),
            OP_BNE => ("bne", Category::Branch),
            OP_BLEZ => ("blez", Category::BranchZero),
            OP_BGTZ => ("bgtz", Category::BranchZero),
            OP_ADDI => ("addi", Category::ArithLogicImm),
            OP_ADDIU => ("addiu", Category::ArithLogicImm),
            OP_SLTI => ("slti", Category::ArithLogicImm),
            OP_SLTIU => ("sltiu", Category::ArithLogicImm),
            OP_ANDI => ("andi", Category::ArithLogicImm),
            OP_ORI => ("ori", Category::ArithLogicImm),
            OP_XORI => ("xori", Category::ArithLogicImm),
            OP_LLO => ("llo", Category::LoadImm),
            OP_LHI => ("lhi", Category::LoadImm),
            OP_TRAP => ("trap", Category::Trap),
            OP_LB => ("lb", Category::LoadStore),
            OP_LH => ("lh", Category::LoadStore),
            OP_LW => ("lw", Category::LoadStore),
            OP_LBU => ("lbu", Category::LoadStore),
            OP_LHU => ("lhu", Category::LoadStore),
            OP_SB => ("sb", Category::LoadStore),
            OP_SH => ("sh", Category::LoadStore),
            OP_SW => ("sw", Category::LoadStore),
            _ => return Err(DecodeError::UnknownOpCode(op_code)),
        };
        Ok(entry)
    }
}

/// A decoded MIPS instruction.
///
/// All fields are extracted unconditionally; the ones a given format
/// does not use stay at their decoded values but are ignored.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub op_code: u8,
    pub rs: Register,
    pub rt: Register,
    pub rd: Register,
    pub shamt: u8,
    pub function: u8,
    pub immediate: u16,
    /// 26-bit pseudo address (for J-type instructions)
    pub target: u32,
    pub format: Format,
    pub category: Category,
    pub mnemonic: &'static str,
}

impl Instruction {
    /// Decode a 32-bit instruction word
    pub fn decode(word: u32) -> Result<Self, DecodeError> {
        let op_code = ((word >> 26) & 0x3F) as u8;
        let function = (word & 0x3F) as u8;
        let (mnemonic, category) = classify(op_code, function)?;

        Ok(Instruction {
            op_code,
            rs: Register::from_field(((word >> 21) & 0x1F) as u8),
            rt: Register::from_field(((word >> 16) & 0x1F) as u8),
            rd: Register::from_field(((word >> 11) & 0x1F) as u8),
            shamt: ((word >> 6) & 0x1F) as u8,
            function,
            immediate: (word & 0xFFFF) as u16,
            target: word & 0x03FF_FFFF,
            format: Format::of(op_code),
            category,
            mnemonic,
        })
    }

    /// Encode the instruction back into its 32-bit word
    pub fn encode(&self) -> u32 {
        let op_code = (self.op_code as u32) << 26;

        match self.format {
            Format::R => {
                op_code
                    | (self.rs.index() as u32) << 21
                    | (self.rt.index() as u32) << 16
                    | (self.rd.index() as u32) << 11
                    | (self.shamt as u32) << 6
                    | self.function as u32
            }
            Format::I => {
                op_code
                    | (self.rs.index() as u32) << 21
                    | (self.rt.index() as u32) << 16
                    | self.immediate as u32
            }
            Format::J => op_code | (self.target & 0x03FF_FFFF),
        }
    }

    /// Build an R-type instruction
    pub fn r_type(spec: OpSpec, rs: Register, rt: Register, rd: Register, shamt: u8) -> Self {
        Instruction {
            op_code: spec.op_code,
            rs,
            rt,
            rd,
            shamt,
            function: spec.function,
            immediate: 0,
            target: 0,
            format: Format::R,
            category: spec.category,
            mnemonic: spec.mnemonic,
        }
    }

    /// Build an I-type instruction
    pub fn i_type(spec: OpSpec, rs: Register, rt: Register, immediate: u16) -> Self {
        Instruction {
            op_code: spec.op_code,
            rs,
            rt,
            rd: Register::ZERO,
            shamt: 0,
            function: 0,
            immediate,
            target: 0,
            format: Format::I,
            category: spec.category,
            mnemonic: spec.mnemonic,
        }
    }

    /// Build a J-type instruction
    pub fn j_type(spec: OpSpec, target: u32) -> Self {
        Instruction {
            op_code: spec.op_code,
            rs: Register::ZERO,
            rt: Register::ZERO,
            rd: Register::ZERO,
            shamt: 0,
            function: 0,
            immediate: 0,
            target: target & 0x03FF_FFFF,
            format: Format::J,
            category: spec.category,
            mnemonic: spec.mnemonic,
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.category {
            Category::ArithLogic => {
                write!(f, "{} {}, {}, {}", self.mnemonic, self.rd, self.rs, self.rt)
            }
            Category::Shift => {
                write!(f, "{} {}, {}, {}", self.mnemonic, self.rd, self.rt, self.shamt)
            }
            Category::ShiftReg => {
                write!(f, "{} {}, {}, {}", self.mnemonic, self.rd, self.rt, self.rs)
            }
            Category::DivMult => write!(f, "{} {}, {}", self.mnemonic, self.rs, self.rt),
            Category::JumpReg => write!(f, "{} {}", self.mnemonic, self.rs),
            Category::MoveFrom => write!(f, "{} {}", self.mnemonic, self.rd),
            Category::MoveTo => write!(f, "{} {}", self.mnemonic, self.rs),
            Category::ArithLogicImm => write!(
                f,
                "{} {}, {}, {}",
                self.mnemonic,
                self.rt,
                self.rs,
                self.immediate as i16
            ),
            Category::LoadImm => {
                write!(f, "{} {}, 0x{:x}", self.mnemonic, self.rt, self.immediate)
            }
            Category::Branch => write!(
                f,
                "{} {}, {}, {}",
                self.mnemonic,
                self.rs,
                self.rt,
                self.immediate as i16
            ),
            Category::BranchZero => {
                write!(f, "{} {}, {}", self.mnemonic, self.rs, self.immediate as i16)
            }
            Category::LoadStore => write!(
                f,
                "{} {}, {}({})",
                self.mnemonic,
                self.rt,
                self.immediate as i16,
                self.rs
            ),
            Category::Jump => write!(f, "{} 0x{:x}", self.mnemonic, self.target << 2),
            Category::Trap => write!(f, "{} {}", self.mnemonic, self.immediate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_fields() {
        // add $t0, $t0, $t1
        let instruction = Instruction::decode(0x0109_4020).unwrap();
        assert_eq!(instruction.op_code, OP_R_TYPE);
        assert_eq!(instruction.function, FUNCTION_ADD);
        assert_eq!(instruction.rs.index(), 8);
        assert_eq!(instruction.rt.index(), 9);
        assert_eq!(instruction.rd.index(), 8);
        assert_eq!(instruction.format, Format::R);
        assert_eq!(instruction.category, Category::ArithLogic);
        assert_eq!(instruction.mnemonic, "add");
    }

    #[test]
    fn format_detection() {
        assert_eq!(Instruction::decode(0x0109_4020).unwrap().format, Format::R);
        // addi $t0, $t0, 42
        assert_eq!(Instruction::decode(0x2108_002A).unwrap().format, Format::I);
        // j 0x40
        assert_eq!(Instruction::decode(0x0800_0010).unwrap().format, Format::J);
    }

    #[test]
    fn encode_round_trip() {
        for &word in &[0x0109_4020, 0x2108_002A, 0x0800_0010] {
            let instruction = Instruction::decode(word).unwrap();
            assert_eq!(instruction.encode(), word);
        }
    }

    #[test]
    fn unknown_codes() {
        // opcode 0x3F is unassigned
        assert_eq!(
            Instruction::decode(0xFC00_0000),
            Err(DecodeError::UnknownOpCode(0x3F))
        );
        // R-type with an unassigned function code
        assert_eq!(
            Instruction::decode(0x0000_003F),
            Err(DecodeError::UnknownFunction(0x3F))
        );
    }

    #[test]
    fn immediate_masked_on_encode() {
        let spec = op_spec("addi").unwrap();
        let instruction = Instruction::i_type(spec, Register::ZERO, Register::AT, 0xFFF6);
        assert_eq!(instruction.encode() & 0xFFFF, 0xFFF6);
    }

    #[test]
    fn target_masked_on_encode() {
        let spec = op_spec("j").unwrap();
        let instruction = Instruction::j_type(spec, 0xFFFF_FFFF);
        assert_eq!(instruction.encode(), (OP_J as u32) << 26 | 0x03FF_FFFF);
    }

    #[test]
    fn spec_lookup_matches_classify() {
        for mnemonic in &[
            "sll", "srl", "sra", "sllv", "srlv", "srav", "jr", "jalr", "mfhi", "mthi", "mflo",
            "mtlo", "mult", "multu", "div", "divu", "add", "addu", "sub", "subu", "and", "or",
            "xor", "nor", "slt", "sltu", "j", "jal", "beq", "bne", "blez", "bgtz", "addi",
            "addiu", "slti", "sltiu", "andi", "ori", "xori", "llo", "lhi", "trap", "lb", "lh",
            "lw", "lbu", "lhu", "sb", "sh", "sw",
        ] {
            let spec = op_spec(mnemonic).unwrap_or_else(|| panic!("missing {}", mnemonic));
            assert_eq!(spec.mnemonic, *mnemonic);
            let (name, category) = classify(spec.op_code, spec.function).unwrap();
            assert_eq!(name, *mnemonic);
            assert_eq!(category, spec.category);
        }
        assert!(op_spec("syscall").is_none());
    }
}
