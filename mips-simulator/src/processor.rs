use crate::machine::MachineState;
use crate::memory::OutOfBounds;
use log::debug;
use mips_types::constants::*;
use mips_types::{Category, DecodeError, Instruction, Register};
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::io;
use std::io::{Read, Write};
use thiserror::Error;

/// An error raised while executing an instruction
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Memory(#[from] OutOfBounds),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("trap I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// A MIPS processor.
///
/// Owns the machine state and the two streams the trap instruction
/// reads from and writes to. The streams default to stdin/stdout and
/// can be replaced for tests.
pub struct Processor {
    state: MachineState,
    halted: bool,
    input: Box<dyn Read>,
    output: Box<dyn Write>,
    /// Byte read past the end of an integer, handed to the next read
    pushback: Option<u8>,
}

impl Processor {
    pub fn new() -> Self {
        Self::with_io(Box::new(io::stdin()), Box::new(io::stdout()))
    }

    pub fn with_io(input: Box<dyn Read>, output: Box<dyn Write>) -> Self {
        Processor {
            state: MachineState::new(),
            halted: false,
            input,
            output,
            pushback: None,
        }
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut MachineState {
        &mut self.state
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Load an image at address 0 and prepare the conventional entry
    /// state: PC at the entry address and `$sp` at the top of memory.
    pub fn load_program(&mut self, image: &[u8], entry: u32) -> Result<(), OutOfBounds> {
        self.state.load_image(image, 0)?;
        self.state.set_pc(entry);
        self.state.set_register(Register::SP, STACK_START);
        Ok(())
    }

    /// Run one fetch-decode-execute cycle
    pub fn step(&mut self) -> Result<(), ExecutionError> {
        if self.halted {
            return Ok(());
        }

        let pc = self.state.pc();
        let word = self.state.load_word(pc)?;

        // An all-zero word is a no-op
        if word == 0 {
            self.state.set_pc(pc.wrapping_add(4));
            return Ok(());
        }

        let instruction = Instruction::decode(word)?;
        debug!("0x{:08x}: {}", pc, instruction);
        self.execute(&instruction)?;

        // Control-transfer instructions set the PC themselves
        if !instruction.category.transfers_control() {
            self.state.set_pc(pc.wrapping_add(4));
        }

        Ok(())
    }

    /// Step until the program halts
    pub fn run(&mut self) -> Result<(), ExecutionError> {
        while !self.halted {
            self.step()?;
        }

        Ok(())
    }

    fn execute(&mut self, instruction: &Instruction) -> Result<(), ExecutionError> {
        match instruction.category {
            Category::ArithLogic => self.execute_arith_logic(instruction),
            Category::DivMult => self.execute_div_mult(instruction),
            Category::Shift => self.execute_shift(instruction),
            Category::ShiftReg => self.execute_shift_reg(instruction),
            Category::JumpReg => self.execute_jump_reg(instruction),
            Category::MoveFrom => self.execute_move_from(instruction),
            Category::MoveTo => self.execute_move_to(instruction),
            Category::ArithLogicImm => self.execute_arith_logic_imm(instruction),
            Category::LoadImm => self.execute_load_imm(instruction),
            Category::Branch => self.execute_branch(instruction),
            Category::BranchZero => self.execute_branch_zero(instruction),
            Category::LoadStore => self.execute_load_store(instruction)?,
            Category::Jump => self.execute_jump(instruction),
            Category::Trap => self.execute_trap(instruction)?,
        }

        Ok(())
    }

    fn execute_arith_logic(&mut self, instruction: &Instruction) {
        let a = self.state.register(instruction.rs);
        let b = self.state.register(instruction.rt);

        let result = match instruction.function {
            FUNCTION_ADD => (a as i32).wrapping_add(b as i32) as u32,
            FUNCTION_ADDU => a.wrapping_add(b),
            FUNCTION_SUB => (a as i32).wrapping_sub(b as i32) as u32,
            FUNCTION_SUBU => a.wrapping_sub(b),
            FUNCTION_AND => a & b,
            FUNCTION_OR => a | b,
            FUNCTION_XOR => a ^ b,
            FUNCTION_NOR => !(a | b),
            FUNCTION_SLT => ((a as i32) < (b as i32)) as u32,
            FUNCTION_SLTU => (a < b) as u32,
            _ => unreachable!("function 0x{:02x} is not arithmetic", instruction.function),
        };

        self.state.set_register(instruction.rd, result);
    }

    fn execute_div_mult(&mut self, instruction: &Instruction) {
        let a = self.state.register(instruction.rs);
        let b = self.state.register(instruction.rt);

        match instruction.function {
            FUNCTION_MULT => {
                let product = i64::from(a as i32) * i64::from(b as i32);
                self.state.set_lo(product as u32);
                self.state.set_hi((product >> 32) as u32);
            }
            FUNCTION_MULTU => {
                let product = u64::from(a) * u64::from(b);
                self.state.set_lo(product as u32);
                self.state.set_hi((product >> 32) as u32);
            }
            // Division by zero leaves HI and LO untouched
            FUNCTION_DIV => {
                if b != 0 {
                    self.state.set_lo((a as i32).wrapping_div(b as i32) as u32);
                    self.state.set_hi((a as i32).wrapping_rem(b as i32) as u32);
                }
            }
            FUNCTION_DIVU => {
                if b != 0 {
                    self.state.set_lo(a / b);
                    self.state.set_hi(a % b);
                }
            }
            _ => unreachable!("function 0x{:02x} is not mult/div", instruction.function),
        }
    }

    fn execute_shift(&mut self, instruction: &Instruction) {
        let value = self.state.register(instruction.rt);
        let shamt = u32::from(instruction.shamt);

        let result = match instruction.function {
            FUNCTION_SLL => value << shamt,
            FUNCTION_SRL => value >> shamt,
            FUNCTION_SRA => ((value as i32) >> shamt) as u32,
            _ => unreachable!("function 0x{:02x} is not a shift", instruction.function),
        };

        self.state.set_register(instruction.rd, result);
    }

    fn execute_shift_reg(&mut self, instruction: &Instruction) {
        let value = self.state.register(instruction.rt);
        // Only the lower 5 bits of the shift register are used
        let shamt = self.state.register(instruction.rs) & 0x1F;

        let result = match instruction.function {
            FUNCTION_SLLV => value << shamt,
            FUNCTION_SRLV => value >> shamt,
            FUNCTION_SRAV => ((value as i32) >> shamt) as u32,
            _ => unreachable!("function 0x{:02x} is not a shift", instruction.function),
        };

        self.state.set_register(instruction.rd, result);
    }

    fn execute_jump_reg(&mut self, instruction: &Instruction) {
        let target = self.state.register(instruction.rs);

        if instruction.function == FUNCTION_JALR {
            let return_address = self.state.pc().wrapping_add(4);
            self.state.set_register(Register::RA, return_address);
        }

        self.state.set_pc(target);
    }

    fn execute_move_from(&mut self, instruction: &Instruction) {
        let value = match instruction.function {
            FUNCTION_MFHI => self.state.hi(),
            _ => self.state.lo(),
        };

        self.state.set_register(instruction.rd, value);
    }

    fn execute_move_to(&mut self, instruction: &Instruction) {
        let value = self.state.register(instruction.rs);

        match instruction.function {
            FUNCTION_MTHI => self.state.set_hi(value),
            _ => self.state.set_lo(value),
        }
    }

    fn execute_arith_logic_imm(&mut self, instruction: &Instruction) {
        let a = self.state.register(instruction.rs);
        let signed = i32::from(instruction.immediate as i16);
        let unsigned = u32::from(instruction.immediate);

        let result = match instruction.op_code {
            OP_ADDI | OP_ADDIU => a.wrapping_add(signed as u32),
            OP_SLTI => ((a as i32) < signed) as u32,
            OP_SLTIU => (a < signed as u32) as u32,
            OP_ANDI => a & unsigned,
            OP_ORI => a | unsigned,
            OP_XORI => a ^ unsigned,
            _ => unreachable!("op code 0x{:02x} is not immediate arithmetic", instruction.op_code),
        };

        self.state.set_register(instruction.rt, result);
    }

    fn execute_load_imm(&mut self, instruction: &Instruction) {
        let current = self.state.register(instruction.rt);
        let immediate = u32::from(instruction.immediate);

        // Load one half of the register, preserving the other
        let result = match instruction.op_code {
            OP_LLO => (current & 0xFFFF_0000) | immediate,
            _ => (current & 0x0000_FFFF) | (immediate << 16),
        };

        self.state.set_register(instruction.rt, result);
    }

    fn execute_branch(&mut self, instruction: &Instruction) {
        let a = self.state.register(instruction.rs);
        let b = self.state.register(instruction.rt);

        let taken = match instruction.op_code {
            OP_BEQ => a == b,
            _ => a != b,
        };

        self.branch(instruction, taken);
    }

    fn execute_branch_zero(&mut self, instruction: &Instruction) {
        let a = self.state.register(instruction.rs) as i32;

        let taken = match instruction.op_code {
            OP_BLEZ => a <= 0,
            _ => a > 0,
        };

        self.branch(instruction, taken);
    }

    /// Resolve a branch: the offset is relative to the instruction
    /// after the branch and counted in words.
    fn branch(&mut self, instruction: &Instruction, taken: bool) {
        let next = self.state.pc().wrapping_add(4);

        if taken {
            let offset = i32::from(instruction.immediate as i16) << 2;
            self.state.set_pc(next.wrapping_add(offset as u32));
        } else {
            self.state.set_pc(next);
        }
    }

    fn execute_load_store(&mut self, instruction: &Instruction) -> Result<(), ExecutionError> {
        let base = self.state.register(instruction.rs);
        let offset = i32::from(instruction.immediate as i16);
        let address = base.wrapping_add(offset as u32);

        match instruction.op_code {
            OP_LB => {
                let value = self.state.load_byte(address) as i8;
                self.state.set_register(instruction.rt, value as i32 as u32);
            }
            OP_LBU => {
                let value = self.state.load_byte(address);
                self.state.set_register(instruction.rt, u32::from(value));
            }
            OP_LH => {
                let value = self.state.load_half(address)? as i16;
                self.state.set_register(instruction.rt, value as i32 as u32);
            }
            OP_LHU => {
                let value = self.state.load_half(address)?;
                self.state.set_register(instruction.rt, u32::from(value));
            }
            OP_LW => {
                let value = self.state.load_word(address)?;
                self.state.set_register(instruction.rt, value);
            }
            OP_SB => {
                let value = self.state.register(instruction.rt);
                self.state.store_byte(address, value as u8);
            }
            OP_SH => {
                let value = self.state.register(instruction.rt);
                self.state.store_half(address, value as u16)?;
            }
            OP_SW => {
                let value = self.state.register(instruction.rt);
                self.state.store_word(address, value)?;
            }
            _ => unreachable!("op code 0x{:02x} is not a load/store", instruction.op_code),
        }

        Ok(())
    }

    fn execute_jump(&mut self, instruction: &Instruction) {
        if instruction.op_code == OP_JAL {
            let return_address = self.state.pc().wrapping_add(4);
            self.state.set_register(Register::RA, return_address);
        }

        self.state.set_pc(instruction.target << 2);
    }

    fn execute_trap(&mut self, instruction: &Instruction) -> Result<(), ExecutionError> {
        match instruction.immediate {
            TRAP_PRINT_INT => {
                let value = self.state.register(Register::A0);
                write!(self.output, "{}", value as i32)?;
                self.output.flush()?;
            }
            TRAP_PRINT_CHAR => {
                let value = self.state.register(Register::A0);
                self.output.write_all(&[value as u8])?;
                self.output.flush()?;
            }
            TRAP_PRINT_STRING => {
                let mut address = self.state.register(Register::A0);
                loop {
                    let byte = self.state.load_byte(address);
                    if byte == 0 {
                        break;
                    }
                    self.output.write_all(&[byte])?;
                    address = address.wrapping_add(1);
                }
                self.output.flush()?;
            }
            TRAP_READ_INT => {
                let value = self.read_int()?;
                self.state.set_register(Register::V0, value as u32);
            }
            TRAP_READ_CHAR => {
                let byte = self.read_byte()?.unwrap_or(0);
                self.state.set_register(Register::V0, u32::from(byte));
            }
            TRAP_EXIT => self.halted = true,
            code => debug!("ignoring unknown trap code {}", code),
        }

        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(byte) = self.pushback.take() {
            return Ok(Some(byte));
        }

        let mut buffer = [0; 1];
        match self.input.read_exact(&mut buffer) {
            Ok(()) => Ok(Some(buffer[0])),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read a signed decimal integer: skip leading whitespace, accept
    /// an optional sign, consume digits. The byte that ends the number
    /// is pushed back for the next read. No digits yields 0.
    fn read_int(&mut self) -> io::Result<i32> {
        let mut byte = loop {
            match self.read_byte()? {
                Some(b) if b.is_ascii_whitespace() => continue,
                Some(b) => break b,
                None => return Ok(0),
            }
        };

        let negative = if byte == b'-' || byte == b'+' {
            let negative = byte == b'-';
            byte = match self.read_byte()? {
                Some(b) => b,
                None => return Ok(0),
            };
            negative
        } else {
            false
        };

        let mut value: i64 = 0;
        let mut saw_digit = false;
        loop {
            if byte.is_ascii_digit() {
                saw_digit = true;
                value = value.saturating_mul(10).saturating_add(i64::from(byte - b'0'));
                byte = match self.read_byte()? {
                    Some(b) => b,
                    None => break,
                };
            } else {
                self.pushback = Some(byte);
                break;
            }
        }

        if !saw_digit {
            return Ok(0);
        }

        let value = if negative { -value } else { value };
        Ok(value.max(i64::from(i32::MIN)).min(i64::from(i32::MAX)) as i32)
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Processor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("state", &self.state)
            .field("halted", &self.halted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn processor_with_input(input: &str) -> Processor {
        Processor::with_io(
            Box::new(Cursor::new(input.as_bytes().to_vec())),
            Box::new(Vec::new()),
        )
    }

    #[test]
    fn read_int_parses_signed_decimals() {
        let mut processor = processor_with_input("  42 -17");
        assert_eq!(processor.read_int().unwrap(), 42);
        assert_eq!(processor.read_int().unwrap(), -17);
    }

    #[test]
    fn read_int_pushes_back_the_terminator() {
        let mut processor = processor_with_input("12x");
        assert_eq!(processor.read_int().unwrap(), 12);
        assert_eq!(processor.read_byte().unwrap(), Some(b'x'));
    }

    #[test]
    fn read_int_on_empty_input_is_zero() {
        let mut processor = processor_with_input("");
        assert_eq!(processor.read_int().unwrap(), 0);
        assert_eq!(processor.read_byte().unwrap(), None);
    }

    #[test]
    fn load_imm_preserves_the_other_half() {
        let mut processor = processor_with_input("");
        let rt = Register::from_name("$t0").unwrap();
        processor.state_mut().set_register(rt, 0xAAAA_BBBB);

        let llo = Instruction::i_type(mips_types::op_spec("llo").unwrap(), Register::ZERO, rt, 0x1234);
        processor.execute(&llo).unwrap();
        assert_eq!(processor.state().register(rt), 0xAAAA_1234);

        let lhi = Instruction::i_type(mips_types::op_spec("lhi").unwrap(), Register::ZERO, rt, 0x5678);
        processor.execute(&lhi).unwrap();
        assert_eq!(processor.state().register(rt), 0x5678_1234);
    }

    #[test]
    fn division_by_zero_is_elided() {
        let mut processor = processor_with_input("");
        let rs = Register::from_name("$t0").unwrap();
        let rt = Register::from_name("$t1").unwrap();
        processor.state_mut().set_register(rs, 10);
        processor.state_mut().set_hi(0x1111);
        processor.state_mut().set_lo(0x2222);

        let div = Instruction::r_type(
            mips_types::op_spec("div").unwrap(),
            rs,
            rt,
            Register::ZERO,
            0,
        );
        processor.execute(&div).unwrap();

        assert_eq!(processor.state().hi(), 0x1111);
        assert_eq!(processor.state().lo(), 0x2222);
    }
}
