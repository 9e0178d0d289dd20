// Operation codes
pub const OP_R_TYPE: u8 = 0b000000;
pub const OP_J: u8 = 0b000010;
pub const OP_JAL: u8 = 0b000011;
pub const OP_BEQ: u8 = 0b000100;
pub const OP_BNE: u8 = 0b000101;
pub const OP_BLEZ: u8 = 0b000110;
pub const OP_BGTZ: u8 = 0b000111;
pub const OP_ADDI: u8 = 0b001000;
pub const OP_ADDIU: u8 = 0b001001;
pub const OP_SLTI: u8 = 0b001010;
pub const OP_SLTIU: u8 = 0b001011;
pub const OP_ANDI: u8 = 0b001100;
pub const OP_ORI: u8 = 0b001101;
pub const OP_XORI: u8 = 0b001110;
pub const OP_LLO: u8 = 0b011000;
pub const OP_LHI: u8 = 0b011001;
pub const OP_TRAP: u8 = 0b011010;
pub const OP_LB: u8 = 0b100000;
pub const OP_LH: u8 = 0b100001;
pub const OP_LW: u8 = 0b100011;
pub const OP_LBU: u8 = 0b100100;
pub const OP_LHU: u8 = 0b100101;
pub const OP_SB: u8 = 0b101000;
pub const OP_SH: u8 = 0b101001;
pub const OP_SW: u8 = 0b101011;

// R-type function codes
pub const FUNCTION_SLL: u8 = 0b000000;
pub const FUNCTION_SRL: u8 = 0b000010;
pub const FUNCTION_SRA: u8 = 0b000011;
pub const FUNCTION_SLLV: u8 = 0b000100;
pub const FUNCTION_SRLV: u8 = 0b000110;
pub const FUNCTION_SRAV: u8 = 0b000111;
pub const FUNCTION_JR: u8 = 0b001000;
pub const FUNCTION_JALR: u8 = 0b001001;
pub const FUNCTION_MFHI: u8 = 0b010000;
pub const FUNCTION_MTHI: u8 = 0b010001;
pub const FUNCTION_MFLO: u8 = 0b010010;
pub const FUNCTION_MTLO: u8 = 0b010011;
pub const FUNCTION_MULT: u8 = 0b011000;
pub const FUNCTION_MULTU: u8 = 0b011001;
pub const FUNCTION_DIV: u8 = 0b011010;
pub const FUNCTION_DIVU: u8 = 0b011011;
pub const FUNCTION_ADD: u8 = 0b100000;
pub const FUNCTION_ADDU: u8 = 0b100001;
pub const FUNCTION_SUB: u8 = 0b100010;
pub const FUNCTION_SUBU: u8 = 0b100011;
pub const FUNCTION_AND: u8 = 0b100100;
pub const FUNCTION_OR: u8 = 0b100101;
pub const FUNCTION_XOR: u8 = 0b100110;
pub const FUNCTION_NOR: u8 = 0b100111;
pub const FUNCTION_SLT: u8 = 0b101010;
pub const FUNCTION_SLTU: u8 = 0b101011;

pub static REGISTER_NAMES: [&str; 32] = [
    "$zero", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3", "$t0", "$t1", "$t2", "$t3",
    "$t4", "$t5", "$t6", "$t7", "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7",
    "$t8", "$t9", "$k0", "$k1", "$gp", "$sp", "$fp", "$ra",
];

// Trap codes
pub const TRAP_PRINT_INT: u16 = 0;
pub const TRAP_PRINT_CHAR: u16 = 1;
pub const TRAP_PRINT_STRING: u16 = 2;
pub const TRAP_READ_INT: u16 = 3;
pub const TRAP_READ_CHAR: u16 = 4;
pub const TRAP_EXIT: u16 = 5;

/// The conventional initial stack pointer
pub const STACK_START: u32 = 0xFFFF_FFFC;
