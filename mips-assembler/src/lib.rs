mod assembler;
mod lexer;
mod parser;

pub use {assembler::*, lexer::*, parser::*};
