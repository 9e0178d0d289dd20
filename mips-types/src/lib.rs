pub mod constants;
mod instruction;
mod object;
mod register;

pub use {instruction::*, object::*, register::*};
