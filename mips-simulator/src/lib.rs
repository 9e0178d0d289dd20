mod machine;
mod memory;
mod processor;
mod registers;

pub use {machine::*, memory::*, processor::*, registers::*};
