mod debugger;

pub use debugger::*;
