//! The interactive debugger: a load-program facade over the
//! assembler and the processor, plus the REPL command dispatcher.

use log::info;
use mips_assembler::{Assembler, AssemblyError};
use mips_simulator::{MachineState, OutOfBounds, Processor};
use mips_types::{BadRegister, Instruction, Register};
use std::collections::{HashMap, HashSet};
use std::io;
use std::io::{BufRead, Write};
use thiserror::Error;

/// A REPL line that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bad command `{0}`")]
pub struct BadCommand(pub String);

/// One parsed debugger command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Step,
    Reg(String),
    Mem8(u32),
    Mem16(u32),
    Mem32(u32),
    Break(String),
    Continue,
    Help,
    Quit,
}

/// Parse one REPL line; the command word is case-insensitive
pub fn parse_command(input: &str) -> Result<Command, BadCommand> {
    let trimmed = input.trim();
    let mut parts = trimmed.split_whitespace();
    let command = parts.next().unwrap_or("").to_lowercase();
    let argument = parts.next();

    if parts.next().is_some() {
        return Err(BadCommand(trimmed.to_string()));
    }

    match (command.as_str(), argument) {
        ("step", None) | ("s", None) => Ok(Command::Step),
        ("reg", Some(name)) | ("r", Some(name)) => Ok(Command::Reg(name.to_string())),
        ("mem8", Some(address)) => Ok(Command::Mem8(parse_address(address)?)),
        ("mem16", Some(address)) => Ok(Command::Mem16(parse_address(address)?)),
        ("mem32", Some(address)) => Ok(Command::Mem32(parse_address(address)?)),
        ("break", Some(target)) | ("b", Some(target)) => Ok(Command::Break(target.to_string())),
        ("continue", None) | ("c", None) => Ok(Command::Continue),
        ("help", None) | ("h", None) => Ok(Command::Help),
        ("quit", None) | ("q", None) => Ok(Command::Quit),
        _ => Err(BadCommand(trimmed.to_string())),
    }
}

/// Parse a hex (`0x`-prefixed) or decimal address
fn parse_address(text: &str) -> Result<u32, BadCommand> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };

    parsed.map_err(|_| BadCommand(text.to_string()))
}

/// Why a program could not be loaded into the debugger
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("assembly failed with {} error(s)", .errors.len())]
    Assembly { errors: Vec<AssemblyError> },
    #[error(transparent)]
    BadRegister(#[from] BadRegister),
    #[error("program has no `main` entry point")]
    NoEntry,
    #[error(transparent)]
    OutOfBounds(#[from] OutOfBounds),
}

/// A by-value copy of the register state, taken before each step so
/// the post-step state can be compared against it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Snapshot {
    registers: [u32; 32],
    pc: u32,
    hi: u32,
    lo: u32,
}

impl Snapshot {
    fn capture(state: &MachineState) -> Self {
        let mut registers = [0; 32];
        for register in Register::all() {
            registers[register.index() as usize] = state.register(register);
        }

        Snapshot {
            registers,
            pc: state.pc(),
            hi: state.hi(),
            lo: state.lo(),
        }
    }
}

/// One observed difference between a snapshot and the current state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub location: &'static str,
    pub old: u32,
    pub new: u32,
}

fn diff(snapshot: &Snapshot, state: &MachineState) -> Vec<StateChange> {
    let mut changes = Vec::new();

    for register in Register::all() {
        let old = snapshot.registers[register.index() as usize];
        let new = state.register(register);
        if old != new {
            changes.push(StateChange {
                location: register.name(),
                old,
                new,
            });
        }
    }

    if snapshot.pc != state.pc() {
        changes.push(StateChange {
            location: "PC",
            old: snapshot.pc,
            new: state.pc(),
        });
    }
    if snapshot.hi != state.hi() {
        changes.push(StateChange {
            location: "HI",
            old: snapshot.hi,
            new: state.hi(),
        });
    }
    if snapshot.lo != state.lo() {
        changes.push(StateChange {
            location: "LO",
            old: snapshot.lo,
            new: state.lo(),
        });
    }

    changes
}

pub struct Debugger {
    processor: Processor,
    /// Address of each lowered line mapped to its textual form
    source_map: HashMap<u32, String>,
    labels: HashMap<String, u32>,
    breakpoints: HashSet<u32>,
    snapshot: Snapshot,
}

impl Debugger {
    /// Assemble a program and prepare it for debugging
    pub fn load_program(source: &str) -> Result<Self, LoadError> {
        Self::load_program_with(source, Processor::new())
    }

    /// Load with a caller-supplied processor (tests substitute
    /// in-memory I/O streams)
    pub fn load_program_with(source: &str, mut processor: Processor) -> Result<Self, LoadError> {
        let mut assembler = Assembler::new();
        let lines = assembler.parse(source);
        let binary = assembler.assemble(&lines)?;

        if assembler.has_errors() {
            return Err(LoadError::Assembly {
                errors: assembler.errors().to_vec(),
            });
        }

        let entry = assembler.entry().ok_or(LoadError::NoEntry)?;
        processor.load_program(&binary, entry)?;

        let source_map = lines
            .iter()
            .map(|line| (line.address, line.statement.to_string()))
            .collect();
        let labels = assembler.labels().clone();
        let snapshot = Snapshot::capture(processor.state());

        info!("Program loaded, entry point 0x{:08X}", entry);

        Ok(Debugger {
            processor,
            source_map,
            labels,
            breakpoints: HashSet::new(),
            snapshot,
        })
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    pub fn breakpoints(&self) -> &HashSet<u32> {
        &self.breakpoints
    }

    /// Run the REPL until quit, halt, or end of input
    pub fn run(&mut self) -> io::Result<()> {
        println!("MIPS debugger - type 'help' for commands");
        self.print_current_instruction();

        let stdin = io::stdin();
        let mut input = String::new();

        loop {
            print!("> ");
            io::stdout().flush()?;

            input.clear();
            if stdin.lock().read_line(&mut input)? == 0 {
                break;
            }
            if input.trim().is_empty() {
                continue;
            }

            match parse_command(&input) {
                Ok(Command::Quit) => break,
                Ok(command) => self.run_command(&command),
                Err(error) => println!("{}. Type 'help' for available commands.", error),
            }

            if self.processor.is_halted() {
                println!("Program halted.");
                break;
            }
        }

        Ok(())
    }

    /// Execute one parsed command
    pub fn run_command(&mut self, command: &Command) {
        match command {
            Command::Step => self.handle_step(),
            Command::Reg(name) => self.handle_reg(name),
            Command::Mem8(address) => self.handle_mem8(*address),
            Command::Mem16(address) => self.handle_mem16(*address),
            Command::Mem32(address) => self.handle_mem32(*address),
            Command::Break(target) => self.handle_break(target),
            Command::Continue => self.handle_continue(),
            Command::Help => Self::print_help(),
            Command::Quit => {}
        }
    }

    fn handle_step(&mut self) {
        if self.processor.is_halted() {
            println!("Program has halted.");
            return;
        }

        self.snapshot = Snapshot::capture(self.processor.state());
        if let Err(error) = self.processor.step() {
            println!("Execution error: {}", error);
            return;
        }

        self.report_changes();
        if !self.processor.is_halted() {
            self.print_current_instruction();
        }
    }

    fn handle_continue(&mut self) {
        if self.processor.is_halted() {
            println!("Program has halted.");
            return;
        }

        println!("Continuing execution...");

        while !self.processor.is_halted() {
            self.snapshot = Snapshot::capture(self.processor.state());
            if let Err(error) = self.processor.step() {
                println!("Execution error: {}", error);
                return;
            }

            let pc = self.processor.state().pc();
            if !self.processor.is_halted() && self.breakpoints.contains(&pc) {
                println!("Breakpoint hit at 0x{:08X}", pc);
                self.report_changes();
                self.print_current_instruction();
                return;
            }
        }
    }

    fn handle_reg(&self, name: &str) {
        match Register::from_name(name) {
            Ok(register) => {
                let value = self.processor.state().register(register);
                println!("{} = 0x{:08X} ({})", register.name(), value, value as i32);
            }
            Err(error) => println!("{}", error),
        }
    }

    fn handle_mem8(&self, address: u32) {
        let value = self.processor.state().load_byte(address);
        println!("mem8[0x{:08X}] = 0x{:02X} ({})", address, value, value);
    }

    fn handle_mem16(&self, address: u32) {
        match self.processor.state().load_half(address) {
            Ok(value) => {
                println!("mem16[0x{:08X}] = 0x{:04X} ({})", address, value, value as i16)
            }
            Err(error) => println!("Memory access error: {}", error),
        }
    }

    fn handle_mem32(&self, address: u32) {
        match self.processor.state().load_word(address) {
            Ok(value) => {
                println!("mem32[0x{:08X}] = 0x{:08X} ({})", address, value, value as i32)
            }
            Err(error) => println!("Memory access error: {}", error),
        }
    }

    fn handle_break(&mut self, target: &str) {
        let address = match self.labels.get(target) {
            Some(&address) => address,
            None => match parse_address(target) {
                Ok(address) => address,
                Err(_) => {
                    println!("Invalid label or address: {}", target);
                    return;
                }
            },
        };

        if self.breakpoints.insert(address) {
            println!("Breakpoint set at 0x{:08X}", address);
        } else {
            println!("Breakpoint already exists at 0x{:08X}", address);
        }
    }

    fn report_changes(&self) {
        let changes = diff(&self.snapshot, self.processor.state());

        if changes.is_empty() {
            println!("No state changes.");
            return;
        }

        println!("State changes:");
        for change in &changes {
            println!(
                "  {}: 0x{:08X} -> 0x{:08X}",
                change.location, change.old, change.new
            );
        }
    }

    fn print_current_instruction(&self) {
        let pc = self.processor.state().pc();
        println!("0x{:08X}: {}", pc, self.instruction_at(pc));
    }

    /// The source text of the line at this address, or a disassembly
    /// of the word in memory when the address is outside the program.
    fn instruction_at(&self, address: u32) -> String {
        if let Some(text) = self.source_map.get(&address) {
            return text.clone();
        }

        match self.processor.state().load_word(address) {
            Ok(0) => "nop".to_string(),
            Ok(word) => match Instruction::decode(word) {
                Ok(instruction) => instruction.to_string(),
                Err(_) => format!("unknown instruction (0x{:08X})", word),
            },
            Err(_) => "invalid memory access".to_string(),
        }
    }

    fn print_help() {
        println!("Available commands:");
        println!("  step (s)                - Execute the current instruction");
        println!("  reg <register> (r)      - Show a register's value");
        println!("  mem8 <address>          - Show the byte at an address");
        println!("  mem16 <address>         - Show the half word at an address");
        println!("  mem32 <address>         - Show the word at an address");
        println!("  break <label|addr> (b)  - Set a breakpoint");
        println!("  continue (c)            - Run until a breakpoint or halt");
        println!("  help (h)                - Show this help message");
        println!("  quit (q)                - Exit the debugger");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn load(source: &str) -> Debugger {
        let processor = Processor::with_io(Box::new(Cursor::new(Vec::new())), Box::new(Vec::new()));
        Debugger::load_program_with(source, processor).unwrap()
    }

    const PROGRAM: &str = "\
main:
    addi $t0, $zero, 42
    addi $t1, $zero, 10
target:
    add $t2, $t0, $t1
    trap 5
";

    #[test]
    fn commands_parse_with_aliases() {
        assert_eq!(parse_command("step"), Ok(Command::Step));
        assert_eq!(parse_command("s"), Ok(Command::Step));
        assert_eq!(parse_command("reg $t0"), Ok(Command::Reg("$t0".to_string())));
        assert_eq!(parse_command("r $ra"), Ok(Command::Reg("$ra".to_string())));
        assert_eq!(parse_command("mem8 0x1000"), Ok(Command::Mem8(0x1000)));
        assert_eq!(parse_command("mem16 256"), Ok(Command::Mem16(256)));
        assert_eq!(parse_command("mem32 0XFF"), Ok(Command::Mem32(0xFF)));
        assert_eq!(parse_command("break main"), Ok(Command::Break("main".to_string())));
        assert_eq!(parse_command("b 0x8"), Ok(Command::Break("0x8".to_string())));
        assert_eq!(parse_command("continue"), Ok(Command::Continue));
        assert_eq!(parse_command("c"), Ok(Command::Continue));
        assert_eq!(parse_command("HELP"), Ok(Command::Help));
        assert_eq!(parse_command("q"), Ok(Command::Quit));
    }

    #[test]
    fn bad_commands_are_rejected() {
        assert!(parse_command("bogus").is_err());
        assert!(parse_command("step now").is_err());
        assert!(parse_command("mem8 xyz").is_err());
        assert!(parse_command("reg").is_err());
    }

    #[test]
    fn load_sets_entry_state() {
        let debugger = load(PROGRAM);
        let state = debugger.processor().state();
        assert_eq!(state.pc(), 0);
        assert_eq!(state.register(Register::SP), 0xFFFF_FFFC);
    }

    #[test]
    fn missing_main_is_rejected() {
        let processor = Processor::with_io(Box::new(Cursor::new(Vec::new())), Box::new(Vec::new()));
        let result = Debugger::load_program_with("start:\n    trap 5\n", processor);
        assert!(matches!(result, Err(LoadError::NoEntry)));
    }

    #[test]
    fn step_reports_deltas_against_the_snapshot() {
        let mut debugger = load(PROGRAM);

        debugger.run_command(&Command::Step);
        let changes = diff(&debugger.snapshot, debugger.processor.state());
        let t0 = Register::from_name("$t0").unwrap();

        assert_eq!(debugger.processor.state().register(t0), 42);
        assert!(changes.iter().any(|c| c.location == "$t0" && c.new == 42));
        assert!(changes.iter().any(|c| c.location == "PC" && c.new == 4));
    }

    #[test]
    fn nop_step_reports_no_changes_but_pc() {
        let mut debugger = load("main:\n    trap 5\n");
        // Point the PC at untouched memory, which reads as a no-op
        debugger.processor.state_mut().set_pc(0x100);

        debugger.run_command(&Command::Step);
        let changes = diff(&debugger.snapshot, debugger.processor.state());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].location, "PC");
    }

    #[test]
    fn breakpoints_are_a_set() {
        let mut debugger = load(PROGRAM);

        debugger.run_command(&Command::Break("target".to_string()));
        assert!(debugger.breakpoints().contains(&8));

        // Adding the same address again does not grow the set
        debugger.run_command(&Command::Break("0x8".to_string()));
        assert_eq!(debugger.breakpoints().len(), 1);

        debugger.run_command(&Command::Break("16".to_string()));
        assert_eq!(debugger.breakpoints().len(), 2);
    }

    #[test]
    fn continue_stops_at_a_breakpoint() {
        let mut debugger = load(PROGRAM);
        debugger.run_command(&Command::Break("target".to_string()));

        debugger.run_command(&Command::Continue);
        assert_eq!(debugger.processor.state().pc(), 8);
        assert!(!debugger.processor.is_halted());

        // Continuing again runs to the halt
        debugger.run_command(&Command::Continue);
        assert!(debugger.processor.is_halted());
    }

    #[test]
    fn continue_without_breakpoints_runs_to_halt() {
        let mut debugger = load(PROGRAM);
        debugger.run_command(&Command::Continue);

        let t2 = Register::from_name("$t2").unwrap();
        assert!(debugger.processor.is_halted());
        assert_eq!(debugger.processor.state().register(t2), 52);
    }

    #[test]
    fn source_map_covers_program_lines() {
        let debugger = load(PROGRAM);
        assert_eq!(debugger.instruction_at(0), "addi $t0, $zero, 42");
        assert_eq!(debugger.instruction_at(8), "add $t2, $t0, $t1");
        // Outside the program, untouched memory disassembles as a no-op
        assert_eq!(debugger.instruction_at(0x100), "nop");
    }
}
