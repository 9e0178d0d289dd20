use log::info;
use mips_assembler::Assembler;
use mips_simulator::Processor;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process;
use structopt::StructOpt;

/// Assemble and run a MIPS program in one shot
#[derive(StructOpt)]
struct CliArgs {
    /// Assembly source file
    #[structopt(parse(from_os_str))]
    file_path: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = CliArgs::from_args();

    let source = fs::read_to_string(&args.file_path)?;

    let mut assembler = Assembler::new();
    let data = match assembler.assemble_text(&source) {
        Ok(data) => data,
        Err(error) => {
            eprintln!("Error: {}", error);
            process::exit(1);
        }
    };

    if assembler.has_errors() {
        for error in assembler.errors() {
            eprintln!("Error: {}", error);
        }
        process::exit(1);
    }

    let entry = match assembler.entry() {
        Some(entry) => entry,
        None => {
            eprintln!("Error: no `main` label in program");
            process::exit(1);
        }
    };

    info!("Starting execution at 0x{:08x}", entry);

    let mut processor = Processor::new();
    processor.load_program(&data, entry)?;
    processor.run()?;

    Ok(())
}
