use mips_debugger::{Debugger, LoadError};
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process;
use structopt::StructOpt;

/// Debug a MIPS assembly program interactively
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

    let mut debugger = match Debugger::load_program(&source) {
        Ok(debugger) => debugger,
        Err(LoadError::Assembly { errors }) => {
            for error in &errors {
                eprintln!("Error: {}", error);
            }
            process::exit(1);
        }
        Err(error) => {
            eprintln!("Error: {}", error);
            process::exit(1);
        }
    };

    debugger.run()?;

    Ok(())
}
