use either::Either;
use log::info;
use mips_assembler::Assembler;
use mips_types::ObjectImage;
use std::error::Error;
use std::fs;
use std::fs::File;
use std::io;
use std::io::Read;
use std::path::PathBuf;
use std::process;
use structopt::StructOpt;

/// Assemble MIPS source into a binary image
#[derive(StructOpt)]
struct CliArgs {
    /// Input assembly file; stdin when omitted
    #[structopt(parse(from_os_str))]
    input: Option<PathBuf>,

    /// Output binary file; stdout when omitted
    #[structopt(parse(from_os_str))]
    output: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = CliArgs::from_args();

    let source = match &args.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };

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

    let image = ObjectImage {
        entry: assembler.entry_address(),
        data,
    };

    let mut output = match &args.output {
        Some(path) => Either::Left(File::create(path)?),
        None => Either::Right(io::stdout()),
    };
    image.write(&mut output)?;
    info!("Wrote {} image bytes", image.data.len());

    Ok(())
}
