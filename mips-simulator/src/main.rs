use log::info;
use mips_simulator::Processor;
use mips_types::ObjectImage;
use std::error::Error;
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use structopt::StructOpt;

/// Run an assembled MIPS binary until it halts
#[derive(StructOpt)]
struct CliArgs {
    /// Binary produced by the assembler
    #[structopt(parse(from_os_str))]
    file_path: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = CliArgs::from_args();

    let file_data = fs::read(&args.file_path)?;
    let image = ObjectImage::parse(&mut Cursor::new(file_data))?;
    info!(
        "Loaded image: {} bytes, entry 0x{:08x}",
        image.data.len(),
        image.entry
    );

    let mut processor = Processor::new();
    processor.load_program(&image.data, image.entry)?;
    processor.run()?;

    Ok(())
}
