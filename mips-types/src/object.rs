use std::io;
use std::io::{Read, Write};

/// An assembled program image with its entry point.
///
/// The on-disk layout is little-endian throughout: a `u32` entry
/// address, a `u32` image size, then the raw instruction and data
/// bytes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ObjectImage {
    /// Address of the `main` label, or 0 if the program has none
    pub entry: u32,
    pub data: Vec<u8>,
}

impl ObjectImage {
    /// Parse the input as an object image
    pub fn parse<R: Read>(input: &mut R) -> io::Result<Self> {
        let entry = read_u32(input)?;
        let size = read_u32(input)?;

        let mut data = vec![0; size as usize];
        input.read_exact(&mut data)?;

        Ok(Self { entry, data })
    }

    /// Write the image
    pub fn write<W: Write>(&self, output: &mut W) -> io::Result<()> {
        output.write_all(&self.entry.to_le_bytes())?;
        output.write_all(&(self.data.len() as u32).to_le_bytes())?;
        output.write_all(&self.data)?;

        Ok(())
    }
}

fn read_u32<R: Read>(input: &mut R) -> io::Result<u32> {
    let mut bytes = [0; 4];
    input.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}
