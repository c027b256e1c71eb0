//! Sparse system matrices on disk: a flat sequence of little-endian
//! `(bin: u32, voxel: u32, weight: f32)` records

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use binrw::{binrw, BinRead, BinWrite, BinResult};

#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatrixElement {
    pub bin: u32,
    pub voxel: u32,
    pub weight: f32,
}

pub fn read(path: &Path) -> BinResult<Vec<MatrixElement>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut elements = vec![];
    loop {
        match MatrixElement::read(&mut reader) {
            Ok(element) => elements.push(element),
            Err(e) if e.is_eof() => break,
            Err(e) => return Err(e),
        }
    }
    Ok(elements)
}

pub fn write(elements: &[MatrixElement], path: &Path) -> BinResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for element in elements {
        element.write(&mut writer)?;
    }
    writer.flush()?;
    Ok(())
}
