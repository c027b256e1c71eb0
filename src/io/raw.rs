//! Flat arrays of `f32`, stored as headerless little-endian binary

use std::fs::File;
use std::io::{BufWriter, Error, ErrorKind, Write};
use std::path::Path;

pub fn write(data: impl Iterator<Item = f32>, path: &Path) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for datum in data {
        out.write_all(&datum.to_le_bytes())?;
    }
    out.flush()
}

/// Read the whole file. A size which is not a multiple of 4 bytes means the
/// file was truncated or is not raw `f32` data.
pub fn read(path: &Path) -> std::io::Result<Vec<f32>> {
    let bytes = std::fs::read(path)?;
    let chunks = bytes.chunks_exact(4);
    if !chunks.remainder().is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("{path:?}: {} bytes is not a whole number of f32s", bytes.len()),
        ));
    }
    Ok(chunks
       .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
       .collect())
}
