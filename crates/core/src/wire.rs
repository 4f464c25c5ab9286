//! Low-level big-endian field helpers shared by the manifest codec and the
//! wire protocol.

use std::io::{self, Read, Write};

use crate::error::{Error, Result};

pub(crate) fn read_u16<R: Read>(r: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

pub(crate) fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

pub(crate) fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

/// Sizes travel as IEEE-754 doubles for format compatibility; integer values
/// below 2^53 round-trip exactly.
pub(crate) fn read_size<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_be_bytes(buf) as u64)
}

pub(crate) fn write_size<W: Write>(w: &mut W, size: u64) -> io::Result<()> {
    w.write_all(&(size as f64).to_be_bytes())
}

pub(crate) fn read_vec<R: Read>(r: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Length-prefixed UTF-8 path: `len: u16` followed by the bytes.
pub(crate) fn read_path<R: Read>(r: &mut R) -> Result<String> {
    let len = read_u16(r)?;
    let raw = read_vec(r, usize::from(len))?;
    String::from_utf8(raw).map_err(|_| Error::Protocol("path is not valid UTF-8".into()))
}

pub(crate) fn write_path<W: Write>(w: &mut W, path: &str) -> Result<()> {
    let len = u16::try_from(path.len())
        .map_err(|_| Error::Protocol(format!("path too long ({} bytes)", path.len())))?;
    w.write_all(&len.to_be_bytes())?;
    w.write_all(path.as_bytes())?;
    Ok(())
}
