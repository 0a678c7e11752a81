//! Binary encode/decode primitives for win-rate checkpoints.
//!
//! All integers and floats are little-endian. There is no compression and
//! no alignment padding.

use std::io::{Read, Write};

use crate::error::StatsError;
use crate::{FORMAT_VERSION, MAGIC};

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), StatsError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), StatsError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian f64.
pub fn write_f64_le(w: &mut dyn Write, v: f64) -> Result<(), StatsError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, StatsError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, StatsError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian f64.
pub fn read_f64_le(r: &mut dyn Read) -> Result<f64, StatsError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

// ── Header ──────────────────────────────────────────────────────

/// Write the checkpoint magic and format version.
pub fn write_header(w: &mut dyn Write) -> Result<(), StatsError> {
    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)
}

/// Read and validate the checkpoint magic and format version.
pub fn read_header(r: &mut dyn Read) -> Result<(), StatsError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(StatsError::InvalidMagic);
    }
    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(StatsError::UnsupportedVersion { found: version });
    }
    Ok(())
}

// ── Estimate vectors ────────────────────────────────────────────

/// Write a length-prefixed vector of f64 values.
pub fn write_f64_vec(w: &mut dyn Write, values: &[f64]) -> Result<(), StatsError> {
    write_u32_le(w, values.len() as u32)?;
    for &v in values {
        write_f64_le(w, v)?;
    }
    Ok(())
}

/// Read a length-prefixed vector of f64 values.
///
/// The declared length must equal `expected_len`; the check happens before
/// any values are read so a corrupt prefix cannot trigger a huge allocation.
pub fn read_f64_vec(r: &mut dyn Read, expected_len: usize) -> Result<Vec<f64>, StatsError> {
    let len = read_u32_le(r)? as usize;
    if len != expected_len {
        return Err(StatsError::LengthMismatch {
            expected: expected_len,
            found: len,
        });
    }
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        values.push(read_f64_le(r)?);
    }
    Ok(values)
}
