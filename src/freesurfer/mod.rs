//! FreeSurfer file formats used by the stage.
//!
//! - [`mgh`]: surface-sampled fMRI timeseries (`.mgh` / `.mgz`).
//! - [`annot`]: native-surface parcellations with an embedded colour table.
//!
//! Both formats are big-endian. Files are read whole into memory and walked
//! with a bounds-checked [`ByteReader`]; a truncated file is a
//! [`FcError::Format`] naming the file, never a panic.
//!
//! # Quick start
//! ```no_run
//! use surfconn::freesurfer::{read_annot, read_surface_timeseries};
//! use std::path::Path;
//!
//! let ts = read_surface_timeseries(Path::new("sub-01_func_space-fsnative_lh_10mm.mgh")).unwrap();
//! println!("{} timepoints × {} vertices", ts.nrows(), ts.ncols());
//!
//! let annot = read_annot(Path::new("lh.schaefer-400_mics.annot")).unwrap();
//! println!("{} colour-table entries", annot.ctab.len());
//! ```
pub mod annot;
pub mod mgh;

pub use annot::{read_annot, Annot, ColorTable, ColorTableEntry, LabelLookup};
pub use mgh::{read_mgh, read_surface_timeseries, write_surface_timeseries, Mgh, MghDtype, MghHeader};

use std::path::{Path, PathBuf};

use crate::error::{FcError, Result};

// ── Big-endian cursor ─────────────────────────────────────────────────────

/// Sequential big-endian reader over an in-memory file.
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    path: PathBuf,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(bytes: &'a [u8], path: &Path) -> Self {
        Self { bytes, pos: 0, path: path.to_path_buf() }
    }

    #[inline]
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    pub(crate) fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.bytes.len() {
            return Err(self.truncated(pos - self.bytes.len()));
        }
        self.pos = pos;
        Ok(())
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(self.truncated(n));
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    pub(crate) fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub(crate) fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.take_array()?))
    }

    /// Length-prefixed string; trailing NULs are dropped.
    pub(crate) fn string(&mut self, len: usize) -> Result<String> {
        let raw = self.take(len)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// A count field; negative counts are a format error.
    pub(crate) fn count(&mut self, what: &str) -> Result<usize> {
        let n = self.i32()?;
        usize::try_from(n).map_err(|_| self.invalid(format!("negative {what}: {n}")))
    }

    pub(crate) fn invalid(&self, msg: String) -> FcError {
        FcError::Format { path: self.path.clone(), msg }
    }

    fn truncated(&self, wanted: usize) -> FcError {
        self.invalid(format!(
            "unexpected end of file at byte {} (wanted {wanted} more)",
            self.pos
        ))
    }
}

/// Read a file, transparently gunzipping it when it starts with the gzip magic.
pub(crate) fn read_maybe_gz(path: &Path) -> Result<Vec<u8>> {
    use std::io::Read;

    let raw = std::fs::read(path)?;
    if raw.len() >= 2 && raw[0] == 0x1f && raw[1] == 0x8b {
        let mut out = Vec::new();
        flate2::read::GzDecoder::new(raw.as_slice()).read_to_end(&mut out)?;
        Ok(out)
    } else {
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_scalars() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&42_i32.to_be_bytes());
        buf.extend_from_slice(&(-3_i16).to_be_bytes());
        buf.extend_from_slice(&1.5_f32.to_be_bytes());
        let mut r = ByteReader::new(&buf, Path::new("mem"));
        assert_eq!(r.i32().unwrap(), 42);
        assert_eq!(r.i16().unwrap(), -3);
        approx::assert_abs_diff_eq!(r.f32().unwrap(), 1.5_f32);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn truncation_is_an_error() {
        let buf = [0u8, 1];
        let mut r = ByteReader::new(&buf, Path::new("short.mgh"));
        let err = r.i32().unwrap_err();
        assert!(matches!(err, FcError::Format { .. }));
    }

    #[test]
    fn strings_stop_at_nul() {
        let buf = b"ctx-lh-bankssts\0\0";
        let mut r = ByteReader::new(buf, Path::new("mem"));
        assert_eq!(r.string(buf.len()).unwrap(), "ctx-lh-bankssts");
    }
}
