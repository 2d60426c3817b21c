//! MGH / MGZ reader for surface-sampled timeseries.
//!
//! On-disk layout (big-endian):
//!
//! ```text
//!   0  version      i32   (always 1)
//!   4  width        i32   ┐
//!   8  height       i32   │ spatial dims; on a surface their product is
//!  12  depth        i32   ┘ the vertex count
//!  16  nframes      i32   timepoints
//!  20  type         i32   0 uchar · 1 int · 3 float · 4 short
//!  24  dof          i32
//!  28  goodRASflag  i16   if 1, 15 × f32 of geometry follow
//! 284  data               column-major: width fastest, nframes slowest
//! ```
//!
//! Because frames are the slowest axis, the data block read in order is
//! already a row-major `[T, V]` matrix.
use ndarray::{Array2, ArrayView2};
use std::io::Write;
use std::path::Path;

use super::{read_maybe_gz, ByteReader};
use crate::error::{FcError, Result};

pub const MGH_VERSION: i32 = 1;

/// Byte offset of the first voxel.
pub const MGH_DATA_START: usize = 284;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MghDtype {
    Uchar,
    Int,
    Float,
    Short,
}

impl MghDtype {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Uchar),
            1 => Some(Self::Int),
            3 => Some(Self::Float),
            4 => Some(Self::Short),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Uchar => 0,
            Self::Int => 1,
            Self::Float => 3,
            Self::Short => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MghHeader {
    /// `[width, height, depth, nframes]`.
    pub dims: [usize; 4],
    pub dtype: MghDtype,
    pub dof: i32,
    pub ras_good: bool,
}

impl MghHeader {
    /// Spatial element count (vertices, for surface data).
    pub fn n_spatial(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    pub fn n_frames(&self) -> usize {
        self.dims[3]
    }

    fn parse(r: &mut ByteReader<'_>) -> Result<Self> {
        let version = r.i32()?;
        if version != MGH_VERSION {
            return Err(r.invalid(format!("unsupported MGH version {version}")));
        }
        let mut dims = [0usize; 4];
        for (i, d) in dims.iter_mut().enumerate() {
            *d = r.count(&format!("dimension {i}"))?;
        }
        let code = r.i32()?;
        let dtype = MghDtype::from_code(code)
            .ok_or_else(|| r.invalid(format!("unsupported MGH data type {code}")))?;
        let dof = r.i32()?;
        let ras_good = r.i16()? == 1;
        Ok(Self { dims, dtype, dof, ras_good })
    }
}

/// A decoded MGH volume; values are widened to `f64`.
#[derive(Debug, Clone)]
pub struct Mgh {
    pub header: MghHeader,
    /// Column-major voxel values, `n_spatial × n_frames` of them.
    pub data: Vec<f64>,
}

impl Mgh {
    /// Reshape into a `[T, V]` timeseries matrix.
    pub fn into_timeseries(self) -> Result<Array2<f64>> {
        let shape = (self.header.n_frames(), self.header.n_spatial());
        let found = self.data.len();
        Array2::from_shape_vec(shape, self.data).map_err(|_| FcError::ShapeMismatch {
            what: "MGH voxel count".to_string(),
            expected: shape.0 * shape.1,
            found,
        })
    }
}

/// Read an `.mgh` or `.mgz` file.
pub fn read_mgh(path: &Path) -> Result<Mgh> {
    let bytes = read_maybe_gz(path)?;
    let mut r = ByteReader::new(&bytes, path);
    let header = MghHeader::parse(&mut r)?;

    r.seek(MGH_DATA_START)?;
    let n = header.n_spatial() * header.n_frames();
    let mut data = Vec::with_capacity(n);
    match header.dtype {
        MghDtype::Uchar => {
            for _ in 0..n {
                data.push(r.u8()? as f64);
            }
        }
        MghDtype::Int => {
            for _ in 0..n {
                data.push(r.i32()? as f64);
            }
        }
        MghDtype::Float => {
            for _ in 0..n {
                data.push(r.f32()? as f64);
            }
        }
        MghDtype::Short => {
            for _ in 0..n {
                data.push(r.i16()? as f64);
            }
        }
    }
    tracing::debug!(
        path = %path.display(),
        dims = ?header.dims,
        "read MGH (data ends at byte {})",
        r.position()
    );
    Ok(Mgh { header, data })
}

/// Read a surface timeseries file straight into `[T, V]`.
pub fn read_surface_timeseries(path: &Path) -> Result<Array2<f64>> {
    read_mgh(path)?.into_timeseries()
}

/// Write a `[T, V]` timeseries as an uncompressed float MGH with
/// dims `(V, 1, 1, T)`.
pub fn write_surface_timeseries(path: &Path, ts: ArrayView2<f64>) -> Result<()> {
    let (n_t, n_v) = ts.dim();
    let mut buf: Vec<u8> = Vec::with_capacity(MGH_DATA_START + 4 * n_t * n_v);
    buf.extend_from_slice(&MGH_VERSION.to_be_bytes());
    for d in [n_v, 1, 1, n_t] {
        buf.extend_from_slice(&(d as i32).to_be_bytes());
    }
    buf.extend_from_slice(&MghDtype::Float.code().to_be_bytes());
    buf.extend_from_slice(&0_i32.to_be_bytes());
    buf.extend_from_slice(&0_i16.to_be_bytes());
    buf.resize(MGH_DATA_START, 0);
    for &v in ts.iter() {
        buf.extend_from_slice(&(v as f32).to_be_bytes());
    }
    let mut f = std::fs::File::create(path)?;
    f.write_all(&buf)?;
    Ok(())
}
