//! Plain-text numeric matrices.
//!
//! Reader: whitespace (or comma) separated values, one row per line. Blank
//! lines and `#` comment lines (AFNI `.1D` headers) are skipped. A file of
//! one value per line is a `[T, 1]` matrix, so one-dimensional confounds
//! come back as single-column matrices without any special casing. A
//! one-dimensional signal saved on a single line is turned back into a
//! column by [`read_signal`].
//!
//! Writer: space separated, fixed decimals, one row per line. Non-finite
//! values are spelled `nan`, `inf`, `-inf`.
use ndarray::{Array1, Array2, ArrayView2};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{FcError, Result};

/// Read a numeric text matrix. An empty file yields a `[0, 0]` array.
pub fn read_matrix(path: &Path) -> Result<Array2<f64>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut values: Vec<f64> = Vec::new();
    let mut n_rows = 0usize;
    let mut n_cols: Option<usize> = None;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let before = values.len();
        for tok in trimmed.split(|c: char| c.is_whitespace() || c == ',') {
            if tok.is_empty() {
                continue;
            }
            let v = tok.parse::<f64>().map_err(|_| FcError::Parse {
                path: path.to_path_buf(),
                line: idx + 1,
                msg: format!("not a number: {tok:?}"),
            })?;
            values.push(v);
        }
        let width = values.len() - before;
        match n_cols {
            None => n_cols = Some(width),
            Some(w) if w != width => {
                return Err(FcError::Parse {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    msg: format!("expected {w} columns, found {width}"),
                });
            }
            Some(_) => {}
        }
        n_rows += 1;
    }

    let n_cols = n_cols.unwrap_or(0);
    Array2::from_shape_vec((n_rows, n_cols), values).map_err(|e| FcError::Format {
        path: path.to_path_buf(),
        msg: e.to_string(),
    })
}

/// Read a one-dimensional signal (white matter, CSF, global) as `[T, 1]`,
/// whether it was saved one value per line or all on one line.
pub fn read_signal(path: &Path) -> Result<Array2<f64>> {
    let m = read_matrix(path)?;
    if m.nrows() == 1 && m.ncols() > 1 {
        Ok(m.reversed_axes())
    } else {
        Ok(m)
    }
}

/// Read every value of a text file in row-major order.
pub fn read_vector(path: &Path) -> Result<Array1<f64>> {
    let m = read_matrix(path)?;
    Ok(Array1::from_iter(m.iter().copied()))
}

/// Format one value the way `numpy.savetxt(fmt='%.Nf')` does.
pub fn format_value(v: f64, precision: usize) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else {
        format!("{v:.precision$}")
    }
}

/// Write `m` as text, `precision` decimals per value.
pub fn write_matrix(path: &Path, m: ArrayView2<f64>, precision: usize) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for row in m.rows() {
        let mut first = true;
        for &v in row.iter() {
            if !first {
                w.write_all(b" ")?;
            }
            w.write_all(format_value(v, precision).as_bytes())?;
            first = false;
        }
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(())
}

/// Write a vector as a single column.
pub fn write_column(path: &Path, v: &[f64], precision: usize) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for &x in v {
        writeln!(w, "{}", format_value(x, precision))?;
    }
    w.flush()?;
    Ok(())
}
