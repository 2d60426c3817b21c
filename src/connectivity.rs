//! Functional-connectivity matrices.
//!
//! `connectome` = concatenate → Pearson → zero missing regions → upper
//! triangle. The zeroing uses [`RunContext::missing_columns`], which relies
//! on the cerebellar block sitting directly after the subcortical one.
use ndarray::{concatenate, Array2, ArrayView2, Axis};
use tracing::warn;

use crate::context::RunContext;
use crate::error::{FcError, Result};

/// Pearson correlation between the columns of `ts` (`[T, N]`).
///
/// Matches `numpy.corrcoef(ts.T)`: a zero-variance column correlates as
/// `NaN` with everything, and values are clipped to `[-1, 1]`. The result
/// is exactly symmetric.
pub fn pearson(ts: ArrayView2<f64>) -> Array2<f64> {
    let n = ts.ncols();
    let Some(mean) = ts.mean_axis(Axis(0)) else {
        return Array2::from_elem((n, n), f64::NAN);
    };
    let centered = &ts - &mean;
    let cov = centered.t().dot(&centered);
    let sd: Vec<f64> = cov.diag().iter().map(|v| v.sqrt()).collect();

    let mut r = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in i..n {
            let v = (cov[[i, j]] / (sd[i] * sd[j])).clamp(-1.0, 1.0);
            r[[i, j]] = v;
            r[[j, i]] = v;
        }
    }
    r
}

/// Zero row and column of every missing cerebellar region.
pub fn zero_missing(fc: &mut Array2<f64>, ctx: &RunContext) {
    for c in ctx.missing_columns() {
        fc.row_mut(c).fill(0.0);
        fc.column_mut(c).fill(0.0);
    }
}

/// Zero everything strictly below the diagonal.
pub fn upper_triangle(fc: &mut Array2<f64>) {
    for ((i, j), v) in fc.indexed_iter_mut() {
        if j < i {
            *v = 0.0;
        }
    }
}

/// Full connectome over `[noncortical, regional]` columns.
///
/// `noncortical` must be `[T, ctx.n_noncortical()]`.
pub fn connectome(
    ctx: &RunContext,
    noncortical: ArrayView2<f64>,
    regional: ArrayView2<f64>,
) -> Result<Array2<f64>> {
    if noncortical.ncols() != ctx.n_noncortical() {
        return Err(FcError::ShapeMismatch {
            what: "non-cortical columns".to_string(),
            expected: ctx.n_noncortical(),
            found: noncortical.ncols(),
        });
    }
    if noncortical.nrows() != regional.nrows() {
        return Err(FcError::ShapeMismatch {
            what: "regional timepoints".to_string(),
            expected: noncortical.nrows(),
            found: regional.nrows(),
        });
    }
    let ts = concatenate(Axis(1), &[noncortical.view(), regional.view()])
        .map_err(|e| FcError::Linalg(e.to_string()))?;

    let mut fc = pearson(ts.view());
    zero_missing(&mut fc, ctx);
    let undefined = fc.diag().iter().filter(|v| v.is_nan()).count();
    if undefined > 0 {
        warn!("{undefined} region(s) have zero variance; their correlations are NaN");
    }
    upper_triangle(&mut fc);
    Ok(fc)
}
