//! Nuisance-signal regression.
//!
//! The design matrix is always `[intercept, groups…]` where the ordered list
//! of confound groups comes from one table, [`ModelSpec::select`]:
//!
//! ```text
//!  spikes  NSR  GSR │ model
//! ──────────────────┼───────────────────────────────────────
//!   yes     1    ·  │ func ~ spikes + dof + wm + csf
//!   yes     0    1  │ func ~ spikes + dof + wm + csf + gs
//!   yes     0    0  │ func ~ spikes
//!   no      1    ·  │ func ~ dof + wm + csf
//!   no      0    1  │ func ~ dof + wm + csf + gs
//!   no      0    0  │ func ~ 1          (no regression)
//! ```
//!
//! A design whose numerical rank is 1 (for example an all-zero spike file)
//! is treated like `func ~ 1`: the data pass through untouched.
//!
//! Coefficients come from the SVD pseudo-inverse of the design, shared by
//! every data column, so one solve covers tens of thousands of vertices.
//! The returned residual is `data − X·β` with the intercept included, which
//! makes it orthogonal to every design column.
use nalgebra::{DMatrix, Dyn, SVD};
use ndarray::{concatenate, Array2, ArrayView2, Axis};
use serde::Serialize;
use tracing::info;

use crate::error::{FcError, Result};

/// A family of confound regressors, in design-matrix order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfoundGroup {
    /// Motion-spike indicator columns.
    Spikes,
    /// Motion parameters (degrees of freedom).
    Motion,
    WhiteMatter,
    Csf,
    GlobalSignal,
}

impl ConfoundGroup {
    /// Short term used in model formulas.
    pub fn term(self) -> &'static str {
        match self {
            Self::Spikes => "spikes",
            Self::Motion => "dof",
            Self::WhiteMatter => "wm",
            Self::Csf => "csf",
            Self::GlobalSignal => "gs",
        }
    }
}

/// The confound groups entering one regression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub groups: Vec<ConfoundGroup>,
}

impl ModelSpec {
    /// Pick the model from the priority table; the first matching row wins.
    pub fn select(has_spikes: bool, nsr: bool, gsr: bool) -> Self {
        use ConfoundGroup::*;
        let mut groups = Vec::with_capacity(5);
        if has_spikes {
            groups.push(Spikes);
        }
        if nsr {
            groups.extend([Motion, WhiteMatter, Csf]);
        } else if gsr {
            groups.extend([Motion, WhiteMatter, Csf, GlobalSignal]);
        }
        Self { groups }
    }

    pub fn is_intercept_only(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn needs(&self, g: ConfoundGroup) -> bool {
        self.groups.contains(&g)
    }

    /// `"func ~ spikes + dof + wm + csf"`, or `"func ~ 1"` for the empty model.
    pub fn formula(&self) -> String {
        if self.groups.is_empty() {
            return "func ~ 1".to_string();
        }
        let terms: Vec<&str> = self.groups.iter().map(|g| g.term()).collect();
        format!("func ~ {}", terms.join(" + "))
    }
}

/// Confound signals for one run. Every matrix is `[T, k]`.
#[derive(Debug, Clone)]
pub struct Confounds {
    pub spikes: Option<Array2<f64>>,
    pub dof: Array2<f64>,
    pub wm: Array2<f64>,
    pub csf: Array2<f64>,
    pub global: Option<Array2<f64>>,
}

impl Confounds {
    pub fn has_spikes(&self) -> bool {
        self.spikes.is_some()
    }

    pub fn group(&self, g: ConfoundGroup) -> Option<&Array2<f64>> {
        match g {
            ConfoundGroup::Spikes => self.spikes.as_ref(),
            ConfoundGroup::Motion => Some(&self.dof),
            ConfoundGroup::WhiteMatter => Some(&self.wm),
            ConfoundGroup::Csf => Some(&self.csf),
            ConfoundGroup::GlobalSignal => self.global.as_ref(),
        }
    }

    /// Assemble `[1, groups…]` for `n_t` timepoints.
    pub fn design(&self, spec: &ModelSpec, n_t: usize) -> Result<Array2<f64>> {
        let ones = Array2::<f64>::ones((n_t, 1));
        let mut parts: Vec<ArrayView2<f64>> = vec![ones.view()];
        for &g in &spec.groups {
            let m = self
                .group(g)
                .ok_or(FcError::MissingConfound(g.term()))?;
            if m.nrows() != n_t {
                return Err(FcError::ShapeMismatch {
                    what: format!("{} confound rows", g.term()),
                    expected: n_t,
                    found: m.nrows(),
                });
            }
            parts.push(m.view());
        }
        concatenate(Axis(1), &parts).map_err(|e| FcError::Linalg(e.to_string()))
    }
}

/// Outcome of one nuisance regression.
#[derive(Debug, Clone)]
pub struct Regression {
    /// `[T, M]` cleaned data.
    pub residuals: Array2<f64>,
    /// `[p, M]` fitted coefficients; `None` when the fit was skipped.
    pub coefficients: Option<Array2<f64>>,
    /// Number of design columns, intercept included.
    pub design_columns: usize,
}

/// Remove the confound structure selected by `spec` from `data` (`[T, M]`).
///
/// `domain` names the data in log lines (`conte69`, `lh_native`, …).
pub fn regress(
    data: Array2<f64>,
    confounds: &Confounds,
    spec: &ModelSpec,
    domain: &str,
) -> Result<Regression> {
    let n_t = data.nrows();
    info!("{domain} model: {}", spec.formula());
    let design = confounds.design(spec, n_t)?;

    // All-zero or constant regressors add nothing beyond the intercept.
    if design.ncols() == 1 || design_rank(&design) <= 1 {
        info!("{domain}: design is equivalent to the intercept alone, data left unchanged");
        return Ok(Regression { residuals: data, coefficients: None, design_columns: design.ncols() });
    }

    let (residuals, coef) = ols_residuals(&design, data)?;
    Ok(Regression {
        residuals,
        coefficients: Some(coef),
        design_columns: design.ncols(),
    })
}

/// Fit `data ≈ design · β` column by column and return `(data − design·β, β)`.
pub fn ols_residuals(design: &Array2<f64>, mut data: Array2<f64>) -> Result<(Array2<f64>, Array2<f64>)> {
    if design.nrows() != data.nrows() {
        return Err(FcError::ShapeMismatch {
            what: "design rows vs data rows".to_string(),
            expected: data.nrows(),
            found: design.nrows(),
        });
    }
    let pinv = pseudo_inverse(design)?;
    let coef = pinv.dot(&data);
    data -= &design.dot(&coef);
    Ok((data, coef))
}

/// Moore–Penrose pseudo-inverse with numpy's `lstsq` cutoff
/// (`σ_max · max(n, p) · ε`), so rank-deficient designs get the
/// minimum-norm solution.
pub fn pseudo_inverse(x: &Array2<f64>) -> Result<Array2<f64>> {
    let (n, p) = x.dim();
    let (svd, tol) = svd_with_cutoff(x);
    let pinv = svd
        .pseudo_inverse(tol)
        .map_err(|e| FcError::Linalg(e.to_string()))?;
    Ok(Array2::from_shape_fn((p, n), |(i, j)| pinv[(i, j)]))
}

/// Numerical rank, using the same cutoff as [`pseudo_inverse`].
pub fn design_rank(x: &Array2<f64>) -> usize {
    let (svd, tol) = svd_with_cutoff(x);
    svd.rank(tol)
}

fn svd_with_cutoff(x: &Array2<f64>) -> (SVD<f64, Dyn, Dyn>, f64) {
    let (n, p) = x.dim();
    let m = DMatrix::from_fn(n, p, |i, j| x[[i, j]]);
    let svd = SVD::new(m, true, true);
    let tol = svd.singular_values.max() * (n.max(p) as f64) * f64::EPSILON;
    (svd, tol)
}
