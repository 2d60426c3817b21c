//! Cerebellar label reconciliation.
//!
//! Co-registration to fMRI space can make small cerebellar ROIs vanish, so
//! the cerebellar timeseries may have fewer than 34 columns. The retained
//! labels are listed in the ROI-statistics file; this module rebuilds the
//! fixed-width block and reports which canonical regions are missing.
//!
//! ```text
//! labels  = [1, 2, 4]            (1-based, one per input column)
//! input   = [T, 3]
//! output  = [T, 34]   col 0 ← in 0, col 1 ← in 1, col 3 ← in 2, rest 0
//! missing = {2, 5, 6, …, 33}
//! ```
use ndarray::Array2;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{FcError, Result};

/// Canonical cerebellar atlas width.
pub const N_CEREBELLAR_REGIONS: usize = 34;

/// Sorted 0-based indices of canonical regions with no data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MissingRegions(Vec<usize>);

impl MissingRegions {
    /// `[0, n_regions) \ present`.
    pub fn complement(present: &[usize], n_regions: usize) -> Self {
        let mut seen = vec![false; n_regions];
        for &p in present {
            if p < n_regions {
                seen[p] = true;
            }
        }
        Self((0..n_regions).filter(|&i| !seen[i]).collect())
    }

    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

/// The fixed-width cerebellar block plus its missing set.
#[derive(Debug, Clone)]
pub struct Cerebellum {
    /// `[T, n_regions]`.
    pub timeseries: Array2<f64>,
    pub missing: MissingRegions,
}

/// Pull the retained label list out of a cerebellar ROI-statistics blob.
///
/// The list starts six characters after the first `nii.gz` and alternates
/// `label<TAB>value`; the labels are the even-position fields. Each is
/// parsed as a float and truncated, so `"12.0"` is label 12.
pub fn parse_roi_labels(text: &str, path: &Path) -> Result<Vec<i64>> {
    const ANCHOR: &str = "nii.gz";
    const SKIP: usize = 6;

    let anchor = text.find(ANCHOR).ok_or_else(|| FcError::Format {
        path: path.to_path_buf(),
        msg: format!("no `{ANCHOR}` entry in ROI statistics"),
    })?;
    let line = text[..anchor].matches('\n').count() + 1;
    let rest = text.get(anchor + ANCHOR.len() + SKIP..).unwrap_or("");

    let mut labels = Vec::new();
    for field in rest.split('\t').step_by(2) {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }
        let v: f64 = field.parse().map_err(|_| FcError::Parse {
            path: path.to_path_buf(),
            line,
            msg: format!("bad ROI label {field:?}"),
        })?;
        labels.push(v.trunc() as i64);
    }
    Ok(labels)
}

/// Rebuild a `n_regions`-wide cerebellar block from the columns that
/// survived co-registration. `labels[i]` is the 1-based region of column `i`.
pub fn reconcile(ts: Array2<f64>, labels: &[i64], n_regions: usize) -> Result<Cerebellum> {
    if ts.ncols() != labels.len() {
        return Err(FcError::ShapeMismatch {
            what: "cerebellar columns vs ROI labels".to_string(),
            expected: labels.len(),
            found: ts.ncols(),
        });
    }

    if labels.len() == n_regions {
        info!("all {n_regions} cerebellar labels found in parcellation");
        return Ok(Cerebellum { timeseries: ts, missing: MissingRegions::none() });
    }

    warn!("some cerebellar ROIs were lost in co-registration to fMRI space");
    let mut out = Array2::<f64>::zeros((ts.nrows(), n_regions));
    let mut present = Vec::with_capacity(labels.len());
    for (col, &label) in labels.iter().enumerate() {
        let idx = usize::try_from(label - 1)
            .ok()
            .filter(|&i| i < n_regions)
            .ok_or_else(|| FcError::ShapeMismatch {
                what: format!("cerebellar label {label} (valid 1..={n_regions})"),
                expected: n_regions,
                found: label.max(0) as usize,
            })?;
        out.column_mut(idx).assign(&ts.column(col));
        present.push(idx);
    }
    let missing = MissingRegions::complement(&present, n_regions);
    warn!(missing = ?missing.as_slice(), "matrix entries for these cerebellar ROIs will be zero");
    Ok(Cerebellum { timeseries: out, missing })
}
