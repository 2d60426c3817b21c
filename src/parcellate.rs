//! Vertex → region aggregation.
//!
//! A parcellation here is just one integer label per cortical column. Region
//! order is the sorted set of distinct labels, and each region's timeseries
//! is the mean over its columns at every timepoint.
//!
//! Two label sources exist:
//! * conte69: a per-vertex label table, used as is ([`conte69_labels`]);
//! * native: a pair of annotations whose packed colours are translated to
//!   colour-table rows, the right hemisphere offset by the size of the left
//!   table ([`native_labels`]).
use ndarray::{Array1, Array2, ArrayView2};
use std::collections::BTreeMap;

use crate::error::{FcError, Result};
use crate::freesurfer::Annot;

/// Regional timeseries and the label each column stands for.
#[derive(Debug, Clone)]
pub struct Parcellated {
    /// Region labels in column order (sorted ascending).
    pub regions: Vec<i64>,
    /// `[T, regions.len()]`.
    pub timeseries: Array2<f64>,
}

/// Average the columns of `data` (`[T, V]`) that share a label.
pub fn parcellate(data: ArrayView2<f64>, labels: &[i64]) -> Result<Parcellated> {
    if labels.len() != data.ncols() {
        return Err(FcError::ShapeMismatch {
            what: "parcellation labels vs cortical columns".to_string(),
            expected: data.ncols(),
            found: labels.len(),
        });
    }

    let mut index: BTreeMap<i64, usize> = labels.iter().map(|&l| (l, 0)).collect();
    for (i, slot) in index.values_mut().enumerate() {
        *slot = i;
    }
    let regions: Vec<i64> = index.keys().copied().collect();
    let region_of: Vec<usize> = labels.iter().map(|l| index[l]).collect();

    let mut counts = vec![0usize; regions.len()];
    for &r in &region_of {
        counts[r] += 1;
    }

    let mut out = Array2::<f64>::zeros((data.nrows(), regions.len()));
    for (mut out_row, in_row) in out.rows_mut().into_iter().zip(data.rows()) {
        for (&v, &r) in in_row.iter().zip(&region_of) {
            out_row[r] += v;
        }
    }
    for (mut col, &n) in out.columns_mut().into_iter().zip(&counts) {
        let n = n as f64;
        col.mapv_inplace(|v| v / n);
    }

    Ok(Parcellated { regions, timeseries: out })
}

/// Integer labels from a numeric label table (one value per vertex).
pub fn conte69_labels(values: &Array1<f64>) -> Vec<i64> {
    values.iter().map(|v| v.round() as i64).collect()
}

/// Fail unless the two hemispheres together cover exactly `n_columns` vertices.
pub fn check_native_length(
    parcellation: &str,
    lh: &Annot,
    rh: &Annot,
    n_columns: usize,
) -> Result<()> {
    check_label_length(parcellation, lh.n_vertices() + rh.n_vertices(), n_columns)
}

/// Fail unless a parcellation has exactly one label per cortical column.
pub fn check_label_length(parcellation: &str, n_labels: usize, n_columns: usize) -> Result<()> {
    if n_labels != n_columns {
        return Err(FcError::LabelLengthMismatch {
            parcellation: parcellation.to_string(),
            labels: n_labels,
            timeseries: n_columns,
        });
    }
    Ok(())
}

/// Translate both hemispheres' vertex colours into one 0-based region index
/// per vertex, left hemisphere first.
pub fn native_labels(parcellation: &str, lh: &Annot, rh: &Annot) -> Result<Vec<i64>> {
    let mut out = Vec::with_capacity(lh.n_vertices() + rh.n_vertices());
    let hemis = [("lh", lh, 0usize), ("rh", rh, lh.ctab.len())];
    for (hemi, annot, offset) in hemis {
        let lut = annot.ctab.lookup();
        for &label in &annot.vertex_labels {
            let row = lut.get(label).ok_or_else(|| FcError::UnknownAnnotLabel {
                parcellation: parcellation.to_string(),
                hemi,
                label,
            })?;
            out.push((row + offset) as i64);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freesurfer::{ColorTable, ColorTableEntry};
    use ndarray::array;

    fn annot(entries: &[(i32, i32, i32)], rows: &[usize]) -> Annot {
        let entries: Vec<ColorTableEntry> = entries
            .iter()
            .enumerate()
            .map(|(i, &(r, g, b))| ColorTableEntry::new(&format!("roi{i}"), r, g, b))
            .collect();
        let vertex_labels = rows.iter().map(|&i| entries[i].packed_label()).collect();
        Annot { vertex_labels, ctab: ColorTable { orig_filename: String::new(), entries } }
    }

    #[test]
    fn regions_are_sorted_unique_labels() {
        let data = array![[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]];
        let p = parcellate(data.view(), &[7, 3, 7, 3]).unwrap();
        assert_eq!(p.regions, vec![3, 7]);
        assert_eq!(p.timeseries, array![[3.0, 2.0], [7.0, 6.0]]);
    }

    #[test]
    fn label_count_must_match_columns() {
        let data = Array2::<f64>::zeros((3, 4));
        assert!(parcellate(data.view(), &[0, 1, 2]).is_err());
    }

    #[test]
    fn right_hemisphere_is_offset_by_left_table() {
        let lh = annot(&[(1, 0, 0), (2, 0, 0), (3, 0, 0)], &[0, 2, 1]);
        let rh = annot(&[(1, 0, 0), (9, 0, 0)], &[1, 0]);
        let labels = native_labels("test", &lh, &rh).unwrap();
        assert_eq!(labels, vec![0, 2, 1, 4, 3]);
    }

    #[test]
    fn unknown_colour_is_recoverable() {
        let lh = annot(&[(1, 0, 0)], &[0]);
        let mut rh = annot(&[(1, 0, 0)], &[0]);
        rh.vertex_labels[0] = 12345;
        let err = native_labels("test", &lh, &rh).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn native_length_mismatch_is_recoverable() {
        let lh = annot(&[(1, 0, 0)], &[0, 0]);
        let rh = annot(&[(1, 0, 0)], &[0]);
        assert!(check_native_length("p", &lh, &rh, 3).is_ok());
        let err = check_native_length("p", &lh, &rh, 4).unwrap_err();
        assert!(matches!(err, FcError::LabelLengthMismatch { labels: 3, timeseries: 4, .. }));
        assert!(err.is_recoverable());
    }
}
