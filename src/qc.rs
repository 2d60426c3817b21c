//! Quality-control outputs: temporal SNR and framewise displacement.
use ndarray::{concatenate, Array1, ArrayView2, Axis};
use plotly::common::color::Rgb;
use plotly::common::{Line, Mode};
use plotly::layout::Axis as PlotAxis;
use plotly::{Layout, Plot, Scatter};
use serde::Serialize;
use std::path::Path;

use crate::error::{FcError, Result};

/// Per-column `mean / std` over time (`ddof = 0`) of a `[T, V]` matrix.
///
/// Zero-variance vertices give `inf` (or `NaN` for an all-zero vertex),
/// following IEEE division.
pub fn tsnr(ts: ArrayView2<f64>) -> Array1<f64> {
    let n_t = ts.nrows() as f64;
    ts.columns()
        .into_iter()
        .map(|col| {
            let mean = col.sum() / n_t;
            let var = col.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n_t;
            mean / var.sqrt()
        })
        .collect()
}

/// tSNR of both hemispheres, left vertices first.
pub fn tsnr_hemispheres(lh: ArrayView2<f64>, rh: ArrayView2<f64>) -> Result<Array1<f64>> {
    let l = tsnr(lh);
    let r = tsnr(rh);
    concatenate(Axis(0), &[l.view(), r.view()]).map_err(|e| FcError::Linalg(e.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FdSummary {
    pub mean: f64,
    pub max: f64,
    pub n_frames: usize,
}

pub fn fd_summary(fd: &[f64]) -> FdSummary {
    let n = fd.len();
    let mean = fd.iter().sum::<f64>() / n as f64;
    let max = fd.iter().copied().fold(f64::NAN, f64::max);
    FdSummary { mean, max, n_frames: n }
}

/// Line plot of the framewise-displacement trace, titled with its mean.
pub fn write_fd_plot(path: &Path, fd: &[f64], summary: &FdSummary) -> Result<()> {
    let x: Vec<usize> = (0..fd.len()).collect();
    let trace = Scatter::new(x, fd.to_vec())
        .mode(Mode::Lines)
        .name("FD")
        .line(Line::new().color(Rgb::new(0x21, 0x71, 0xb5)));

    let layout = Layout::new()
        .title(format!("mean FD: {}", summary.mean))
        .width(1600)
        .height(600)
        .x_axis(PlotAxis::new().title("frame".to_string()).show_grid(false))
        .y_axis(PlotAxis::new().title("FD (mm)".to_string()).show_grid(false));

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(layout);
    std::fs::write(path, plot.to_html())?;
    Ok(())
}
