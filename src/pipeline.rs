//! The connectome stage, end to end.
//!
//! ```text
//!  conte69 lh+rh ─┐
//!  subcortical ───┼─► regress ─► clean timeseries ─► per-parcellation FC (conte69)
//!  cerebellum* ───┘
//!
//!  native lh ─► regress ─┐
//!  native rh ─► regress ─┼─► per-parcellation timeseries + FC (fsnative)
//!  sctx+cereb ─► regress ┘
//!
//!  FD trace ─► summary + plot        NoHP lh+rh ─► tSNR
//! ```
//! `*` the cerebellar block is first reconciled to its full width; the
//! resulting [`RunContext`] is shared read-only by every connectome.
//!
//! Fatal errors abort [`run`]. Per-parcellation errors for which
//! [`FcError::is_recoverable`] holds are logged, recorded in the
//! [`RunSummary`] and the next parcellation proceeds.
use ndarray::{concatenate, s, Array2, ArrayView2, Axis};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::cerebellum::{self, Cerebellum};
use crate::config::RunConfig;
use crate::connectivity::connectome;
use crate::context::RunContext;
use crate::error::{FcError, Result};
use crate::freesurfer::{read_annot, read_surface_timeseries};
use crate::io::{read_matrix, read_signal, read_vector, write_column, write_matrix};
use crate::layout::{Hemi, SubjectLayout};
use crate::parcellate::{check_label_length, check_native_length, conte69_labels, native_labels, parcellate};
use crate::qc::{fd_summary, tsnr_hemispheres, write_fd_plot, FdSummary};
use crate::regress::{regress, ConfoundGroup, Confounds, ModelSpec};

// ── Summary types ────────────────────────────────────────────────────────────

/// What happened to one parcellation in one space.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ParcellationStatus {
    Written { regions: usize, fc: PathBuf },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParcellationOutcome {
    pub name: String,
    #[serde(flatten)]
    pub status: ParcellationStatus,
}

impl ParcellationOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self.status, ParcellationStatus::Written { .. })
    }
}

/// Machine-readable record of one run, written next to the QC outputs.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub subject: String,
    pub model: String,
    pub context: RunContext,
    pub n_timepoints: usize,
    pub n_vertex_conte69: usize,
    pub n_vertex_native: usize,
    pub conte69: Vec<ParcellationOutcome>,
    pub native: Vec<ParcellationOutcome>,
    pub framewise_displacement: FdSummary,
    pub tsnr_vertices: usize,
}

// ── Loading ──────────────────────────────────────────────────────────────────

/// Column-wise concatenation that reports a timepoint mismatch by name.
fn hstack(what: &str, parts: &[ArrayView2<f64>]) -> Result<Array2<f64>> {
    if let Some(first) = parts.first() {
        for p in &parts[1..] {
            if p.nrows() != first.nrows() {
                return Err(FcError::ShapeMismatch {
                    what: format!("{what} timepoints"),
                    expected: first.nrows(),
                    found: p.nrows(),
                });
            }
        }
    }
    concatenate(Axis(1), parts).map_err(|e| FcError::Linalg(e.to_string()))
}

fn load_hemispheres(what: &str, lh: PathBuf, rh: PathBuf) -> Result<Array2<f64>> {
    let l = read_surface_timeseries(&lh)?;
    let r = read_surface_timeseries(&rh)?;
    info!("{what}: lh {:?} + rh {:?}", l.dim(), r.dim());
    hstack(what, &[l.view(), r.view()])
}

fn load_subcortical(layout: &SubjectLayout) -> Result<Array2<f64>> {
    let path = layout.subcortical();
    let sctx = read_matrix(&path)?;
    if sctx.is_empty() {
        return Err(FcError::EmptyInput(path));
    }
    Ok(sctx)
}

fn load_cerebellum(layout: &SubjectLayout, n_regions: usize) -> Result<Cerebellum> {
    let ts = read_matrix(&layout.cerebellum())?;
    let stats_path = layout.cerebellum_stats();
    let text = std::fs::read_to_string(&stats_path)?;
    let labels = cerebellum::parse_roi_labels(&text, &stats_path)?;
    cerebellum::reconcile(ts, &labels, n_regions)
}

/// Read every confound the layout provides. Optional groups that are
/// absent stay `None`; the model decides whether that matters.
pub fn load_confounds(layout: &SubjectLayout) -> Result<Confounds> {
    let spikes = match layout.spikes()? {
        Some(p) => {
            info!("motion spike regressors found: {}", p.display());
            Some(read_matrix(&p)?)
        }
        None => None,
    };
    let global = match layout.global_signal()? {
        Some(p) => Some(read_signal(&p)?),
        None => None,
    };
    Ok(Confounds {
        spikes,
        dof: read_matrix(&layout.dof()?)?,
        wm: read_signal(&layout.white_matter()?)?,
        csf: read_signal(&layout.csf()?)?,
        global,
    })
}

fn select_model(cfg: &RunConfig, layout: &SubjectLayout, confounds: &Confounds) -> Result<ModelSpec> {
    let spec = ModelSpec::select(confounds.has_spikes(), cfg.nsr, cfg.gsr);
    if spec.needs(ConfoundGroup::GlobalSignal) && confounds.global.is_none() {
        return Err(FcError::MissingInput {
            what: "global signal",
            pattern: "*global*".to_string(),
            dir: layout.volumetric.clone(),
        });
    }
    Ok(spec)
}

// ── Per-parcellation work ────────────────────────────────────────────────────

/// Run `f` on a dedicated pool of `threads` workers, or on rayon's global
/// pool when `threads` is `None`.
fn run_in_pool<T, F>(threads: Option<usize>, f: F) -> Result<T>
where
    F: FnOnce() -> T + Send,
    T: Send,
{
    match threads {
        Some(n) => {
            let pool = ThreadPoolBuilder::new().num_threads(n).build()?;
            Ok(pool.install(f))
        }
        None => Ok(f()),
    }
}

/// Turn a per-parcellation result into an outcome, propagating only
/// fatal errors.
fn settle(space: &str, name: &str, res: Result<ParcellationStatus>) -> Result<ParcellationOutcome> {
    let status = match res {
        Ok(status) => status,
        Err(e) if e.is_recoverable() => {
            warn!("{space} {name}: {e}; skipping");
            ParcellationStatus::Skipped { reason: e.to_string() }
        }
        Err(e) => return Err(e),
    };
    Ok(ParcellationOutcome { name: name.to_string(), status })
}

fn for_each_parcellation<F>(
    threads: Option<usize>,
    space: &str,
    names: &[String],
    build: F,
) -> Result<Vec<ParcellationOutcome>>
where
    F: Fn(&str) -> Result<ParcellationStatus> + Sync,
{
    let results: Vec<Result<ParcellationOutcome>> = run_in_pool(threads, || {
        names
            .par_iter()
            .map(|name| settle(space, name, build(name)))
            .collect()
    })?;
    results.into_iter().collect()
}

/// Inputs shared by every conte69 parcellation.
struct Conte69Stage<'a> {
    cfg: &'a RunConfig,
    layout: &'a SubjectLayout,
    ctx: &'a RunContext,
    /// Cleaned `[sctx, cereb, conte69]` timeseries.
    clean: ArrayView2<'a, f64>,
}

impl Conte69Stage<'_> {
    fn build(&self, name: &str) -> Result<ParcellationStatus> {
        if self.cfg.is_unsupported_conte69(name) {
            return Err(FcError::UnsupportedParcellation(format!("{name}_conte69")));
        }
        let path = self.layout.conte69_labels(name);
        if !path.is_file() {
            return Err(FcError::MissingParcellation { name: name.to_string(), path });
        }
        let labels = conte69_labels(&read_vector(&path)?);

        let n = self.ctx.n_noncortical();
        let cortex = self.clean.slice(s![.., n..]);
        check_label_length(name, labels.len(), cortex.ncols())?;
        let parc = parcellate(cortex, &labels)?;

        let fc = connectome(self.ctx, self.clean.slice(s![.., ..n]), parc.timeseries.view())?;
        let out = self.layout.conte69_fc(name);
        write_matrix(&out, fc.view(), self.cfg.fc_precision)?;
        info!("conte69 {name}: {} regions -> {}", parc.regions.len(), out.display());
        Ok(ParcellationStatus::Written { regions: parc.regions.len(), fc: out })
    }
}

/// Inputs shared by every native-surface parcellation.
struct NativeStage<'a> {
    cfg: &'a RunConfig,
    layout: &'a SubjectLayout,
    ctx: &'a RunContext,
    /// Cleaned `[lh, rh]` native vertices.
    cortex: ArrayView2<'a, f64>,
    /// Cleaned `[sctx, cereb]`.
    noncortical: ArrayView2<'a, f64>,
}

impl NativeStage<'_> {
    fn build(&self, name: &str) -> Result<ParcellationStatus> {
        let lh_path = self.layout.annot(Hemi::Left, name);
        let rh_path = self.layout.annot(Hemi::Right, name);
        for path in [&lh_path, &rh_path] {
            if !path.is_file() {
                return Err(FcError::MissingParcellation { name: name.to_string(), path: path.clone() });
            }
        }
        let lh = read_annot(&lh_path)?;
        let rh = read_annot(&rh_path)?;
        check_native_length(name, &lh, &rh, self.cortex.ncols())?;
        let labels = native_labels(name, &lh, &rh)?;
        let parc = parcellate(self.cortex, &labels)?;

        let ts = hstack("native regional", &[self.noncortical.view(), parc.timeseries.view()])?;
        write_matrix(&self.layout.native_timeseries(name), ts.view(), self.cfg.native_precision)?;

        let fc = connectome(self.ctx, self.noncortical, parc.timeseries.view())?;
        let out = self.layout.native_fc(name);
        write_matrix(&out, fc.view(), self.cfg.fc_precision)?;
        info!("fsnative {name}: {} regions -> {}", parc.regions.len(), out.display());
        Ok(ParcellationStatus::Written { regions: parc.regions.len(), fc: out })
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

/// Run the whole stage for one subject/run.
pub fn run(cfg: &RunConfig) -> Result<RunSummary> {
    let layout = SubjectLayout::new(cfg);
    layout.check_surfaces()?;
    info!("subject {}: surfaces found in {}", cfg.subject, layout.surfaces.display());

    // Non-cortical block and run context.
    let sctx = load_subcortical(&layout)?;
    let cereb = load_cerebellum(&layout, cfg.n_cerebellar_regions)?;
    let ctx = RunContext {
        n_subcortical: sctx.ncols(),
        n_cerebellar: cereb.timeseries.ncols(),
        missing: cereb.missing.clone(),
    };
    let noncortical = hstack("subcortical + cerebellar", &[sctx.view(), cereb.timeseries.view()])?;
    drop((sctx, cereb));

    let confounds = load_confounds(&layout)?;
    let spec = select_model(cfg, &layout, &confounds)?;
    let parcellations = layout.parcellations()?;
    info!("{} parcellation(s): {:?}", parcellations.len(), parcellations);

    // conte69
    let cortex = load_hemispheres(
        "conte69",
        layout.conte69(Hemi::Left)?,
        layout.conte69(Hemi::Right)?,
    )?;
    let n_vertex_conte69 = cortex.ncols();
    let data = hstack("conte69", &[noncortical.view(), cortex.view()])?;
    drop(cortex);
    let n_timepoints = data.nrows();
    let clean = regress(data, &confounds, &spec, "conte69")?.residuals;
    write_matrix(&layout.clean_timeseries(), clean.view(), cfg.fc_precision)?;

    let conte69 = if cfg.skip_fc {
        info!("connectome generation disabled");
        Vec::new()
    } else {
        let stage = Conte69Stage { cfg, layout: &layout, ctx: &ctx, clean: clean.view() };
        for_each_parcellation(cfg.threads, "conte69", &parcellations, |name| stage.build(name))?
    };
    drop(clean);

    // fsnative
    let lh = read_surface_timeseries(&layout.native(Hemi::Left)?)?;
    let lh = regress(lh, &confounds, &spec, "lh_native")?.residuals;
    let rh = read_surface_timeseries(&layout.native(Hemi::Right)?)?;
    let rh = regress(rh, &confounds, &spec, "rh_native")?.residuals;
    let native = hstack("native", &[lh.view(), rh.view()])?;
    drop((lh, rh));
    let n_vertex_native = native.ncols();
    let noncortical = regress(noncortical, &confounds, &spec, "sctx_cereb")?.residuals;

    let native_out = if cfg.skip_fc {
        Vec::new()
    } else {
        let stage = NativeStage {
            cfg,
            layout: &layout,
            ctx: &ctx,
            cortex: native.view(),
            noncortical: noncortical.view(),
        };
        for_each_parcellation(cfg.threads, "fsnative", &parcellations, |name| stage.build(name))?
    };
    drop(native);

    // QC
    let fd_trace = read_vector(&layout.framewise_displacement()?)?.to_vec();
    let fd = fd_summary(&fd_trace);
    write_fd_plot(&layout.fd_plot(), &fd_trace, &fd)?;
    info!("mean framewise displacement: {:.4}", fd.mean);

    let lh_raw = read_surface_timeseries(&layout.native_unfiltered(Hemi::Left)?)?;
    let rh_raw = read_surface_timeseries(&layout.native_unfiltered(Hemi::Right)?)?;
    let tsnr = tsnr_hemispheres(lh_raw.view(), rh_raw.view())?;
    write_column(&layout.tsnr(), &tsnr.to_vec(), cfg.native_precision)?;

    let summary = RunSummary {
        subject: cfg.subject.clone(),
        model: spec.formula(),
        context: ctx,
        n_timepoints,
        n_vertex_conte69,
        n_vertex_native,
        conte69,
        native: native_out,
        framewise_displacement: fd,
        tsnr_vertices: tsnr.len(),
    };
    write_summary(&layout, &summary)?;
    Ok(summary)
}

fn write_summary(layout: &SubjectLayout, summary: &RunSummary) -> Result<()> {
    let path = layout.summary();
    let w = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(w, summary)?;
    info!("run summary -> {}", path.display());
    Ok(())
}
