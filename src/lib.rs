//! # surfconn: surface-based functional connectomes in pure Rust
//!
//! `surfconn` is the post-processing stage of a resting-state fMRI
//! pipeline. It takes surface-mapped timeseries plus subcortical and
//! cerebellar regional signals for one subject, removes nuisance signals by
//! ordinary least squares and writes one functional-connectivity matrix per
//! cortical parcellation, in both the conte69 template space and the
//! subject's native surface.
//!
//! _No Python, no BLAS, no C libraries: linear algebra is `nalgebra` +
//! `ndarray`, FreeSurfer formats are read natively._
//!
//! ## Pipeline overview
//!
//! ```text
//! funcDir/
//!   ├─ surfaces/    conte69 + fsnative .mgh timeseries
//!   └─ volumetric/  subcortical, cerebellar, confounds, FD
//!        │
//!        ├─ cerebellum::reconcile()   34-wide block + missing regions
//!        ├─ regress::regress()        [1, spikes, dof, wm, csf, gs] OLS
//!        ├─ parcellate::parcellate()  vertex → region means
//!        ├─ connectivity::connectome()  Pearson, zero missing, triu
//!        └─ qc                        FD plot, tSNR
//!             │
//!             └─→ surfaces/*_desc-FC.txt, volumetric/*_desc-fc_summary.json
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use surfconn::{run, RunConfig};
//!
//! let cfg = RunConfig {
//!     subject:   "sub-01_ses-01".into(),
//!     func_dir:  "/out/sub-01/ses-01/func/desc-se_task-rest".into(),
//!     label_dir: "/out/sub-01/ses-01/label".into(),
//!     parc_dir:  "/opt/parcellations".into(),
//!     volm_dir:  "/out/sub-01/ses-01/parc".into(),
//!     func_lab:  "_desc-se_task-rest_bold".into(),
//!     nsr:       true,
//!     ..RunConfig::default()
//! };
//! let summary = run(&cfg).unwrap();
//! println!("{} conte69 connectomes", summary.conte69.len());
//! ```
//!
//! ## Running individual steps
//!
//! ```
//! use surfconn::{connectome, parcellate, regress, Confounds, ModelSpec, RunContext};
//! use surfconn::cerebellum::MissingRegions;
//! use ndarray::Array2;
//!
//! let n_t = 40;
//! let wave = |t: usize, k: usize| ((t * (k + 1)) as f64 * 0.37).sin();
//! let data = Array2::from_shape_fn((n_t, 5), |(t, c)| wave(t, c));
//! let confounds = Confounds {
//!     spikes: None,
//!     dof: Array2::from_shape_fn((n_t, 6), |(t, c)| wave(t, c + 7)),
//!     wm:  Array2::from_shape_fn((n_t, 1), |(t, _)| wave(t, 20)),
//!     csf: Array2::from_shape_fn((n_t, 1), |(t, _)| wave(t, 21)),
//!     global: None,
//! };
//! let spec = ModelSpec::select(confounds.has_spikes(), true, false);
//! let clean = regress(data, &confounds, &spec, "demo").unwrap().residuals;
//!
//! // one subcortical column, no cerebellum, four vertices in two regions
//! let ctx = RunContext { n_subcortical: 1, n_cerebellar: 0, missing: MissingRegions::none() };
//! let cortex = clean.slice(ndarray::s![.., 1..]);
//! let parc = parcellate(cortex, &[1, 1, 2, 2]).unwrap();
//! let fc = connectome(&ctx, clean.slice(ndarray::s![.., ..1]), parc.timeseries.view()).unwrap();
//! assert_eq!(fc.dim(), (3, 3));
//! ```

pub mod cerebellum;
pub mod config;
pub mod connectivity;
pub mod context;
pub mod error;
pub mod freesurfer;
pub mod io;
pub mod layout;
pub mod logging;
pub mod parcellate;
pub mod pipeline;
pub mod qc;
pub mod regress;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `surfconn::Foo` without having to know the internal module layout.

// config / errors / logging
pub use config::{parse_flag, RunConfig};
pub use error::{FcError, Result};
pub use logging::init_tracing;

// run context
pub use context::RunContext;

// cerebellum
pub use cerebellum::{parse_roi_labels, reconcile, Cerebellum, MissingRegions, N_CEREBELLAR_REGIONS};

// regression
pub use regress::{ols_residuals, pseudo_inverse, regress, ConfoundGroup, Confounds, ModelSpec, Regression};

// parcellation + connectivity
pub use connectivity::{connectome, pearson, upper_triangle, zero_missing};
pub use parcellate::{conte69_labels, native_labels, parcellate, Parcellated};

// FreeSurfer formats
pub use freesurfer::{read_annot, read_mgh, read_surface_timeseries, Annot, ColorTable, Mgh};

// quality control
pub use qc::{fd_summary, tsnr, FdSummary};

// pipeline
pub use pipeline::{run, ParcellationOutcome, ParcellationStatus, RunSummary};
