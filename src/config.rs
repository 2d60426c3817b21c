//! Run configuration.
//!
//! [`RunConfig`] holds every input the stage needs: where the subject's
//! directories live, which nuisance model to fit and whether to build
//! connectomes at all. Everything not tied to a subject has a default that
//! matches the pipeline's conventions.
use std::path::PathBuf;

/// Configuration for one subject/run.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use surfconn::RunConfig;
///
/// let cfg = RunConfig {
///     subject:  "sub-01_ses-01".into(),
///     func_dir: "/data/sub-01/ses-01/func/desc-se_task-rest".into(),
///     nsr:      true,
///     ..RunConfig::default()
/// };
/// assert_eq!(cfg.n_cerebellar_regions, 34);
/// ```
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Subject identifier, including the session if any (`sub-01_ses-01`).
    pub subject: String,

    /// Subject func directory; must contain `surfaces/` and `volumetric/`.
    pub func_dir: PathBuf,

    /// Directory holding the native-surface `{lh,rh}.<parc>_mics.annot` files.
    pub label_dir: PathBuf,

    /// Directory holding the conte69 `<parc>_conte69.csv` label tables.
    pub parc_dir: PathBuf,

    /// Subject volumetric parcellation directory. Only the file names are
    /// used: each `*atlas-<parc>.nii*` entry names one parcellation.
    pub volm_dir: PathBuf,

    /// Acquisition identifier spliced into volumetric file names
    /// (e.g. `_desc-se_task-rest_bold`).
    pub func_lab: String,

    /// Regress dof + white matter + CSF.
    pub nsr: bool,

    /// Regress dof + white matter + CSF + global signal.
    /// Ignored when [`nsr`](Self::nsr) is set.
    pub gsr: bool,

    /// Skip functional-connectivity generation entirely.
    pub skip_fc: bool,

    /// Width of the canonical cerebellar atlas.
    ///
    /// Default: `34`.
    pub n_cerebellar_regions: usize,

    /// Parcellations that are skipped (with a notice) in conte69 space.
    ///
    /// Default: `["aparc-a2009s"]`.
    pub unsupported_conte69: Vec<String>,

    /// Worker threads for per-parcellation work. `None` uses rayon's
    /// global pool.
    pub threads: Option<usize>,

    /// Decimals for the conte69 clean timeseries and every FC matrix.
    ///
    /// Default: `6`.
    pub fc_precision: usize,

    /// Decimals for native parcellated timeseries and tSNR.
    ///
    /// Default: `12`.
    pub native_precision: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            subject: String::new(),
            func_dir: PathBuf::new(),
            label_dir: PathBuf::new(),
            parc_dir: PathBuf::new(),
            volm_dir: PathBuf::new(),
            func_lab: String::new(),
            nsr: false,
            gsr: false,
            skip_fc: false,
            n_cerebellar_regions: 34,
            unsupported_conte69: vec!["aparc-a2009s".to_string()],
            threads: None,
            fc_precision: 6,
            native_precision: 12,
        }
    }
}

impl RunConfig {
    pub fn surfaces_dir(&self) -> PathBuf {
        self.func_dir.join("surfaces")
    }

    pub fn volumetric_dir(&self) -> PathBuf {
        self.func_dir.join("volumetric")
    }

    /// `true` if `name` must be skipped in conte69 space.
    pub fn is_unsupported_conte69(&self, name: &str) -> bool {
        self.unsupported_conte69.iter().any(|u| u == name)
    }
}

/// Interpret a pipeline flag argument.
///
/// `"1"`, `"true"` and `"yes"` (any case) are on; anything else is off.
///
/// ```
/// use surfconn::config::parse_flag;
/// assert!(parse_flag("1"));
/// assert!(parse_flag("TRUE"));
/// assert!(!parse_flag("0"));
/// assert!(!parse_flag("FALSE"));
/// ```
pub fn parse_flag(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
