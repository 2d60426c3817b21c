//! Error taxonomy for the connectome stage.
//!
//! Two classes matter to the caller:
//!
//! * **fatal**: preconditions, unreadable inputs, shape mismatches in a
//!   regression. The run stops and nothing further is written.
//! * **recoverable**: a single parcellation cannot be built. The pipeline
//!   logs it, records it in the run summary and moves on to the next one.
//!
//! [`FcError::is_recoverable`] is the only place that classification lives.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FcError {
    #[error("no surfaces directory (or it is empty): {0}")]
    MissingSurfaces(PathBuf),

    #[error("more than one scan matches `{pattern}` in {dir} ({count} found)")]
    AmbiguousScan {
        pattern: String,
        dir: PathBuf,
        count: usize,
    },

    #[error("missing {what}: nothing matches `{pattern}` in {dir}")]
    MissingInput {
        what: &'static str,
        pattern: String,
        dir: PathBuf,
    },

    #[error("{0} is empty")]
    EmptyInput(PathBuf),

    #[error("{what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("the nuisance model needs the {0} confound but none was loaded")]
    MissingConfound(&'static str),

    #[error("{path}:{line}: {msg}")]
    Parse {
        path: PathBuf,
        line: usize,
        msg: String,
    },

    #[error("{path}: {msg}")]
    Format { path: PathBuf, msg: String },

    #[error("{parcellation}: {labels} vertex labels but the timeseries has {timeseries} cortical columns")]
    LabelLengthMismatch {
        parcellation: String,
        labels: usize,
        timeseries: usize,
    },

    #[error("{parcellation}: vertex label {label} is not in the {hemi} colour table")]
    UnknownAnnotLabel {
        parcellation: String,
        hemi: &'static str,
        label: i32,
    },

    #[error("parcellation {0} is currently not supported in this space")]
    UnsupportedParcellation(String),

    #[error("parcellation {name}: label file {path} not found")]
    MissingParcellation { name: String, path: PathBuf },

    #[error("least-squares solve failed: {0}")]
    Linalg(String),

    #[error("bad file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("could not build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FcError {
    /// True for failures scoped to one parcellation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FcError::LabelLengthMismatch { .. }
                | FcError::UnknownAnnotLabel { .. }
                | FcError::UnsupportedParcellation(_)
                | FcError::MissingParcellation { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FcError>;
