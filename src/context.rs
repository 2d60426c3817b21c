//! Per-run facts shared by the regression and connectome steps.
use serde::Serialize;

use crate::cerebellum::MissingRegions;

/// Immutable description of the non-cortical block that leads every
/// concatenated timeseries: `[subcortical…, cerebellar…, cortex…]`.
///
/// Built once after cerebellar reconciliation and passed by reference to
/// every connectome; nothing downstream recomputes or mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunContext {
    pub n_subcortical: usize,
    pub n_cerebellar: usize,
    /// Missing cerebellar regions, 0-based within the cerebellar block.
    pub missing: MissingRegions,
}

impl RunContext {
    /// Columns preceding the cortex.
    pub fn n_noncortical(&self) -> usize {
        self.n_subcortical + self.n_cerebellar
    }

    /// Global column indices of the missing cerebellar regions. The
    /// cerebellar block starts right after the subcortical one.
    pub fn missing_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.missing.as_slice().iter().map(move |&i| i + self.n_subcortical)
    }
}
