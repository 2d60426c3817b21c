//! Naming conventions of the upstream pipeline stages.
//!
//! Inputs are found by `glob` patterns inside the subject's
//! `surfaces/` and `volumetric/` directories. A mandatory pattern with no
//! match is [`FcError::MissingInput`]; any pattern with several matches is
//! [`FcError::AmbiguousScan`], since two scans in one run directory cannot
//! be told apart.
use glob::{glob, GlobError, Pattern};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::RunConfig;
use crate::error::{FcError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemi {
    Left,
    Right,
}

impl Hemi {
    pub fn as_str(self) -> &'static str {
        match self {
            Hemi::Left => "lh",
            Hemi::Right => "rh",
        }
    }
}

/// Sorted paths in `dir` whose file name matches the shell pattern.
pub fn find_matching(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = format!("{}/{pattern}", Pattern::escape(&dir.to_string_lossy()));
    let mut out = Vec::new();
    for entry in glob(&full)? {
        out.push(entry.map_err(GlobError::into_error)?);
    }
    out.sort();
    Ok(out)
}

/// At most one match.
pub fn find_optional(dir: &Path, pattern: &str) -> Result<Option<PathBuf>> {
    let mut found = find_matching(dir, pattern)?;
    match found.len() {
        0 => Ok(None),
        1 => Ok(found.pop()),
        count => Err(FcError::AmbiguousScan {
            pattern: pattern.to_string(),
            dir: dir.to_path_buf(),
            count,
        }),
    }
}

/// Exactly one match.
pub fn find_unique(dir: &Path, pattern: &str, what: &'static str) -> Result<PathBuf> {
    find_optional(dir, pattern)?.ok_or_else(|| FcError::MissingInput {
        what,
        pattern: pattern.to_string(),
        dir: dir.to_path_buf(),
    })
}

/// Parcellation name encoded in a volumetric atlas file name
/// (`sub-01_space-nativepro_atlas-schaefer-400.nii.gz` → `schaefer-400`).
pub fn atlas_name(file_name: &str) -> Option<&str> {
    let (_, rest) = file_name.split_once("atlas-")?;
    Some(rest.split(".nii").next().unwrap_or(rest))
}

/// Every path the stage reads or writes for one subject/run.
#[derive(Debug, Clone)]
pub struct SubjectLayout {
    pub subject: String,
    pub func_lab: String,
    pub surfaces: PathBuf,
    pub volumetric: PathBuf,
    pub label_dir: PathBuf,
    pub parc_dir: PathBuf,
    pub volm_dir: PathBuf,
}

impl SubjectLayout {
    pub fn new(cfg: &RunConfig) -> Self {
        Self {
            subject: cfg.subject.clone(),
            func_lab: cfg.func_lab.clone(),
            surfaces: cfg.surfaces_dir(),
            volumetric: cfg.volumetric_dir(),
            label_dir: cfg.label_dir.clone(),
            parc_dir: cfg.parc_dir.clone(),
            volm_dir: cfg.volm_dir.clone(),
        }
    }

    /// `surfaces/` must exist and hold at least one entry.
    pub fn check_surfaces(&self) -> Result<()> {
        let non_empty = fs::read_dir(&self.surfaces)
            .map(|mut it| it.next().is_some())
            .unwrap_or(false);
        if non_empty {
            Ok(())
        } else {
            Err(FcError::MissingSurfaces(self.surfaces.clone()))
        }
    }

    fn volumetric_prefix(&self) -> String {
        format!("{}{}", self.subject, self.func_lab)
    }

    // ── surface inputs ───────────────────────────────────────────────────

    pub fn conte69(&self, hemi: Hemi) -> Result<PathBuf> {
        let pattern = format!("*space-conte69-32k_{}_10mm*", hemi.as_str());
        find_unique(&self.surfaces, &pattern, "conte69 surface timeseries")
    }

    pub fn native(&self, hemi: Hemi) -> Result<PathBuf> {
        // Only the left file is keyed on the subject id upstream.
        let prefix = match hemi {
            Hemi::Left => Pattern::escape(&self.subject),
            Hemi::Right => "*".to_string(),
        };
        let pattern = format!("{prefix}_func_space-fsnative_{}_10mm.mgh", hemi.as_str());
        find_unique(&self.surfaces, &pattern, "native surface timeseries")
    }

    pub fn native_unfiltered(&self, hemi: Hemi) -> Result<PathBuf> {
        let pattern = format!("*_func_space-fsnative_{}_NoHP.mgh", hemi.as_str());
        find_unique(&self.surfaces, &pattern, "unfiltered native surface timeseries")
    }

    // ── volumetric inputs ────────────────────────────────────────────────

    pub fn subcortical(&self) -> PathBuf {
        self.volumetric
            .join(format!("{}_timeseries_subcortical.txt", self.volumetric_prefix()))
    }

    pub fn cerebellum(&self) -> PathBuf {
        self.volumetric
            .join(format!("{}_timeseries_cerebellum.txt", self.volumetric_prefix()))
    }

    pub fn cerebellum_stats(&self) -> PathBuf {
        self.volumetric
            .join(format!("{}_cerebellum_roi_stats.txt", self.volumetric_prefix()))
    }

    pub fn spikes(&self) -> Result<Option<PathBuf>> {
        find_optional(&self.volumetric, "*spikeRegressors_FD.1D")
    }

    pub fn dof(&self) -> Result<PathBuf> {
        let pattern = format!("*{}.1D", Pattern::escape(&self.func_lab));
        find_unique(&self.volumetric, &pattern, "motion parameters")
    }

    pub fn white_matter(&self) -> Result<PathBuf> {
        find_unique(&self.volumetric, "*WM*", "white-matter signal")
    }

    pub fn csf(&self) -> Result<PathBuf> {
        find_unique(&self.volumetric, "*CSF*", "CSF signal")
    }

    pub fn global_signal(&self) -> Result<Option<PathBuf>> {
        find_optional(&self.volumetric, "*global*")
    }

    pub fn framewise_displacement(&self) -> Result<PathBuf> {
        find_unique(&self.volumetric, "*metric_FD*", "framewise displacement")
    }

    // ── parcellations ────────────────────────────────────────────────────

    /// Parcellation names present in the volumetric atlas directory,
    /// sorted, without `subcortical` and `cerebellum`.
    pub fn parcellations(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for path in find_matching(&self.volm_dir, "*atlas-*")? {
            let Some(file_name) = path.file_name().and_then(|f| f.to_str()) else { continue };
            match atlas_name(file_name) {
                Some("subcortical") | Some("cerebellum") => debug!("not a cortical parcellation: {file_name}"),
                Some(name) => names.push(name.to_string()),
                None => {}
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    pub fn conte69_labels(&self, parcellation: &str) -> PathBuf {
        self.parc_dir.join(format!("{parcellation}_conte69.csv"))
    }

    pub fn annot(&self, hemi: Hemi, parcellation: &str) -> PathBuf {
        self.label_dir
            .join(format!("{}.{parcellation}_mics.annot", hemi.as_str()))
    }

    // ── outputs ──────────────────────────────────────────────────────────

    pub fn clean_timeseries(&self) -> PathBuf {
        self.surfaces.join(format!(
            "{}_func_space-conte69-32k_desc-timeseries_clean.txt",
            self.subject
        ))
    }

    pub fn conte69_fc(&self, parcellation: &str) -> PathBuf {
        self.surfaces.join(format!(
            "{}_func_space-conte69-32k_atlas-{parcellation}_desc-FC.txt",
            self.subject
        ))
    }

    pub fn native_timeseries(&self, parcellation: &str) -> PathBuf {
        self.surfaces.join(format!(
            "{}_func_space-fsnative_atlas-{parcellation}_desc-timeseries.txt",
            self.subject
        ))
    }

    pub fn native_fc(&self, parcellation: &str) -> PathBuf {
        self.surfaces.join(format!(
            "{}_func_space-fsnative_atlas-{parcellation}_desc-FC.txt",
            self.subject
        ))
    }

    pub fn fd_plot(&self) -> PathBuf {
        self.volumetric
            .join(format!("{}_framewiseDisplacement.html", self.volumetric_prefix()))
    }

    pub fn tsnr(&self) -> PathBuf {
        self.volumetric
            .join(format!("{}_tSNR.txt", self.volumetric_prefix()))
    }

    pub fn summary(&self) -> PathBuf {
        self.volumetric
            .join(format!("{}_desc-fc_summary.json", self.volumetric_prefix()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_match_whole_file_names() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["x_spikeRegressors_FD.1D", "x_spikeRegressors_FD.1D.bak", "exact.mgh", "exact.mgz"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let names = |pattern: &str| -> Vec<String> {
            find_matching(dir.path(), pattern)
                .unwrap()
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect()
        };
        assert_eq!(names("*spikeRegressors_FD.1D"), vec!["x_spikeRegressors_FD.1D"]);
        assert_eq!(names("exact.mgh"), vec!["exact.mgh"]);
        assert_eq!(names("exact*"), vec!["exact.mgh", "exact.mgz"]);
        assert!(names("*WM*").is_empty());
    }

    #[test]
    fn directory_names_are_not_patterns() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("run[1]");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("sub-01_CSF.txt"), "1\n").unwrap();
        assert!(find_unique(&dir, "*CSF*", "csf").is_ok());
    }

    #[test]
    fn atlas_names() {
        assert_eq!(atlas_name("sub-01_space-nativepro_atlas-schaefer-400.nii.gz"), Some("schaefer-400"));
        assert_eq!(atlas_name("sub-01_atlas-vosdewael-100.nii"), Some("vosdewael-100"));
        assert_eq!(atlas_name("README"), None);
    }

    #[test]
    fn ambiguous_and_missing_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_WM.txt"), "1\n").unwrap();
        std::fs::write(dir.path().join("b_WM.txt"), "1\n").unwrap();
        assert!(matches!(
            find_unique(dir.path(), "*WM*", "wm"),
            Err(FcError::AmbiguousScan { count: 2, .. })
        ));
        assert!(matches!(
            find_unique(dir.path(), "*CSF*", "csf"),
            Err(FcError::MissingInput { .. })
        ));
        assert_eq!(find_optional(dir.path(), "*global*").unwrap(), None);
    }
}
