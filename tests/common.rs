/// Shared helpers: deterministic signals and on-disk subject fixtures.
use ndarray::Array2;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use surfconn::freesurfer::{write_surface_timeseries, Annot, ColorTable, ColorTableEntry};
use surfconn::io::{write_column, write_matrix};
use surfconn::RunConfig;

pub const SUBJECT: &str = "sub-01";
pub const FUNC_LAB: &str = "_desc-se_task-rest_bold";

/// `n` pseudo-random values in `[-1, 1)` (splitmix64).
pub fn noise(seed: u64, n: usize) -> Vec<f64> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ 0xD1B5_4A32_D192_ED03;
    (0..n)
        .map(|_| {
            state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
            let mut z = state;
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            z ^= z >> 31;
            (z >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0
        })
        .collect()
}

/// `[n_t, n_cols]` matrix of independent noise columns.
pub fn random_matrix(seed: u64, n_t: usize, n_cols: usize) -> Array2<f64> {
    let mut m = Array2::zeros((n_t, n_cols));
    for (c, mut col) in m.columns_mut().into_iter().enumerate() {
        let v = noise(seed * 10_000 + c as u64, n_t);
        col.assign(&ndarray::Array1::from(v));
    }
    m
}

#[allow(unused)]
pub fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    assert_eq!(a.dim(), b.dim(), "shape mismatch");
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0_f64, f64::max)
}

/// Colour table of `n` distinct entries.
pub fn colour_table(n: usize) -> ColorTable {
    let entries = (0..n)
        .map(|i| {
            let i = i as i32;
            ColorTableEntry::new(&format!("roi{i}"), 10 + i, 20 + 3 * i, 200 - i)
        })
        .collect();
    ColorTable { orig_filename: "fixture.ctab".to_string(), entries }
}

/// Annotation whose vertex `v` carries the colour of table row `rows[v]`.
pub fn annot(ctab: &ColorTable, rows: &[usize]) -> Annot {
    let vertex_labels = rows.iter().map(|&r| ctab.entries[r].packed_label()).collect();
    Annot { vertex_labels, ctab: ctab.clone() }
}

/// Shape of a synthetic subject.
#[derive(Debug, Clone)]
pub struct FixtureOptions {
    pub n_t: usize,
    pub n_subcortical: usize,
    /// 1-based cerebellar labels that survived co-registration.
    pub cerebellar_labels: Vec<i64>,
    /// conte69 vertices per hemisphere.
    pub conte69_per_hemi: usize,
    /// conte69 vertices per region (label = vertex / size + 1).
    pub conte69_region_size: usize,
    /// native vertices per hemisphere.
    pub native_per_hemi: usize,
    /// colour-table entries per hemisphere for native annotations.
    pub native_regions_per_hemi: usize,
    pub parcellations: Vec<String>,
    pub spikes: bool,
    pub global: bool,
    pub nsr: bool,
    pub gsr: bool,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            n_t: 100,
            n_subcortical: 2,
            cerebellar_labels: (1..=34).collect(),
            conte69_per_hemi: 50,
            conte69_region_size: 10,
            native_per_hemi: 30,
            native_regions_per_hemi: 4,
            parcellations: vec!["schaefer-100".to_string()],
            spikes: false,
            global: false,
            nsr: true,
            gsr: false,
        }
    }
}

/// A complete subject/run directory tree in a temp dir.
pub struct SubjectFixture {
    _root: TempDir,
    pub opts: FixtureOptions,
    pub cfg: RunConfig,
}

impl SubjectFixture {
    pub fn new(opts: FixtureOptions) -> Self {
        let root = tempfile::tempdir().unwrap();
        let base = root.path();
        let cfg = RunConfig {
            subject: SUBJECT.to_string(),
            func_dir: base.join("func"),
            label_dir: base.join("label"),
            parc_dir: base.join("parc"),
            volm_dir: base.join("volm"),
            func_lab: FUNC_LAB.to_string(),
            nsr: opts.nsr,
            gsr: opts.gsr,
            threads: Some(2),
            ..RunConfig::default()
        };
        for d in [cfg.surfaces_dir(), cfg.volumetric_dir(), cfg.label_dir.clone(), cfg.parc_dir.clone(), cfg.volm_dir.clone()] {
            fs::create_dir_all(d).unwrap();
        }

        let fx = Self { _root: root, opts, cfg };
        fx.write_surfaces();
        fx.write_volumetric();
        for name in fx.opts.parcellations.clone() {
            fx.add_parcellation(&name);
        }
        fx
    }

    pub fn surfaces(&self) -> PathBuf {
        self.cfg.surfaces_dir()
    }

    pub fn volumetric(&self) -> PathBuf {
        self.cfg.volumetric_dir()
    }

    fn vol(&self, suffix: &str) -> PathBuf {
        self.volumetric().join(format!("{SUBJECT}{FUNC_LAB}{suffix}"))
    }

    fn write_surfaces(&self) {
        let o = &self.opts;
        let s = self.surfaces();
        for (i, hemi) in ["lh", "rh"].iter().enumerate() {
            let c69 = random_matrix(10 + i as u64, o.n_t, o.conte69_per_hemi);
            let p = s.join(format!("{SUBJECT}_func_space-conte69-32k_{hemi}_10mm.mgh"));
            write_surface_timeseries(&p, c69.view()).unwrap();

            let native = random_matrix(20 + i as u64, o.n_t, o.native_per_hemi);
            let p = s.join(format!("{SUBJECT}_func_space-fsnative_{hemi}_10mm.mgh"));
            write_surface_timeseries(&p, native.view()).unwrap();

            let raw = random_matrix(30 + i as u64, o.n_t, o.native_per_hemi).mapv(|v| 100.0 + v);
            let p = s.join(format!("{SUBJECT}_func_space-fsnative_{hemi}_NoHP.mgh"));
            write_surface_timeseries(&p, raw.view()).unwrap();
        }
    }

    fn write_volumetric(&self) {
        let o = &self.opts;
        let sctx = random_matrix(1, o.n_t, o.n_subcortical);
        write_matrix(&self.vol("_timeseries_subcortical.txt"), sctx.view(), 6).unwrap();

        let cereb = random_matrix(2, o.n_t, o.cerebellar_labels.len());
        write_matrix(&self.vol("_timeseries_cerebellum.txt"), cereb.view(), 6).unwrap();
        fs::write(self.vol("_cerebellum_roi_stats.txt"), roi_stats(&o.cerebellar_labels)).unwrap();

        write_matrix(&self.vol(".1D"), random_matrix(3, o.n_t, 6).view(), 6).unwrap();
        write_matrix(&self.vol("_WM.txt"), random_matrix(4, o.n_t, 1).view(), 6).unwrap();
        write_matrix(&self.vol("_CSF.txt"), random_matrix(5, o.n_t, 1).view(), 6).unwrap();
        if o.global {
            write_matrix(&self.vol("_global.txt"), random_matrix(6, o.n_t, 1).view(), 6).unwrap();
        }
        if o.spikes {
            let spikes = Array2::from_shape_fn((o.n_t, 2), |(t, c)| {
                if t == [o.n_t / 10, o.n_t / 2][c] { 1.0 } else { 0.0 }
            });
            write_matrix(&self.vol("_spikeRegressors_FD.1D"), spikes.view(), 0).unwrap();
        }
        let fd: Vec<f64> = noise(7, o.n_t).iter().map(|v| 0.2 + 0.1 * v).collect();
        write_column(&self.vol("_metric_FD.1D"), &fd, 6).unwrap();
    }

    /// Register a parcellation: volumetric atlas entry, conte69 labels and
    /// native annotations.
    pub fn add_parcellation(&self, name: &str) {
        let o = &self.opts;
        let atlas = self.cfg.volm_dir.join(format!("{SUBJECT}_space-nativepro_atlas-{name}.nii.gz"));
        fs::write(atlas, b"").unwrap();

        let labels: Vec<f64> = (0..2 * o.conte69_per_hemi)
            .map(|v| (v / o.conte69_region_size + 1) as f64)
            .collect();
        write_column(&self.cfg.parc_dir.join(format!("{name}_conte69.csv")), &labels, 0).unwrap();

        let ctab = colour_table(o.native_regions_per_hemi);
        let rows: Vec<usize> = (0..o.native_per_hemi).map(|v| v % o.native_regions_per_hemi).collect();
        for hemi in ["lh", "rh"] {
            self.write_annot(hemi, name, &annot(&ctab, &rows));
        }
    }

    pub fn write_annot(&self, hemi: &str, name: &str, a: &Annot) {
        a.write(&self.annot_path(hemi, name)).unwrap();
    }

    pub fn annot_path(&self, hemi: &str, name: &str) -> PathBuf {
        self.cfg.label_dir.join(format!("{hemi}.{name}_mics.annot"))
    }

    pub fn conte69_fc(&self, name: &str) -> PathBuf {
        self.surfaces()
            .join(format!("{SUBJECT}_func_space-conte69-32k_atlas-{name}_desc-FC.txt"))
    }

    pub fn native_fc(&self, name: &str) -> PathBuf {
        self.surfaces()
            .join(format!("{SUBJECT}_func_space-fsnative_atlas-{name}_desc-FC.txt"))
    }

    pub fn native_timeseries(&self, name: &str) -> PathBuf {
        self.surfaces()
            .join(format!("{SUBJECT}_func_space-fsnative_atlas-{name}_desc-timeseries.txt"))
    }

    pub fn clean_timeseries(&self) -> PathBuf {
        self.surfaces()
            .join(format!("{SUBJECT}_func_space-conte69-32k_desc-timeseries_clean.txt"))
    }

    pub fn summary(&self) -> PathBuf {
        self.vol("_desc-fc_summary.json")
    }

    pub fn tsnr(&self) -> PathBuf {
        self.vol("_tSNR.txt")
    }

    pub fn fd_plot(&self) -> PathBuf {
        self.vol("_framewiseDisplacement.html")
    }

    #[allow(unused)]
    pub fn remove(&self, path: &Path) {
        fs::remove_file(path).unwrap();
    }
}

/// An ROI-statistics blob listing `labels` the way the cerebellar
/// extraction step writes it.
pub fn roi_stats(labels: &[i64]) -> String {
    let mut s = String::from("File\tSub-brick\tNZMean\n/data/atlas-cerebellum.nii.gz\t0[?]\t");
    let fields: Vec<String> = labels.iter().map(|l| format!("{l}\t{:.4}", 100.0 + *l as f64)).collect();
    s.push_str(&fields.join("\t"));
    s.push('\n');
    s
}
