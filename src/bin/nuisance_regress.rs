/// nuisance_regress: run the confound regression on one text matrix.
///
///   nuisance_regress --data ts.txt --dof motion.1D --wm wm.txt --csf csf.txt \
///                    [--spikes spikes.1D] [--global gs.txt] [--nsr] [--gsr] \
///                    --output clean.txt [--precision 6]
///
/// The model is chosen exactly as in the full stage: spike regressors are
/// used whenever given, and neither `--nsr` nor `--gsr` with no spikes
/// leaves the data unchanged.
use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use surfconn::io::{read_matrix, read_signal, write_matrix};
use surfconn::{init_tracing, regress, ConfoundGroup, Confounds, ModelSpec};

#[derive(Parser, Debug)]
#[command(name = "nuisance_regress", about = "OLS nuisance-signal regression on a [T, M] text matrix")]
struct Args {
    /// `[T, M]` data, one timepoint per line.
    #[arg(long)]
    data: PathBuf,

    /// Motion parameters `[T, k]`.
    #[arg(long)]
    dof: PathBuf,

    /// White-matter signal `[T, 1]`.
    #[arg(long)]
    wm: PathBuf,

    /// CSF signal `[T, 1]`.
    #[arg(long)]
    csf: PathBuf,

    /// Motion-spike indicator columns.
    #[arg(long)]
    spikes: Option<PathBuf>,

    /// Global signal `[T, 1]`.
    #[arg(long)]
    global: Option<PathBuf>,

    /// Regress dof + WM + CSF.
    #[arg(long)]
    nsr: bool,

    /// Regress dof + WM + CSF + global signal.
    #[arg(long)]
    gsr: bool,

    /// Cleaned `[T, M]` output.
    #[arg(long)]
    output: PathBuf,

    /// Decimals written per value.
    #[arg(long, default_value_t = 6)]
    precision: usize,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let data = read_matrix(&args.data)?;
    let confounds = Confounds {
        spikes: args.spikes.as_deref().map(read_matrix).transpose()?,
        dof: read_matrix(&args.dof)?,
        wm: read_signal(&args.wm)?,
        csf: read_signal(&args.csf)?,
        global: args.global.as_deref().map(read_signal).transpose()?,
    };
    let spec = ModelSpec::select(confounds.has_spikes(), args.nsr, args.gsr);
    if spec.needs(ConfoundGroup::GlobalSignal) && confounds.global.is_none() {
        bail!("--gsr needs --global");
    }

    println!("Loaded {} timepoints × {} columns", data.nrows(), data.ncols());
    let fit = regress(data, &confounds, &spec, "data")?;
    write_matrix(&args.output, fit.residuals.view(), args.precision)?;
    println!("{} ({} design columns) → {}", spec.formula(), fit.design_columns, args.output.display());
    Ok(())
}
