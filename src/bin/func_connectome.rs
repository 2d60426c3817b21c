/// func_connectome: nuisance regression + surface connectomes for one
/// subject/run.
///
/// Positional arguments follow the upstream pipeline's call order:
///
///   func_connectome SUBJECT FUNC_DIR LABEL_DIR PARC_DIR VOLM_DIR \
///                   PERFORM_NSR PERFORM_GSR FUNC_LAB NO_FC [--threads N]
///
/// Flags accept `1`/`true`/`yes` (any case) as true, anything else as false.
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use surfconn::{init_tracing, parse_flag, run, RunConfig};

#[derive(Parser, Debug)]
#[command(name = "func_connectome", about = "Surface-based functional connectomes")]
struct Args {
    /// Subject id, session included (`sub-01_ses-01`).
    subject: String,

    /// Run directory holding `surfaces/` and `volumetric/`.
    func_dir: PathBuf,

    /// Native-surface annotation directory.
    label_dir: PathBuf,

    /// conte69 parcellation label directory.
    parc_dir: PathBuf,

    /// Volumetric parcellation directory (names the parcellations).
    volm_dir: PathBuf,

    /// Regress dof + WM + CSF.
    perform_nsr: String,

    /// Regress dof + WM + CSF + global signal.
    perform_gsr: String,

    /// Acquisition label used in volumetric file names.
    func_lab: String,

    /// Skip connectome generation.
    no_fc: String,

    /// Worker threads for per-parcellation work (default: all cores).
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let cfg = RunConfig {
        subject: args.subject,
        func_dir: args.func_dir,
        label_dir: args.label_dir,
        parc_dir: args.parc_dir,
        volm_dir: args.volm_dir,
        func_lab: args.func_lab,
        nsr: parse_flag(&args.perform_nsr),
        gsr: parse_flag(&args.perform_gsr),
        skip_fc: parse_flag(&args.no_fc),
        threads: args.threads,
        ..RunConfig::default()
    };

    let summary = run(&cfg).with_context(|| format!("connectome stage failed for {}", cfg.subject))?;

    let written = |v: &[surfconn::ParcellationOutcome]| v.iter().filter(|o| o.is_written()).count();
    println!(
        "{}: {} conte69 + {} fsnative connectomes ({} / {} skipped), model {}",
        summary.subject,
        written(&summary.conte69),
        written(&summary.native),
        summary.conte69.len() - written(&summary.conte69),
        summary.native.len() - written(&summary.native),
        summary.model,
    );
    Ok(())
}
