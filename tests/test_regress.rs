mod common;
use common::{max_abs_diff, random_matrix};
use ndarray::Array2;
use surfconn::{regress, ConfoundGroup, Confounds, FcError, ModelSpec};

const N_T: usize = 120;

fn confounds(spikes: bool, global: bool) -> Confounds {
    Confounds {
        spikes: spikes.then(|| {
            Array2::from_shape_fn((N_T, 3), |(t, c)| if t == 10 + 40 * c { 1.0 } else { 0.0 })
        }),
        dof: random_matrix(101, N_T, 6),
        wm: random_matrix(102, N_T, 1),
        csf: random_matrix(103, N_T, 1),
        global: global.then(|| random_matrix(104, N_T, 1)),
    }
}

#[test]
fn design_width_follows_priority_table() {
    // (spikes, nsr, gsr) → intercept + regressor columns
    let cases = [
        ((true, true, false), 1 + 3 + 6 + 1 + 1),
        ((true, true, true), 1 + 3 + 6 + 1 + 1),
        ((true, false, true), 1 + 3 + 6 + 1 + 1 + 1),
        ((true, false, false), 1 + 3),
        ((false, true, false), 1 + 6 + 1 + 1),
        ((false, true, true), 1 + 6 + 1 + 1),
        ((false, false, true), 1 + 6 + 1 + 1 + 1),
    ];
    let data = random_matrix(1, N_T, 5);
    for ((spikes, nsr, gsr), want) in cases {
        let c = confounds(spikes, true);
        let spec = ModelSpec::select(c.has_spikes(), nsr, gsr);
        let fit = regress(data.clone(), &c, &spec, "test").unwrap();
        assert_eq!(fit.design_columns, want, "spikes={spikes} nsr={nsr} gsr={gsr}");
        assert_eq!(fit.coefficients.unwrap().dim(), (want, 5));
    }
}

#[test]
fn intercept_only_leaves_data_untouched() {
    let c = confounds(false, true);
    let spec = ModelSpec::select(false, false, false);
    let data = random_matrix(2, N_T, 7).mapv(|v| v + 3.0);
    let fit = regress(data.clone(), &c, &spec, "test").unwrap();
    assert_eq!(fit.residuals, data);
    assert!(fit.coefficients.is_none());
    assert_eq!(fit.design_columns, 1);
}

#[test]
fn all_zero_spike_columns_leave_data_untouched() {
    let mut c = confounds(false, false);
    c.spikes = Some(Array2::zeros((N_T, 2)));
    let spec = ModelSpec::select(c.has_spikes(), false, false);
    assert_eq!(spec.formula(), "func ~ spikes");
    let data = random_matrix(8, N_T, 4).mapv(|v| v + 5.0);
    let fit = regress(data.clone(), &c, &spec, "test").unwrap();
    assert_eq!(fit.residuals, data);
    assert!(fit.coefficients.is_none());
    assert_eq!(fit.design_columns, 3);
}

#[test]
fn residuals_are_orthogonal_to_every_design_column() {
    let c = confounds(true, true);
    let spec = ModelSpec::select(true, false, true);
    let design = c.design(&spec, N_T).unwrap();
    let data = random_matrix(3, N_T, 9);
    let fit = regress(data, &c, &spec, "test").unwrap();

    let cross = design.t().dot(&fit.residuals);
    for &v in cross.iter() {
        approx::assert_abs_diff_eq!(v, 0.0, epsilon = 1e-9);
    }
}

#[test]
fn pure_confound_signal_is_removed() {
    let c = confounds(false, false);
    let spec = ModelSpec::select(false, true, false);
    let design = c.design(&spec, N_T).unwrap();
    let beta = random_matrix(4, design.ncols(), 3);
    let data = design.dot(&beta);
    let fit = regress(data, &c, &spec, "test").unwrap();
    assert!(max_abs_diff(&fit.residuals, &Array2::zeros((N_T, 3))) < 1e-9);
    assert!(max_abs_diff(fit.coefficients.as_ref().unwrap(), &beta) < 1e-8);
}

#[test]
fn missing_global_signal_is_fatal() {
    let c = confounds(false, false);
    let spec = ModelSpec::select(false, false, true);
    assert!(spec.needs(ConfoundGroup::GlobalSignal));
    let err = regress(random_matrix(5, N_T, 2), &c, &spec, "test").unwrap_err();
    assert!(matches!(err, FcError::MissingConfound("gs")));
    assert!(!err.is_recoverable());
}

#[test]
fn confound_row_mismatch_is_fatal() {
    let mut c = confounds(false, false);
    c.wm = random_matrix(6, N_T - 1, 1);
    let spec = ModelSpec::select(false, true, false);
    let err = regress(random_matrix(7, N_T, 2), &c, &spec, "test").unwrap_err();
    assert!(matches!(err, FcError::ShapeMismatch { expected: N_T, .. }));
}
