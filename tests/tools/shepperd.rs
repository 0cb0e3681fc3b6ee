extern crate nyx_ivp as nyx;

use approx::assert_abs_diff_eq;
use nyx::dynamics::{Dynamics, TwoBody};
use nyx::errors::TwoBodyError;
use nyx::linalg::{Matrix3, Matrix6, Vector3};
use nyx::propagators::*;
use nyx::tools::{shepperd, shepperd_stm};
use nyx::utils::split_state;
use rstest::*;

use crate::{max_abs_diff, CIRCULAR, ECCENTRIC};

/// Two body dynamics with the variational equations of the flattened (column major) 6x6 STM
/// appended to the state.
fn two_body_with_stm(y: &[f64], t: f64, dy: &mut [f64]) {
    TwoBody::canonical().eom(&y[..6], t, &mut dy[..6]);

    let r = Vector3::new(y[0], y[1], y[2]);
    let rmag = r.norm();
    let gradient =
        (3.0 * r * r.transpose() / rmag.powi(2) - Matrix3::identity()) / rmag.powi(3);
    let mut jacobian = Matrix6::zeros();
    jacobian
        .fixed_view_mut::<3, 3>(0, 3)
        .copy_from(&Matrix3::identity());
    jacobian.fixed_view_mut::<3, 3>(3, 0).copy_from(&gradient);

    let stm = Matrix6::from_column_slice(&y[6..]);
    dy[6..].copy_from_slice((jacobian * stm).as_slice());
}

#[rstest]
#[case(ECCENTRIC, 5.0)]
#[case(ECCENTRIC, -3.0)]
#[case([1.0, 0.2, 0.0, 0.1, 1.5, 0.3], 2.5)]
#[case([2.0, 1.0, 0.0, -0.1, 2.5, 0.0], -7.0)]
fn matches_numerical_integration(#[case] y0: [f64; 6], #[case] tof: f64) {
    let (r0, v0) = split_state(&y0);
    let stm = shepperd_stm(1.0, tof, &r0, &v0).unwrap();

    let mut y0_stm = y0.to_vec();
    y0_stm.extend_from_slice(Matrix6::<f64>::identity().as_slice());
    let mut yf = vec![0.0; 42];
    let mut f = two_body_with_stm;
    Propagator::dp8(PropOpts::with_tolerance(1e-12))
        .solve(&mut f, &y0_stm, &mut yf, 0.0, tof, None, &[])
        .unwrap();

    let (rf, vf) = split_state(&yf);
    assert_abs_diff_eq!(rf, stm.r, epsilon = 1e-8);
    assert_abs_diff_eq!(vf, stm.v, epsilon = 1e-8);

    let numerical = Matrix6::from_column_slice(&yf[6..]);
    let analytical = stm.stm();
    let rel_err = (numerical - analytical).norm() / analytical.norm();
    println!("[matches_numerical_integration] {tof}: {rel_err:e}");
    assert!(rel_err < 1e-6, "STM relative error {rel_err:e}");
}

#[test]
fn hyperbolic_flyby() {
    // Escape velocity is sqrt(2), this leaves on a hyperbola
    let y0 = [1.0, 0.0, 0.0, 0.0, 1.8, 0.0];
    let (r0, v0) = split_state(&y0);
    let (rf, vf) = shepperd(1.0, 10.0, &r0, &v0).unwrap();
    assert!(rf.norm() > 10.0);

    let mut yf = [0.0; 6];
    Propagator::dp8(PropOpts::with_tolerance(1e-12))
        .solve(&mut TwoBody::canonical(), &y0, &mut yf, 0.0, 10.0, None, &[])
        .unwrap();
    let expected: Vec<f64> = rf.iter().chain(vf.iter()).copied().collect();
    assert!(max_abs_diff(&yf, &expected) < 1e-8);
}

#[test]
fn many_revolutions() {
    let (r0, v0) = split_state(&CIRCULAR);
    let revs = 1000.0;
    let (rf, vf) = shepperd(1.0, revs * std::f64::consts::TAU, &r0, &v0).unwrap();
    assert_abs_diff_eq!(rf, r0, epsilon = 1e-9);
    assert_abs_diff_eq!(vf, v0, epsilon = 1e-9);
}

#[test]
fn radial_collision_is_rejected() {
    let zero = Vector3::zeros();
    assert!(matches!(
        shepperd(1.0, 1.0, &zero, &Vector3::new(0.0, 1.0, 0.0)),
        Err(TwoBodyError::InvalidInput { .. })
    ));
    assert!(matches!(
        shepperd(-1.0, 1.0, &Vector3::x(), &Vector3::y()),
        Err(TwoBodyError::InvalidInput { .. })
    ));
}
