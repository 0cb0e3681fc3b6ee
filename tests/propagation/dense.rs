extern crate nyx_ivp as nyx;

use std::f64::consts::TAU;

use nyx::dynamics::TwoBody;
use nyx::polyfit::HermiteSpline;
use nyx::propagators::*;
use rstest::*;

use crate::{max_abs_diff, CIRCULAR};

fn circular_at(t: f64) -> [f64; 6] {
    [t.cos(), t.sin(), 0.0, -t.sin(), t.cos(), 0.0]
}

#[rstest]
fn evenly_spaced_samples(
    #[values(
        Scheme::BogackiShampine32,
        Scheme::DormandPrince54,
        Scheme::Tsitouras54,
        Scheme::DormandPrince853
    )]
    scheme: Scheme,
) {
    let opts = PropOpts::builder()
        .rtol(1e-10)
        .atol(1e-10)
        .interp_num(20)
        .build();
    let prop = Propagator::new(scheme, opts);
    let mut samples: Vec<(f64, Vec<f64>, Vec<f64>)> = Vec::new();
    let mut yf = [0.0; 6];
    prop.solve(
        &mut TwoBody::canonical(),
        &CIRCULAR,
        &mut yf,
        0.0,
        TAU,
        Some(&mut samples),
        &[],
    )
    .unwrap();

    // The initial state, then 20 intervals
    assert_eq!(samples.len(), 21);
    assert_eq!(samples[0].0, 0.0);
    assert_eq!(samples[0].1, CIRCULAR.to_vec());
    let (t_last, y_last, _) = samples.last().unwrap();
    assert_eq!(*t_last, TAU);
    assert_eq!(y_last.as_slice(), &yf, "last sample must be the final state");

    for (i, (t, y, dy)) in samples.iter().enumerate() {
        if i > 0 && i < 20 {
            assert!((t - i as f64 * TAU / 20.0).abs() < 1e-14);
        }
        let expected = circular_at(*t);
        let err = max_abs_diff(y, &expected);
        assert!(err < 1e-7, "{scheme} at t = {t}: {err:e}");
        // The derivative is the velocity and the acceleration
        assert!((dy[0] - y[3]).abs() < 1e-15);
        assert!((dy[3] + y[0]).abs() < 1e-7);
    }
}

#[test]
fn every_step_into_spline() {
    let opts = PropOpts::builder()
        .rtol(1e-10)
        .atol(1e-10)
        .interp_num(0)
        .build();
    let prop = Propagator::dp5(opts);
    let mut spline = HermiteSpline::new();
    let mut yf = [0.0; 6];
    let summary = prop
        .solve(
            &mut TwoBody::canonical(),
            &CIRCULAR,
            &mut yf,
            0.0,
            TAU,
            Some(&mut spline),
            &[],
        )
        .unwrap();

    assert_eq!(spline.len(), summary.accepted + 1);
    assert_eq!(spline.dim(), 6);
    assert_eq!(spline.first_time().unwrap(), 0.0);
    assert_eq!(spline.last_time().unwrap(), TAU);
    assert_eq!(spline.evaluate(TAU).unwrap().as_slice(), &yf);

    for i in 0..100 {
        let t = (i as f64 + 0.5) * TAU / 100.0;
        let y = spline.evaluate(t).unwrap();
        let err = max_abs_diff(y.as_slice(), &circular_at(t));
        assert!(err < 1e-7, "at t = {t}: {err:e}");
    }
    assert!(spline.evaluate(TAU + 0.1).is_err());
}

#[test]
fn backward_samples() {
    let opts = PropOpts::builder()
        .rtol(1e-11)
        .atol(1e-11)
        .interp_num(8)
        .build();
    let prop = Propagator::tsit5(opts);
    let mut spline = HermiteSpline::new();
    let y0 = circular_at(TAU);
    let mut yf = [0.0; 6];
    prop.solve(
        &mut TwoBody::canonical(),
        &y0,
        &mut yf,
        TAU,
        0.0,
        Some(&mut spline),
        &[],
    )
    .unwrap();

    assert_eq!(spline.len(), 9);
    assert_eq!(spline.first_time().unwrap(), TAU);
    assert_eq!(spline.last_time().unwrap(), 0.0);
    assert!(max_abs_diff(&yf, &CIRCULAR) < 1e-8);
    let y = spline.evaluate(TAU * 0.375).unwrap();
    assert!(max_abs_diff(y.as_slice(), &circular_at(TAU * 0.375)) < 1e-7);
}
