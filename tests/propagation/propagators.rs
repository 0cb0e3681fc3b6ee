extern crate nyx_ivp as nyx;
extern crate pretty_env_logger;

use std::f64::consts::TAU;

use enum_iterator::all;
use nyx::dynamics::{Dynamics, TwoBody};
use nyx::io::ConfigRepr;
use nyx::linalg::Vector3;
use nyx::propagators::*;
use nyx::tools::shepperd;
use nyx::utils::{angular_momentum, specific_energy, split_state};
use rstest::*;

use crate::{max_abs_diff, CIRCULAR, ECCENTRIC};

fn decay(y: &[f64], _t: f64, dy: &mut [f64]) {
    dy[0] = -y[0];
}

fn oscillator(y: &[f64], _t: f64, dy: &mut [f64]) {
    dy[0] = y[1];
    dy[1] = -y[0];
}

#[rstest]
fn circular_orbit(
    #[values(
        Scheme::BogackiShampine32,
        Scheme::DormandPrince54,
        Scheme::Tsitouras54,
        Scheme::DormandPrince853
    )]
    scheme: Scheme,
) {
    let _ = pretty_env_logger::try_init();

    let prop = Propagator::new(scheme, PropOpts::with_tolerance(1e-10));
    let mut yf = [0.0; 6];
    let summary = prop
        .solve(
            &mut TwoBody::canonical(),
            &CIRCULAR,
            &mut yf,
            0.0,
            TAU,
            None,
            &[],
        )
        .unwrap();
    println!("[circular_orbit] {scheme}: {summary}");

    assert_eq!(summary.status, Status::Completed);
    assert_eq!(summary.t, TAU, "final time must be exact");
    assert!(summary.last.error <= 1.0);
    assert!(summary.accepted > 0);
    let err = max_abs_diff(&yf, &CIRCULAR);
    assert!(err < 1e-8, "{scheme} after one period: {err:e}");
}

#[rstest]
fn eccentric_orbit_and_back(
    #[values(
        Scheme::BogackiShampine32,
        Scheme::DormandPrince54,
        Scheme::Tsitouras54,
        Scheme::DormandPrince853
    )]
    scheme: Scheme,
) {
    let tf = 5.0;
    let (r0, v0) = split_state(&ECCENTRIC);
    let (rf, vf) = shepperd(1.0, tf, &r0, &v0).unwrap();
    let expected: Vec<f64> = rf.iter().chain(vf.iter()).copied().collect();

    let prop = Propagator::new(scheme, PropOpts::with_tolerance(1e-10));
    let mut dynamics = TwoBody::canonical();
    let mut yf = [0.0; 6];
    prop.solve(&mut dynamics, &ECCENTRIC, &mut yf, 0.0, tf, None, &[])
        .unwrap();
    let err = max_abs_diff(&yf, &expected);
    assert!(err < 1e-8, "{scheme} forward: {err:e}");

    // And back to the initial time from the analytical final state
    let mut y0 = [0.0; 6];
    let summary = prop
        .solve(&mut dynamics, &expected, &mut y0, tf, 0.0, None, &[])
        .unwrap();
    assert_eq!(summary.t, 0.0);
    let err = max_abs_diff(&y0, &ECCENTRIC);
    assert!(err < 1e-8, "{scheme} backward: {err:e}");
}

#[rstest]
#[case(Scheme::BogackiShampine32, 0.1)]
#[case(Scheme::DormandPrince54, 0.2)]
#[case(Scheme::Tsitouras54, 0.2)]
#[case(Scheme::DormandPrince853, 0.5)]
fn convergence_order(#[case] scheme: Scheme, #[case] step: f64) {
    // Halving a fixed step divides the global error by 2^order
    let tf = 2.0;
    let global_error = |f: fn(&[f64], f64, &mut [f64]), y0: &[f64], exact: &[f64], h: f64| {
        let prop = Propagator::new(scheme, PropOpts::with_fixed_step(h));
        let mut f = f;
        let mut yf = vec![0.0; y0.len()];
        let summary = prop.solve(&mut f, y0, &mut yf, 0.0, tf, None, &[]).unwrap();
        assert_eq!(summary.rejected, 0);
        assert_eq!(summary.t, tf);
        max_abs_diff(&yf, exact)
    };

    let decay_exact = [(-tf).exp()];
    let osc_exact = [tf.sin(), tf.cos()];
    for (name, ratio) in [
        (
            "decay",
            global_error(decay, &[1.0], &decay_exact, step)
                / global_error(decay, &[1.0], &decay_exact, step / 2.0),
        ),
        (
            "oscillator",
            global_error(oscillator, &[0.0, 1.0], &osc_exact, step)
                / global_error(oscillator, &[0.0, 1.0], &osc_exact, step / 2.0),
        ),
    ] {
        let observed = ratio.log2();
        println!("[convergence_order] {scheme} {name}: {observed:.3}");
        assert!(
            (observed - f64::from(scheme.order())).abs() < 0.6,
            "{scheme} on {name}: observed order {observed}"
        );
    }
}

#[test]
fn energy_and_momentum_conservation() {
    let prop = Propagator::dp8(PropOpts::with_tolerance(1e-12));
    let (r0, v0) = split_state(&ECCENTRIC);
    let energy0 = specific_energy(1.0, &r0, &v0);
    let momentum0 = angular_momentum(&r0, &v0);
    // Three orbits
    let sma = -1.0 / (2.0 * energy0);
    let tf = 3.0 * TAU * sma.powf(1.5);

    let mut yf = [0.0; 6];
    let summary = prop
        .solve(
            &mut TwoBody::canonical(),
            &ECCENTRIC,
            &mut yf,
            0.0,
            tf,
            None,
            &[],
        )
        .unwrap();
    println!("[energy_and_momentum_conservation] {summary}");

    let (rf, vf) = split_state(&yf);
    let energy_drift = (specific_energy(1.0, &rf, &vf) - energy0).abs();
    let momentum_drift: Vector3<f64> = angular_momentum(&rf, &vf) - momentum0;
    assert!(energy_drift < 1e-8, "energy drift: {energy_drift:e}");
    assert!(
        momentum_drift.norm() < 1e-8,
        "momentum drift: {:e}",
        momentum_drift.norm()
    );
    // Back at periapsis
    assert!(max_abs_diff(&yf, &ECCENTRIC) < 1e-6);
}

#[test]
fn schemes_agree() {
    let tf = 5.0;
    let mut reference = [0.0; 6];
    Propagator::dp8(PropOpts::with_tolerance(1e-12))
        .solve(
            &mut TwoBody::canonical(),
            &ECCENTRIC,
            &mut reference,
            0.0,
            tf,
            None,
            &[],
        )
        .unwrap();

    for scheme in all::<Scheme>() {
        let prop = Propagator::new(scheme, PropOpts::with_tolerance(1e-11));
        let mut yf = [0.0; 6];
        let summary = prop
            .solve(
                &mut TwoBody::canonical(),
                &ECCENTRIC,
                &mut yf,
                0.0,
                tf,
                None,
                &[],
            )
            .unwrap();
        let err = max_abs_diff(&yf, &reference);
        println!("[schemes_agree] {scheme}: {err:e} ({summary})");
        assert!(err < 1e-8, "{scheme} differs by {err:e}");
    }
}

#[test]
fn higher_order_needs_fewer_steps() {
    let opts = PropOpts::with_tolerance(1e-12);
    let steps: Vec<usize> = [
        Propagator::bs3(opts),
        Propagator::dp5(opts),
        Propagator::dp8(opts),
    ]
    .iter()
    .map(|prop| {
        let mut yf = [0.0; 6];
        prop.solve(
            &mut TwoBody::canonical(),
            &CIRCULAR,
            &mut yf,
            0.0,
            TAU,
            None,
            &[],
        )
        .unwrap()
        .accepted
    })
    .collect();
    assert!(steps[0] > steps[1] && steps[1] > steps[2], "{steps:?}");
}

#[test]
fn zero_span_is_noop() {
    let prop = Propagator::default();
    let mut evals = 0;
    let mut f = |y: &[f64], t: f64, dy: &mut [f64]| {
        evals += 1;
        decay(y, t, dy)
    };
    let mut yf = [0.0];
    let mut samples: Vec<(f64, Vec<f64>, Vec<f64>)> = Vec::new();
    let summary = prop
        .solve(&mut f, &[2.0], &mut yf, 1.5, 1.5, Some(&mut samples), &[])
        .unwrap();
    assert_eq!(summary.status, Status::Completed);
    assert_eq!(summary.accepted, 0);
    assert_eq!(summary.t, 1.5);
    assert_eq!(yf, [2.0]);
    assert_eq!(samples, vec![(1.5, vec![2.0], vec![-2.0])]);
    assert_eq!(evals, 1);
}

#[rstest]
fn short_span_at_large_time(
    #[values(
        Scheme::BogackiShampine32,
        Scheme::DormandPrince54,
        Scheme::DormandPrince853
    )]
    scheme: Scheme,
) {
    // A span of a few ulps of t0 is covered by one step that lands on tf
    let t0 = 1e6;
    let tf = t0 + 1e-9;
    let prop = Propagator::new(scheme, PropOpts::default());
    let mut yf = [0.0];
    let summary = prop
        .solve(&mut decay, &[1.0], &mut yf, t0, tf, None, &[])
        .unwrap();
    assert_eq!(summary.status, Status::Completed);
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.t, tf);
    assert!((yf[0] - (-(tf - t0)).exp()).abs() < 1e-15);

    // Backward as well
    let summary = prop
        .solve(&mut decay, &[1.0], &mut yf, tf, t0, None, &[])
        .unwrap();
    assert_eq!(summary.status, Status::Completed);
    assert_eq!(summary.t, t0);
}

#[test]
fn fixed_step_counts() {
    let prop = Propagator::new(Scheme::Tsitouras54, PropOpts::with_fixed_step(0.25));
    let mut yf = [0.0];
    let summary = prop
        .solve(&mut decay, &[1.0], &mut yf, 0.0, 2.0, None, &[])
        .unwrap();
    assert_eq!(summary.accepted, 8);
    assert_eq!(summary.rejected, 0);
    assert_eq!(summary.last.step, 0.25);
    // Six new stages per step with the first same as last property, plus the initial evaluation
    assert_eq!(summary.evals, 8 * 6 + 1);
    assert!((yf[0] - (-2.0_f64).exp()).abs() < 1e-6);
}

#[test]
fn instance_run() {
    let prop = Propagator::dp5(PropOpts::with_tolerance(1e-10));
    let mut instance = prop.with::<DormandPrince54>(0.0, &[0.0, 1.0]);
    let mut f = oscillator;
    let summary = instance.until_time(&mut f, 3.0, None, &[]).unwrap();
    assert_eq!(instance.t, 3.0);
    assert_eq!(summary.t, 3.0);
    let state = instance.state();
    assert!((state[0] - 3.0_f64.sin()).abs() < 1e-8);
    assert!((state[1] - 3.0_f64.cos()).abs() < 1e-8);
    let details = instance.latest_details();
    assert!(details.error <= 1.0);
    assert!(details.step > 0.0);
    assert_eq!(details, summary.last);
}

#[test]
fn custom_dynamics() {
    struct Harmonic {
        omega: f64,
    }

    impl Dynamics for Harmonic {
        fn eom(&mut self, y: &[f64], _t: f64, dy: &mut [f64]) {
            dy[0] = y[1];
            dy[1] = -self.omega * self.omega * y[0];
        }
    }

    let mut harmonic = Harmonic { omega: 2.0 };
    let mut yf = [0.0; 2];
    Propagator::tsit5(PropOpts::with_tolerance(1e-11))
        .solve(&mut harmonic, &[1.0, 0.0], &mut yf, 0.0, 1.0, None, &[])
        .unwrap();
    assert!((yf[0] - 2.0_f64.cos()).abs() < 1e-8);
    assert!((yf[1] + 2.0 * 2.0_f64.sin()).abs() < 1e-8);
}

#[test]
fn largest_error_control() {
    let opts = PropOpts::builder()
        .rtol(1e-10)
        .atol(1e-10)
        .error_ctrl(ErrorCtrl::LargestError)
        .build();
    let rms = PropOpts::with_tolerance(1e-10);

    let run = |opts: PropOpts| {
        let mut yf = [0.0; 6];
        let summary = Propagator::dp5(opts)
            .solve(
                &mut TwoBody::canonical(),
                &ECCENTRIC,
                &mut yf,
                0.0,
                5.0,
                None,
                &[],
            )
            .unwrap();
        assert!(summary.last.error <= 1.0);
        yf
    };
    let y_max = run(opts);
    let y_rms = run(rms);
    assert!(max_abs_diff(&y_max, &y_rms) < 1e-8);
}

#[test]
fn solve_many_matches_sequential() {
    let prop = Propagator::dp5(PropOpts::with_tolerance(1e-10));
    let y0s: Vec<Vec<f64>> = (0..8)
        .map(|i| {
            let mut y0 = CIRCULAR.to_vec();
            y0[4] += 0.01 * i as f64;
            y0
        })
        .collect();

    let results = prop.solve_many(&TwoBody::canonical(), &y0s, 0.0, 4.0);
    assert_eq!(results.len(), y0s.len());
    for (y0, result) in y0s.iter().zip(results) {
        let (yf_par, summary_par) = result.unwrap();
        let mut yf = vec![0.0; 6];
        let summary = prop
            .solve(&mut TwoBody::canonical(), y0, &mut yf, 0.0, 4.0, None, &[])
            .unwrap();
        assert_eq!(yf_par, yf);
        assert_eq!(summary_par.accepted, summary.accepted);
    }
}

#[test]
fn options_from_yaml() {
    let opts = PropOpts::loads(
        r#"
rtol: 1.0e-11
atol: 1.0e-12
h_max: 0.5
interp_num: 0
error_ctrl: LargestError
"#,
    )
    .unwrap();
    assert_eq!(opts.rtol, 1e-11);
    assert_eq!(opts.atol, 1e-12);
    assert_eq!(opts.h_max, 0.5);
    assert_eq!(opts.interp_num, 0);
    assert_eq!(opts.error_ctrl, ErrorCtrl::LargestError);
    // Unspecified fields keep their defaults
    assert_eq!(opts.max_iter, PropOpts::default().max_iter);
    assert!(opts.throw_on_max_iter);

    let scheme: Scheme = serde_yaml::from_str("DP8").unwrap();
    assert_eq!(scheme, Scheme::DormandPrince853);

    let prop = Propagator::new(scheme, opts);
    let mut yf = [0.0; 6];
    let summary = prop
        .solve(
            &mut TwoBody::canonical(),
            &CIRCULAR,
            &mut yf,
            0.0,
            TAU,
            None,
            &[],
        )
        .unwrap();
    assert!(summary.accepted >= (TAU / 0.5).ceil() as usize);
    assert!(max_abs_diff(&yf, &CIRCULAR) < 1e-8);

    assert!(PropOpts::loads("rtol: [1, 2]").is_err());
}
