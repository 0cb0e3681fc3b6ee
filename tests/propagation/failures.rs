extern crate nyx_ivp as nyx;

use std::f64::consts::TAU;

use nyx::dynamics::{Dynamics, TwoBody};
use nyx::pool;
use nyx::propagators::*;
use rstest::*;

use crate::CIRCULAR;

/// Two body state padded with passive components up to `len`, to check that the buffers of a run
/// are returned. Each test uses its own length, so that no other test rents buffers of that
/// length concurrently.
fn padded(len: usize) -> Vec<f64> {
    let mut y0 = CIRCULAR.to_vec();
    y0.resize(len, 0.25);
    y0
}

#[fixture]
fn tiny_steps() -> PropOpts {
    let mut opts = PropOpts::with_fixed_step(1e-10);
    opts.max_iter = 10;
    opts
}

#[rstest]
fn iteration_limit(tiny_steps: PropOpts) {
    const LEN: usize = 17;
    let prop = Propagator::dp5(tiny_steps);
    let y0 = padded(LEN);
    let mut yf = vec![0.0; LEN];
    let err = prop
        .solve(&mut TwoBody::canonical(), &y0, &mut yf, 0.0, 1.0, None, &[])
        .unwrap_err();
    match err {
        PropagationError::IterationLimitExceeded { max_iter, t } => {
            assert_eq!(max_iter, 10);
            assert!((t - 1e-9).abs() < 1e-20, "{t}");
        }
        _ => panic!("unexpected error {err}"),
    }
    // The output is untouched and every buffer went back to the pool
    assert!(yf.iter().all(|x| *x == 0.0));
    assert_eq!(pool::outstanding(LEN), 0);
    assert!(pool::available(LEN) > 0);
}

#[rstest]
fn truncated(mut tiny_steps: PropOpts) {
    tiny_steps.throw_on_max_iter = false;
    let prop = Propagator::bs3(tiny_steps);
    let mut yf = [0.0; 6];
    let summary = prop
        .solve(
            &mut TwoBody::canonical(),
            &CIRCULAR,
            &mut yf,
            0.0,
            1.0,
            None,
            &[],
        )
        .unwrap();
    assert_eq!(summary.status, Status::Truncated);
    assert_eq!(summary.accepted, 10);
    assert!((summary.t - 1e-9).abs() < 1e-20);
    assert!((yf[1] - 1e-9).abs() < 1e-15);
}

#[test]
fn cancelled_before_start() {
    let token = CancelToken::new();
    token.cancel();
    let prop = Propagator::dp8(PropOpts::default()).with_cancel_token(token);
    assert!(prop.is_cancelled());
    let mut yf = [0.0; 6];
    assert_eq!(
        prop.solve(
            &mut TwoBody::canonical(),
            &CIRCULAR,
            &mut yf,
            0.0,
            TAU,
            None,
            &[]
        ),
        Err(PropagationError::Cancelled { t: 0.0 })
    );
}

#[test]
fn cancelled_while_running() {
    let token = CancelToken::new();
    let prop = Propagator::dp5(PropOpts::with_tolerance(1e-10)).with_cancel_token(token.clone());
    let mut two_body = TwoBody::canonical();
    let mut f = |y: &[f64], t: f64, dy: &mut [f64]| {
        if t > 1.0 {
            token.cancel();
        }
        two_body.eom(y, t, dy);
    };
    const LEN: usize = 19;
    let y0 = padded(LEN);
    let mut yf = vec![0.0; LEN];
    match prop.solve(&mut f, &y0, &mut yf, 0.0, TAU, None, &[]) {
        Err(PropagationError::Cancelled { t }) => assert!(t > 1.0 && t < TAU, "{t}"),
        other => panic!("expected a cancellation, got {other:?}"),
    }
    assert_eq!(pool::outstanding(LEN), 0);
}

#[test]
fn unstable_dynamics() {
    let prop = Propagator::tsit5(PropOpts::default());
    let mut f = |y: &[f64], t: f64, dy: &mut [f64]| {
        dy[0] = if t > 0.5 { f64::NAN } else { -y[0] };
    };
    let mut yf = [0.0];
    let err = prop
        .solve(&mut f, &[1.0], &mut yf, 0.0, 1.0, None, &[])
        .unwrap_err();
    match err {
        PropagationError::NumericalInstability { t } => assert!(t <= 0.5 + 1e-12, "{t}"),
        _ => panic!("unexpected error {err}"),
    }

    // Non finite from the very first evaluation
    let mut f = |_y: &[f64], _t: f64, dy: &mut [f64]| dy[0] = f64::INFINITY;
    assert_eq!(
        prop.solve(&mut f, &[1.0], &mut yf, 0.0, 1.0, None, &[]),
        Err(PropagationError::NumericalInstability { t: 0.0 })
    );
}

#[test]
fn tolerance_unreachable() {
    // y' = y² blows up at t = 1
    let mut blow_up = |y: &[f64], _t: f64, dy: &mut [f64]| dy[0] = y[0] * y[0];
    let opts = PropOpts::builder()
        .h_min(1e-6)
        .rtol(1e-8)
        .atol(1e-8)
        .build();
    let mut yf = [0.0];
    let err = Propagator::dp5(opts)
        .solve(&mut blow_up, &[1.0], &mut yf, 0.0, 2.0, None, &[])
        .unwrap_err();
    match err {
        PropagationError::ToleranceUnreachable { t, step, error } => {
            assert!(t < 1.0 && t > 0.99, "{t}");
            assert_eq!(step, 1e-6);
            assert!(error > 1.0);
        }
        _ => panic!("unexpected error {err}"),
    }
}

#[test]
fn degraded_steps() {
    // Large minimum step with a tight tolerance
    let opts = PropOpts::builder()
        .h_min(0.5)
        .h_max(1.0)
        .rtol(1e-12)
        .atol(1e-12)
        .build();
    let mut oscillator = |y: &[f64], _t: f64, dy: &mut [f64]| {
        dy[0] = y[1];
        dy[1] = -y[0];
    };
    let mut yf = [0.0; 2];
    assert!(matches!(
        Propagator::dp5(opts).solve(&mut oscillator, &[0.0, 1.0], &mut yf, 0.0, 10.0, None, &[]),
        Err(PropagationError::ToleranceUnreachable { t, .. }) if t == 0.0
    ));

    let mut opts = opts;
    opts.throw_on_min_step = false;
    let summary = Propagator::dp5(opts)
        .solve(&mut oscillator, &[0.0, 1.0], &mut yf, 0.0, 10.0, None, &[])
        .unwrap();
    assert_eq!(summary.status, Status::Completed);
    assert!(summary.degraded > 0);
    assert_eq!(summary.t, 10.0);
    // Still a fifth order solution with steps of at most one
    assert!((yf[0] - 10.0_f64.sin()).abs() < 1e-2);
}

#[test]
fn invalid_inputs() {
    let prop = Propagator::default();
    let mut two_body = TwoBody::canonical();
    let mut yf = [0.0; 6];

    let mut y0 = CIRCULAR;
    y0[2] = f64::NAN;
    assert!(matches!(
        prop.solve(&mut two_body, &y0, &mut yf, 0.0, 1.0, None, &[]),
        Err(PropagationError::InvalidInput { .. })
    ));

    // Mismatched output
    assert!(matches!(
        prop.solve(&mut two_body, &CIRCULAR, &mut yf[..5], 0.0, 1.0, None, &[]),
        Err(PropagationError::InvalidInput { .. })
    ));

    // Empty state
    assert!(matches!(
        prop.solve(&mut two_body, &[], &mut [], 0.0, 1.0, None, &[]),
        Err(PropagationError::InvalidInput { .. })
    ));

    // Non finite bounds
    assert!(matches!(
        prop.solve(&mut two_body, &CIRCULAR, &mut yf, 0.0, f64::INFINITY, None, &[]),
        Err(PropagationError::InvalidInput { .. })
    ));

    // Inconsistent options
    for opts in [
        PropOpts::with_tolerance(-1e-9),
        PropOpts::with_adaptive_step(1.0, 0.1, 1e-9, 1e-9),
        PropOpts::builder().attempts(0).build(),
        PropOpts::builder().h_start(0.0).build(),
    ] {
        let err = Propagator::dp5(opts)
            .solve(&mut two_body, &CIRCULAR, &mut yf, 0.0, 1.0, None, &[])
            .unwrap_err();
        println!("{err}");
        assert!(matches!(err, PropagationError::InvalidInput { .. }));
    }
}
