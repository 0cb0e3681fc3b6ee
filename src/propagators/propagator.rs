/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use super::dense::DenseOutput;
use super::events::EventEvaluator;
use super::{
    BogackiShampine32, DormandPrince54, DormandPrince853, IntegrationSummary, PropInstance,
    PropOpts, PropagationError, Scheme, Tsitouras54, RK,
};
use crate::dynamics::Dynamics;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag to request the cancellation of running integrations.
///
/// Every clone refers to the same flag. A propagator checks it once per step and returns
/// [`PropagationError::Cancelled`] when set.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the cancellation of every integration watching this token
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A Propagator allows integrating a set of dynamics forward or backward in time.
/// It includes the integration scheme, the options and an optional cancellation token, and holds
/// no other state: each call to `solve` runs on its own instance, so a propagator may be shared
/// between threads.
#[derive(Clone, Debug, Default)]
pub struct Propagator {
    pub scheme: Scheme,
    /// Stores the integration options (tolerance, min/max step, init step, etc.)
    pub opts: PropOpts,
    cancel: Option<CancelToken>,
}

impl Propagator {
    /// Each propagator must be initialized with `new` which stores propagator information.
    pub fn new(scheme: Scheme, opts: PropOpts) -> Self {
        Self {
            scheme,
            opts,
            cancel: None,
        }
    }

    /// A Bogacki Shampine 3(2) propagator with custom propagator options.
    pub fn bs3(opts: PropOpts) -> Self {
        Self::new(Scheme::BogackiShampine32, opts)
    }

    /// A Dormand Prince 5(4) propagator (the default) with custom propagator options.
    pub fn dp5(opts: PropOpts) -> Self {
        Self::new(Scheme::DormandPrince54, opts)
    }

    /// A Tsitouras 5(4) propagator with custom propagator options.
    pub fn tsit5(opts: PropOpts) -> Self {
        Self::new(Scheme::Tsitouras54, opts)
    }

    /// A Dormand Prince 8(5,3) propagator with custom propagator options: the most efficient at
    /// tight tolerances.
    pub fn dp8(opts: PropOpts) -> Self {
        Self::new(Scheme::DormandPrince853, opts)
    }

    /// Watch the provided token, cancelling the integration once it is set.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Whether the cancellation of this propagator was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    /// Set the relative and absolute tolerances for the propagator
    pub fn set_tolerance(&mut self, tol: f64) {
        self.opts.rtol = tol;
        self.opts.atol = tol;
    }

    /// Set the maximum step size for the propagator and sets the initial step to that value if currently greater
    pub fn set_max_step(&mut self, step: f64) {
        self.opts.set_max_step(step);
    }

    pub fn set_min_step(&mut self, step: f64) {
        self.opts.set_min_step(step);
    }

    /// Initializes the run state of an integration from `y0` at `t0` with the scheme `T`.
    pub fn with<T: RK>(&self, t0: f64, y0: &[f64]) -> PropInstance<'_, T> {
        PropInstance::new(self, t0, y0)
    }

    /// Integrates `f` from `y0` at `t0` until `tf` and stores the final state in `yf`.
    ///
    /// The dense output is pushed to `sink` if provided, and each of `events` is located along
    /// the way. If one of them is terminal, the integration stops at its first occurrence and
    /// `yf` is the state at that event. `yf` is left untouched on error.
    #[allow(clippy::too_many_arguments)]
    pub fn solve<D: Dynamics>(
        &self,
        f: &mut D,
        y0: &[f64],
        yf: &mut [f64],
        t0: f64,
        tf: f64,
        sink: Option<&mut dyn DenseOutput>,
        events: &[&dyn EventEvaluator],
    ) -> Result<IntegrationSummary, PropagationError> {
        if yf.len() != y0.len() {
            return Err(PropagationError::InvalidInput {
                reason: format!(
                    "the output state has {} components but the initial state has {}",
                    yf.len(),
                    y0.len()
                ),
            });
        }
        match self.scheme {
            Scheme::BogackiShampine32 => {
                self.solve_with::<BogackiShampine32, D>(f, y0, yf, t0, tf, sink, events)
            }
            Scheme::DormandPrince54 => {
                self.solve_with::<DormandPrince54, D>(f, y0, yf, t0, tf, sink, events)
            }
            Scheme::Tsitouras54 => {
                self.solve_with::<Tsitouras54, D>(f, y0, yf, t0, tf, sink, events)
            }
            Scheme::DormandPrince853 => {
                self.solve_with::<DormandPrince853, D>(f, y0, yf, t0, tf, sink, events)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn solve_with<T: RK, D: Dynamics>(
        &self,
        f: &mut D,
        y0: &[f64],
        yf: &mut [f64],
        t0: f64,
        tf: f64,
        sink: Option<&mut dyn DenseOutput>,
        events: &[&dyn EventEvaluator],
    ) -> Result<IntegrationSummary, PropagationError> {
        let mut instance = self.with::<T>(t0, y0);
        let summary = instance.until_time(f, tf, sink, events)?;
        yf.copy_from_slice(instance.state());
        Ok(summary)
    }

    /// Integrates each of the initial states from `t0` until `tf` in parallel, each with its own
    /// copy of the dynamics. Returns the final states in the same order as `y0s`.
    pub fn solve_many<D>(
        &self,
        f: &D,
        y0s: &[Vec<f64>],
        t0: f64,
        tf: f64,
    ) -> Vec<Result<(Vec<f64>, IntegrationSummary), PropagationError>>
    where
        D: Dynamics + Clone + Send + Sync,
    {
        y0s.par_iter()
            .map(|y0| {
                let mut f = f.clone();
                let mut yf = vec![0.0; y0.len()];
                let summary = self.solve(&mut f, y0, &mut yf, t0, tf, None, &[])?;
                Ok((yf, summary))
            })
            .collect()
    }
}
