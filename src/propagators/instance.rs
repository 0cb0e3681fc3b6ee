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

use super::dense::{DenseOutput, StepData};
use super::events::{find_bracketed, is_crossing, EventDetails, EventEdge, EventEvaluator};
use super::step_size::{initial_step, StepController};
use super::{
    EventSearchSnafu, IntegrationDetails, IntegrationSummary, PropagationError, Propagator,
    Status, RK,
};
use crate::dynamics::Dynamics;
use crate::pool::Buffer;
#[cfg(not(target_arch = "wasm32"))]
use crate::time::Duration;
use snafu::ResultExt;
use std::marker::PhantomData;
use std::mem;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

/// Evenly spaced dense output times over the whole integration span.
#[derive(Copy, Clone, Debug)]
struct DenseSchedule {
    t0: f64,
    tf: f64,
    num: usize,
    next: usize,
}

impl DenseSchedule {
    /// Time of the next sample, if any remain
    fn peek(&self) -> Option<f64> {
        if self.num == 0 || self.next > self.num {
            None
        } else if self.next == self.num {
            // Exactly the final time
            Some(self.tf)
        } else {
            Some(self.t0 + (self.next as f64) * (self.tf - self.t0) / (self.num as f64))
        }
    }
}

/// A `PropInstance` is the run state of an integration with a given scheme: the current state,
/// the stage buffers rented from the pool, the step size controller and the counters.
///
/// It is created by [`Propagator::with`] and owns all of its buffers, so every buffer returns to
/// the pool when the instance is dropped, whatever the outcome of the integration.
#[derive(Debug)]
pub struct PropInstance<'a, T: RK> {
    /// The propagator setup (scheme, options, cancellation)
    pub prop: &'a Propagator,
    /// Stores the details of the previous integration step
    pub details: IntegrationDetails,
    /// Current time
    pub t: f64,
    /// Magnitude of the step for the _next_ attempt
    pub(crate) step_size: f64,
    y: Buffer,
    dy: Buffer,
    y_next: Buffer,
    dy_next: Buffer,
    y_tmp: Buffer,
    dy_tmp: Buffer,
    /// Stage derivatives, followed by the extra stages of the continuous extension
    pub(crate) k: Vec<Buffer>,
    dense_ready: bool,
    controller: StepController,
    accepted: usize,
    rejected: usize,
    degraded: usize,
    evals: usize,
    _scheme: PhantomData<T>,
}

impl<'a, T: RK> PropInstance<'a, T> {
    pub(crate) fn new(prop: &'a Propagator, t0: f64, y0: &[f64]) -> Self {
        let n = y0.len();
        Self {
            prop,
            details: IntegrationDetails::default(),
            t: t0,
            step_size: 0.0,
            y: Buffer::from_slice(y0),
            dy: Buffer::rent(n),
            y_next: Buffer::rent(n),
            dy_next: Buffer::rent(n),
            y_tmp: Buffer::rent(n),
            dy_tmp: Buffer::rent(n),
            k: (0..T::STAGES + T::DENSE_STAGES)
                .map(|_| Buffer::rent(n))
                .collect(),
            dense_ready: false,
            controller: StepController::new(T::ERROR_ORDER),
            accepted: 0,
            rejected: 0,
            degraded: 0,
            evals: 0,
            _scheme: PhantomData,
        }
    }

    /// Current state
    pub fn state(&self) -> &[f64] {
        &self.y
    }

    /// Copy the details of the latest integration step.
    pub fn latest_details(&self) -> IntegrationDetails {
        self.details
    }

    /// Propagates the provided dynamics until `tf` (forward or backward), pushing the dense
    /// output to `sink` and locating `events` along the way.
    ///
    /// On success, the state of this instance is the final state: at `tf`, at the first terminal
    /// event, or wherever the integration stopped if truncated by the maximum number of steps.
    pub fn until_time<D: Dynamics>(
        &mut self,
        f: &mut D,
        tf: f64,
        mut sink: Option<&mut dyn DenseOutput>,
        events: &[&dyn EventEvaluator],
    ) -> Result<IntegrationSummary, PropagationError> {
        let opts = self.prop.opts;
        let t0 = self.t;
        opts.validate()?;
        if !t0.is_finite() || !tf.is_finite() {
            return Err(PropagationError::InvalidInput {
                reason: format!("integration bounds must be finite, got [{t0}, {tf}]"),
            });
        } else if self.y.is_empty() {
            return Err(PropagationError::InvalidInput {
                reason: "the state is empty".to_string(),
            });
        } else if !self.y.is_finite() {
            return Err(PropagationError::InvalidInput {
                reason: "the initial state is not finite".to_string(),
            });
        }

        f.eom(&self.y, t0, &mut self.dy);
        self.evals += 1;
        if !self.dy.is_finite() {
            return Err(PropagationError::NumericalInstability { t: t0 });
        }

        if let Some(sink) = sink.as_deref_mut() {
            sink.push(t0, &self.y, &self.dy);
        }
        if tf == t0 {
            // No propagation necessary
            return Ok(self.summary(Status::Completed, Vec::new()));
        }

        #[cfg(not(target_arch = "wasm32"))]
        let tick = Instant::now();
        debug!(
            "Propagating {} from t = {t0} to t = {tf} ({})",
            self.prop.scheme, opts
        );

        let direction = (tf - t0).signum();
        let fixed_step = opts.is_fixed_step();
        self.step_size = match opts.h_start {
            Some(h_start) => h_start.abs(),
            None if fixed_step => opts.h_max,
            None => {
                self.evals += 1;
                initial_step(
                    f,
                    t0,
                    &self.y,
                    &self.dy,
                    direction,
                    T::ORDER,
                    opts.h_max.min((tf - t0).abs()),
                    &opts,
                    &mut self.y_tmp,
                    &mut self.dy_tmp,
                )
            }
        }
        .min(opts.h_max)
        .max(opts.h_min);

        let mut schedule = DenseSchedule {
            t0,
            tf,
            num: opts.interp_num,
            next: 1,
        };
        let mut event_values: Vec<f64> = events
            .iter()
            .map(|event| event.eval(t0, &self.y))
            .collect();
        let mut found: Vec<EventDetails> = Vec::new();

        let status = loop {
            if self.t == tf {
                break Status::Completed;
            }
            if self.prop.is_cancelled() {
                return Err(PropagationError::Cancelled { t: self.t });
            }
            if self.accepted >= opts.max_iter {
                if opts.throw_on_max_iter {
                    return Err(PropagationError::IterationLimitExceeded {
                        max_iter: opts.max_iter,
                        t: self.t,
                    });
                }
                warn!(
                    "maximum number of steps ({}) reached at t = {}, stopping before t = {tf}",
                    opts.max_iter, self.t
                );
                break Status::Truncated;
            }

            let (h, last) = self.step(f, tf, direction, fixed_step)?;

            // The step is accepted
            if !T::FSAL {
                f.eom(&self.y_next, self.t + h, &mut self.dy_next);
                self.evals += 1;
            }
            let t_next = if last { tf } else { self.t + h };
            if !self.dy_next.is_finite() {
                return Err(PropagationError::NumericalInstability { t: t_next });
            }
            self.accepted += 1;
            self.dense_ready = false;

            let mut step_events = self.locate_events(f, h, t_next, events, &mut event_values)?;
            step_events.sort_by(|a, b| (direction * a.t).total_cmp(&(direction * b.t)));
            let terminal = step_events
                .iter()
                .position(|details| events[details.index].terminal());
            if let Some(pos) = terminal {
                step_events.truncate(pos + 1);
            }
            let stop = terminal.map(|pos| step_events[pos].t);

            if let Some(sink) = sink.as_deref_mut() {
                self.emit_samples(f, h, t_next, stop, &mut schedule, sink);
            }

            for details in &step_events {
                debug!("{details}");
            }
            found.extend(step_events);

            if let Some(t_stop) = stop {
                // Restart from the state at the terminal event
                let y_stop = found.last().map(|details| details.y.clone()).unwrap_or_default();
                self.y.assign(&y_stop);
                f.eom(&self.y, t_stop, &mut self.dy);
                self.evals += 1;
                self.t = t_stop;
                if let Some(sink) = sink.as_deref_mut() {
                    sink.push(t_stop, &self.y, &self.dy);
                }
                break Status::Terminated;
            }

            if opts.interp_num == 0 {
                if let Some(sink) = sink.as_deref_mut() {
                    sink.push(t_next, &self.y_next, &self.dy_next);
                }
            }

            mem::swap(&mut self.y, &mut self.y_next);
            mem::swap(&mut self.dy, &mut self.dy_next);
            self.t = t_next;
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let tock: Duration = tick.elapsed().into();
            if self.accepted >= 10_000 {
                info!("Done in {} ({} steps)", tock, self.accepted);
            } else {
                debug!("Done in {} ({} steps)", tock, self.accepted);
            }
        }

        Ok(self.summary(status, found))
    }

    /// Attempts steps from the current state until one is accepted, storing it in `y_next`.
    /// Returns the signed step size and whether this step lands on `tf`.
    fn step<D: Dynamics>(
        &mut self,
        f: &mut D,
        tf: f64,
        direction: f64,
        fixed_step: bool,
    ) -> Result<(f64, bool), PropagationError> {
        let opts = self.prop.opts;
        self.details.attempts = 0;
        loop {
            self.details.attempts = self.details.attempts.saturating_add(1);

            // Take one final step of exactly the needed duration until the stop time
            let remaining = (tf - self.t).abs();
            let last = 1.01 * self.step_size > remaining;
            if last {
                self.step_size = remaining;
            }
            // The final step lands on `tf` regardless of its size
            if !last && 0.1 * self.step_size <= f64::EPSILON * self.t.abs() {
                return Err(PropagationError::ToleranceUnreachable {
                    t: self.t,
                    step: self.step_size,
                    error: self.details.error,
                });
            }

            let h = direction * self.step_size;
            self.evals += self.compute_stages(f, h);
            let error = T::error_norm(h, &self.k[..T::STAGES], &self.y, &self.y_next, &opts);
            if error.is_nan() || !self.y_next.is_finite() {
                return Err(PropagationError::NumericalInstability { t: self.t });
            }
            self.details.error = error;
            self.details.step = h;

            if fixed_step {
                // Using a fixed step, no adaptive step necessary
                return Ok((h, last));
            } else if error <= 1.0 {
                let factor = self.controller.accept(error);
                self.step_size = (self.step_size * factor).min(opts.h_max).max(opts.h_min);
                return Ok((h, last));
            }

            let at_min_step = self.step_size <= opts.h_min;
            if at_min_step || self.details.attempts >= opts.attempts {
                if opts.throw_on_min_step {
                    return Err(PropagationError::ToleranceUnreachable {
                        t: self.t,
                        step: self.step_size,
                        error,
                    });
                }
                warn!(
                    "Could not further decrease step size at t = {} (attempts: {}, step: {:e}), accepting an error of {error:.3e}",
                    self.t, self.details.attempts, self.step_size
                );
                self.degraded += 1;
                let factor = self.controller.accept(error);
                self.step_size = (self.step_size * factor).min(opts.h_max).max(opts.h_min);
                return Ok((h, last));
            }

            // Error is too high and we aren't using the smallest step, so let's adapt the step size.
            self.rejected += 1;
            let factor = self.controller.reject(error);
            self.step_size = (self.step_size * factor).max(opts.h_min);
        }
    }

    /// Computes all of the stages of a step of size `h` from the current state, and the
    /// propagated state in `y_next`. Returns the number of evaluations of the dynamics.
    fn compute_stages<D: Dynamics>(&mut self, f: &mut D, h: f64) -> usize {
        self.k[0].assign(&self.dy);
        let mut a_idx: usize = 0;
        for i in 1..T::STAGES {
            // y_tmp = y + h * sum_{j < i} a_ij k_j
            self.y_tmp.assign(&self.y);
            for kj in &self.k[..i] {
                let a_ij = T::A_COEFFS[a_idx];
                if a_ij != 0.0 {
                    self.y_tmp.add_scaled(h * a_ij, kj);
                }
                a_idx += 1;
            }
            f.eom(&self.y_tmp, self.t + T::C_COEFFS[i] * h, &mut self.k[i]);
        }

        self.y_next.assign(&self.y);
        for (b_i, ki) in T::B_COEFFS.iter().zip(&self.k) {
            if *b_i != 0.0 {
                self.y_next.add_scaled(h * b_i, ki);
            }
        }
        if T::FSAL {
            // The last stage was evaluated at y_next
            self.dy_next.assign(&self.k[T::STAGES - 1]);
        }
        T::STAGES - 1
    }

    /// Computes the extra stages of the continuous extension of the accepted step, once.
    fn prepare_dense<D: Dynamics>(&mut self, f: &mut D, h: f64) {
        if !self.dense_ready {
            self.evals += T::prepare_dense(
                f,
                self.t,
                h,
                &self.y,
                &self.dy_next,
                &mut self.k,
                &mut self.y_tmp,
            );
            self.dense_ready = true;
        }
    }

    /// Locates the events which occurred during the accepted step from `t` to `t_next`.
    fn locate_events<D: Dynamics>(
        &mut self,
        f: &mut D,
        h: f64,
        t_next: f64,
        events: &[&dyn EventEvaluator],
        event_values: &mut [f64],
    ) -> Result<Vec<EventDetails>, PropagationError> {
        let mut found = Vec::new();
        for (index, event) in events.iter().enumerate() {
            let before = event_values[index];
            let after = event.eval(t_next, &self.y_next);
            event_values[index] = after;
            if !is_crossing(*event, before, after) {
                continue;
            }

            let (t_event, y_event, value) = if after == 0.0 {
                (t_next, self.y_next.to_vec(), after)
            } else {
                self.prepare_dense(f, h);
                let t = self.t;
                let step = StepData {
                    t,
                    h,
                    y: &self.y,
                    dy: &self.dy,
                    y_next: &self.y_next,
                    dy_next: &self.dy_next,
                    k: &self.k,
                };
                let y_tmp = &mut self.y_tmp;
                let g = |theta: f64| {
                    T::interpolate(&step, theta, y_tmp.as_mut_slice());
                    event.eval(t + theta * h, y_tmp.as_slice())
                };
                let (theta, value) = find_bracketed(
                    *event,
                    g,
                    0.0,
                    1.0,
                    before,
                    after,
                    event.time_precision() / h.abs(),
                )
                .context(EventSearchSnafu)?;

                if theta >= 1.0 {
                    (t_next, self.y_next.to_vec(), value)
                } else {
                    let mut y_event = vec![0.0; self.y.len()];
                    T::interpolate(&step, theta, &mut y_event);
                    (t + theta * h, y_event, value)
                }
            };

            found.push(EventDetails {
                index,
                t: t_event,
                y: y_event,
                edge: EventEdge::from_values(before, after),
                value,
                repr: format!("{event}"),
            });
        }
        Ok(found)
    }

    /// Pushes the scheduled dense output samples within the accepted step to the sink, stopping
    /// before `stop` if a terminal event cuts the step short.
    fn emit_samples<D: Dynamics>(
        &mut self,
        f: &mut D,
        h: f64,
        t_next: f64,
        stop: Option<f64>,
        schedule: &mut DenseSchedule,
        sink: &mut dyn DenseOutput,
    ) {
        let direction = h.signum();
        while let Some(t_sample) = schedule.peek() {
            let within = match stop {
                Some(t_stop) => direction * (t_sample - t_stop) < 0.0,
                None => direction * (t_sample - t_next) <= 0.0,
            };
            if !within {
                break;
            }
            schedule.next += 1;

            if t_sample == t_next {
                sink.push(t_next, &self.y_next, &self.dy_next);
            } else {
                self.prepare_dense(f, h);
                let step = StepData {
                    t: self.t,
                    h,
                    y: &self.y,
                    dy: &self.dy,
                    y_next: &self.y_next,
                    dy_next: &self.dy_next,
                    k: &self.k,
                };
                T::interpolate(&step, step.theta(t_sample), &mut self.y_tmp);
                f.eom(&self.y_tmp, t_sample, &mut self.dy_tmp);
                self.evals += 1;
                sink.push(t_sample, &self.y_tmp, &self.dy_tmp);
            }
        }
    }

    fn summary(&self, status: Status, events: Vec<EventDetails>) -> IntegrationSummary {
        IntegrationSummary {
            t: self.t,
            status,
            accepted: self.accepted,
            rejected: self.rejected,
            degraded: self.degraded,
            evals: self.evals,
            last: self.details,
            events,
        }
    }
}
