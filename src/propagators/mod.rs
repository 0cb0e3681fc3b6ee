/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2023 Christopher Rabotin <christopher.rabotin@gmail.com>

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

use snafu::prelude::*;
use std::fmt;

/// Provides different methods for controlling the error computation of the integrator.
pub mod error_ctrl;
pub use self::error_ctrl::*;

/// Continuous extensions of the steps and the dense output sinks.
pub mod dense;
pub use self::dense::{DenseOutput, StepData};

/// Events located during an integration.
pub mod events;
pub use self::events::{EventDetails, EventEdge, EventEvaluator, ScalarCrossing};

/// Initial step size and step size controller.
pub mod step_size;

// Re-Export
mod instance;
pub use instance::*;
mod propagator;
pub use propagator::*;
mod rk_methods;
pub use rk_methods::*;
mod options;
pub use options::*;

use crate::errors::EventError;

/// Stores the details of the latest integration step.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct IntegrationDetails {
    /// signed step size used
    pub step: f64,
    /// error norm of the latest integration step, at most one unless the step was degraded or fixed
    pub error: f64,
    /// number of attempts needed by an adaptive step size to be within the tolerance
    pub attempts: u8,
}

impl fmt::Display for IntegrationDetails {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "IntegrationDetails {{step: {:e}, error: {:.3e}, attempts: {}}}",
            self.step, self.error, self.attempts
        )
    }
}

/// Final state of an integration which returned without error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    /// The final time was reached
    Completed,
    /// A terminal event stopped the integration
    Terminated,
    /// The maximum number of steps was reached before the final time
    Truncated,
}

/// Statistics and events of an integration.
#[derive(Clone, Debug, PartialEq)]
pub struct IntegrationSummary {
    /// Time of the returned state
    pub t: f64,
    pub status: Status,
    /// Number of accepted steps
    pub accepted: usize,
    /// Number of rejected step attempts
    pub rejected: usize,
    /// Number of steps accepted at `h_min` above tolerance
    pub degraded: usize,
    /// Number of evaluations of the dynamics
    pub evals: usize,
    pub last: IntegrationDetails,
    /// Events found, in integration order
    pub events: Vec<EventDetails>,
}

impl fmt::Display for IntegrationSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:?} at t = {} after {} steps ({} rejected, {} degraded) and {} evaluations, {} event(s)",
            self.status,
            self.t,
            self.accepted,
            self.rejected,
            self.degraded,
            self.evals,
            self.events.len()
        )
    }
}

#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PropagationError {
    #[snafu(display("invalid propagation input: {reason}"))]
    InvalidInput { reason: String },
    #[snafu(display("non-finite state or derivative at t = {t}"))]
    NumericalInstability { t: f64 },
    #[snafu(display(
        "tolerance unreachable at t = {t}: error {error:.3e} with a step of {step:e}"
    ))]
    ToleranceUnreachable { t: f64, step: f64, error: f64 },
    #[snafu(display("maximum number of steps ({max_iter}) reached at t = {t}"))]
    IterationLimitExceeded { max_iter: usize, t: f64 },
    #[snafu(display("propagation cancelled at t = {t}"))]
    Cancelled { t: f64 },
    #[snafu(display("when locating an event: {source}"))]
    EventSearch { source: EventError },
}
