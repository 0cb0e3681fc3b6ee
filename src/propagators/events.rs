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

use crate::errors::EventError;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of iterations of the Brent solver
pub const MAX_ITER: usize = 50;

/// A trait to specify how a specific event must be evaluated.
///
/// An event happens where `eval` changes sign. After each accepted step, a sign change between
/// both ends of the step is refined on the continuous extension of the step.
pub trait EventEvaluator: fmt::Display + Send + Sync {
    /// Evaluation of the event, must return a value corresponding to whether the state is before or after the event
    fn eval(&self, t: f64, y: &[f64]) -> f64;

    /// Precision on the value of `eval` at which the root is considered found
    fn value_precision(&self) -> f64 {
        1e-12
    }

    /// Time precision after which the solver reports the best root so far
    fn time_precision(&self) -> f64 {
        1e-10
    }

    /// Only report crossings of this edge, or both if `None`
    fn edge(&self) -> Option<EventEdge> {
        None
    }

    /// Whether the integration stops at the first occurrence of this event
    fn terminal(&self) -> bool {
        false
    }
}

/// Enumerates the possible edges of an event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventEdge {
    /// The evaluation of the event goes from negative to positive
    Rising,
    /// The evaluation of the event goes from positive to negative
    Falling,
    /// The edge could not be determined, e.g. the event only touches zero
    Unclear,
}

impl EventEdge {
    /// Edge of a crossing from `before` to `after`.
    pub fn from_values(before: f64, after: f64) -> Self {
        if after > before {
            Self::Rising
        } else if after < before {
            Self::Falling
        } else {
            Self::Unclear
        }
    }
}

/// Represents the details of an event found during an integration.
#[derive(Clone, Debug, PartialEq)]
pub struct EventDetails {
    /// Index of the event in the list of events provided to the integration
    pub index: usize,
    /// Time of the event
    pub t: f64,
    /// State at the event
    pub y: Vec<f64>,
    pub edge: EventEdge,
    /// Evaluation of the event at the returned state, close to zero
    pub value: f64,
    /// Representation of the event, because the event itself is only borrowed
    pub repr: String,
}

impl fmt::Display for EventDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}) at t = {} (value = {:e})",
            self.repr, self.edge, self.t, self.value
        )
    }
}

/// Crossing of a threshold by one component of the state.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalarCrossing {
    pub component: usize,
    pub threshold: f64,
    pub edge: Option<EventEdge>,
    pub terminal: bool,
}

impl ScalarCrossing {
    /// Reports every crossing of `threshold` by `y[component]` without stopping the integration.
    pub fn new(component: usize, threshold: f64) -> Self {
        Self {
            component,
            threshold,
            edge: None,
            terminal: false,
        }
    }

    /// Stops the integration at the first crossing.
    pub fn as_terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    /// Only reports crossings of the given edge.
    pub fn with_edge(mut self, edge: EventEdge) -> Self {
        self.edge = Some(edge);
        self
    }
}

impl fmt::Display for ScalarCrossing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "y[{}] = {}", self.component, self.threshold)?;
        if let Some(edge) = self.edge {
            write!(f, " ({edge:?})")?;
        }
        if self.terminal {
            write!(f, " [terminal]")?;
        }
        Ok(())
    }
}

impl EventEvaluator for ScalarCrossing {
    fn eval(&self, _t: f64, y: &[f64]) -> f64 {
        y.get(self.component)
            .map_or(f64::NAN, |value| value - self.threshold)
    }

    fn edge(&self) -> Option<EventEdge> {
        self.edge
    }

    fn terminal(&self) -> bool {
        self.terminal
    }
}

/// Whether the event values at both ends of a step bracket a reportable crossing.
///
/// A crossing that starts exactly on zero was reported at the end of the previous step.
pub(crate) fn is_crossing(event: &dyn EventEvaluator, before: f64, after: f64) -> bool {
    if before == 0.0 || !(before * after <= 0.0) {
        return false;
    }
    match event.edge() {
        Some(edge) => EventEdge::from_values(before, after) == edge,
        None => true,
    }
}

/// Find the root of `g` between `start` and `end`, where `g` has values `g_start` and `g_end`
/// of opposite signs, using a Brent solver. Returns the root and the value of `g` there.
///
/// The search stops when `|g|` is within the value precision of the event, or when the bracket is
/// smaller than `x_precision`, in which case the best bound is returned.
pub(crate) fn find_bracketed<G>(
    event: &dyn EventEvaluator,
    mut g: G,
    start: f64,
    end: f64,
    g_start: f64,
    g_end: f64,
    x_precision: f64,
) -> Result<(f64, f64), EventError>
where
    G: FnMut(f64) -> f64,
{
    let value_precision = event.value_precision().abs();
    if g_start.abs() <= value_precision {
        return Ok((start, g_start));
    } else if g_end.abs() <= value_precision {
        return Ok((end, g_end));
    } else if g_start * g_end > 0.0 || g_start.is_nan() || g_end.is_nan() {
        return Err(EventError::NotBracketed {
            event: format!("{event}"),
            start,
            end,
        });
    }

    let has_converged = |xa: f64, xb: f64| (xa - xb).abs() <= x_precision;
    // The best estimate is always kept in `b`
    let arrange = |a: f64, ya: f64, b: f64, yb: f64| {
        if ya.abs() > yb.abs() {
            (a, ya, b, yb)
        } else {
            (b, yb, a, ya)
        }
    };

    let (mut xa, mut ya, mut xb, mut yb) = arrange(start, g_start, end, g_end);
    let (mut xc, mut yc, mut xd) = (xa, ya, xa);
    let mut flag = true;

    for _ in 0..MAX_ITER {
        if yb.abs() <= value_precision || has_converged(xa, xb) {
            debug!("{event} -- found with |{yb:e}| @ {xb}");
            return Ok((xb, yb));
        }
        let mut s = if (ya - yc).abs() > f64::EPSILON && (yb - yc).abs() > f64::EPSILON {
            // Inverse quadratic interpolation
            xa * yb * yc / ((ya - yb) * (ya - yc))
                + xb * ya * yc / ((yb - ya) * (yb - yc))
                + xc * ya * yb / ((yc - ya) * (yc - yb))
        } else {
            // Secant
            xb - yb * (xb - xa) / (yb - ya)
        };
        let cond1 = (s - xb) * (s - (3.0 * xa + xb) / 4.0) > 0.0;
        let cond2 = flag && (s - xb).abs() >= (xb - xc).abs() / 2.0;
        let cond3 = !flag && (s - xb).abs() >= (xc - xd).abs() / 2.0;
        let cond4 = flag && has_converged(xb, xc);
        let cond5 = !flag && has_converged(xc, xd);
        if cond1 || cond2 || cond3 || cond4 || cond5 || !s.is_finite() {
            s = (xa + xb) / 2.0;
            flag = true;
        } else {
            flag = false;
        }
        let ys = g(s);
        xd = xc;
        xc = xb;
        yc = yb;
        if ya * ys < 0.0 {
            // Root bracketed between a and s
            (xa, ya, xb, yb) = arrange(xa, ya, s, ys);
        } else {
            // Root bracketed between s and b
            (xa, ya, xb, yb) = arrange(s, ys, xb, yb);
        }
    }
    error!("Brent solver failed after {MAX_ITER} iterations");
    Err(EventError::MaxIterations {
        event: format!("{event}"),
        iterations: MAX_ITER,
    })
}
