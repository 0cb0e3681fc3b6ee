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

use crate::errors::InterpolationError;
use crate::linalg::DVector;
use crate::propagators::dense::{hermite_cubic, DenseOutput, StepData};

/// Piecewise cubic Hermite interpolation of the dense output of an integration.
///
/// Samples of `(t, y, dy)` must be pushed with strictly monotone times, increasing or
/// decreasing (the direction is set by the first two samples). Evaluations are exact at the
/// samples, and third order accurate in between.
///
/// ```
/// use nyx_ivp::polyfit::HermiteSpline;
/// use nyx_ivp::propagators::DenseOutput;
///
/// let mut spline = HermiteSpline::new();
/// for i in 0..=10 {
///     let t = i as f64 / 10.0;
///     spline.push(t, &[t.sin()], &[t.cos()]);
/// }
/// let y = spline.evaluate(0.55).unwrap();
/// assert!((y[0] - 0.55_f64.sin()).abs() < 1e-6);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HermiteSpline {
    dim: usize,
    ts: Vec<f64>,
    /// States, `dim` values per sample
    ys: Vec<f64>,
    /// Derivatives, `dim` values per sample
    dys: Vec<f64>,
}

impl HermiteSpline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.ts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ts.is_empty()
    }

    /// Number of components of each state, zero until the first sample
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn first_time(&self) -> Result<f64, InterpolationError> {
        self.ts
            .first()
            .copied()
            .ok_or(InterpolationError::NoInterpolationData)
    }

    pub fn last_time(&self) -> Result<f64, InterpolationError> {
        self.ts
            .last()
            .copied()
            .ok_or(InterpolationError::NoInterpolationData)
    }

    /// Sign of the direction of the samples, positive when there is at most one sample
    fn direction(&self) -> f64 {
        match self.ts.as_slice() {
            [first, second, ..] => (second - first).signum(),
            _ => 1.0,
        }
    }

    fn sample(&self, i: usize) -> (&[f64], &[f64]) {
        let range = i * self.dim..(i + 1) * self.dim;
        (&self.ys[range.clone()], &self.dys[range])
    }

    /// Index `i` such that `t` is within the segment from sample `i` to `i + 1`, or the exact
    /// sample if `t` is one of the sample times.
    fn locate(&self, t: f64) -> Result<Segment, InterpolationError> {
        let start = self.first_time()?;
        let end = self.last_time()?;
        let dir = self.direction();
        if t.is_nan() || dir * (t - start) < 0.0 || dir * (t - end) > 0.0 {
            return Err(InterpolationError::OutOfRange { t, start, end });
        }
        // Number of samples at or before t
        let after = self.ts.partition_point(|&ti| dir * ti <= dir * t);
        if after > 0 && self.ts[after - 1] == t {
            Ok(Segment::Node(after - 1))
        } else {
            Ok(Segment::Between(after - 1))
        }
    }

    /// Interpolated state at `t`
    pub fn evaluate(&self, t: f64) -> Result<DVector<f64>, InterpolationError> {
        let mut out = DVector::zeros(self.dim);
        match self.locate(t)? {
            Segment::Node(i) => out.copy_from_slice(self.sample(i).0),
            Segment::Between(i) => {
                let (y, dy) = self.sample(i);
                let (y_next, dy_next) = self.sample(i + 1);
                let step = StepData {
                    t: self.ts[i],
                    h: self.ts[i + 1] - self.ts[i],
                    y,
                    dy,
                    y_next,
                    dy_next,
                    k: &[],
                };
                hermite_cubic(&step, step.theta(t), out.as_mut_slice());
            }
        }
        Ok(out)
    }

    /// Interpolated time derivative of the state at `t`
    pub fn evaluate_derivative(&self, t: f64) -> Result<DVector<f64>, InterpolationError> {
        let mut out = DVector::zeros(self.dim);
        match self.locate(t)? {
            Segment::Node(i) => out.copy_from_slice(self.sample(i).1),
            Segment::Between(i) => {
                let (y, dy) = self.sample(i);
                let (y_next, dy_next) = self.sample(i + 1);
                let h = self.ts[i + 1] - self.ts[i];
                let theta = (t - self.ts[i]) / h;
                let theta2 = theta * theta;
                let d00 = 6.0 * theta2 - 6.0 * theta;
                let d10 = 3.0 * theta2 - 4.0 * theta + 1.0;
                let d01 = -d00;
                let d11 = 3.0 * theta2 - 2.0 * theta;
                for (j, out_j) in out.iter_mut().enumerate() {
                    *out_j = (d00 * y[j] + d01 * y_next[j]) / h + d10 * dy[j] + d11 * dy_next[j];
                }
            }
        }
        Ok(out)
    }
}

enum Segment {
    Node(usize),
    Between(usize),
}

impl DenseOutput for HermiteSpline {
    fn push(&mut self, t: f64, y: &[f64], dy: &[f64]) {
        if self.ts.is_empty() {
            self.dim = y.len();
        }
        if y.len() != self.dim || dy.len() != self.dim {
            warn!(
                "ignoring sample at t = {t}: {}",
                InterpolationError::DimensionMismatch {
                    expected: self.dim,
                    got: y.len().max(dy.len()),
                }
            );
            return;
        }
        if let Some(last) = self.ts.last() {
            let in_order = match self.ts.len() {
                1 => t != *last,
                _ => self.direction() * (t - last) > 0.0,
            };
            if !in_order || t.is_nan() {
                warn!("ignoring duplicate or out of order sample at t = {t} (last at {last})");
                return;
            }
        }
        self.ts.push(t);
        self.ys.extend_from_slice(y);
        self.dys.extend_from_slice(dy);
    }
}
