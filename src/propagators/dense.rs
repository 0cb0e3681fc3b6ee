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

use crate::pool::Buffer;

/// A sink for the dense output of an integration.
///
/// Samples are pushed in integration order, i.e. with decreasing time when integrating backward.
pub trait DenseOutput {
    fn push(&mut self, t: f64, y: &[f64], dy: &[f64]);
}

impl DenseOutput for Vec<(f64, Vec<f64>, Vec<f64>)> {
    fn push(&mut self, t: f64, y: &[f64], dy: &[f64]) {
        Vec::push(self, (t, y.to_vec(), dy.to_vec()));
    }
}

/// Everything known about the last accepted step, from which its continuous extension is built.
#[derive(Debug)]
pub struct StepData<'a> {
    /// Time at the start of the step
    pub t: f64,
    /// Signed step size
    pub h: f64,
    pub y: &'a [f64],
    pub dy: &'a [f64],
    pub y_next: &'a [f64],
    pub dy_next: &'a [f64],
    /// Stage derivatives, followed by the extra stages of the continuous extension if any
    pub k: &'a [Buffer],
}

impl StepData<'_> {
    /// Time at the end of the step
    pub fn t_next(&self) -> f64 {
        self.t + self.h
    }

    /// Normalized position of `t` within the step.
    pub fn theta(&self, t: f64) -> f64 {
        (t - self.t) / self.h
    }
}

/// Cubic Hermite interpolation over the step from both end states and derivatives.
///
/// This is third order accurate only, independently of the order of the scheme which produced the step.
pub fn hermite_cubic(step: &StepData, theta: f64, out: &mut [f64]) {
    let h = step.h;
    let theta2 = theta * theta;
    let theta3 = theta2 * theta;
    let h00 = 2.0 * theta3 - 3.0 * theta2 + 1.0;
    let h10 = theta3 - 2.0 * theta2 + theta;
    let h01 = -2.0 * theta3 + 3.0 * theta2;
    let h11 = theta3 - theta2;
    for (i, out_i) in out.iter_mut().enumerate() {
        *out_i = h00 * step.y[i]
            + h10 * h * step.dy[i]
            + h01 * step.y_next[i]
            + h11 * h * step.dy_next[i];
    }
}
