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

use super::PropOpts;
use crate::dynamics::Dynamics;
use crate::pool::Buffer;

/// Safety factor applied to every step size proposal
pub const SAFETY: f64 = 0.84;
/// Smallest ratio between two consecutive step sizes
pub const MIN_FACTOR: f64 = 0.1;
/// Largest ratio between two consecutive step sizes
pub const MAX_FACTOR: f64 = 4.0;

/// Initial step size magnitude from two evaluations of the dynamics, as in Hairer's codes.
///
/// The first guess is built from the magnitude of the state and its derivative, then an explicit
/// Euler step of that size provides an estimate of the second derivative, from which the step of
/// a scheme of order `order` meeting the tolerances follows. The result is at most `h_max`.
/// Uses `y1` and `dy1` as scratch space.
#[allow(clippy::too_many_arguments)]
pub fn initial_step<D: Dynamics>(
    f: &mut D,
    t0: f64,
    y0: &[f64],
    dy0: &[f64],
    direction: f64,
    order: u8,
    h_max: f64,
    opts: &PropOpts,
    y1: &mut Buffer,
    dy1: &mut Buffer,
) -> f64 {
    let (mut dnf, mut dny) = (0.0, 0.0);
    for (y_i, dy_i) in y0.iter().zip(dy0) {
        let sk = opts.error_scale(*y_i, *y_i);
        dnf += (dy_i / sk) * (dy_i / sk);
        dny += (y_i / sk) * (y_i / sk);
    }

    let mut h = if dnf <= 1e-10 || dny <= 1e-10 {
        1e-6
    } else {
        (dny / dnf).sqrt() * 0.01
    };
    h = h.min(h_max);

    // Explicit Euler step
    y1.assign(y0).add_scaled(direction * h, dy0);
    f.eom(y1, t0 + direction * h, dy1);

    // Estimate of the second derivative
    let mut der2 = 0.0;
    for ((dy1_i, dy0_i), y_i) in dy1.iter().zip(dy0).zip(y0) {
        let sk = opts.error_scale(*y_i, *y_i);
        der2 += ((dy1_i - dy0_i) / sk).powi(2);
    }
    der2 = der2.sqrt() / h;

    let der12 = der2.max(dnf.sqrt());
    let h1 = if der12 <= 1e-15 {
        (h * 1e-3).max(1e-6)
    } else {
        (0.01 / der12).powf(1.0 / f64::from(order))
    };

    let h0 = (100.0 * h).min(h1).min(h_max);
    if h0.is_finite() && h0 > 0.0 {
        h0
    } else {
        // Non-finite dynamics at the Euler step: let the step loop report it
        h
    }
}

/// Proportional integral step size controller.
///
/// The exponents follow from the order of the embedded solution `q`: a rejected step is shrunk
/// by `SAFETY * err^(-1/(q+1))` and an accepted one is scaled by
/// `SAFETY * err^(-0.7/(q+1)) * err_prev^(0.4/(q+1))`. Both factors are kept within
/// `[MIN_FACTOR, MAX_FACTOR]`, and the step is not allowed to grow right after a rejection.
///
/// Note that `q` is the embedded order and not the order `p` of the propagated solution, so the
/// exponent is `1/(q+1)` rather than `1/(p+1)`. The error estimate is the local error of the
/// embedded solution, which scales as `h^(q+1)`; Hairer's DOPRI5 and DOP853 make the same choice.
#[derive(Copy, Clone, Debug)]
pub struct StepController {
    /// `1 / (q + 1)`
    expo: f64,
    alpha: f64,
    beta: f64,
    err_prev: f64,
    rejected: bool,
}

impl StepController {
    pub fn new(error_order: u8) -> Self {
        let expo = 1.0 / (f64::from(error_order) + 1.0);
        Self {
            expo,
            alpha: 0.7 * expo,
            beta: 0.4 * expo,
            err_prev: 1e-4,
            rejected: false,
        }
    }

    /// Step size ratio after a rejected step of error norm `error > 1`.
    pub fn reject(&mut self, error: f64) -> f64 {
        self.rejected = true;
        (SAFETY * error.powf(-self.expo)).clamp(MIN_FACTOR, MAX_FACTOR)
    }

    /// Step size ratio after an accepted step of error norm `error`.
    pub fn accept(&mut self, error: f64) -> f64 {
        let mut factor = if error <= 0.0 {
            MAX_FACTOR
        } else {
            (SAFETY * error.powf(-self.alpha) * self.err_prev.powf(self.beta))
                .clamp(MIN_FACTOR, MAX_FACTOR)
        };
        if self.rejected {
            factor = factor.min(1.0);
        }
        self.err_prev = error.max(1e-4);
        self.rejected = false;
        factor
    }
}
