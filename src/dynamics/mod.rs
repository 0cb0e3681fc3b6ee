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

use crate::linalg::Vector3;
use std::fmt;

/// A trait for right hand sides `dy/dt = f(y, t)` which can be integrated.
///
/// The integrators call `eom` with speculative states of rejected steps as well, so the
/// implementation must not rely on being called only along the accepted solution. Any closure
/// `FnMut(&[f64], f64, &mut [f64])` is a `Dynamics`.
pub trait Dynamics {
    /// Writes the time derivative of `y` at time `t` into `dy`, which has the length of `y`.
    fn eom(&mut self, y: &[f64], t: f64, dy: &mut [f64]);
}

impl<F> Dynamics for F
where
    F: FnMut(&[f64], f64, &mut [f64]),
{
    fn eom(&mut self, y: &[f64], t: f64, dy: &mut [f64]) {
        self(y, t, dy)
    }
}

/// Point mass gravity of a single body.
///
/// The first six components are the Cartesian position and velocity. Any extra component is
/// carried along with a zero derivative.
///
/// # Panics
/// `eom` panics if the state or its derivative has fewer than six components, or if they differ
/// in length.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TwoBody {
    /// Gravitational parameter
    pub mu: f64,
}

impl TwoBody {
    pub fn new(mu: f64) -> Self {
        Self { mu }
    }

    /// Two body dynamics of a unit gravitational parameter.
    pub fn canonical() -> Self {
        Self::new(1.0)
    }
}

impl fmt::Display for TwoBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "two body (mu = {})", self.mu)
    }
}

impl Dynamics for TwoBody {
    fn eom(&mut self, y: &[f64], _t: f64, dy: &mut [f64]) {
        debug_assert!(
            y.len() >= 6 && dy.len() == y.len(),
            "two body needs a state of at least six components, got {} and {}",
            y.len(),
            dy.len()
        );
        let radius = Vector3::new(y[0], y[1], y[2]);
        let body_acceleration = (-self.mu / radius.norm().powi(3)) * radius;
        dy[..3].copy_from_slice(&y[3..6]);
        dy[3..6].copy_from_slice(body_acceleration.as_slice());
        for d in dy.iter_mut().skip(6) {
            *d = 0.0;
        }
    }
}
