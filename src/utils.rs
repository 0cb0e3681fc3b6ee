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

use crate::linalg::{Matrix3, Vector3};

/// Returns whether all of the provided values are finite.
pub fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|x| x.is_finite())
}

/// Returns the tilde matrix from the provided Vector3, such that `tilde_matrix(a) * b` is `a × b`.
pub fn tilde_matrix(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0,
        -v[2],
        v[1],
        v[2],
        0.0,
        -v[0],
        -v[1],
        v[0],
        0.0,
    )
}

/// Specific orbital energy of the two body problem, constant along a Keplerian arc.
pub fn specific_energy(mu: f64, r: &Vector3<f64>, v: &Vector3<f64>) -> f64 {
    0.5 * v.norm_squared() - mu / r.norm()
}

/// Specific angular momentum, constant along a Keplerian arc.
pub fn angular_momentum(r: &Vector3<f64>, v: &Vector3<f64>) -> Vector3<f64> {
    tilde_matrix(r) * v
}

/// Splits a Cartesian state of six components into its position and velocity.
///
/// Only the first six components are used, so the state may be followed by other variables
/// (e.g. a flattened STM).
pub fn split_state(y: &[f64]) -> (Vector3<f64>, Vector3<f64>) {
    (
        Vector3::new(y[0], y[1], y[2]),
        Vector3::new(y[3], y[4], y[5]),
    )
}
