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

use snafu::prelude::*;

/// Errors of the analytic two-body propagator.
#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TwoBodyError {
    /// Non-finite input, non-positive gravitational parameter or zero position vector.
    #[snafu(display("invalid two-body input: {reason}"))]
    InvalidInput { reason: String },
    /// The universal Kepler equation was not solved within the iteration cap.
    #[snafu(display(
        "Kepler equation did not converge after {iterations} iterations (residual {residual:e})"
    ))]
    KeplerNotConverged { iterations: usize, residual: f64 },
    /// The continued fraction of the universal functions did not settle.
    #[snafu(display("continued fraction did not converge in {terms} terms for q = {q}"))]
    ContinuedFraction { terms: usize, q: f64 },
}

/// Errors raised while locating an event within an accepted step.
#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EventError {
    #[snafu(display("{event} is not bracketed between t = {start} and t = {end}"))]
    NotBracketed { event: String, start: f64, end: f64 },
    #[snafu(display("Brent solver failed to converge on {event} after {iterations} iterations"))]
    MaxIterations { event: String, iterations: usize },
}

/// Errors of the dense output stores.
#[derive(Clone, Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InterpolationError {
    #[snafu(display("no interpolation data"))]
    NoInterpolationData,
    #[snafu(display("requested t = {t} outside of the interpolated range [{start}, {end}]"))]
    OutOfRange { t: f64, start: f64, end: f64 },
    #[snafu(display("expected a state of {expected} components but got {got}"))]
    DimensionMismatch { expected: usize, got: usize },
}
