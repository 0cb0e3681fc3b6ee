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

use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Aggregation of the component wise scaled error estimates into a single error norm.
///
/// Each component of the embedded error estimate is first divided by
/// `atol + rtol * max(|y_old|, |y_new|)`, see [`scaled_error`]. A step is accepted when the
/// aggregated norm is at most one.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCtrl {
    /// Root mean square of the scaled errors, as in Hairer's codes. When in doubt, use this one.
    #[default]
    RmsNorm,
    /// Largest scaled error of all components: more stringent, especially for large states.
    LargestError,
}

/// Tolerance scale of a single component.
pub fn error_scale(atol: f64, rtol: f64, y_old: f64, y_new: f64) -> f64 {
    atol + rtol * y_old.abs().max(y_new.abs())
}

/// Scaled error of a single component.
pub fn scaled_error(err: f64, atol: f64, rtol: f64, y_old: f64, y_new: f64) -> f64 {
    err / error_scale(atol, rtol, y_old, y_new)
}

impl ErrorCtrl {
    /// Aggregates the already scaled component errors.
    pub fn norm<I>(self, scaled: I) -> f64
    where
        I: IntoIterator<Item = f64>,
    {
        match self {
            Self::RmsNorm => {
                let (sum_sq, n) = scaled
                    .into_iter()
                    .fold((0.0, 0usize), |(acc, n), e| (acc + e * e, n + 1));
                if n == 0 {
                    0.0
                } else {
                    (sum_sq / n as f64).sqrt()
                }
            }
            Self::LargestError => scaled
                .into_iter()
                .fold(0.0_f64, |max_err, e| if e.abs() > max_err || e.is_nan() {
                    e.abs()
                } else {
                    max_err
                }),
        }
    }
}

impl fmt::Display for ErrorCtrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RmsNorm => write!(f, "RMS norm"),
            Self::LargestError => write!(f, "largest error"),
        }
    }
}
