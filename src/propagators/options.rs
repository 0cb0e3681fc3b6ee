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

use std::fmt;

use super::error_ctrl::{error_scale, ErrorCtrl};
use super::PropagationError;
use crate::io::ConfigRepr;
use serde_derive::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// PropOpts stores the integrator options, including the minimum and maximum step sizes, and the
/// error tolerances.
///
/// Different step sizes and tolerances are only used for adaptive stepping. To use a fixed step
/// integrator, initialize the options using `with_fixed_step`: the error estimate is then still
/// computed and reported, but never rejects a step.
#[derive(Clone, Copy, Debug, PartialEq, TypedBuilder, Serialize, Deserialize)]
#[builder(doc)]
#[serde(default)]
pub struct PropOpts {
    /// Smallest permitted step magnitude
    #[builder(default = 1e-15)]
    pub h_min: f64,
    /// Largest permitted step magnitude
    #[builder(default = f64::INFINITY)]
    pub h_max: f64,
    /// Initial step magnitude, estimated from the dynamics if unset
    #[builder(default, setter(strip_option))]
    pub h_start: Option<f64>,
    /// Maximum number of accepted steps
    #[builder(default = 100_000)]
    pub max_iter: usize,
    #[builder(default = 1e-9)]
    pub rtol: f64,
    #[builder(default = 1e-9)]
    pub atol: f64,
    /// Number of evenly spaced dense output intervals over the whole integration span, zero
    /// records every accepted step instead
    #[builder(default = 20)]
    pub interp_num: usize,
    /// Return an error when `max_iter` is reached, else stop and return the partial solution
    #[builder(default = true)]
    pub throw_on_max_iter: bool,
    /// Return an error when the error criterion cannot be met at `h_min`, else accept the step
    #[builder(default = true)]
    pub throw_on_min_step: bool,
    /// Maximum number of rejections of a single step
    #[builder(default = 50)]
    pub attempts: u8,
    #[builder(default)]
    pub error_ctrl: ErrorCtrl,
}

impl PropOpts {
    /// `with_adaptive_step` initializes a `PropOpts` such that the integrator is used with an
    ///  adaptive step size. The number of attempts is fixed to 50 (as in GMAT).
    pub fn with_adaptive_step(h_min: f64, h_max: f64, rtol: f64, atol: f64) -> Self {
        Self {
            h_min,
            h_max,
            rtol,
            atol,
            ..Default::default()
        }
    }

    /// `with_fixed_step` initializes a `PropOpts` such that the integrator is used with a fixed
    ///  step size.
    pub fn with_fixed_step(step: f64) -> Self {
        Self {
            h_min: step.abs(),
            h_max: step.abs(),
            h_start: Some(step.abs()),
            ..Default::default()
        }
    }

    /// Returns the default options with the same relative and absolute tolerance.
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            rtol: tolerance,
            atol: tolerance,
            ..Default::default()
        }
    }

    /// Returns a string with the information about these options
    pub fn info(&self) -> String {
        format!("{self}")
    }

    /// Set the maximum step size and sets the initial step to that value if currently greater
    pub fn set_max_step(&mut self, h_max: f64) {
        if let Some(h_start) = self.h_start {
            if h_start > h_max {
                self.h_start = Some(h_max);
            }
        }
        self.h_max = h_max;
    }

    /// Set the minimum step size and sets the initial step to that value if currently smaller
    pub fn set_min_step(&mut self, h_min: f64) {
        if let Some(h_start) = self.h_start {
            if h_start < h_min {
                self.h_start = Some(h_min);
            }
        }
        self.h_min = h_min;
    }

    /// Whether every step is taken at `h_min == h_max` without error control.
    pub fn is_fixed_step(&self) -> bool {
        self.h_min == self.h_max
    }

    /// Tolerance scale of a single component of the state.
    pub fn error_scale(&self, y_old: f64, y_new: f64) -> f64 {
        error_scale(self.atol, self.rtol, y_old, y_new)
    }

    /// Checks the consistency of these options.
    pub fn validate(&self) -> Result<(), PropagationError> {
        let reason = if !(self.rtol > 0.0 && self.rtol.is_finite()) {
            Some(format!("rtol must be positive, got {}", self.rtol))
        } else if !(self.atol > 0.0 && self.atol.is_finite()) {
            Some(format!("atol must be positive, got {}", self.atol))
        } else if !(self.h_min >= 0.0 && self.h_min.is_finite()) {
            Some(format!("h_min must be non-negative, got {}", self.h_min))
        } else if self.h_max.is_nan() || self.h_max <= 0.0 || self.h_max < self.h_min {
            Some(format!(
                "h_max must be positive and at least h_min, got {} < {}",
                self.h_max, self.h_min
            ))
        } else if self
            .h_start
            .is_some_and(|h| !h.is_finite() || h == 0.0)
        {
            Some(format!("h_start must be finite and nonzero, got {:?}", self.h_start))
        } else if self.attempts == 0 {
            Some("at least one attempt per step is required".to_string())
        } else {
            None
        };

        match reason {
            Some(reason) => Err(PropagationError::InvalidInput { reason }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for PropOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_fixed_step() {
            write!(f, "fixed step: {:e}", self.h_min)
        } else {
            write!(
                f,
                "h_min: {:e}, h_max: {:e}, rtol: {:e}, atol: {:e}, attempts: {}, error: {}",
                self.h_min, self.h_max, self.rtol, self.atol, self.attempts, self.error_ctrl
            )
        }
    }
}

impl Default for PropOpts {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ConfigRepr for PropOpts {}

#[test]
fn test_options() {
    let opts = PropOpts::with_fixed_step(1e-1);
    assert_eq!(opts.h_min, 1e-1);
    assert_eq!(opts.h_max, 1e-1);
    assert_eq!(opts.h_start, Some(1e-1));
    assert!(opts.is_fixed_step());
    assert!(opts.validate().is_ok());

    let opts = PropOpts::with_adaptive_step(1e-2, 10.0, 1e-12, 1e-10);
    assert_eq!(opts.h_min, 1e-2);
    assert_eq!(opts.h_max, 10.0);
    assert!((opts.rtol - 1e-12).abs() < f64::EPSILON);
    assert!((opts.atol - 1e-10).abs() < f64::EPSILON);
    assert!(!opts.is_fixed_step());

    let opts = PropOpts::default();
    assert_eq!(opts.h_min, 1e-15);
    assert_eq!(opts.h_max, f64::INFINITY);
    assert_eq!(opts.h_start, None);
    assert_eq!(opts.max_iter, 100_000);
    assert_eq!(opts.interp_num, 20);
    assert_eq!(opts.attempts, 50);
    assert!(opts.throw_on_max_iter);
    assert!(opts.throw_on_min_step);
    assert_eq!(opts.error_ctrl, ErrorCtrl::RmsNorm);
    assert!(!opts.is_fixed_step());

    let mut opts = PropOpts::builder().h_start(10.0).rtol(1e-6).build();
    assert_eq!(opts.h_start, Some(10.0));
    opts.set_max_step(1.0);
    assert_eq!(opts.h_start, Some(1.0));
    assert_eq!(opts.h_max, 1.0);
    opts.set_min_step(2.0);
    assert_eq!(opts.h_start, Some(2.0));
    // h_max < h_min now
    assert!(opts.validate().is_err());

    let opts = PropOpts::with_tolerance(0.0);
    assert!(matches!(
        opts.validate(),
        Err(PropagationError::InvalidInput { .. })
    ));
    assert!(PropOpts::with_tolerance(1e-12).validate().is_ok());
    assert!(format!("{}", PropOpts::with_fixed_step(0.5)).contains("fixed step"));
}
