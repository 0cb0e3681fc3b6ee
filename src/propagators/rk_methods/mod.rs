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

mod bogacki;
pub use self::bogacki::*;
mod dormand;
pub use self::dormand::*;
mod tsitouras;
pub use self::tsitouras::*;

use super::dense::{hermite_cubic, StepData};
use super::error_ctrl::scaled_error;
use super::PropOpts;
use crate::dynamics::Dynamics;
use crate::pool::Buffer;
use enum_iterator::Sequence;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// The `RK` trait defines an embedded Runge Kutta integrator.
#[allow(clippy::upper_case_acronyms)]
pub trait RK
where
    Self: Sized,
{
    /// Order of the propagated solution.
    const ORDER: u8;

    /// Order of the embedded solution used for the error estimate. The step size controller
    /// exponents use `ERROR_ORDER + 1`.
    const ERROR_ORDER: u8;

    /// Number of stages (as usize because it's used as indexing).
    const STAGES: usize;

    /// First Same As Last: the last stage is evaluated at the new state, so it is the derivative
    /// at the start of the next step.
    const FSAL: bool;

    /// Strictly lower triangular part of the A matrix of the Butcher table, row by row, so
    /// `A_COEFFS.len() == STAGES * (STAGES - 1) / 2`. Row `i` starts at `i * (i - 1) / 2`.
    const A_COEFFS: &'static [f64];

    /// Weights of the propagated solution, one per stage.
    const B_COEFFS: &'static [f64];

    /// Nodes of the stages, one per stage.
    const C_COEFFS: &'static [f64];

    /// Difference between the weights of the propagated and embedded solutions, one per stage.
    const E_COEFFS: &'static [f64];

    /// Order of the continuous extension of a step.
    const DENSE_ORDER: u8 = 3;

    /// Number of additional stage buffers needed by the continuous extension.
    const DENSE_STAGES: usize = 0;

    /// Scaled error norm of a step of size `h` (signed) from `y` to `y_next`, where `k` holds the
    /// stage derivatives.
    fn error_norm(h: f64, k: &[Buffer], y: &[f64], y_next: &[f64], opts: &PropOpts) -> f64 {
        let scaled = y
            .iter()
            .zip(y_next)
            .enumerate()
            .map(|(i, (y_i, y_next_i))| {
                let err: f64 = Self::E_COEFFS
                    .iter()
                    .zip(k)
                    .map(|(e_j, k_j)| e_j * k_j[i])
                    .sum();
                scaled_error(h * err, opts.atol, opts.rtol, *y_i, *y_next_i)
            });
        opts.error_ctrl.norm(scaled)
    }

    /// Computes the additional stages needed by `interpolate` once a step is accepted, and
    /// returns the number of evaluations of the dynamics this required.
    #[allow(clippy::too_many_arguments)]
    fn prepare_dense<D: Dynamics>(
        _f: &mut D,
        _t: f64,
        _h: f64,
        _y: &[f64],
        _dy_next: &[f64],
        _k: &mut [Buffer],
        _y_tmp: &mut Buffer,
    ) -> usize {
        0
    }

    /// Evaluates the continuous extension of the step at `theta` in `[0, 1]`.
    ///
    /// Defaults to a cubic Hermite interpolation from the end states and derivatives.
    fn interpolate(step: &StepData, theta: f64, out: &mut [f64]) {
        hermite_cubic(step, theta, out)
    }
}

/// All of the available integration schemes.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Sequence, Serialize, Deserialize,
)]
pub enum Scheme {
    /// Bogacki Shampine 3(2), four stages with FSAL
    #[serde(alias = "BS3")]
    BogackiShampine32,
    /// Dormand Prince 5(4), seven stages with FSAL
    #[default]
    #[serde(alias = "DP5")]
    DormandPrince54,
    /// Tsitouras 5(4), seven stages with FSAL
    #[serde(alias = "Tsit5")]
    Tsitouras54,
    /// Dormand Prince 8(5,3), twelve stages
    #[serde(alias = "DP8")]
    DormandPrince853,
}

impl Scheme {
    pub fn order(&self) -> u8 {
        match self {
            Self::BogackiShampine32 => BogackiShampine32::ORDER,
            Self::DormandPrince54 => DormandPrince54::ORDER,
            Self::Tsitouras54 => Tsitouras54::ORDER,
            Self::DormandPrince853 => DormandPrince853::ORDER,
        }
    }

    pub fn error_order(&self) -> u8 {
        match self {
            Self::BogackiShampine32 => BogackiShampine32::ERROR_ORDER,
            Self::DormandPrince54 => DormandPrince54::ERROR_ORDER,
            Self::Tsitouras54 => Tsitouras54::ERROR_ORDER,
            Self::DormandPrince853 => DormandPrince853::ERROR_ORDER,
        }
    }

    pub fn stages(&self) -> usize {
        match self {
            Self::BogackiShampine32 => BogackiShampine32::STAGES,
            Self::DormandPrince54 => DormandPrince54::STAGES,
            Self::Tsitouras54 => Tsitouras54::STAGES,
            Self::DormandPrince853 => DormandPrince853::STAGES,
        }
    }

    pub fn dense_order(&self) -> u8 {
        match self {
            Self::BogackiShampine32 => BogackiShampine32::DENSE_ORDER,
            Self::DormandPrince54 => DormandPrince54::DENSE_ORDER,
            Self::Tsitouras54 => Tsitouras54::DENSE_ORDER,
            Self::DormandPrince853 => DormandPrince853::DENSE_ORDER,
        }
    }

    pub fn fsal(&self) -> bool {
        match self {
            Self::BogackiShampine32 => BogackiShampine32::FSAL,
            Self::DormandPrince54 => DormandPrince54::FSAL,
            Self::Tsitouras54 => Tsitouras54::FSAL,
            Self::DormandPrince853 => DormandPrince853::FSAL,
        }
    }

    /// Short name of this scheme
    pub fn name(&self) -> &'static str {
        match self {
            Self::BogackiShampine32 => "BS3",
            Self::DormandPrince54 => "DP5",
            Self::Tsitouras54 => "Tsit5",
            Self::DormandPrince853 => "DP8",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (order {})", self.name(), self.order())
    }
}
