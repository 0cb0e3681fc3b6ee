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

use super::RK;

/// `BogackiShampine32` is a [Bogacki Shampine](https://en.wikipedia.org/wiki/Bogacki%E2%80%93Shampine_method)
/// integrator of order 3 with an embedded order 2 solution.
///
/// It is cheap per step, so it suits expensive dynamics at loose tolerances. Its free third order
/// interpolant is exactly the cubic Hermite interpolation of the step, hence the default
/// continuous extension is used.
pub struct BogackiShampine32 {}

impl RK for BogackiShampine32 {
    const ORDER: u8 = 3;
    const ERROR_ORDER: u8 = 2;
    const STAGES: usize = 4;
    const FSAL: bool = true;

    const A_COEFFS: &'static [f64] = &[
        1.0 / 2.0,
        0.0,
        3.0 / 4.0,
        2.0 / 9.0,
        1.0 / 3.0,
        4.0 / 9.0,
    ];

    const B_COEFFS: &'static [f64] = &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0, 0.0];

    const C_COEFFS: &'static [f64] = &[0.0, 1.0 / 2.0, 3.0 / 4.0, 1.0];

    const E_COEFFS: &'static [f64] = &[5.0 / 72.0, -1.0 / 12.0, -1.0 / 9.0, 1.0 / 8.0];
}
