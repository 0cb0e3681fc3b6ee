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
use crate::propagators::dense::StepData;

/// `Tsitouras54` is the order 5 integrator with an embedded order 4 solution of
/// Ch. Tsitouras, "Runge–Kutta pairs of order 5(4) satisfying only the first column simplifying
/// assumption", Computers & Mathematics with Applications, 2011.
///
/// Its coefficients are better conditioned than those of Dormand Prince and it comes with a free
/// fourth order interpolant.
pub struct Tsitouras54 {}

impl Tsitouras54 {
    /// Weights of the stages of the continuous extension at `theta`.
    fn dense_weights(theta: f64) -> [f64; 7] {
        let theta2 = theta * theta;
        [
            -1.053_088_497_729_021_6
                * theta
                * (theta - 1.329_989_018_975_141_2)
                * (theta2 - 1.436_402_854_171_635_1 * theta + 0.713_981_691_707_420_9),
            0.1017 * theta2 * (theta2 - 2.196_656_833_824_975_4 * theta + 1.294_985_250_737_463_1),
            2.490_627_285_651_252_793
                * theta2
                * (theta2 - 2.385_356_454_720_616_57 * theta + 1.578_034_682_080_924_86),
            -16.548_102_889_244_902_72
                * (theta - 1.217_129_272_955_332_44)
                * (theta - 0.616_204_060_378_000_89)
                * theta2,
            47.379_521_962_819_281_22
                * (theta - 1.203_071_208_372_362_603)
                * (theta - 0.658_047_292_653_547_382)
                * theta2,
            -34.870_657_861_496_609_74 * (theta - 1.2) * (theta - 0.666_666_666_666_666_667) * theta2,
            2.5 * (theta - 1.0) * (theta - 0.6) * theta2,
        ]
    }
}

impl RK for Tsitouras54 {
    const ORDER: u8 = 5;
    const ERROR_ORDER: u8 = 4;
    const STAGES: usize = 7;
    const FSAL: bool = true;
    const DENSE_ORDER: u8 = 4;

    const A_COEFFS: &'static [f64] = &[
        0.161,
        -0.008_480_655_492_356_989,
        0.335_480_655_492_357,
        2.897_153_057_105_493,
        -6.359_448_489_975_075,
        4.362_295_432_869_581_5,
        5.325_864_828_439_257,
        -11.748_883_564_062_828,
        7.495_539_342_889_836_5,
        -0.092_495_066_361_755_25,
        5.861_455_442_946_42,
        -12.920_969_317_847_11,
        8.159_367_898_576_159,
        -0.071_584_973_281_401,
        -0.028_269_050_394_068_383,
        0.096_460_766_818_065_23,
        0.01,
        0.479_889_650_414_499_6,
        1.379_008_574_103_742,
        -3.290_069_515_436_081,
        2.324_710_524_099_774,
    ];

    const B_COEFFS: &'static [f64] = &[
        0.096_460_766_818_065_23,
        0.01,
        0.479_889_650_414_499_6,
        1.379_008_574_103_742,
        -3.290_069_515_436_081,
        2.324_710_524_099_774,
        0.0,
    ];

    const C_COEFFS: &'static [f64] = &[0.0, 0.161, 0.327, 0.9, 0.980_025_540_904_509_7, 1.0, 1.0];

    const E_COEFFS: &'static [f64] = &[
        -0.001_780_011_052_225_777_14,
        -0.000_816_434_459_656_746_9,
        0.007_880_878_010_261_995,
        -0.144_711_007_173_262_9,
        0.582_357_165_452_555_2,
        -0.458_082_105_929_186_97,
        1.0 / 66.0,
    ];

    fn interpolate(step: &StepData, theta: f64, out: &mut [f64]) {
        let weights = Self::dense_weights(theta);
        for (i, out_i) in out.iter_mut().enumerate() {
            let incr: f64 = weights
                .iter()
                .zip(step.k)
                .map(|(w_j, k_j)| w_j * k_j[i])
                .sum();
            *out_i = step.y[i] + step.h * incr;
        }
    }
}
