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
use crate::dynamics::Dynamics;
use crate::pool::Buffer;
use crate::propagators::dense::StepData;
use crate::propagators::error_ctrl::scaled_error;
use crate::propagators::{ErrorCtrl, PropOpts};

/// `DormandPrince54` is a [Dormand-Prince integrator](https://en.wikipedia.org/wiki/Dormand%E2%80%93Prince_method)
/// of order 5 with an embedded order 4 solution, and Hairer's fourth order continuous extension.
pub struct DormandPrince54 {}

/// Coefficients of the continuous extension of `DormandPrince54`, applied to the stages.
const DP5_DENSE: [f64; 7] = [
    -12_715_105_075.0 / 11_282_082_432.0,
    0.0,
    87_487_479_700.0 / 32_700_410_799.0,
    -10_690_763_975.0 / 1_880_347_072.0,
    701_980_252_875.0 / 199_316_789_632.0,
    -1_453_857_185.0 / 822_651_844.0,
    69_997_945.0 / 29_380_423.0,
];

impl RK for DormandPrince54 {
    const ORDER: u8 = 5;
    const ERROR_ORDER: u8 = 4;
    const STAGES: usize = 7;
    const FSAL: bool = true;
    const DENSE_ORDER: u8 = 4;

    const A_COEFFS: &'static [f64] = &[
        1.0 / 5.0,
        3.0 / 40.0,
        9.0 / 40.0,
        44.0 / 45.0,
        -56.0 / 15.0,
        32.0 / 9.0,
        19_372.0 / 6_561.0,
        -25_360.0 / 2_187.0,
        64_448.0 / 6_561.0,
        -212.0 / 729.0,
        9_017.0 / 3_168.0,
        -355.0 / 33.0,
        46_732.0 / 5_247.0,
        49.0 / 176.0,
        -5_103.0 / 18_656.0,
        35.0 / 384.0,
        0.0,
        500.0 / 1_113.0,
        125.0 / 192.0,
        -2_187.0 / 6_784.0,
        11.0 / 84.0,
    ];

    const B_COEFFS: &'static [f64] = &[
        35.0 / 384.0,
        0.0,
        500.0 / 1_113.0,
        125.0 / 192.0,
        -2_187.0 / 6_784.0,
        11.0 / 84.0,
        0.0,
    ];

    const C_COEFFS: &'static [f64] = &[0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];

    const E_COEFFS: &'static [f64] = &[
        71.0 / 57_600.0,
        0.0,
        -71.0 / 16_695.0,
        71.0 / 1_920.0,
        -17_253.0 / 339_200.0,
        22.0 / 525.0,
        -1.0 / 40.0,
    ];

    fn interpolate(step: &StepData, theta: f64, out: &mut [f64]) {
        let h = step.h;
        let theta1 = 1.0 - theta;
        for (i, out_i) in out.iter_mut().enumerate() {
            let ydiff = step.y_next[i] - step.y[i];
            let bspl = h * step.dy[i] - ydiff;
            let c3 = ydiff - h * step.dy_next[i] - bspl;
            let c4 = h * DP5_DENSE
                .iter()
                .zip(step.k)
                .map(|(d_j, k_j)| d_j * k_j[i])
                .sum::<f64>();
            *out_i = step.y[i] + theta * (ydiff + theta1 * (bspl + theta * (c3 + theta1 * c4)));
        }
    }
}

/// `DormandPrince853` is the twelve stage, eighth order Dormand Prince integrator of Hairer's
/// `DOP853`, with its seventh order continuous extension.
///
/// The error estimate combines the embedded fifth and third order solutions, which behaves as a
/// seventh order estimate for the step size control. The continuous extension needs the
/// derivative at the new state and three more evaluations of the dynamics, which are only computed
/// for the steps which are actually interpolated.
pub struct DormandPrince853 {}

impl DormandPrince853 {
    /// Difference between the eighth order weights and the embedded third order ones.
    pub const E3_COEFFS: [f64; 12] = [
        5.42937341165687622380535766363e-2 - 0.244094488188976377952755905512e+00,
        0.0,
        0.0,
        0.0,
        0.0,
        4.45031289275240888144113950566e0,
        1.89151789931450038304281599044e0,
        -5.8012039600105847814672114227e0,
        3.1116436695781989440891606237e-1 - 0.733846688281611857341361741547e+00,
        -1.52160949662516078556178806805e-1,
        2.01365400804030348374776537501e-1,
        4.47106157277725905176885569043e-2 - 0.220588235294117647058823529412e-01,
    ];

    /// Nodes of the three extra stages of the continuous extension.
    const C_DENSE: [f64; 3] = [0.1, 0.2, 7.0 / 9.0];
}

// Rows of the extra stages 14 to 16, applied to stages 1 to 13, where stage 13 is the
// derivative at the new state.
const A14: [f64; 13] = [
    5.61675022830479523392909219681e-2,
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    2.53500210216624811088794765333e-1,
    -2.46239037470802489917441475441e-1,
    -1.24191423263816360469010140626e-1,
    1.5329179827876569731206322685e-1,
    8.20105229563468988491666602057e-3,
    7.56789766054569976138603589584e-3,
    -8.298e-3,
];

const A15: [f64; 14] = [
    3.18346481635021405060768473261e-2,
    0.0,
    0.0,
    0.0,
    0.0,
    2.83009096723667755288322961402e-2,
    5.35419883074385676223797384372e-2,
    -5.49237485713909884646569340306e-2,
    0.0,
    0.0,
    -1.08347328697249322858509316994e-4,
    3.82571090835658412954920192323e-4,
    -3.40465008687404560802977114492e-4,
    1.41312443674632500278074618366e-1,
];

const A16: [f64; 15] = [
    -4.28896301583791923408573538692e-1,
    0.0,
    0.0,
    0.0,
    0.0,
    -4.69762141536116384314449447206e0,
    7.68342119606259904184240953878e0,
    4.06898981839711007970213554331e0,
    3.56727187455281109270669543021e-1,
    0.0,
    0.0,
    0.0,
    -1.39902416515901462129418009734e-3,
    2.9475147891527723389556272149e0,
    -9.15095847217987001081870187138e0,
];

/// Coefficients of the four highest order terms of the continuous extension, applied to stages 1 to 16.
const DP8_DENSE: [[f64; 16]; 4] = [
    [
        -0.84289382761090128651353491142e+01,
        0.0,
        0.0,
        0.0,
        0.0,
        0.56671495351937776962531783590e+00,
        -0.30689499459498916912797304727e+01,
        0.23846676565120698287728149680e+01,
        0.21170345824450282767155149946e+01,
        -0.87139158377797299206789907490e+00,
        0.22404374302607882758541771650e+01,
        0.63157877876946881815570249290e+00,
        -0.88990336451333310820698117400e-01,
        0.18148505520854727256656404962e+02,
        -0.91946323924783554000451984436e+01,
        -0.44360363875948939664310572000e+01,
    ],
    [
        0.10427508642579134603413151009e+02,
        0.0,
        0.0,
        0.0,
        0.0,
        0.24228349177525818288430175319e+03,
        0.16520045171727028198505394887e+03,
        -0.37454675472269020279518312152e+03,
        -0.22113666853125306036270938578e+02,
        0.77334326684722638389603898808e+01,
        -0.30674084731089398182061213626e+02,
        -0.93321305264302278729567221706e+01,
        0.15697238121770843886131091075e+02,
        -0.31139403219565177677282850411e+02,
        -0.93529243588444783865713862664e+01,
        0.35816841486394083752465898540e+02,
    ],
    [
        0.19985053242002433820987653617e+02,
        0.0,
        0.0,
        0.0,
        0.0,
        -0.38703730874935176555105901742e+03,
        -0.18917813819516756882830838328e+03,
        0.52780815920542364900561016686e+03,
        -0.11573902539959630126141871134e+02,
        0.68812326946963000169666922661e+01,
        -0.10006050966910838403183860980e+01,
        0.77771377980534432092869265740e+00,
        -0.27782057523535084065932004339e+01,
        -0.60196695231264120758267380846e+02,
        0.84320405506677161018159903784e+02,
        0.11992291136182789328035130030e+02,
    ],
    [
        -0.25693933462703749003312586129e+02,
        0.0,
        0.0,
        0.0,
        0.0,
        -0.15418974869023643374053993627e+03,
        -0.23152937917604549567536039109e+03,
        0.35763911791061412378285349910e+03,
        0.93405324183624310003907691704e+02,
        -0.37458323136451633156875139351e+02,
        0.10409964950896230045147246184e+03,
        0.29840293426660503123344363579e+02,
        -0.43533456590011143754432175058e+02,
        0.96324553959188282948394950600e+02,
        -0.39177261675615439165231486172e+02,
        -0.14972683625798562581422125276e+03,
    ],
];

impl RK for DormandPrince853 {
    const ORDER: u8 = 8;
    const ERROR_ORDER: u8 = 7;
    const STAGES: usize = 12;
    const FSAL: bool = false;
    const DENSE_ORDER: u8 = 7;
    const DENSE_STAGES: usize = 4;

    const A_COEFFS: &'static [f64] = &[
        // Stage 2
        5.26001519587677318785587544488e-2,
        // Stage 3
        1.97250569845378994544595329183e-2,
        5.91751709536136983633785987549e-2,
        // Stage 4
        2.95875854768068491816892993775e-2,
        0.0,
        8.87627564304205475450678981324e-2,
        // Stage 5
        2.41365134159266685502369798665e-1,
        0.0,
        -8.84549479328286085344864962717e-1,
        9.24834003261792003115737966543e-1,
        // Stage 6
        3.7037037037037037037037037037e-2,
        0.0,
        0.0,
        1.70828608729473871279604482173e-1,
        1.25467687566822425016691814123e-1,
        // Stage 7
        3.7109375e-2,
        0.0,
        0.0,
        1.70252211019544039314978060272e-1,
        6.02165389804559606850219397283e-2,
        -1.7578125e-2,
        // Stage 8
        3.70920001185047927108779319836e-2,
        0.0,
        0.0,
        1.70383925712239993810214054705e-1,
        1.07262030446373284651809199168e-1,
        -1.53194377486244017527936158236e-2,
        8.27378916381402288758473766002e-3,
        // Stage 9
        6.24110958716075717114429577812e-1,
        0.0,
        0.0,
        -3.36089262944694129406857109825e0,
        -8.68219346841726006818189891453e-1,
        2.75920996994467083049415600797e1,
        2.01540675504778934086186788979e1,
        -4.34898841810699588477366255144e1,
        // Stage 10
        4.77662536438264365890433908527e-1,
        0.0,
        0.0,
        -2.48811461997166764192642586468e0,
        -5.90290826836842996371446475743e-1,
        2.12300514481811942347288949897e1,
        1.52792336328824235832596922938e1,
        -3.32882109689848629194453265587e1,
        -2.03312017085086261358222928593e-2,
        // Stage 11
        -9.3714243008598732571704021658e-1,
        0.0,
        0.0,
        5.18637242884406370830023853209e0,
        1.09143734899672957818500254654e0,
        -8.14978701074692612513997267357e0,
        -1.85200656599969598641566180701e1,
        2.27394870993505042818970056734e1,
        2.49360555267965238987089396762e0,
        -3.0467644718982195003823669022e0,
        // Stage 12
        2.27331014751653820792359768449e0,
        0.0,
        0.0,
        -1.05344954667372501984066689879e1,
        -2.00087205822486249909675718444e0,
        -1.79589318631187989172765950534e1,
        2.79488845294199600508499808837e1,
        -2.85899827713502369474065508674e0,
        -8.87285693353062954433549289258e0,
        1.23605671757943030647266201528e1,
        6.43392746015763530355970484046e-1,
    ];

    const B_COEFFS: &'static [f64] = &[
        5.42937341165687622380535766363e-2,
        0.0,
        0.0,
        0.0,
        0.0,
        4.45031289275240888144113950566e0,
        1.89151789931450038304281599044e0,
        -5.8012039600105847814672114227e0,
        3.1116436695781989440891606237e-1,
        -1.52160949662516078556178806805e-1,
        2.01365400804030348374776537501e-1,
        4.47106157277725905176885569043e-2,
    ];

    const C_COEFFS: &'static [f64] = &[
        0.0,
        0.526001519587677318785587544488e-01,
        0.789002279381515978178381316732e-01,
        0.118350341907227396726757197510e+00,
        0.281649658092772603273242802490e+00,
        0.333333333333333333333333333333e+00,
        0.25e+00,
        0.307692307692307692307692307692e+00,
        0.651282051282051282051282051282e+00,
        0.6e+00,
        0.857142857142857142857142857142e+00,
        1.0,
    ];

    /// Difference between the eighth order weights and the embedded fifth order ones.
    const E_COEFFS: &'static [f64] = &[
        0.1312004499419488073250102996e-01,
        0.0,
        0.0,
        0.0,
        0.0,
        -0.1225156446376204440720569753e+01,
        -0.4957589496572501915214079952e+00,
        0.1664377182454986536961530415e+01,
        -0.3503288487499736816886487290e+00,
        0.3341791187130174790297318841e+00,
        0.8192320648511571246570742613e-01,
        -0.2235530786388629525884427845e-01,
    ];

    fn error_norm(h: f64, k: &[Buffer], y: &[f64], y_next: &[f64], opts: &PropOpts) -> f64 {
        let n = y.len();
        if n == 0 {
            return 0.0;
        }
        let scaled = (0..n).map(|i| {
            let (mut err5, mut err3) = (0.0, 0.0);
            for (j, k_j) in k.iter().take(Self::STAGES).enumerate() {
                err5 += Self::E_COEFFS[j] * k_j[i];
                err3 += Self::E3_COEFFS[j] * k_j[i];
            }
            (
                scaled_error(err5, opts.atol, opts.rtol, y[i], y_next[i]),
                scaled_error(err3, opts.atol, opts.rtol, y[i], y_next[i]),
            )
        });
        let (err5, err3, count) = match opts.error_ctrl {
            ErrorCtrl::RmsNorm => {
                let (e5, e3) = scaled.fold((0.0, 0.0), |(e5, e3), (s5, s3)| {
                    (e5 + s5 * s5, e3 + s3 * s3)
                });
                (e5, e3, n as f64)
            }
            ErrorCtrl::LargestError => {
                let (e5, e3) = scaled.fold((0.0_f64, 0.0_f64), |(e5, e3), (s5, s3)| {
                    (e5.max(s5.abs()), e3.max(s3.abs()))
                });
                (e5 * e5, e3 * e3, 1.0)
            }
        };
        let mut deno = err5 + 0.01 * err3;
        if deno <= 0.0 {
            deno = 1.0;
        }
        h.abs() * err5 / (count * deno).sqrt()
    }

    fn prepare_dense<D: Dynamics>(
        f: &mut D,
        t: f64,
        h: f64,
        y: &[f64],
        dy_next: &[f64],
        k: &mut [Buffer],
        y_tmp: &mut Buffer,
    ) -> usize {
        k[12].assign(dy_next);
        for (stage, row) in [&A14[..], &A15[..], &A16[..]].iter().enumerate() {
            y_tmp.assign(y);
            for (a_j, k_j) in row.iter().zip(k.iter()) {
                if *a_j != 0.0 {
                    y_tmp.add_scaled(h * a_j, k_j);
                }
            }
            f.eom(y_tmp, t + Self::C_DENSE[stage] * h, &mut k[13 + stage]);
        }
        3
    }

    fn interpolate(step: &StepData, theta: f64, out: &mut [f64]) {
        let h = step.h;
        let theta1 = 1.0 - theta;
        for (i, out_i) in out.iter_mut().enumerate() {
            let ydiff = step.y_next[i] - step.y[i];
            let bspl = h * step.dy[i] - ydiff;
            let c3 = ydiff - h * step.dy_next[i] - bspl;
            let mut d = [0.0; 4];
            for (d_m, row) in d.iter_mut().zip(DP8_DENSE.iter()) {
                *d_m = h * row
                    .iter()
                    .zip(step.k)
                    .map(|(d_j, k_j)| d_j * k_j[i])
                    .sum::<f64>();
            }
            let conpar = d[0] + theta * (d[1] + theta1 * (d[2] + theta * d[3]));
            *out_i = step.y[i]
                + theta * (ydiff + theta1 * (bspl + theta * (c3 + theta1 * conpar)));
        }
    }
}
