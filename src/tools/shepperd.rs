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

use crate::errors::TwoBodyError;
use crate::linalg::{Matrix3, Matrix6, Vector3};
use crate::utils::all_finite;
use std::f64::consts::PI;

/// Tolerance on the time equation, relative to the time of flight
const KEPLER_TOLERANCE: f64 = 1e-12;
/// Maximum number of iterations on the universal Kepler equation.
const KEPLER_MAX_ITERATIONS: usize = 50;
/// Maximum number of terms of the continued fraction. Near-parabolic and strongly hyperbolic
/// cases need tens of thousands of them.
const CF_MAX_TERMS: usize = 100_000;

/// Evaluates the continued fraction of the third universal function at `q`.
fn continued_fraction(q: f64) -> Result<f64, TwoBodyError> {
    let (mut n, mut r, mut l, mut s, mut d) = (0.0, 1.0, 1.0, 1.0, 3.0);
    let (mut gcf, mut gold, mut k) = (1.0, 0.0, -5.0);
    let mut terms = 0;
    while gcf != gold {
        if terms == CF_MAX_TERMS {
            return Err(TwoBodyError::ContinuedFraction { terms, q });
        }
        terms += 1;
        k = -k;
        l += 2.0;
        d += 4.0 * l;
        n += (1.0 + k) * l;
        r = d / (d - n * r * q);
        s *= r - 1.0;
        gold = gcf;
        gcf = gold + s;
    }
    Ok(gcf)
}

/// Solution of the universal Kepler equation from which the final state and its partials follow.
#[derive(Copy, Clone, Debug)]
struct KeplerSolution {
    mu: f64,
    /// Initial radius
    r0: f64,
    /// Dot product of the initial position and velocity
    n0: f64,
    /// Twice the negative specific orbital energy
    beta: f64,
    /// Number of complete revolutions for elliptic orbits
    orbits: f64,
    /// Converged iteration variable
    u: f64,
    /// Universal functions at the solution
    u0: f64,
    u1: f64,
    u2: f64,
    u3: f64,
    /// Final radius
    r1: f64,
}

impl KeplerSolution {
    fn solve(
        mu: f64,
        tau: f64,
        ri: &Vector3<f64>,
        vi: &Vector3<f64>,
    ) -> Result<Self, TwoBodyError> {
        Self::solve_with_cap(mu, tau, ri, vi, KEPLER_MAX_ITERATIONS)
    }

    /// Solves the universal Kepler equation in at most `max_iter` iterations.
    fn solve_with_cap(
        mu: f64,
        tau: f64,
        ri: &Vector3<f64>,
        vi: &Vector3<f64>,
        max_iter: usize,
    ) -> Result<Self, TwoBodyError> {
        if !(mu > 0.0 && mu.is_finite()) {
            return Err(TwoBodyError::InvalidInput {
                reason: format!("gravitational parameter must be positive, got {mu}"),
            });
        } else if !tau.is_finite() {
            return Err(TwoBodyError::InvalidInput {
                reason: format!("time of flight must be finite, got {tau}"),
            });
        } else if !all_finite(ri.as_slice()) || !all_finite(vi.as_slice()) {
            return Err(TwoBodyError::InvalidInput {
                reason: "initial state must be finite".to_string(),
            });
        }

        let r0 = ri.norm();
        if r0 == 0.0 {
            return Err(TwoBodyError::InvalidInput {
                reason: "initial position is zero".to_string(),
            });
        }
        let n0 = ri.dot(vi);
        let beta = 2.0 * mu / r0 - vi.norm_squared();
        let threshold = KEPLER_TOLERANCE * tau.abs();

        let (mut umin, mut umax) = if beta != 0.0 {
            let umax = 1.0 / beta.abs().sqrt();
            (-umax, umax)
        } else {
            (f64::NEG_INFINITY, f64::INFINITY)
        };

        let orbits = if beta > 0.0 {
            // Complete revolutions are accounted for analytically
            let revs = 1.0 + (beta * tau - 2.0 * n0) * beta.sqrt() / (PI * mu);
            (revs / 2.0).floor()
        } else {
            0.0
        };

        let mut u = 0.0;
        let (mut u_prev, mut dt_prev) = (f64::NAN, f64::NAN);
        let mut residual = f64::INFINITY;
        for iteration in 1..=max_iter {
            let q = beta * u * u;
            let q = q / (1.0 + q);
            let gcf = continued_fraction(q)?;

            let h0 = 1.0 - 2.0 * q;
            let h1 = 2.0 * u * (1.0 - q);
            let u0 = 2.0 * h0 * h0 - 1.0;
            let u1 = 2.0 * h0 * h1;
            let u2 = 2.0 * h1 * h1;
            let mut u3 = 2.0 * h1 * u2 * gcf / 3.0;
            if orbits != 0.0 {
                u3 += 2.0 * PI * orbits / (beta * beta.sqrt());
            }

            let r1 = r0 * u0 + n0 * u1 + mu * u2;
            let dt = r0 * u1 + n0 * u2 + mu * u3;
            residual = tau - dt;

            // Stagnation of either the iterate or the time counts as converged
            if residual.abs() <= threshold || (iteration > 1 && (u == u_prev || dt == dt_prev)) {
                return Ok(Self {
                    mu,
                    r0,
                    n0,
                    beta,
                    orbits,
                    u,
                    u0,
                    u1,
                    u2,
                    u3,
                    r1,
                });
            }
            u_prev = u;
            dt_prev = dt;

            // Newton step, with a bisection fallback when it leaves the bracket
            let slope = 4.0 * r1 / (1.0 + beta * u * u);
            let ustep = residual / slope;
            if ustep > 0.0 {
                umin = u;
                u += ustep;
                if u > umax {
                    u = (umin + umax) / 2.0;
                }
            } else {
                umax = u;
                u += ustep;
                if u < umin {
                    u = (umin + umax) / 2.0;
                }
            }
        }

        Err(TwoBodyError::KeplerNotConverged {
            iterations: max_iter,
            residual,
        })
    }

    /// Lagrange coefficients `(f, g, f_dot, g_dot)`
    fn lagrange(&self) -> (f64, f64, f64, f64) {
        let f = 1.0 - self.mu / self.r0 * self.u2;
        let g = self.r0 * self.u1 + self.n0 * self.u2;
        let f_dot = -self.mu * self.u1 / (self.r0 * self.r1);
        let g_dot = 1.0 - self.mu / self.r1 * self.u2;
        (f, g, f_dot, g_dot)
    }

    fn final_state(&self, ri: &Vector3<f64>, vi: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
        let (f, g, f_dot, g_dot) = self.lagrange();
        (ri * f + vi * g, ri * f_dot + vi * g_dot)
    }

    /// Sundman time at the solution, i.e. the argument of the universal functions.
    fn sundman(&self) -> f64 {
        let x2 = self.beta * self.u * self.u;
        let ratio = if x2.abs() < 1e-3 {
            1.0 - x2 / 3.0 + x2 * x2 / 5.0 - x2.powi(3) / 7.0 + x2.powi(4) / 9.0
        } else if x2 > 0.0 {
            x2.sqrt().atan() / x2.sqrt()
        } else {
            (-x2).sqrt().atanh() / (-x2).sqrt()
        };
        let mut s = 4.0 * self.u * ratio;
        if self.orbits != 0.0 {
            s += 2.0 * PI * self.orbits / self.beta.sqrt();
        }
        s
    }
}

/// Power series of the universal function of index `k` at Sundman time `s`.
fn universal_series(s: f64, beta: f64, k: i32) -> f64 {
    let z = -beta * s * s;
    let mut term = s.powi(k) / (1..=k).product::<i32>() as f64;
    let mut total = 0.0;
    for j in 0..30 {
        total += term;
        let m = f64::from(k + 2 * j);
        term *= z / ((m + 1.0) * (m + 2.0));
    }
    total
}

/// Propagates a two-body orbit of gravitational parameter `mu` by `tau` (possibly negative)
/// using Shepperd's universal variable method.
///
/// Works for every conic (elliptic, parabolic and hyperbolic) and handles many revolutions
/// without loss of accuracy. Returns the final position and velocity.
pub fn shepperd(
    mu: f64,
    tau: f64,
    r0: &Vector3<f64>,
    v0: &Vector3<f64>,
) -> Result<(Vector3<f64>, Vector3<f64>), TwoBodyError> {
    let solution = KeplerSolution::solve(mu, tau, r0, v0)?;
    Ok(solution.final_state(r0, v0))
}

/// Final state of a two-body propagation and its state transition matrix.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TwoBodyStm {
    pub r: Vector3<f64>,
    pub v: Vector3<f64>,
    pub drdr0: Matrix3<f64>,
    pub drdv0: Matrix3<f64>,
    pub dvdr0: Matrix3<f64>,
    pub dvdv0: Matrix3<f64>,
}

impl TwoBodyStm {
    /// The full 6x6 state transition matrix, position first.
    pub fn stm(&self) -> Matrix6<f64> {
        let mut stm = Matrix6::zeros();
        stm.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.drdr0);
        stm.fixed_view_mut::<3, 3>(0, 3).copy_from(&self.drdv0);
        stm.fixed_view_mut::<3, 3>(3, 0).copy_from(&self.dvdr0);
        stm.fixed_view_mut::<3, 3>(3, 3).copy_from(&self.dvdv0);
        stm
    }
}

/// Same as [`shepperd`], with the partials of the final state with respect to the initial state.
///
/// The partials follow from the implicit differentiation of the universal Kepler equation in
/// Sundman time. The final state is bit for bit the one returned by [`shepperd`].
pub fn shepperd_stm(
    mu: f64,
    tau: f64,
    r0: &Vector3<f64>,
    v0: &Vector3<f64>,
) -> Result<TwoBodyStm, TwoBodyError> {
    let sol = KeplerSolution::solve(mu, tau, r0, v0)?;
    let (r, v) = sol.final_state(r0, v0);
    let (f, g, f_dot, g_dot) = sol.lagrange();

    let (beta, r0m, n0) = (sol.beta, sol.r0, sol.n0);
    let s = sol.sundman();
    let (big_u0, big_u1, big_u2, big_u3) = (sol.u0, sol.u1, sol.u2, sol.u3);
    let (big_u4, big_u5) = if (beta * s * s).abs() < 1.0 {
        (universal_series(s, beta, 4), universal_series(s, beta, 5))
    } else {
        (
            (s * s / 2.0 - big_u2) / beta,
            (s.powi(3) / 6.0 - big_u3) / beta,
        )
    };
    let r1 = sol.r1;

    // Partials of the universal functions with respect to (r0, n0, beta, s)
    let du0 = [0.0, 0.0, -s * big_u1 / 2.0, -beta * big_u1];
    let du1 = [0.0, 0.0, (big_u3 - s * big_u2) / 2.0, big_u0];
    let du2 = [0.0, 0.0, (2.0 * big_u4 - s * big_u3) / 2.0, big_u1];
    let du3 = [0.0, 0.0, (3.0 * big_u5 - s * big_u4) / 2.0, big_u2];

    // The time equation r0 U1 + n0 U2 + mu U3 = tau fixes s, and its partial in s is r
    let time_partials = [
        big_u1,
        big_u2,
        r0m * du1[2] + n0 * du2[2] + sol.mu * du3[2],
    ];
    let ds: [f64; 3] = time_partials.map(|t_p| -t_p / r1);
    let total = |partials: [f64; 4]| -> [f64; 3] {
        [
            partials[0] + partials[3] * ds[0],
            partials[1] + partials[3] * ds[1],
            partials[2] + partials[3] * ds[2],
        ]
    };
    let (u0t, u1t, u2t) = (total(du0), total(du1), total(du2));
    let mu = sol.mu;

    // Total derivatives with respect to (r0, n0, beta)
    let rt = [
        big_u0 + r0m * u0t[0] + n0 * u1t[0] + mu * u2t[0],
        r0m * u0t[1] + big_u1 + n0 * u1t[1] + mu * u2t[1],
        r0m * u0t[2] + n0 * u1t[2] + mu * u2t[2],
    ];
    let ft = [
        mu * big_u2 / (r0m * r0m) - mu / r0m * u2t[0],
        -mu / r0m * u2t[1],
        -mu / r0m * u2t[2],
    ];
    let gt = [
        big_u1 + r0m * u1t[0] + n0 * u2t[0],
        r0m * u1t[1] + big_u2 + n0 * u2t[1],
        r0m * u1t[2] + n0 * u2t[2],
    ];
    let f_dot_t: [f64; 3] = std::array::from_fn(|j| {
        let d_r0r1 = (if j == 0 { r1 } else { 0.0 }) + r0m * rt[j];
        -mu * u1t[j] / (r0m * r1) + mu * big_u1 / (r0m * r1).powi(2) * d_r0r1
    });
    let g_dot_t: [f64; 3] =
        std::array::from_fn(|j| -mu * u2t[j] / r1 + mu * big_u2 / (r1 * r1) * rt[j]);

    // Gradients of (r0, n0, beta) with respect to the initial position and velocity
    let r0_hat = r0 / r0m;
    let gradient = |t: [f64; 3]| -> (Vector3<f64>, Vector3<f64>) {
        let wrt_r = r0_hat * t[0] + v0 * t[1] + r0_hat * (-2.0 * mu / (r0m * r0m) * t[2]);
        let wrt_v = r0 * t[1] + v0 * (-2.0 * t[2]);
        (wrt_r, wrt_v)
    };
    let (f_r, f_v) = gradient(ft);
    let (g_r, g_v) = gradient(gt);
    let (f_dot_r, f_dot_v) = gradient(f_dot_t);
    let (g_dot_r, g_dot_v) = gradient(g_dot_t);

    let eye = Matrix3::identity();
    Ok(TwoBodyStm {
        r,
        v,
        drdr0: eye * f + r0 * f_r.transpose() + v0 * g_r.transpose(),
        drdv0: eye * g + r0 * f_v.transpose() + v0 * g_v.transpose(),
        dvdr0: eye * f_dot + r0 * f_dot_r.transpose() + v0 * g_dot_r.transpose(),
        dvdv0: eye * g_dot + r0 * f_dot_v.transpose() + v0 * g_dot_v.transpose(),
    })
}
