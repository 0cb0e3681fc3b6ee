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

/*! # nyx-ivp

Adaptive embedded Runge Kutta integrators for initial value problems, with dense output, event
location and an analytical two body propagator to validate them against.

```
use nyx_ivp::dynamics::TwoBody;
use nyx_ivp::propagators::{PropOpts, Propagator};

let prop = Propagator::dp5(PropOpts::with_tolerance(1e-10));
let y0 = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
let mut yf = [0.0; 6];
let summary = prop
    .solve(&mut TwoBody::canonical(), &y0, &mut yf, 0.0, std::f64::consts::TAU, None, &[])
    .unwrap();
assert!((yf[0] - 1.0).abs() < 1e-8);
println!("{summary}");
```
*/

/// Provides the adaptive Runge Kutta propagators, their options, dense output and events.
pub mod propagators;

/// Provides the right hand sides which can be integrated, and the two body dynamics.
pub mod dynamics;

/// Pool of reusable state buffers shared by every integration.
pub mod pool;

/// Utility functions shared by different modules, and which may be useful to engineers.
pub mod utils;

/// Functions which may fail return one of these errors, the library does not panic on bad input.
pub mod errors;

/// Loading and dumping of the configuration, e.g. the propagator options.
pub mod io;

/// Analytical tools, i.e. the Shepperd two body propagator and its state transition matrix.
pub mod tools;

/// Interpolation of the dense output
pub mod polyfit;

#[macro_use]
extern crate log;
extern crate hifitime;
extern crate nalgebra as na;

/// Re-export of hifitime
pub mod time {
    pub use hifitime::*;
}

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

pub use self::propagators::{PropagationError, Propagator};
