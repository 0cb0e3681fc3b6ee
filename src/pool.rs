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

//! Pooled numeric buffers.
//!
//! The integrators rent every working vector from a process wide free list keyed by length, so a
//! propagation loop does not allocate once the pool is warm. A [`Buffer`] goes back to the pool when
//! it is dropped, hence every exit path of a run (success, error or cancellation) releases its
//! buffers exactly once.

use crate::linalg::DVector;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct PoolState {
    free: HashMap<usize, Vec<DVector<f64>>>,
    rented: HashMap<usize, usize>,
}

lazy_static! {
    static ref POOL: Mutex<PoolState> = Mutex::new(PoolState::default());
}

fn lock() -> MutexGuard<'static, PoolState> {
    // A panic while holding the lock cannot leave the free list half updated.
    POOL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Number of free buffers of length `len` currently held by the pool.
pub fn available(len: usize) -> usize {
    lock().free.get(&len).map_or(0, Vec::len)
}

/// Number of buffers of length `len` rented and not yet returned.
pub fn outstanding(len: usize) -> usize {
    lock().rented.get(&len).copied().unwrap_or(0)
}

/// A zero initialized vector of `f64` rented from the pool, and returned to it on drop.
pub struct Buffer {
    data: DVector<f64>,
}

impl Buffer {
    /// Rents a zeroed buffer of length `len`.
    pub fn rent(len: usize) -> Self {
        let mut pool = lock();
        let data = match pool.free.get_mut(&len).and_then(Vec::pop) {
            Some(mut data) => {
                data.fill(0.0);
                data
            }
            None => DVector::zeros(len),
        };
        *pool.rented.entry(len).or_insert(0) += 1;
        Self { data }
    }

    /// Rents a buffer holding a copy of `values`.
    pub fn from_slice(values: &[f64]) -> Self {
        let mut me = Self::rent(values.len());
        me.assign(values);
        me
    }

    /// Returns this buffer to the pool. Equivalent to dropping it.
    pub fn dispose(self) {}

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        self.data.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.data.as_mut_slice()
    }

    pub fn as_vector(&self) -> &DVector<f64> {
        &self.data
    }

    /// Copies `other` into this buffer, which must be of the same length.
    pub fn assign(&mut self, other: &[f64]) -> &mut Self {
        self.data.as_mut_slice().copy_from_slice(other);
        self
    }

    pub fn fill(&mut self, value: f64) -> &mut Self {
        self.data.fill(value);
        self
    }

    /// self += other
    pub fn add(&mut self, other: &[f64]) -> &mut Self {
        for (x, o) in self.data.iter_mut().zip(other) {
            *x += o;
        }
        self
    }

    /// self -= other
    pub fn sub(&mut self, other: &[f64]) -> &mut Self {
        for (x, o) in self.data.iter_mut().zip(other) {
            *x -= o;
        }
        self
    }

    /// self += a * other
    pub fn add_scaled(&mut self, a: f64, other: &[f64]) -> &mut Self {
        for (x, o) in self.data.iter_mut().zip(other) {
            *x += a * o;
        }
        self
    }

    /// self *= a
    pub fn scale(&mut self, a: f64) -> &mut Self {
        self.data *= a;
        self
    }

    /// Euclidean norm
    pub fn norm(&self) -> f64 {
        self.data.norm()
    }

    pub fn is_finite(&self) -> bool {
        crate::utils::all_finite(self.data.as_slice())
    }
}

impl Clone for Buffer {
    fn clone(&self) -> Self {
        Self::from_slice(self.as_slice())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        let data = mem::replace(&mut self.data, DVector::zeros(0));
        let len = data.len();
        let mut pool = lock();
        if let Some(count) = pool.rented.get_mut(&len) {
            *count = count.saturating_sub(1);
        }
        pool.free.entry(len).or_default().push(data);
    }
}

impl Deref for Buffer {
    type Target = [f64];

    fn deref(&self) -> &Self::Target {
        self.data.as_slice()
    }
}

impl DerefMut for Buffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data.as_mut_slice()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer{:?}", self.as_slice())
    }
}
