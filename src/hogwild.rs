//! Shared `f32` matrix for Hogwild-style SGD.
//!
//! Workers read and write rows concurrently with no locks. Every cell is an `AtomicU32`
//! holding the `f32` bit pattern, accessed with `Relaxed` loads and stores; a read-modify-write
//! is a separate load and store, so concurrent updates to the same cell may overwrite each
//! other. Lost updates are accepted; no cell is ever torn.

use std::sync::atomic::{AtomicU32, Ordering};

pub struct HogwildMatrix {
    data: Vec<AtomicU32>,
    dim: usize,
}

impl HogwildMatrix {
    pub fn zeros(rows: usize, dim: usize) -> Self {
        Self::from_vec(vec![0.0; rows * dim], dim)
    }

    /// `values.len()` must be a multiple of `dim`.
    pub fn from_vec(values: Vec<f32>, dim: usize) -> Self {
        debug_assert!(dim == 0 || values.len() % dim == 0);
        Self {
            data: values.into_iter().map(|v| AtomicU32::new(v.to_bits())).collect(),
            dim,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn rows(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        f32::from_bits(self.data[row * self.dim + col].load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, row: usize, col: usize, value: f32) {
        self.data[row * self.dim + col].store(value.to_bits(), Ordering::Relaxed);
    }

    /// Copy row `row` into `out`.
    pub fn read_row(&self, row: usize, out: &mut [f32]) {
        for (c, o) in out.iter_mut().enumerate().take(self.dim) {
            *o = self.get(row, c);
        }
    }

    /// `row += scale * delta`.
    pub fn axpy_row(&self, row: usize, scale: f32, delta: &[f32]) {
        for (c, &d) in delta.iter().enumerate().take(self.dim) {
            self.set(row, c, self.get(row, c) + scale * d);
        }
    }

    /// Dot product of row `row` with `v`.
    pub fn dot_row(&self, row: usize, v: &[f32]) -> f32 {
        v.iter()
            .enumerate()
            .take(self.dim)
            .map(|(c, &x)| self.get(row, c) * x)
            .sum()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
            .into_iter()
            .map(|a| f32::from_bits(a.into_inner()))
            .collect()
    }
}

impl std::fmt::Debug for HogwildMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HogwildMatrix")
            .field("rows", &self.rows())
            .field("dim", &self.dim)
            .finish()
    }
}
