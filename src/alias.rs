//! Walker/Vose alias method: O(k) setup, O(1) categorical draws.
//!
//! References:
//! - Walker (1974): An efficient method for generating discrete random variables with general distributions.
//! - Vose (1991): A linear algorithm for generating random numbers with a given distribution.

use rand::Rng;

/// An owned alias table over `0..len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasTable {
    alias: Vec<u32>,
    prob: Vec<f32>,
}

impl AliasTable {
    /// Build from non-negative weights (they need not sum to 1).
    ///
    /// Returns `None` for an empty weight list. All-zero weights yield a uniform table.
    pub fn new(weights: &[f32]) -> Option<Self> {
        if weights.is_empty() {
            return None;
        }
        let mut probs = weights.to_vec();
        normalize_in_place(&mut probs);
        let (alias, prob) = alias_setup(&probs);
        Some(Self { alias, prob })
    }

    pub fn len(&self) -> usize {
        self.prob.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prob.is_empty()
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        alias_draw(&self.alias, &self.prob, rng)
    }
}

/// Normalize to a probability vector. All-zero input becomes uniform.
pub(crate) fn normalize_in_place(x: &mut [f32]) {
    let s = x.iter().copied().sum::<f32>();
    if s > 0.0 {
        for v in x {
            *v /= s;
        }
    } else if !x.is_empty() {
        let u = 1.0 / x.len() as f32;
        x.fill(u);
    }
}

/// `probs` must already be normalized.
pub(crate) fn alias_setup(probs: &[f32]) -> (Vec<u32>, Vec<f32>) {
    let k = probs.len();
    let mut q = vec![0.0f32; k];
    let mut j = vec![0u32; k];

    let mut smaller: Vec<usize> = Vec::with_capacity(k);
    let mut larger: Vec<usize> = Vec::with_capacity(k);

    for kk in 0..k {
        q[kk] = (k as f32) * probs[kk];
        j[kk] = kk as u32;
        if q[kk] < 1.0 {
            smaller.push(kk);
        } else {
            larger.push(kk);
        }
    }

    while let (Some(&small), Some(&large)) = (smaller.last(), larger.last()) {
        smaller.pop();
        larger.pop();
        j[small] = large as u32;
        q[large] = q[large] + q[small] - 1.0;
        if q[large] < 1.0 {
            smaller.push(large);
        } else {
            larger.push(large);
        }
    }

    // Leftovers are 1.0 up to rounding error.
    for kk in smaller.into_iter().chain(larger) {
        q[kk] = 1.0;
    }

    (j, q)
}

pub(crate) fn alias_draw<R: Rng>(j: &[u32], q: &[f32], rng: &mut R) -> usize {
    debug_assert_eq!(j.len(), q.len());
    let k = j.len();
    let kk = rng.random_range(0..k);
    if rng.random::<f32>() < q[kk] {
        kk
    } else {
        j[kk] as usize
    }
}
