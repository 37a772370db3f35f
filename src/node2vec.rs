//! Precomputed node2vec transition tables.
//!
//! For every directed edge `prev -> curr` we store an alias table over `curr`'s out-neighbors
//! with unnormalized weights
//!
//! ```text
//! w(curr, next) / p    if next == prev
//! w(curr, next)        if prev -> next is an edge (distance 1)
//! w(curr, next) / q    otherwise (distance 2)
//! ```
//!
//! The first step of a walk has no `prev` and is drawn proportionally to edge weight alone,
//! from a per-node alias table.
//!
//! Layout is CSR-style: out-edges are numbered by their position in the flattened neighbor
//! array, and the table of edge `e = prev -> curr` is the slice
//! `edge_indptr[e]..edge_indptr[e] + out_degree(curr)` of `alias_j` / `alias_q`.
//! A walk carries the index of the edge it arrived on, so a second-order draw needs no lookup.

use crate::alias::{alias_draw, alias_setup, normalize_in_place};
use crate::graph::WeightedGraphRef;
use crate::{Error, Result};
use rand::Rng;
use tracing::debug;

/// Alias tables for every directed edge (second-order steps) and every node (first steps).
#[derive(Debug, Clone)]
pub struct TransitionTables {
    indptr: Vec<usize>,
    targets: Vec<usize>,
    first_j: Vec<u32>,
    first_q: Vec<f32>,
    edge_indptr: Vec<u64>,
    alias_j: Vec<u32>,
    alias_q: Vec<f32>,
    p: f32,
    q: f32,
}

impl TransitionTables {
    pub fn new<G: WeightedGraphRef + Sync>(graph: &G, p: f32, q: f32) -> Result<Self> {
        if !(p.is_finite() && p > 0.0) {
            return Err(Error::InvalidParameter(format!("p must be > 0, got {p}")));
        }
        if !(q.is_finite() && q > 0.0) {
            return Err(Error::InvalidParameter(format!("q must be > 0, got {q}")));
        }

        let n = graph.node_count();
        let mut indptr = vec![0usize; n + 1];
        for v in 0..n {
            indptr[v + 1] = indptr[v] + graph.out_degree(v);
        }
        let num_edges = indptr[n];

        let mut targets = Vec::with_capacity(num_edges);
        let mut first_j = Vec::with_capacity(num_edges);
        let mut first_q = Vec::with_capacity(num_edges);
        let mut probs: Vec<f32> = Vec::new();
        for v in 0..n {
            let (nbrs, wts) = graph.neighbors_and_weights_ref(v);
            debug_assert_eq!(nbrs.len(), wts.len());
            targets.extend_from_slice(nbrs);
            if nbrs.is_empty() {
                continue;
            }
            probs.clear();
            probs.extend_from_slice(wts);
            normalize_in_place(&mut probs);
            let (j, qtab) = alias_setup(&probs);
            first_j.extend_from_slice(&j);
            first_q.extend_from_slice(&qtab);
        }

        let mut edge_indptr = vec![0u64; num_edges + 1];
        for e in 0..num_edges {
            edge_indptr[e + 1] = edge_indptr[e] + graph.out_degree(targets[e]) as u64;
        }

        let blocks = build_edge_blocks(graph, p, q);
        let total = edge_indptr[num_edges] as usize;
        let mut alias_j = Vec::with_capacity(total);
        let mut alias_q = Vec::with_capacity(total);
        for (j, qtab) in blocks {
            alias_j.extend_from_slice(&j);
            alias_q.extend_from_slice(&qtab);
        }
        debug_assert_eq!(alias_j.len(), total);

        debug!(
            nodes = n,
            edges = num_edges,
            entries = total,
            "built node2vec transition tables"
        );

        Ok(Self {
            indptr,
            targets,
            first_j,
            first_q,
            edge_indptr,
            alias_j,
            alias_q,
            p,
            q,
        })
    }

    pub fn node_count(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn edge_count(&self) -> usize {
        self.targets.len()
    }

    pub fn p(&self) -> f32 {
        self.p
    }

    pub fn q(&self) -> f32 {
        self.q
    }

    pub fn neighbors(&self, node: usize) -> &[usize] {
        &self.targets[self.indptr[node]..self.indptr[node + 1]]
    }

    /// Index of the directed edge `prev -> curr`, if present.
    pub fn edge_index(&self, prev: usize, curr: usize) -> Option<usize> {
        self.neighbors(prev)
            .binary_search(&curr)
            .ok()
            .map(|j| self.indptr[prev] + j)
    }

    /// First step from `curr`, weighted by edge weight. Returns `(next, edge curr -> next)`.
    pub fn sample_first<R: Rng>(&self, curr: usize, rng: &mut R) -> Option<(usize, usize)> {
        let (start, end) = (self.indptr[curr], self.indptr[curr + 1]);
        if start == end {
            return None;
        }
        let k = alias_draw(&self.first_j[start..end], &self.first_q[start..end], rng);
        Some((self.targets[start + k], start + k))
    }

    /// Second-order step after arriving over `edge` (`prev -> curr`).
    /// Returns `(next, edge curr -> next)`, or `None` when `curr` has no out-edges.
    pub fn sample_next<R: Rng>(&self, edge: usize, rng: &mut R) -> Option<(usize, usize)> {
        let curr = self.targets[edge];
        let (start, end) = (self.indptr[curr], self.indptr[curr + 1]);
        if start == end {
            return None;
        }
        let off = self.edge_indptr[edge] as usize;
        let deg = end - start;
        let k = alias_draw(
            &self.alias_j[off..off + deg],
            &self.alias_q[off..off + deg],
            rng,
        );
        Some((self.targets[start + k], start + k))
    }

    /// Draw the node that follows `curr` given the walk came from `prev`.
    ///
    /// Returns `None` if `prev -> curr` is not an edge or `curr` has no out-edges.
    pub fn sample_after<R: Rng>(&self, prev: usize, curr: usize, rng: &mut R) -> Option<usize> {
        let edge = self.edge_index(prev, curr)?;
        self.sample_next(edge, rng).map(|(next, _)| next)
    }
}

/// Normalized node2vec distribution over `curr`'s out-neighbors, having arrived from `prev`.
///
/// Entries line up with `graph.neighbors_and_weights_ref(curr).0`.
pub fn biased_transition_probs<G: WeightedGraphRef>(
    graph: &G,
    prev: usize,
    curr: usize,
    p: f32,
    q: f32,
) -> Vec<f32> {
    let mut out_ind = Vec::new();
    let mut probs = Vec::new();
    fill_biased_probs(graph, prev, curr, p, q, &mut out_ind, &mut probs);
    probs
}

fn fill_biased_probs<G: WeightedGraphRef>(
    graph: &G,
    prev: usize,
    curr: usize,
    p: f32,
    q: f32,
    out_ind: &mut Vec<bool>,
    probs: &mut Vec<f32>,
) {
    let (cur_nbrs, cur_wts) = graph.neighbors_and_weights_ref(curr);
    let (prev_nbrs, _) = graph.neighbors_and_weights_ref(prev);

    out_ind.clear();
    out_ind.resize(cur_nbrs.len(), true);
    mark_non_common(cur_nbrs, prev_nbrs, out_ind);

    probs.clear();
    probs.extend_from_slice(cur_wts);
    for (i, &next) in cur_nbrs.iter().enumerate() {
        if next == prev {
            probs[i] /= p;
        } else if out_ind[i] {
            probs[i] /= q;
        }
    }
    normalize_in_place(probs);
}

/// Alias blocks for the out-edges of every node, in edge order.
fn build_edge_blocks<G: WeightedGraphRef + Sync>(
    graph: &G,
    p: f32,
    q: f32,
) -> Vec<(Vec<u32>, Vec<f32>)> {
    let n = graph.node_count();

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..n)
            .into_par_iter()
            .map(|prev| edge_blocks_from(graph, prev, p, q))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        (0..n).map(|prev| edge_blocks_from(graph, prev, p, q)).collect()
    }
}

/// Concatenated alias tables for all edges leaving `prev`.
fn edge_blocks_from<G: WeightedGraphRef>(
    graph: &G,
    prev: usize,
    p: f32,
    q: f32,
) -> (Vec<u32>, Vec<f32>) {
    let (prev_nbrs, _) = graph.neighbors_and_weights_ref(prev);
    let mut js = Vec::new();
    let mut qs = Vec::new();
    let mut out_ind = Vec::new();
    let mut probs = Vec::new();

    for &curr in prev_nbrs {
        if graph.out_degree(curr) == 0 {
            continue;
        }
        fill_biased_probs(graph, prev, curr, p, q, &mut out_ind, &mut probs);
        let (j, qtab) = alias_setup(&probs);
        js.extend_from_slice(&j);
        qs.extend_from_slice(&qtab);
    }
    (js, qs)
}

/// `out[i] = true` iff `cur[i]` is not in `prev`. Both slices must be sorted.
fn mark_non_common(cur: &[usize], prev: &[usize], out: &mut [bool]) {
    debug_assert_eq!(cur.len(), out.len());
    let mut j = 0usize;
    for (i, &x) in cur.iter().enumerate() {
        while j < prev.len() && prev[j] < x {
            j += 1;
        }
        out[i] = !(j < prev.len() && prev[j] == x);
    }
}
