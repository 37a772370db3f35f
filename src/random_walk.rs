//! Walk corpus generation.

use crate::graph::{EdgeListGraph, NodeId};
use crate::node2vec::TransitionTables;
use crate::{mix64, Error, Result};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// Padding value for rows shorter than the corpus width.
pub const PADDING: NodeId = 0;

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WalkConfig {
    /// Maximum walk length (in nodes).
    pub length: usize,
    /// Number of walks per node.
    pub walks_per_node: usize,
    /// Return parameter \(p\).
    pub p: f32,
    /// In-out parameter \(q\).
    pub q: f32,
    /// Seed for deterministic RNG.
    pub seed: u64,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self { length: 80, walks_per_node: 10, p: 1.0, q: 1.0, seed: 42 }
    }
}

impl WalkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.length == 0 {
            return Err(Error::InvalidParameter("walk length must be >= 1".into()));
        }
        if !(self.p.is_finite() && self.p > 0.0) {
            return Err(Error::InvalidParameter(format!("p must be > 0, got {}", self.p)));
        }
        if !(self.q.is_finite() && self.q > 0.0) {
            return Err(Error::InvalidParameter(format!("q must be > 0, got {}", self.q)));
        }
        Ok(())
    }
}

/// Dense rectangular table of walks. Rows shorter than `width` end in a run of [`PADDING`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkCorpus {
    width: usize,
    data: Vec<NodeId>,
}

impl WalkCorpus {
    /// An all-padding corpus of `rows × width`.
    pub fn new(rows: usize, width: usize) -> Self {
        Self {
            width,
            data: vec![PADDING; rows * width],
        }
    }

    /// Build from explicit rows, padding each to `width`. Rows longer than `width` are an error.
    pub fn from_rows<I, W>(rows: I, width: usize) -> Result<Self>
    where
        I: IntoIterator<Item = W>,
        W: AsRef<[NodeId]>,
    {
        let mut data = Vec::new();
        for (i, row) in rows.into_iter().enumerate() {
            let row = row.as_ref();
            if row.len() > width {
                return Err(Error::InvalidParameter(format!(
                    "walk {i} has {} nodes, corpus width is {width}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
            data.resize(data.len() + width - row.len(), PADDING);
        }
        Ok(Self { width, data })
    }

    pub fn rows(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.data.len() / self.width
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Full padded row.
    pub fn row(&self, i: usize) -> &[NodeId] {
        &self.data[i * self.width..(i + 1) * self.width]
    }

    pub(crate) fn row_mut(&mut self, i: usize) -> &mut [NodeId] {
        &mut self.data[i * self.width..(i + 1) * self.width]
    }

    /// Row `i` without its trailing padding.
    pub fn walk(&self, i: usize) -> &[NodeId] {
        let row = self.row(i);
        let len = row.iter().rposition(|&v| v != PADDING).map_or(0, |p| p + 1);
        &row[..len]
    }

    pub fn walks(&self) -> impl Iterator<Item = &[NodeId]> + '_ {
        (0..self.rows()).map(move |i| self.walk(i))
    }

    /// Check that padding only ever appears as a trailing run.
    pub fn validate(&self) -> Result<()> {
        for i in 0..self.rows() {
            let row = self.row(i);
            if let Some(first_pad) = row.iter().position(|&v| v == PADDING) {
                if row[first_pad..].iter().any(|&v| v != PADDING) {
                    return Err(Error::MalformedCorpus {
                        row: i,
                        column: first_pad,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Generate `walks_per_node` walks from every node of `graph`.
///
/// Row `r * n + i` is the `r`-th repetition's walk from the `i`-th node of that repetition's
/// shuffled start order. Each walk draws from its own RNG stream derived from
/// `(seed, repetition, start node)`, so output does not depend on the number of worker threads.
pub fn generate_walks(
    graph: &EdgeListGraph,
    tables: &TransitionTables,
    config: WalkConfig,
) -> Result<WalkCorpus> {
    config.validate()?;
    if tables.node_count() != graph.node_count() {
        return Err(Error::InvalidParameter(format!(
            "transition tables cover {} nodes, graph has {}",
            tables.node_count(),
            graph.node_count()
        )));
    }
    if (tables.p() - config.p).abs() > 1e-6 || (tables.q() - config.q).abs() > 1e-6 {
        return Err(Error::InvalidParameter(
            "transition table p/q do not match WalkConfig".into(),
        ));
    }

    let n = graph.node_count();
    let jobs = start_order(n, config);
    let mut corpus = WalkCorpus::new(jobs.len(), config.length);

    info!(
        nodes = n,
        walks = jobs.len(),
        length = config.length,
        "generating walks"
    );

    let fill = |(row, &(rep, start)): (&mut [NodeId], &(u32, usize))| {
        let seed = mix64(config.seed ^ ((rep as u64) << 32) ^ mix64(start as u64));
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        fill_walk(graph, tables, start, row, &mut rng);
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        corpus
            .data
            .par_chunks_mut(config.length)
            .zip(jobs.par_iter())
            .for_each(fill);
    }

    #[cfg(not(feature = "parallel"))]
    {
        for (i, job) in jobs.iter().enumerate() {
            fill((corpus.row_mut(i), job));
        }
    }

    Ok(corpus)
}

/// `(repetition, start node)` per row; start nodes are shuffled once per repetition.
fn start_order(n: usize, config: WalkConfig) -> Vec<(u32, usize)> {
    let mut epoch_nodes: Vec<usize> = (0..n).collect();
    let mut jobs = Vec::with_capacity(n * config.walks_per_node);
    for rep in 0..(config.walks_per_node as u32) {
        let mut rng = ChaCha8Rng::seed_from_u64(mix64(config.seed ^ (rep as u64)));
        epoch_nodes.shuffle(&mut rng);
        jobs.extend(epoch_nodes.iter().map(|&node| (rep, node)));
    }
    jobs
}

fn fill_walk<R: Rng>(
    graph: &EdgeListGraph,
    tables: &TransitionTables,
    start: usize,
    row: &mut [NodeId],
    rng: &mut R,
) {
    row[0] = graph.node_id(start);
    let mut step = tables.sample_first(start, rng);
    for slot in row.iter_mut().skip(1) {
        let Some((next, edge)) = step else { break };
        *slot = graph.node_id(next);
        step = tables.sample_next(edge, rng);
    }
}
