//! Graph adapter trait and the in-memory edge-list graph.

use crate::{Error, Result};
use std::collections::HashMap;

/// External node identifier, as it appears in edge lists, walks and embedding files.
///
/// `0` is reserved as the walk padding sentinel and is never a real node.
pub type NodeId = u64;

/// A weighted graph view that can return **borrowed** neighbor + weight slices.
///
/// Nodes are addressed by dense index `0..node_count()`. A node has a contiguous
/// neighbor list and a contiguous weight list, with matching indices.
pub trait WeightedGraphRef {
    fn node_count(&self) -> usize;

    /// Return `(neighbors, weights)` for a node.
    ///
    /// Requirements:
    /// - `neighbors.len() == weights.len()`
    /// - `neighbors` is sorted ascending and free of duplicates
    /// - weights are finite and non-negative
    fn neighbors_and_weights_ref(&self, node: usize) -> (&[usize], &[f32]);

    fn out_degree(&self, node: usize) -> usize {
        self.neighbors_and_weights_ref(node).0.len()
    }
}

/// Weighted adjacency built once from edge data, then only read.
///
/// Node ids are mapped to dense indices in order of first appearance. Each adjacency list is
/// kept sorted by dense index, which is also the order [`EdgeListGraph::neighbors`] reports.
#[derive(Debug, Clone, Default)]
pub struct EdgeListGraph {
    directed: bool,
    ids: Vec<NodeId>,
    index: HashMap<NodeId, usize>,
    adj: Vec<Vec<usize>>,
    wts: Vec<Vec<f32>>,
    edge_count: usize,
}

impl EdgeListGraph {
    pub fn new(directed: bool) -> Self {
        Self {
            directed,
            ..Self::default()
        }
    }

    /// Add a node if absent, returning its dense index.
    pub fn add_node(&mut self, id: NodeId) -> Result<usize> {
        if id == 0 {
            return Err(Error::ReservedNodeId {
                context: "graph node".to_string(),
            });
        }
        if let Some(&idx) = self.index.get(&id) {
            return Ok(idx);
        }
        let idx = self.ids.len();
        self.ids.push(id);
        self.index.insert(id, idx);
        self.adj.push(Vec::new());
        self.wts.push(Vec::new());
        Ok(idx)
    }

    /// Add `src -> dst` (and `dst -> src` for undirected graphs), adding endpoints as needed.
    ///
    /// Re-adding an existing edge replaces its weight.
    pub fn add_edge(&mut self, src: NodeId, dst: NodeId, weight: f32) -> Result<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "edge {src} -> {dst} has weight {weight}; weights must be finite and >= 0"
            )));
        }
        let s = self.add_node(src)?;
        let d = self.add_node(dst)?;
        self.insert_arc(s, d, weight);
        if !self.directed {
            self.insert_arc(d, s, weight);
        }
        Ok(())
    }

    fn insert_arc(&mut self, s: usize, d: usize, weight: f32) {
        match self.adj[s].binary_search(&d) {
            Ok(i) => self.wts[s][i] = weight,
            Err(i) => {
                self.adj[s].insert(i, d);
                self.wts[s].insert(i, weight);
                self.edge_count += 1;
            }
        }
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Outgoing `(neighbor, weight)` pairs of `id`; empty for unknown ids.
    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = (NodeId, f32)> + '_ {
        let (nbrs, wts) = match self.index.get(&id) {
            Some(&i) => (self.adj[i].as_slice(), self.wts[i].as_slice()),
            None => (&[][..], &[][..]),
        };
        nbrs.iter()
            .zip(wts.iter())
            .map(move |(&n, &w)| (self.ids[n], w))
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    /// Number of stored directed arcs (undirected edges count twice, self-loops once).
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn node_id(&self, idx: usize) -> NodeId {
        self.ids[idx]
    }

    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Node ids in dense-index order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.ids
    }
}

impl WeightedGraphRef for EdgeListGraph {
    fn node_count(&self) -> usize {
        self.ids.len()
    }

    fn neighbors_and_weights_ref(&self, node: usize) -> (&[usize], &[f32]) {
        let nbrs = self.adj.get(node).map(Vec::as_slice).unwrap_or(&[]);
        let wts = self.wts.get(node).map(Vec::as_slice).unwrap_or(&[]);
        (nbrs, wts)
    }
}
