//! Initial input vectors and sticky factors.
//!
//! Priority per node:
//! 1. a node-specific override vector (used verbatim, with its sticky factor or 0);
//! 2. the custom default, component `i` drawn as `value[i] * (1 + u)`, `u ~ U[-var[i], var[i]]`;
//! 3. uniform in `[-0.5 / dim, 0.5 / dim)`, the usual skip-gram initialization.
//!
//! Output (context) vectors are not covered here: they always start at zero.

use crate::graph::NodeId;
use crate::{Error, Result};
use rand::Rng;
use std::collections::HashMap;

/// Convert an input quality score into a sticky factor: `1 - quality`, clamped to `[0, 1]`.
pub fn sticky_from_quality(quality: f32) -> f32 {
    (1.0 - quality).clamp(0.0, 1.0)
}

/// Per-dimension `(value, variability)` used to synthesize default vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultEmbeddingSpec {
    values: Vec<f32>,
    variability: Vec<f32>,
}

impl DefaultEmbeddingSpec {
    pub fn new(entries: impl IntoIterator<Item = (f32, f32)>) -> Result<Self> {
        let (values, variability): (Vec<f32>, Vec<f32>) = entries.into_iter().unzip();
        for (i, (&v, &var)) in values.iter().zip(variability.iter()).enumerate() {
            if !v.is_finite() {
                return Err(Error::InvalidParameter(format!(
                    "default value for dimension {i} is not finite"
                )));
            }
            if !(var.is_finite() && var >= 0.0) {
                return Err(Error::InvalidParameter(format!(
                    "variability for dimension {i} must be finite and >= 0, got {var}"
                )));
            }
        }
        Ok(Self { values, variability })
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn value(&self, i: usize) -> f32 {
        self.values[i]
    }

    pub fn variability(&self, i: usize) -> f32 {
        self.variability[i]
    }

    /// Inclusive range a synthesized component `i` falls in.
    pub fn bounds(&self, i: usize) -> (f32, f32) {
        let a = self.values[i] * (1.0 - self.variability[i]);
        let b = self.values[i] * (1.0 + self.variability[i]);
        (a.min(b), a.max(b))
    }

    pub fn sample_into<R: Rng>(&self, rng: &mut R, out: &mut [f32]) {
        for (i, o) in out.iter_mut().enumerate() {
            let var = self.variability[i];
            let u = if var > 0.0 { rng.random_range(-var..=var) } else { 0.0 };
            *o = self.values[i] * (1.0 + u);
        }
    }
}

/// A node-specific starting vector.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOverride {
    pub vector: Vec<f32>,
    pub sticky: Option<f32>,
}

/// Initialization policy for a training run.
#[derive(Debug, Clone)]
pub struct InitialEmbeddings {
    dim: usize,
    overrides: HashMap<NodeId, NodeOverride>,
    defaults: Option<DefaultEmbeddingSpec>,
}

impl InitialEmbeddings {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            overrides: HashMap::new(),
            defaults: None,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn set_defaults(&mut self, spec: DefaultEmbeddingSpec) -> Result<()> {
        if spec.dim() != self.dim {
            return Err(Error::InvalidParameter(format!(
                "default embedding has {} dimensions, expected {}",
                spec.dim(),
                self.dim
            )));
        }
        self.defaults = Some(spec);
        Ok(())
    }

    pub fn defaults(&self) -> Option<&DefaultEmbeddingSpec> {
        self.defaults.as_ref()
    }

    /// Register an override. A later override for the same node replaces the earlier one.
    pub fn insert_override(
        &mut self,
        node: NodeId,
        vector: Vec<f32>,
        sticky: Option<f32>,
    ) -> Result<()> {
        if node == 0 {
            return Err(Error::ReservedNodeId {
                context: "initial embedding".to_string(),
            });
        }
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch {
                node,
                expected: self.dim,
                found: vector.len(),
            });
        }
        if let Some(s) = sticky {
            if !(0.0..=1.0).contains(&s) {
                return Err(Error::InvalidParameter(format!(
                    "sticky factor for node {node} must be in [0, 1], got {s}"
                )));
            }
        }
        self.overrides.insert(node, NodeOverride { vector, sticky });
        Ok(())
    }

    pub fn get_override(&self, node: NodeId) -> Option<&NodeOverride> {
        self.overrides.get(&node)
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    pub fn sticky_factor(&self, node: NodeId) -> f32 {
        self.overrides
            .get(&node)
            .and_then(|o| o.sticky)
            .unwrap_or(0.0)
    }

    /// Fill `out` with the starting input vector of `node` and return its sticky factor.
    pub fn initial_vector<R: Rng>(&self, node: NodeId, rng: &mut R, out: &mut [f32]) -> f32 {
        debug_assert_eq!(out.len(), self.dim);
        if let Some(o) = self.overrides.get(&node) {
            out.copy_from_slice(&o.vector);
            return o.sticky.unwrap_or(0.0);
        }
        match &self.defaults {
            Some(spec) => spec.sample_into(rng, out),
            None => {
                let r = 0.5 / self.dim as f32;
                for o in out.iter_mut() {
                    *o = rng.random_range(-r..r);
                }
            }
        }
        0.0
    }
}
