//! Skip-gram with negative sampling (SGNS) over a walk corpus, with sticky damping.
//!
//! Two matrices are trained: input vectors (reported as the embeddings) and output vectors
//! (used only for the logistic loss). For a center node `c` and a target `t` (the true context,
//! label 1, or a negative sample, label 0):
//!
//! ```text
//! g        = (label - σ(in[c] · out[t])) * lr
//! neu1e   += g * out[t]
//! out[t]  += g * in[c]
//! ```
//!
//! and once all targets of a (center, context) pair are processed,
//! `in[c] += (1 - sticky[c]) * neu1e`. Output vectors are never damped.
//!
//! Negatives come from the smoothed unigram distribution `count^0.75` over the vocabulary,
//! redrawn when they hit the true context node.
//!
//! Training is Hogwild-style: walk rows are split into contiguous shards, one RNG stream per
//! shard, and shards update the shared matrices without locks (see [`crate::hogwild`]).
//! The learning rate decays linearly with the number of corpus positions processed.

use crate::alias::AliasTable;
use crate::graph::NodeId;
use crate::hogwild::HogwildMatrix;
use crate::init::InitialEmbeddings;
use crate::random_walk::WalkCorpus;
use crate::{mix64, Error, Result};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

const MAX_EXP: f32 = 6.0;
const NEGATIVE_RETRIES: usize = 8;

/// Skip-gram model configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SkipGramConfig {
    /// Embedding dimension.
    pub dim: usize,
    /// Context window size (each side).
    pub window: usize,
    /// Number of negative samples per positive.
    pub negatives: usize,
    /// Passes over the corpus.
    pub epochs: usize,
    /// Initial learning rate.
    pub learning_rate: f32,
    /// Floor for the decayed learning rate.
    pub min_learning_rate: f32,
    /// Random seed.
    pub seed: u64,
    /// Number of training shards; 0 means one per worker thread.
    pub threads: usize,
}

impl Default for SkipGramConfig {
    fn default() -> Self {
        Self {
            dim: 128,
            window: 10,
            negatives: 5,
            epochs: 1,
            learning_rate: 0.025,
            min_learning_rate: 0.025 * 1e-4,
            seed: 42,
            threads: 0,
        }
    }
}

impl SkipGramConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 {
            return Err(Error::InvalidParameter("dimension must be >= 1".into()));
        }
        if self.window == 0 {
            return Err(Error::InvalidParameter("window size must be >= 1".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "learning rate must be > 0, got {}",
                self.learning_rate
            )));
        }
        if !(self.min_learning_rate.is_finite() && self.min_learning_rate >= 0.0) {
            return Err(Error::InvalidParameter(format!(
                "min learning rate must be >= 0, got {}",
                self.min_learning_rate
            )));
        }
        Ok(())
    }

    fn shard_count(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        #[cfg(feature = "parallel")]
        {
            rayon::current_num_threads()
        }
        #[cfg(not(feature = "parallel"))]
        {
            1
        }
    }
}

/// Distinct node ids of a corpus, in ascending order, with occurrence counts.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    ids: Vec<NodeId>,
    index: HashMap<NodeId, u32>,
    counts: Vec<u64>,
}

impl Vocabulary {
    pub fn from_corpus(corpus: &WalkCorpus) -> Result<Self> {
        let mut freq: HashMap<NodeId, u64> = HashMap::new();
        for walk in corpus.walks() {
            for &v in walk {
                *freq.entry(v).or_insert(0) += 1;
            }
        }
        if freq.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        let mut ids: Vec<NodeId> = freq.keys().copied().collect();
        ids.sort_unstable();
        let counts = ids.iter().map(|id| freq[id]).collect();
        let index = ids
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i as u32))
            .collect();
        Ok(Self { ids, index, counts })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).map(|&i| i as usize)
    }

    pub fn count(&self, idx: usize) -> u64 {
        self.counts[idx]
    }

    fn noise_distribution(&self) -> Option<AliasTable> {
        let weights: Vec<f32> = (0..self.len())
            .map(|i| (self.count(i) as f64).powf(0.75) as f32)
            .collect();
        AliasTable::new(&weights)
    }
}

/// Trained (or initial) input vectors, one per node id.
#[derive(Debug, Clone, PartialEq)]
pub struct Embeddings {
    ids: Vec<NodeId>,
    index: HashMap<NodeId, usize>,
    dim: usize,
    data: Vec<f32>,
}

impl Embeddings {
    /// `data` is row-major, one row of `dim` values per entry of `ids`.
    pub fn new(ids: Vec<NodeId>, dim: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != ids.len() * dim {
            return Err(Error::InvalidParameter(format!(
                "{} values do not fill {} vectors of dimension {dim}",
                data.len(),
                ids.len()
            )));
        }
        let mut index = HashMap::with_capacity(ids.len());
        for (i, &id) in ids.iter().enumerate() {
            if index.insert(id, i).is_some() {
                return Err(Error::InvalidParameter(format!("duplicate node id {id}")));
            }
        }
        Ok(Self {
            ids,
            index,
            dim,
            data,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn get(&self, id: NodeId) -> Option<&[f32]> {
        let i = *self.index.get(&id)?;
        Some(&self.data[i * self.dim..(i + 1) * self.dim])
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &[f32])> + '_ {
        self.ids
            .iter()
            .enumerate()
            .map(move |(i, &id)| (id, &self.data[i * self.dim..(i + 1) * self.dim]))
    }
}

/// SGNS trainer over a fixed corpus and initialization policy.
#[derive(Debug)]
pub struct SkipGramTrainer {
    config: SkipGramConfig,
    vocab: Vocabulary,
    walks: Vec<Vec<u32>>,
    input: HogwildMatrix,
    output: HogwildMatrix,
    sticky: Vec<f32>,
    noise: Option<AliasTable>,
    total_words: u64,
}

impl SkipGramTrainer {
    /// Validate the corpus, build the vocabulary and initialize both matrices.
    ///
    /// Fails on padding inside a walk ([`Error::MalformedCorpus`]), an empty corpus, or an
    /// initialization policy whose dimension differs from `config.dim`.
    pub fn new(
        corpus: &WalkCorpus,
        init: &InitialEmbeddings,
        config: SkipGramConfig,
    ) -> Result<Self> {
        config.validate()?;
        if init.dim() != config.dim {
            return Err(Error::InvalidParameter(format!(
                "initial embeddings have dimension {}, trainer expects {}",
                init.dim(),
                config.dim
            )));
        }
        corpus.validate()?;
        let vocab = Vocabulary::from_corpus(corpus)?;

        let walks: Vec<Vec<u32>> = corpus
            .walks()
            .filter(|w| !w.is_empty())
            .map(|w| {
                w.iter()
                    .map(|id| vocab.index[id])
                    .collect()
            })
            .collect();
        let total_words = walks.iter().map(|w| w.len() as u64).sum();

        let dim = config.dim;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut values = vec![0.0f32; vocab.len() * dim];
        let mut sticky = vec![0.0f32; vocab.len()];
        for (i, &id) in vocab.ids().iter().enumerate() {
            sticky[i] = init.initial_vector(id, &mut rng, &mut values[i * dim..(i + 1) * dim]);
        }

        let frozen = sticky.iter().filter(|&&s| s >= 1.0).count();
        debug!(
            vocab = vocab.len(),
            walks = walks.len(),
            words = total_words,
            overrides = init.override_count(),
            frozen,
            "initialized skip-gram model"
        );

        let noise = vocab.noise_distribution();
        Ok(Self {
            input: HogwildMatrix::from_vec(values, dim),
            output: HogwildMatrix::zeros(vocab.len(), dim),
            config,
            vocab,
            walks,
            sticky,
            noise,
            total_words,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn config(&self) -> &SkipGramConfig {
        &self.config
    }

    /// Current input vector of `node`.
    pub fn input_vector(&self, node: NodeId) -> Option<Vec<f32>> {
        let i = self.vocab.index_of(node)?;
        let mut out = vec![0.0; self.config.dim];
        self.input.read_row(i, &mut out);
        Some(out)
    }

    pub fn sticky_factor(&self, node: NodeId) -> Option<f32> {
        self.vocab.index_of(node).map(|i| self.sticky[i])
    }

    /// Run all epochs and return the input vectors.
    pub fn train(self) -> Embeddings {
        let shards = self.config.shard_count().max(1);
        let chunk = self.walks.len().div_ceil(shards).max(1);
        let processed = AtomicU64::new(0);

        info!(
            epochs = self.config.epochs,
            shards,
            words = self.total_words,
            "training skip-gram"
        );

        for epoch in 0..self.config.epochs {
            let run_shard = |(s, rows): (usize, &[Vec<u32>])| {
                let seed = mix64(self.config.seed ^ ((epoch as u64) << 32) ^ (s as u64));
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                self.train_shard(rows, &mut rng, &processed);
            };

            #[cfg(feature = "parallel")]
            {
                use rayon::prelude::*;
                self.walks.par_chunks(chunk).enumerate().for_each(run_shard);
            }

            #[cfg(not(feature = "parallel"))]
            {
                self.walks.chunks(chunk).enumerate().for_each(run_shard);
            }

            debug!(
                epoch = epoch + 1,
                lr = self.learning_rate(processed.load(Ordering::Relaxed)),
                "epoch finished"
            );
        }

        self.into_embeddings()
    }

    /// Input vectors as they are now, without training.
    pub fn into_embeddings(self) -> Embeddings {
        let dim = self.input.dim();
        let ids = self.vocab.ids;
        Embeddings {
            index: ids.iter().enumerate().map(|(i, &id)| (id, i)).collect(),
            ids,
            dim,
            data: self.input.into_vec(),
        }
    }

    fn learning_rate(&self, processed: u64) -> f32 {
        let total = (self.config.epochs as u64 * self.total_words + 1) as f64;
        let lr = self.config.learning_rate as f64 * (1.0 - processed as f64 / total);
        (lr as f32).max(self.config.min_learning_rate)
    }

    fn train_shard<R: Rng>(&self, rows: &[Vec<u32>], rng: &mut R, processed: &AtomicU64) {
        let dim = self.config.dim;
        let mut h = vec![0.0f32; dim];
        let mut neu1e = vec![0.0f32; dim];

        for walk in rows {
            let before = processed.fetch_add(walk.len() as u64, Ordering::Relaxed);
            let lr = self.learning_rate(before);
            self.train_walk(walk, lr, rng, &mut h, &mut neu1e);
        }
    }

    fn train_walk<R: Rng>(
        &self,
        walk: &[u32],
        lr: f32,
        rng: &mut R,
        h: &mut [f32],
        neu1e: &mut [f32],
    ) {
        let window = self.config.window;
        for (pos, &center) in walk.iter().enumerate() {
            let center = center as usize;
            let damp = 1.0 - self.sticky[center];
            let start = pos.saturating_sub(window);
            let end = (pos + window + 1).min(walk.len());

            for ctx_pos in start..end {
                if ctx_pos == pos {
                    continue;
                }
                let context = walk[ctx_pos] as usize;

                self.input.read_row(center, h);
                neu1e.fill(0.0);

                self.update_target(h, context, 1.0, lr, neu1e);
                for _ in 0..self.config.negatives {
                    if let Some(neg) = self.draw_negative(context, rng) {
                        self.update_target(h, neg, 0.0, lr, neu1e);
                    }
                }

                if damp > 0.0 {
                    self.input.axpy_row(center, damp, neu1e);
                }
            }
        }
    }

    fn update_target(&self, h: &[f32], target: usize, label: f32, lr: f32, neu1e: &mut [f32]) {
        let f = self.output.dot_row(target, h);
        let g = (label - sigmoid(f)) * lr;
        for (c, e) in neu1e.iter_mut().enumerate() {
            let o = self.output.get(target, c);
            *e += g * o;
            self.output.set(target, c, o + g * h[c]);
        }
    }

    fn draw_negative<R: Rng>(&self, context: usize, rng: &mut R) -> Option<usize> {
        let noise = self.noise.as_ref()?;
        (0..NEGATIVE_RETRIES)
            .map(|_| noise.sample(rng))
            .find(|&k| k != context)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x.clamp(-MAX_EXP, MAX_EXP)).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> SkipGramConfig {
        SkipGramConfig {
            dim: 8,
            window: 2,
            negatives: 3,
            epochs: 2,
            threads: 1,
            ..Default::default()
        }
    }

    fn ring_corpus() -> WalkCorpus {
        let rows: Vec<Vec<NodeId>> = (0..20)
            .map(|r| (0..10).map(|k| ((r + k) % 5 + 1) as NodeId).collect())
            .collect();
        WalkCorpus::from_rows(rows, 10).unwrap()
    }

    #[test]
    fn vocabulary_is_sorted_and_counted() {
        let c = WalkCorpus::from_rows([vec![3u64, 1, 3], vec![2]], 3).unwrap();
        let v = Vocabulary::from_corpus(&c).unwrap();
        assert_eq!(v.ids(), &[1, 2, 3]);
        assert_eq!(v.count(v.index_of(3).unwrap()), 2);
        assert_eq!(v.index_of(9), None);
    }

    #[test]
    fn empty_corpus_is_rejected() {
        let c = WalkCorpus::new(3, 4);
        assert!(matches!(Vocabulary::from_corpus(&c), Err(Error::EmptyCorpus)));
    }

    #[test]
    fn interior_padding_is_fatal() {
        let c = WalkCorpus::from_rows([vec![1u64, 2, 0, 3]], 4).unwrap();
        let init = InitialEmbeddings::new(8);
        assert!(matches!(
            SkipGramTrainer::new(&c, &init, small_config()),
            Err(Error::MalformedCorpus { row: 0, column: 2 })
        ));
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let init = InitialEmbeddings::new(4);
        assert!(SkipGramTrainer::new(&ring_corpus(), &init, small_config()).is_err());
    }

    #[test]
    fn learning_rate_decays_linearly_to_floor() {
        let init = InitialEmbeddings::new(8);
        let t = SkipGramTrainer::new(&ring_corpus(), &init, small_config()).unwrap();
        let lr0 = t.learning_rate(0);
        let lr_half = t.learning_rate(t.total_words);
        let lr_end = t.learning_rate(10 * t.total_words);
        assert!((lr0 - 0.025).abs() < 1e-6);
        assert!(lr_half < lr0 && lr_half > lr_end);
        assert_eq!(lr_end, t.config.min_learning_rate);
    }

    #[test]
    fn negatives_never_hit_the_context() {
        let init = InitialEmbeddings::new(8);
        let t = SkipGramTrainer::new(&ring_corpus(), &init, small_config()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..1000 {
            assert_ne!(t.draw_negative(2, &mut rng), Some(2));
        }
    }

    #[test]
    fn single_node_vocabulary_has_no_negatives() {
        let c = WalkCorpus::from_rows([vec![4u64, 4, 4]], 3).unwrap();
        let init = InitialEmbeddings::new(8);
        let t = SkipGramTrainer::new(&c, &init, small_config()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(t.draw_negative(0, &mut rng), None);
        let emb = t.train();
        assert_eq!(emb.len(), 1);
        assert!(emb.get(4).unwrap().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn single_shard_training_is_reproducible() {
        let init = InitialEmbeddings::new(8);
        let a = SkipGramTrainer::new(&ring_corpus(), &init, small_config())
            .unwrap()
            .train();
        let b = SkipGramTrainer::new(&ring_corpus(), &init, small_config())
            .unwrap()
            .train();
        assert_eq!(a, b);
    }

    #[test]
    fn sticky_one_freezes_and_sticky_zero_moves() {
        let mut init = InitialEmbeddings::new(8);
        let frozen = vec![0.1f32; 8];
        init.insert_override(1, frozen.clone(), Some(1.0)).unwrap();
        init.insert_override(2, vec![0.1; 8], Some(0.0)).unwrap();

        let t = SkipGramTrainer::new(&ring_corpus(), &init, small_config()).unwrap();
        assert_eq!(t.input_vector(1).unwrap(), frozen);
        assert_eq!(t.sticky_factor(1), Some(1.0));
        let emb = t.train();

        assert_eq!(emb.get(1).unwrap(), frozen.as_slice());
        let moved: f32 = emb
            .get(2)
            .unwrap()
            .iter()
            .map(|v| (v - 0.1).abs())
            .sum();
        assert!(moved > 1e-4, "node 2 barely moved: {moved}");
    }

    #[test]
    fn partial_stickiness_damps_movement() {
        let run = |sticky: f32| {
            let mut init = InitialEmbeddings::new(8);
            init.insert_override(3, vec![0.05; 8], Some(sticky)).unwrap();
            let emb = SkipGramTrainer::new(&ring_corpus(), &init, small_config())
                .unwrap()
                .train();
            emb.get(3)
                .unwrap()
                .iter()
                .map(|v| (v - 0.05).abs())
                .sum::<f32>()
        };
        let free = run(0.0);
        let damped = run(0.9);
        assert!(damped < free, "damped={damped} free={free}");
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        dot / (na * nb).max(1e-12)
    }

    /// Mean cosine within and across two disjoint 6-cliques (ids 1..=6 and 7..=12).
    fn clique_similarity(threads: usize) -> (f32, f32) {
        use crate::graph::EdgeListGraph;
        use crate::node2vec::TransitionTables;
        use crate::random_walk::{generate_walks, WalkConfig};

        let mut g = EdgeListGraph::new(false);
        for base in [0u64, 6] {
            for a in 1..=6 {
                for b in (a + 1)..=6 {
                    g.add_edge(base + a, base + b, 1.0).unwrap();
                }
            }
        }
        let walk = WalkConfig { length: 20, walks_per_node: 20, p: 1.0, q: 1.0, seed: 3 };
        let tables = TransitionTables::new(&g, walk.p, walk.q).unwrap();
        let corpus = generate_walks(&g, &tables, walk).unwrap();

        let config = SkipGramConfig {
            dim: 16,
            window: 5,
            epochs: 5,
            threads,
            seed: 3,
            ..Default::default()
        };
        let init = InitialEmbeddings::new(config.dim);
        let emb = SkipGramTrainer::new(&corpus, &init, config).unwrap().train();

        let (mut intra, mut n_intra, mut inter, mut n_inter) = (0.0, 0, 0.0, 0);
        for a in 1..=12u64 {
            for b in (a + 1)..=12 {
                let c = cosine(emb.get(a).unwrap(), emb.get(b).unwrap());
                if (a - 1) / 6 == (b - 1) / 6 {
                    intra += c;
                    n_intra += 1;
                } else {
                    inter += c;
                    n_inter += 1;
                }
            }
        }
        (intra / n_intra as f32, inter / n_inter as f32)
    }

    #[test]
    fn disjoint_cliques_separate_single_shard() {
        let (intra, inter) = clique_similarity(1);
        assert!(intra > inter + 0.4, "intra={intra} inter={inter}");
    }

    #[test]
    fn disjoint_cliques_separate_with_concurrent_shards() {
        let (intra, inter) = clique_similarity(4);
        assert!(intra > inter + 0.4, "intra={intra} inter={inter}");
    }

    #[test]
    fn embeddings_reject_inconsistent_shapes() {
        assert!(Embeddings::new(vec![1, 2], 2, vec![0.0; 3]).is_err());
        assert!(Embeddings::new(vec![1, 1], 1, vec![0.0; 2]).is_err());
        let e = Embeddings::new(vec![5, 9], 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(e.get(9), Some(&[3.0, 4.0][..]));
        assert_eq!(e.iter().count(), 2);
    }
}
