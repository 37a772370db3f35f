//! `stickyvec`: node2vec walks + skip-gram node embeddings, with sticky nodes.
//!
//! Pipeline: [`EdgeListGraph`] → [`TransitionTables`] → [`generate_walks`] →
//! [`SkipGramTrainer`] → [`Embeddings`]. [`InitialEmbeddings`] feeds starting vectors and
//! per-node sticky factors into the trainer independently of the walk path.
//!
//! Public invariants (must not drift):
//! - **Sentinel**: node id `0` is reserved as walk padding; it is rejected as a real node id.
//! - **Dimensionality**: every vector (override, default, trained) has the configured dimension.
//! - **Determinism**: walk output is a pure function of (graph, config), independent of the
//!   number of worker threads. Training is bit-reproducible with a single training thread.
//! - **Sticky damping**: a node's input-vector update is scaled by `1 - sticky(node)`, so a
//!   node with sticky factor `1` keeps its initial vector exactly.
//!
//! Swappable (allowed to change without breaking the contract):
//! - work partitioning of walk generation and training
//! - internal table layouts (so long as sampling distributions are unchanged)

pub mod alias;
pub mod graph;
pub mod hogwild;
pub mod init;
pub mod io;
pub mod node2vec;
pub mod pipeline;
pub mod random_walk;
pub mod skipgram;

pub use alias::AliasTable;
pub use graph::{EdgeListGraph, NodeId, WeightedGraphRef};
pub use init::{sticky_from_quality, DefaultEmbeddingSpec, InitialEmbeddings, NodeOverride};
pub use io::{
    load_default_embedding, load_edge_list, load_initial_embeddings, load_walk_corpus,
    read_default_embedding, read_edge_list, read_embeddings, read_initial_embeddings,
    read_walk_corpus, write_atomically, write_embeddings, write_walks, EdgeLine, Parsed,
};
pub use node2vec::{biased_transition_probs, TransitionTables};
pub use pipeline::{InitOptions, Node2VecOptions, RunOutput, Word2VecOptions};
pub use random_walk::{generate_walks, WalkConfig, WalkCorpus, PADDING};
pub use skipgram::{Embeddings, SkipGramConfig, SkipGramTrainer, Vocabulary};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("node id 0 is reserved as the walk padding sentinel ({context})")]
    ReservedNodeId { context: String },
    #[error("dimension mismatch for node {node}: expected {expected}, found {found}")]
    DimensionMismatch {
        node: NodeId,
        expected: usize,
        found: usize,
    },
    #[error("malformed corpus: padding at row {row}, column {column} is followed by node ids")]
    MalformedCorpus { row: usize, column: usize },
    #[error("walk corpus contains no nodes")]
    EmptyCorpus,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// SplitMix64 finalizer; used to derive independent per-walk / per-shard seeds.
pub(crate) fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58476d1ce4e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d049bb133111eb);
    x ^= x >> 31;
    x
}
