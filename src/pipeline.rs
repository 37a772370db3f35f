//! End-to-end drivers: graph → walks → embeddings, and walk corpus → embeddings.
//!
//! Optional initialization inputs never abort a run: an unreadable initial-embeddings file
//! or a bad default-embedding file is logged and the affected nodes fall back to the next
//! initialization tier. Problems with the graph or corpus are returned as errors.

use crate::graph::EdgeListGraph;
use crate::init::InitialEmbeddings;
use crate::io::{
    load_default_embedding, load_edge_list, load_initial_embeddings, load_walk_corpus,
    write_atomically, write_embeddings, write_walks,
};
use crate::node2vec::TransitionTables;
use crate::random_walk::{generate_walks, WalkConfig, WalkCorpus};
use crate::skipgram::{Embeddings, SkipGramConfig, SkipGramTrainer};
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where starting vectors come from.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Read the trailing quality token of each initial-embedding line as `1 - sticky`.
    pub sticky: bool,
    pub init_embeddings: Option<PathBuf>,
    pub default_embedding: Option<PathBuf>,
}

impl InitOptions {
    /// Build the initialization policy for vectors of size `dim`.
    pub fn load(&self, dim: usize) -> InitialEmbeddings {
        let mut init = InitialEmbeddings::new(dim);

        if let Some(path) = &self.default_embedding {
            match load_default_embedding(path, dim).and_then(|spec| init.set_defaults(spec)) {
                Ok(()) => info!(path = %path.display(), "using custom default embedding"),
                Err(e) => warn!(error = %e, "ignoring default embedding; using random initialization"),
            }
        }

        if let Some(path) = &self.init_embeddings {
            match load_initial_embeddings(path, self.sticky, &mut init) {
                Ok(n) => info!(path = %path.display(), overrides = n, "loaded initial embeddings"),
                Err(e) => warn!(error = %e, "ignoring initial embeddings"),
            }
        }

        init
    }
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutput {
    Walks(WalkCorpus),
    Embeddings(Embeddings),
}

impl RunOutput {
    /// Write to `path` atomically. Walk output gets a `NumWalks MaxLen` header only when
    /// `walks_header` is set.
    pub fn save(&self, path: &Path, walks_header: bool) -> Result<()> {
        match self {
            RunOutput::Walks(c) => write_atomically(path, |w| write_walks(w, c, walks_header)),
            RunOutput::Embeddings(e) => write_atomically(path, |w| write_embeddings(w, e)),
        }
    }
}

/// Options for the graph-driven pipeline.
#[derive(Debug, Clone, Default)]
pub struct Node2VecOptions {
    pub walk: WalkConfig,
    pub train: SkipGramConfig,
    pub init: InitOptions,
    pub directed: bool,
    pub weighted: bool,
    /// Stop after walk generation and emit the corpus instead of embeddings.
    pub output_walks: bool,
    /// Prefix walk output with a `NumWalks MaxLen` header.
    pub walks_header: bool,
}

impl Node2VecOptions {
    pub fn walks(&self, graph: &EdgeListGraph) -> Result<WalkCorpus> {
        let tables = TransitionTables::new(graph, self.walk.p, self.walk.q)?;
        generate_walks(graph, &tables, self.walk)
    }

    pub fn run_on_graph(&self, graph: &EdgeListGraph) -> Result<RunOutput> {
        // Fail on bad training parameters before spending time on walks.
        if !self.output_walks {
            self.train.validate()?;
        }
        let corpus = self.walks(graph)?;
        if self.output_walks {
            return Ok(RunOutput::Walks(corpus));
        }
        let init = self.init.load(self.train.dim);
        train(&corpus, &init, &self.train).map(RunOutput::Embeddings)
    }

    /// Load `input`, run, and write the result to `output`. Nothing is written on failure.
    pub fn run(&self, input: &Path, output: &Path) -> Result<RunOutput> {
        let graph = load_edge_list(input, self.directed, self.weighted)?;
        info!(
            nodes = graph.node_count(),
            arcs = graph.edge_count(),
            directed = graph.is_directed(),
            "loaded graph"
        );
        let out = self.run_on_graph(&graph)?;
        out.save(output, self.walks_header)?;
        Ok(out)
    }
}

/// Options for training directly on a walk corpus file.
#[derive(Debug, Clone, Default)]
pub struct Word2VecOptions {
    pub train: SkipGramConfig,
    pub init: InitOptions,
}

impl Word2VecOptions {
    pub fn run_on_corpus(&self, corpus: &WalkCorpus) -> Result<Embeddings> {
        let init = self.init.load(self.train.dim);
        train(corpus, &init, &self.train)
    }

    pub fn run(&self, input: &Path, output: &Path) -> Result<Embeddings> {
        self.train.validate()?;
        let corpus = load_walk_corpus(input)?;
        info!(walks = corpus.rows(), width = corpus.width(), "loaded walk corpus");
        let emb = self.run_on_corpus(&corpus)?;
        write_atomically(output, |w| write_embeddings(w, &emb))?;
        Ok(emb)
    }
}

fn train(corpus: &WalkCorpus, init: &InitialEmbeddings, config: &SkipGramConfig) -> Result<Embeddings> {
    let trainer = SkipGramTrainer::new(corpus, init, config.clone())?;
    Ok(trainer.train())
}
