//! stickyvec: node embeddings from node2vec walks, with sticky nodes.
//!
//! # Usage
//!
//! ```bash
//! # Embed an undirected edge list
//! stickyvec node2vec -i graph/karate.edgelist -o emb/karate.emb -d 64 -l 40 -r 10
//!
//! # Biased walks only (BFS-like, p=1 q=2)
//! stickyvec node2vec -i graph.txt -o walks.txt -p 1 -q 2 --output-walks --walks-header
//!
//! # Train on an existing corpus, keeping known nodes near their initial vectors
//! stickyvec word2vec -i walks.txt -o out.emb --init-embeddings known.emb --sticky
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::time::Instant;
use stickyvec::{
    load_edge_list, load_walk_corpus, write_atomically, write_embeddings, InitOptions,
    Node2VecOptions, SkipGramConfig, WalkConfig, Word2VecOptions,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "stickyvec")]
#[command(about = "node2vec / word2vec embeddings with sticky nodes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate biased walks over a graph and train embeddings on them
    Node2vec {
        /// Input edge list (`src dst [weight]` per line)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (embeddings, or walks with --output-walks)
        #[arg(short, long)]
        output: PathBuf,

        /// Walk length
        #[arg(short = 'l', long, default_value = "80")]
        walk_length: usize,

        /// Number of walks per node
        #[arg(short = 'r', long, default_value = "10")]
        num_walks: usize,

        /// Return parameter p
        #[arg(short, default_value = "1.0")]
        p: f32,

        /// In-out parameter q
        #[arg(short, default_value = "1.0")]
        q: f32,

        /// Graph is directed
        #[arg(long)]
        directed: bool,

        /// Edge list has a weight column
        #[arg(long)]
        weighted: bool,

        /// Write the walk table instead of training
        #[arg(long)]
        output_walks: bool,

        /// Prefix walk output with a `NumWalks MaxLen` header (readable by `word2vec`)
        #[arg(long, requires = "output_walks")]
        walks_header: bool,

        #[command(flatten)]
        train: TrainArgs,
    },

    /// Train embeddings on a walk corpus file
    Word2vec {
        /// Walk corpus (`NumWalks MaxLen` header, one walk per line)
        #[arg(short, long)]
        input: PathBuf,

        /// Output embeddings file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        train: TrainArgs,
    },
}

#[derive(Args)]
struct TrainArgs {
    /// Embedding dimension
    #[arg(short, long, default_value = "128")]
    dimensions: usize,

    /// Context window size
    #[arg(short = 'k', long, default_value = "10")]
    window: usize,

    /// Number of epochs
    #[arg(short, long, default_value = "1")]
    epochs: usize,

    /// Node-specific initial embeddings (`id v_1 .. v_D [quality]`)
    #[arg(long)]
    init_embeddings: Option<PathBuf>,

    /// Default embedding values (`value variability` per dimension)
    #[arg(long)]
    default_embedding: Option<PathBuf>,

    /// Read quality scores from the initial embeddings and damp updates by them
    #[arg(short, long)]
    sticky: bool,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Worker threads (0 = all cores)
    #[arg(long, default_value = "0")]
    threads: usize,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl TrainArgs {
    fn skipgram(&self) -> SkipGramConfig {
        SkipGramConfig {
            dim: self.dimensions,
            window: self.window,
            epochs: self.epochs,
            seed: self.seed,
            threads: self.threads,
            ..Default::default()
        }
    }

    fn init(&self) -> InitOptions {
        InitOptions {
            sticky: self.sticky,
            init_embeddings: self.init_embeddings.clone(),
            default_embedding: self.default_embedding.clone(),
        }
    }

    fn setup(&self) -> Result<()> {
        let level = if self.verbose { Level::DEBUG } else { Level::INFO };
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to install tracing subscriber")?;

        #[cfg(feature = "parallel")]
        {
            if self.threads > 0 {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(self.threads)
                    .build_global()
                    .context("Failed to configure worker threads")?;
            }
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Node2vec {
            input,
            output,
            walk_length,
            num_walks,
            p,
            q,
            directed,
            weighted,
            output_walks,
            walks_header,
            train,
        } => {
            train.setup()?;
            let opts = Node2VecOptions {
                walk: WalkConfig {
                    length: walk_length,
                    walks_per_node: num_walks,
                    p,
                    q,
                    seed: train.seed,
                },
                train: train.skipgram(),
                init: train.init(),
                directed,
                weighted,
                output_walks,
                walks_header,
            };
            cmd_node2vec(&input, &output, &opts)
        }
        Commands::Word2vec {
            input,
            output,
            train,
        } => {
            train.setup()?;
            let opts = Word2VecOptions {
                train: train.skipgram(),
                init: train.init(),
            };
            cmd_word2vec(&input, &output, &opts)
        }
    }
}

fn cmd_node2vec(input: &Path, output: &Path, opts: &Node2VecOptions) -> Result<()> {
    let start = Instant::now();
    let pb = ProgressBar::new_spinner();
    pb.set_message(format!("Loading {}...", input.display()));
    let graph = load_edge_list(input, opts.directed, opts.weighted)
        .with_context(|| format!("Failed to load graph {}", input.display()))?;
    pb.finish_with_message(format!(
        "Loaded {} nodes, {} arcs in {:.2?}",
        graph.node_count(),
        graph.edge_count(),
        start.elapsed()
    ));

    let start = Instant::now();
    let out = opts.run_on_graph(&graph).context("Run failed")?;
    info!(elapsed = ?start.elapsed(), "done");

    out.save(output, opts.walks_header)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Results written to {}", output.display());
    Ok(())
}

fn cmd_word2vec(input: &Path, output: &Path, opts: &Word2VecOptions) -> Result<()> {
    opts.train.validate().context("Invalid training parameters")?;

    let start = Instant::now();
    let pb = ProgressBar::new_spinner();
    pb.set_message(format!("Loading {}...", input.display()));
    let corpus = load_walk_corpus(input)
        .with_context(|| format!("Failed to load walk corpus {}", input.display()))?;
    pb.finish_with_message(format!(
        "Loaded {} walks of length {} in {:.2?}",
        corpus.rows(),
        corpus.width(),
        start.elapsed()
    ));

    let start = Instant::now();
    let emb = opts.run_on_corpus(&corpus).context("Training failed")?;
    info!(elapsed = ?start.elapsed(), nodes = emb.len(), "done");

    write_atomically(output, |w| write_embeddings(w, &emb))
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Results written to {}", output.display());
    Ok(())
}
