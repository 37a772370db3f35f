use proptest::prelude::*;
use std::collections::HashSet;
use stickyvec::{
    biased_transition_probs, generate_walks, EdgeListGraph, NodeId, TransitionTables, WalkConfig,
    WalkCorpus, PADDING,
};

fn ring(n: NodeId) -> EdgeListGraph {
    let mut g = EdgeListGraph::new(false);
    for i in 1..=n {
        g.add_edge(i, i % n + 1, 1.0).unwrap();
    }
    g
}

fn walks_for(g: &EdgeListGraph, cfg: WalkConfig) -> WalkCorpus {
    let tables = TransitionTables::new(g, cfg.p, cfg.q).unwrap();
    generate_walks(g, &tables, cfg).unwrap()
}

fn assert_walks_sane(g: &EdgeListGraph, corpus: &WalkCorpus, cfg: WalkConfig) {
    assert_eq!(corpus.rows(), cfg.walks_per_node * g.node_count());
    assert_eq!(corpus.width(), cfg.length);
    corpus.validate().expect("padding only as a trailing run");
    for w in corpus.walks() {
        assert!(!w.is_empty(), "walk should never be empty");
        assert!(w.len() <= cfg.length, "walk length exceeded config");
        assert!(w.iter().all(|&v| v != PADDING && g.has_node(v)));
    }
}

fn assert_walks_follow_edges(g: &EdgeListGraph, corpus: &WalkCorpus) {
    for w in corpus.walks() {
        for win in w.windows(2) {
            let (u, v) = (win[0], win[1]);
            assert!(
                g.neighbors(u).any(|(n, _)| n == v),
                "walk step {u} -> {v} is not an edge"
            );
        }
    }
}

#[test]
fn ring_end_to_end_corpus() {
    let g = ring(5);
    let cfg = WalkConfig { length: 6, walks_per_node: 3, p: 1.0, q: 1.0, seed: 42 };
    let a = walks_for(&g, cfg);
    let b = walks_for(&g, cfg);
    assert_eq!(a, b, "walks must be deterministic for a fixed seed");
    assert_eq!(a.rows(), 15);
    assert_walks_sane(&g, &a, cfg);
    assert_walks_follow_edges(&g, &a);
    // No dead ends on a ring, so every walk runs the full length.
    assert!(a.walks().all(|w| w.len() == 6));
    let seen: HashSet<NodeId> = a.walks().flatten().copied().collect();
    assert!(seen.iter().all(|v| (1..=5).contains(v)));
}

#[test]
fn different_seeds_give_different_corpora() {
    let g = ring(7);
    let cfg = WalkConfig { length: 10, walks_per_node: 4, p: 1.0, q: 1.0, seed: 1 };
    let a = walks_for(&g, cfg);
    let b = walks_for(&g, WalkConfig { seed: 2, ..cfg });
    assert_ne!(a, b);
}

#[test]
fn isolated_node_walks_have_length_1() {
    let mut g = ring(3);
    g.add_node(10).unwrap();
    let cfg = WalkConfig { length: 5, walks_per_node: 2, p: 0.5, q: 2.0, seed: 0 };
    let corpus = walks_for(&g, cfg);
    assert_walks_sane(&g, &corpus, cfg);
    let isolated: Vec<&[NodeId]> = corpus.walks().filter(|w| w[0] == 10).collect();
    assert_eq!(isolated.len(), 2);
    assert!(isolated.iter().all(|w| w.len() == 1));
}

#[test]
fn low_p_walks_backtrack_more() {
    // On a long path every non-start step either returns (weight 1/p) or advances (1/q).
    let mut g = EdgeListGraph::new(false);
    for i in 1..50 {
        g.add_edge(i, i + 1, 1.0).unwrap();
    }
    let returns = |p: f32, q: f32| {
        let corpus = walks_for(&g, WalkConfig { length: 20, walks_per_node: 4, p, q, seed: 5 });
        corpus
            .walks()
            .flat_map(|w| w.windows(3))
            .filter(|w| w[0] == w[2])
            .count()
    };
    assert!(returns(0.25, 4.0) > returns(4.0, 0.25));
}

#[test]
fn exact_probabilities_on_square_with_diagonal() {
    // 1-2-3-4-1 plus 1-3. From (prev=2, curr=1): back to 2 is a return, 3 is a common
    // neighbor of 2, and 4 is at distance 2 from 2.
    let mut g = EdgeListGraph::new(false);
    for (a, b) in [(1, 2), (2, 3), (3, 4), (4, 1), (1, 3)] {
        g.add_edge(a, b, 1.0).unwrap();
    }
    let (p, q) = (0.5, 4.0);
    let prev = g.node_index(2).unwrap();
    let curr = g.node_index(1).unwrap();
    let probs = biased_transition_probs(&g, prev, curr, p, q);
    let nbrs: Vec<NodeId> = g.neighbors(1).map(|(n, _)| n).collect();
    assert_eq!(nbrs, vec![2, 3, 4]);
    let z = 1.0 / p + 1.0 + 1.0 / q;
    let expected = [1.0 / p / z, 1.0 / z, 1.0 / q / z];
    for (got, want) in probs.iter().zip(expected) {
        assert!((got - want).abs() < 1e-6, "{probs:?} vs {expected:?}");
    }
}

proptest! {
    // Property: every row has the right shape and every step follows an edge.
    #[test]
    fn prop_walks_follow_edges_and_are_in_range(
        n in 1u64..8,
        edges in prop::collection::vec((1u64..8, 1u64..8, 0.1f32..5.0), 0..20),
        directed in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let mut g = EdgeListGraph::new(directed);
        for id in 1..=n {
            g.add_node(id).unwrap();
        }
        for (a, b, w) in edges {
            g.add_edge((a - 1) % n + 1, (b - 1) % n + 1, w).unwrap();
        }

        let cfg = WalkConfig { length: 10, walks_per_node: 2, p: 0.5, q: 2.0, seed };
        let corpus = walks_for(&g, cfg);
        assert_walks_sane(&g, &corpus, cfg);
        assert_walks_follow_edges(&g, &corpus);
    }
}

#[cfg(feature = "parallel")]
#[test]
fn parallel_walks_are_thread_count_invariant() {
    let mut g = ring(12);
    for (a, b, w) in [(1, 5, 2.0), (3, 9, 0.5), (4, 11, 1.5)] {
        g.add_edge(a, b, w).unwrap();
    }
    let cfg = WalkConfig { length: 15, walks_per_node: 5, p: 0.5, q: 2.0, seed: 999 };

    let pool1 = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap();
    let pool4 = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .unwrap();

    let w1 = pool1.install(|| walks_for(&g, cfg));
    let w4 = pool4.install(|| walks_for(&g, cfg));
    assert_eq!(w1, w4, "walk output must be thread-count invariant");
}
