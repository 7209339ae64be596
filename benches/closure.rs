//! Transitive-closure and path-query benchmarks.
//!
//! The closure is the asymptotic bottleneck of query evaluation, so it gets
//! its own size sweep; the end-to-end RPQ benchmark covers the product
//! construction on top of it.
//!
//! Run with:
//! ```bash
//! cargo bench --bench closure
//! ```

use std::collections::BTreeSet;
use std::hint::black_box;

use cfpq_rs::cfg::Grammar;
use cfpq_rs::cfpq::cfpq_with_hellings;
use cfpq_rs::graph::LabeledGraph;
use cfpq_rs::matrix::BoolMatrix;
use cfpq_rs::rpq::regular_path_query;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn random_matrix(n: usize, edges: usize, rng: &mut ChaCha8Rng) -> BoolMatrix {
    let mut m = BoolMatrix::new(n);
    for _ in 0..edges {
        m.set(rng.gen_range(0..n), rng.gen_range(0..n));
    }
    m
}

fn random_graph(n: u32, edges: usize, labels: &[&str], rng: &mut ChaCha8Rng) -> LabeledGraph {
    let mut graph = LabeledGraph::new();
    for v in 0..n {
        graph.add_vertex(v);
    }
    for _ in 0..edges {
        let label = labels[rng.gen_range(0..labels.len())];
        graph.add_edge(rng.gen_range(0..n), label, rng.gen_range(0..n));
    }
    graph
}

fn bench_transitive_closure(c: &mut Criterion) {
    let mut group = c.benchmark_group("transitive_closure");
    for &n in &[64usize, 128, 256] {
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let mut rng = ChaCha8Rng::seed_from_u64(42);
            // ~4 edges per vertex keeps the closure nontrivial but sparse.
            let m = random_matrix(n, n * 4, &mut rng);
            b.iter(|| black_box(m.transitive_closure()));
        });
    }
    group.finish();
}

fn bench_rpq(c: &mut Criterion) {
    c.bench_function("rpq_random_graph_128", |b| {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let graph = random_graph(128, 512, &["a", "b", "c"], &mut rng);
        let starts: BTreeSet<u32> = (0..16).collect();
        b.iter(|| {
            black_box(
                regular_path_query(&graph, Some(&starts), None, "a.(b|c)*").unwrap(),
            )
        });
    });
}

fn bench_cfpq_hellings(c: &mut Criterion) {
    c.bench_function("cfpq_hellings_random_graph_64", |b| {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let graph = random_graph(64, 256, &["a", "b"], &mut rng);
        let grammar = Grammar::from_text("S -> a S b | a b").unwrap();
        b.iter(|| black_box(cfpq_with_hellings(&grammar, &graph, None, None).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_transitive_closure,
    bench_rpq,
    bench_cfpq_hellings
);
criterion_main!(benches);
