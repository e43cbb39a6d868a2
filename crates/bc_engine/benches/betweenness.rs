use std::time::Duration;

use bc_engine::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion, SamplingMode};
use graph_builder::prelude::*;
use rand::prelude::*;

fn random_edges(node_count: usize, edge_count: usize, seed: u64) -> Vec<(usize, usize)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..edge_count)
        .map(|_| (rng.gen_range(0..node_count), rng.gen_range(0..node_count)))
        .collect()
}

fn betweenness(c: &mut Criterion) {
    let node_count = 2_000;
    let edge_count = 8_000;
    let concurrency = 4;

    let graph: UndirectedCsrGraph<usize> = GraphBuilder::new()
        .edges(random_edges(node_count, edge_count, 42))
        .build();

    let partitioned = partition_by_range(&graph, concurrency, |_| PartitionKind::Cpu, |_| PartitionAlgorithm::Random);

    let mut group = c.benchmark_group("betweenness");
    group
        .sample_size(10)
        .measurement_time(Duration::from_secs(60))
        .sampling_mode(SamplingMode::Flat);

    group.bench_function("exact", |b| {
        b.iter(|| black_box(betweenness_hybrid(&partitioned, &BetweennessConfig::default()).unwrap()))
    });

    group.bench_function("approximate", |b| {
        b.iter(|| black_box(betweenness_hybrid(&partitioned, &BetweennessConfig::new(0.1)).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, betweenness);
criterion_main!(benches);
