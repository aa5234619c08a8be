//! Criterion benchmarks for u-evo.
//!
//! Measures the engine overhead on synthetic problems: statistics,
//! selection pool rounds, topology construction, and time-to-target on the
//! Sphere function for both population kinds.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use std::sync::Arc;
use std::thread;
use u_evo::generational::{Generational, GenerationalConfig};
use u_evo::graph::{Graph, GraphConfig, Topology};
use u_evo::recycle::Recycler;
use u_evo::sel::{binary_tournament, SelectionPool};
use u_evo::{Genome, Population, Stats};

// ===========================================================================
// Sphere function: maximize -sum(x_i^2)
// ===========================================================================

struct Sphere {
    genes: Vec<f64>,
}

impl Sphere {
    fn random(dim: usize) -> Arc<Self> {
        let mut rng = rand::rng();
        Arc::new(Self {
            genes: (0..dim).map(|_| rng.random_range(-5.0..5.0)).collect(),
        })
    }
}

impl Genome for Sphere {
    fn fitness(&self) -> f64 {
        -self.genes.iter().map(|x| x * x).sum::<f64>()
    }

    fn evolve(self: Arc<Self>, suitors: &[Arc<Self>]) -> Arc<Self> {
        let mut rng = rand::rng();
        let mate = binary_tournament(suitors, &mut rng);
        let genes = self
            .genes
            .iter()
            .zip(&mate.genes)
            .map(|(a, b)| {
                let x = if rng.random_bool(0.5) { *a } else { *b };
                x + rng.random_range(-0.1..0.1)
            })
            .collect();
        let child = Arc::new(Sphere { genes });
        if child.fitness() > self.fitness() {
            child
        } else {
            self
        }
    }
}

fn wait_for<P: Population>(pop: &P, target: f64) {
    while pop.stats().max() < target {
        thread::yield_now();
    }
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats");
    let mut rng = rand::rng();

    for &n in &[100usize, 10_000] {
        let xs: Vec<f64> = (0..n).map(|_| rng.random_range(-1e3..1e3)).collect();
        group.bench_with_input(BenchmarkId::new("insert", n), &xs, |b, xs| {
            b.iter(|| {
                let stats: Stats = black_box(xs).iter().copied().collect();
                black_box(stats.variance())
            })
        });

        let (left, right) = xs.split_at(n / 2);
        let left: Stats = left.iter().copied().collect();
        let right: Stats = right.iter().copied().collect();
        group.bench_with_input(BenchmarkId::new("merge", n), &(left, right), |b, (l, r)| {
            b.iter(|| black_box(l.merge(black_box(r))))
        });
    }
    group.finish();
}

fn bench_topology(c: &mut Criterion) {
    let mut group = c.benchmark_group("topology");
    for &n in &[64usize, 1024] {
        group.bench_with_input(BenchmarkId::new("ring", n), &n, |b, &n| {
            b.iter(|| black_box(Topology::ring(black_box(n))))
        });
        group.bench_with_input(BenchmarkId::new("grid", n), &n, |b, &n| {
            b.iter(|| black_box(Topology::grid(black_box(n))))
        });
        group.bench_with_input(BenchmarkId::new("hypercube", n), &n, |b, &n| {
            b.iter(|| black_box(Topology::hypercube(black_box(n))))
        });
    }
    group.finish();
}

fn bench_elite_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("elite_pool");
    for (mu, lambda) in [(1usize, 8usize), (8, 64), (32, 256)] {
        let pool = SelectionPool::elite(mu, lambda).unwrap();
        let candidates: Vec<Arc<Sphere>> = (0..lambda).map(|_| Sphere::random(8)).collect();
        group.bench_with_input(
            BenchmarkId::new(format!("mu{}_lambda{}", mu, lambda), lambda),
            &candidates,
            |b, candidates| {
                b.iter(|| {
                    for g in candidates {
                        pool.put(g.clone()).unwrap();
                    }
                    for _ in 0..mu {
                        black_box(pool.get().unwrap());
                    }
                })
            },
        );
        pool.close().unwrap();
    }
    group.finish();
}

fn bench_recycler(c: &mut Criterion) {
    let recycler = Recycler::<f64>::new();
    c.bench_function("recycler_take_give", |b| {
        b.iter(|| {
            let mut buf = recycler.take(black_box(256));
            buf.push(1.0);
            recycler.give(buf);
        })
    });
}

fn bench_graph_sphere(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_sphere");
    group.sample_size(10);
    for &n in &[16usize, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let seeds = (0..n).map(|_| Sphere::random(4));
                let graph = Graph::hypercube(seeds, GraphConfig::default()).unwrap();
                wait_for(&graph, -0.1);
                graph.close().unwrap();
            })
        });
    }
    group.finish();
}

fn bench_generational_sphere(c: &mut Criterion) {
    let mut group = c.benchmark_group("generational_sphere");
    group.sample_size(10);
    for &n in &[8usize, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let seeds = (0..n).map(|_| Sphere::random(4));
                let pop = Generational::new(seeds, GenerationalConfig::default()).unwrap();
                wait_for(&pop, -0.1);
                pop.close().unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_stats,
    bench_topology,
    bench_elite_pool,
    bench_recycler,
    bench_graph_sphere,
    bench_generational_sphere
);
criterion_main!(benches);
