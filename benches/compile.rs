use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dagc_core::prelude::*;
use dagc_planner::compile;

/// A chain of `iterations` single-iteration loops, each a shuffle-fed
/// update that reads the previous iteration and a loop-invariant input.
fn iterative_job(iterations: usize) -> DagBuilder {
    let edge = |p, a: &Vertex, b: &Vertex| Edge::new(p, a.id(), b.id(), Coder::bytes());
    let input = Vertex::source("input");
    let parse = Vertex::operator("parse");
    let model = Vertex::operator("initModel");

    let mut builder = DagBuilder::new();
    for v in [&input, &parse, &model] {
        builder.add_vertex(v.clone());
    }
    let links = [
        edge(CommunicationPattern::OneToOne, &input, &parse),
        edge(CommunicationPattern::OneToOne, &parse, &model),
    ];
    for e in links {
        let _ = builder.connect_vertices(e);
    }

    let mut previous = model;
    for _ in 0..iterations {
        let header = LoopHeader::new("train", 1);
        let step = Vertex::operator("step");
        builder.add_vertex_in_loop(step.clone(), &header);
        let _ = builder.connect_vertices(edge(CommunicationPattern::Shuffle, &parse, &step));
        let _ = builder.connect_vertices(edge(CommunicationPattern::Shuffle, &previous, &step));
        previous = step;
    }
    let sink = Vertex::operator("save");
    builder.add_vertex(sink.clone());
    let _ = builder.connect_vertices(edge(CommunicationPattern::OneToOne, &previous, &sink));
    builder
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for policy in ["default", "relay-shuffle"] {
        let cfg = CompilerConfig {
            policy: policy.to_string(),
            ..CompilerConfig::default()
        };
        for iterations in [4usize, 16, 64] {
            let job = iterative_job(iterations);
            group.bench_with_input(BenchmarkId::new(policy, iterations), &job, |b, job| {
                b.iter(|| {
                    let plan = compile(job.clone(), &cfg);
                    black_box(plan.map(|p| p.stage_count()))
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);
