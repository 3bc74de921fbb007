//! Benchmarks for the lowering pipeline

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use prism::prelude::*;

/// A chain of `depth` pointwise stages, each calling the previous one
fn chain(depth: usize) -> Function {
    let x = Expr::var("x");
    let mut stage = Function::new("stage0", ["x"], x.clone() + 1);
    for i in 1..depth {
        stage = Function::new(
            format!("stage{}", i),
            ["x"],
            stage.call(vec![x.clone()]) * 2,
        );
    }
    stage
}

fn stencil() -> Function {
    let (x, y) = (Expr::var("x"), Expr::var("y"));
    let g = Function::new("g", ["x", "y"], x.clone() - y.clone());
    let f = Function::new(
        "f",
        ["x", "y"],
        g.call(vec![x.clone(), y.clone()]) + g.call(vec![x, y.clone() - 1]),
    );
    g.store_at(&f, "y").compute_at(&f, "x");
    f
}

fn bench_lower_pointwise(c: &mut Criterion) {
    c.bench_function("lower_pointwise", |b| {
        b.iter(|| {
            let (x, y) = (Expr::var("x"), Expr::var("y"));
            let f = Function::new("f", ["x", "y"], x + y);
            black_box(lower(&f).unwrap())
        })
    });
}

fn bench_lower_stencil(c: &mut Criterion) {
    c.bench_function("lower_stencil_compute_at", |b| {
        b.iter(|| black_box(lower(&stencil()).unwrap()))
    });
}

fn bench_lower_inline_chain(c: &mut Criterion) {
    c.bench_function("lower_inline_chain_16", |b| {
        b.iter(|| black_box(lower(&chain(16)).unwrap()))
    });
}

fn bench_realization_order(c: &mut Criterion) {
    let out = chain(32);
    let mut env = Environment::default();
    prism::lower::populate_environment(&out, &mut env).unwrap();
    c.bench_function("realization_order_chain_32", |b| {
        b.iter(|| {
            black_box(
                prism::lower::realization_order(out.name(), &env).unwrap(),
            )
        })
    });
}

fn bench_qualify(c: &mut Criterion) {
    let mut e = Expr::var("x");
    for _ in 0..64 {
        e = e.clone() + Expr::var("y") * Expr::var("z");
    }
    c.bench_function("qualify_deep_expr", |b| {
        b.iter(|| black_box(qualify_expr("f.", &e)))
    });
}

criterion_group!(
    benches,
    bench_lower_pointwise,
    bench_lower_stencil,
    bench_lower_inline_chain,
    bench_realization_order,
    bench_qualify
);
criterion_main!(benches);
