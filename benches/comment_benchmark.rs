use criterion::{black_box, criterion_group, criterion_main, Criterion};
use patzer::comments::CommentTags;

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("comment annotations", |b| {
        b.iter(|| CommentTags::new(black_box(b" [%eval 0.17] [%clk 0:00:30] ")).count())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
