use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use tileset_core::prelude::*;

fn generate_frames(count: usize, min_size: u32, max_size: u32) -> Vec<Frame> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x7117);
    (0..count)
        .map(|i| {
            let w = rng.gen_range(min_size..=max_size);
            let h = rng.gen_range(min_size..=max_size);
            Frame::new(format!("frame_{i}"), w, h)
        })
        .collect()
}

fn bench_pack_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack_growth");

    for count in [50, 200, 800] {
        let frames = generate_frames(count, 8, 96);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("fixed", count), &frames, |b, frames| {
            let opts = PackOptions::builder().rotatable(false).build();
            b.iter(|| black_box(pack(frames, &opts)));
        });

        group.bench_with_input(BenchmarkId::new("rotatable", count), &frames, |b, frames| {
            let opts = PackOptions::builder().rotatable(true).build();
            b.iter(|| black_box(pack(frames, &opts)));
        });

        group.bench_with_input(BenchmarkId::new("padded", count), &frames, |b, frames| {
            let opts = PackOptions::builder().rotatable(true).padding(2).build();
            b.iter(|| black_box(pack(frames, &opts)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pack_growth);
criterion_main!(benches);
