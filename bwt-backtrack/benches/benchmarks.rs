use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bwt_backtrack::align::{AlignConfig, Aligner, SaRange, Selection, SuffixLocator};
use bwt_backtrack::index::{fm, Bound};
use bwt_backtrack::util::dna::Base;

fn make_reference(len: usize) -> Vec<u8> {
    let bases = [b'A', b'C', b'G', b'T'];
    let mut seq = Vec::with_capacity(len);
    let mut x: u32 = 42;
    for _ in 0..len {
        x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        seq.push(bases[(x >> 16) as usize % 4]);
    }
    seq
}

fn build_aligner(seq: &[u8]) -> Aligner {
    let idx = fm::FmIndex::build(seq, 64, 16).expect("bench reference is ACGT");
    Aligner::new(Arc::new(idx), AlignConfig { selection: Selection::Ordered, ..AlignConfig::default() })
}

fn bench_rank(c: &mut Criterion) {
    let reference = make_reference(100_000);
    let aligner = build_aligner(&reference);
    let idx = aligner.index();

    c.bench_function("rank_sweep_1k", |b| {
        b.iter(|| {
            let mut acc = 0usize;
            for row in (0..idx.len()).step_by(100) {
                acc += idx.rank(black_box(Base::G), row, Bound::High);
            }
            black_box(acc)
        })
    });
}

fn bench_exact_read(c: &mut Criterion) {
    let reference = make_reference(100_000);
    let aligner = build_aligner(&reference);
    let read = reference[5_000..5_100].to_vec();
    let quals = vec![40u8; read.len()];

    c.bench_function("align_exact_100bp", |b| {
        b.iter(|| black_box(aligner.align(black_box(&read), black_box(&quals))))
    });
}

fn bench_mismatch_read(c: &mut Criterion) {
    let reference = make_reference(100_000);
    let aligner = build_aligner(&reference);
    let mut read = reference[20_000..20_100].to_vec();
    read[40] = if read[40] == b'A' { b'C' } else { b'A' };
    let mut quals = vec![40u8; read.len()];
    quals[40] = 3;

    c.bench_function("align_one_mismatch_100bp", |b| {
        b.iter(|| black_box(aligner.align(black_box(&read), black_box(&quals))))
    });
}

fn bench_locate(c: &mut Criterion) {
    let reference = make_reference(100_000);
    let aligner = build_aligner(&reference);
    let idx = aligner.index();
    let (low, high) = idx.block(Base::T).expect("reference has T");
    let range = SaRange { low, high: high.min(low + 999) };

    c.bench_function("locate_1k_rows", |b| {
        b.iter(|| black_box(SuffixLocator::new(idx).locate_range(black_box(range))))
    });
}

criterion_group!(benches, bench_rank, bench_exact_read, bench_mismatch_read, bench_locate);
criterion_main!(benches);
