use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use lzrescue::diff::copy_and_diff;
use lzrescue::try_decode;

fn bench_trial_decode(c: &mut Criterion) {
    let member = std::fs::read(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/big.lz")).unwrap();
    let size = member.len() as u64;

    c.bench_function("trial_decode_80k_member", |b| {
        b.iter(|| {
            let mut cur = Cursor::new(black_box(&member[..]));
            try_decode(&mut cur, size)
        })
    });
}

fn bench_diff_scan(c: &mut Criterion) {
    let a: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
    let mut damaged = a.clone();
    damaged[5_000] ^= 0xFF;
    damaged[700_000] ^= 0x0F;

    c.bench_function("diff_scan_1mb_two_copies", |b| {
        b.iter(|| {
            let mut sources = [Cursor::new(&a[..]), Cursor::new(&damaged[..])];
            let mut out = std::io::sink();
            copy_and_diff(black_box(&mut sources), &mut out).unwrap()
        })
    });
}

criterion_group!(benches, bench_trial_decode, bench_diff_scan);
criterion_main!(benches);
