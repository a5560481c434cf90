//! Benchmark: generic decode vs compiled matcher vs build, over a batch of
//! length-prefixed records (see `PATTERN`).
//! Also prints a rough records/s comparison after the criterion runs.

use bitsyntax::{compile, decode, parse, Bindings, Value};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const PATTERN: &str = "165:8, kind:8, len:16, payload:len/binary, crc:32/little";
const RECORDS: usize = 1_000;

fn make_records(pattern: &bitsyntax::Pattern) -> Vec<Vec<u8>> {
    (0..RECORDS)
        .map(|i| {
            let payload: Vec<u8> = (0..(i % 64) as u8).collect();
            let mut b = Bindings::new();
            b.insert("kind".to_string(), Value::UInt((i % 4) as u64));
            b.insert("len".to_string(), Value::UInt(payload.len() as u64));
            b.insert("payload".to_string(), Value::from(payload));
            b.insert("crc".to_string(), Value::UInt(i as u64 * 2654435761 % (1 << 32)));
            pattern.build(&b).expect("build")
        })
        .collect()
}

fn decode_all(pattern: &bitsyntax::Pattern, records: &[Vec<u8>]) -> usize {
    records
        .iter()
        .filter(|r| decode(pattern, r, None).is_some())
        .count()
}

fn match_all(matcher: &bitsyntax::Matcher, records: &[Vec<u8>]) -> usize {
    records
        .iter()
        .filter(|r| matcher.decode(r, None).is_some())
        .count()
}

fn bench_match(c: &mut Criterion) {
    let pattern = parse(PATTERN).expect("parse");
    let matcher = compile(&pattern);
    let records = make_records(&pattern);
    let total_bytes: usize = records.iter().map(Vec::len).sum();
    assert_eq!(decode_all(&pattern, &records), RECORDS);
    assert_eq!(match_all(&matcher, &records), RECORDS);
    eprintln!("match_bench: {} records, {} bytes", RECORDS, total_bytes);

    c.bench_function("decode_generic", |b| {
        b.iter(|| black_box(decode_all(&pattern, black_box(&records))));
    });

    c.bench_function("decode_compiled", |b| {
        b.iter(|| black_box(match_all(&matcher, black_box(&records))));
    });

    c.bench_function("decode_build_round_trip", |b| {
        b.iter(|| {
            let mut bytes = 0usize;
            for r in &records {
                if let Some(bound) = matcher.decode(black_box(r), None) {
                    bytes += pattern.build(&bound).map(|v| v.len()).unwrap_or(0);
                }
            }
            black_box(bytes)
        });
    });

    const ITERS: u32 = 2_000;
    let mut rates = Vec::new();
    for (label, compiled) in [("generic", false), ("compiled", true)] {
        let start = std::time::Instant::now();
        for _ in 0..ITERS {
            if compiled {
                match_all(&matcher, &records);
            } else {
                decode_all(&pattern, &records);
            }
        }
        let ns = start.elapsed().as_nanos() / (ITERS as u128);
        rates.push((label, (RECORDS as f64) / (ns as f64 / 1e9)));
    }
    eprintln!();
    eprintln!("--- records/s ({} bytes per batch) ---", total_bytes);
    for (label, rate) in rates {
        eprintln!("  {:10} ~{:.2} M/s", label, rate / 1e6);
    }
}

criterion_group!(benches, bench_match);
criterion_main!(benches);
