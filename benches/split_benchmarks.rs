//! Throughput benchmarks for record splitting
//! Verifies that splitting cost stays linear in input size regardless of chunking

use changes_feed::config::FeedConfig;
use changes_feed::feed::{split_chunks, FeedMode};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::hint::black_box;

/// Build `count` realistic change rows
fn create_rows(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            json!({
                "seq": format!("{}-g1AAAAB{}", i, "x".repeat(24)),
                "id": format!("doc_{i}"),
                "changes": [{"rev": format!("{}-abcdef0123456789", i % 7 + 1)}],
                "doc": {"title": "braces {inside} [strings]", "n": i},
            })
            .to_string()
        })
        .collect()
}

fn long_poll_body(count: usize) -> Vec<u8> {
    format!(
        "{{\"results\":[\n{}\n],\n\"last_seq\":{count}}}\n",
        create_rows(count).join(",\n")
    )
    .into_bytes()
}

fn continuous_body(count: usize) -> Vec<u8> {
    let mut body = create_rows(count).join("\n\n");
    body.push('\n');
    body.into_bytes()
}

/// Benchmark long-poll splitting across chunk sizes
fn bench_long_poll_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("long_poll_split");
    let body = long_poll_body(2000);
    let config = FeedConfig::long_poll();
    group.throughput(Throughput::Bytes(body.len() as u64));

    for chunk_size in [1, 64, 4096, 65536] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let result = split_chunks(
                        FeedMode::LongPoll,
                        &config,
                        body.chunks(chunk_size),
                    );
                    black_box(result)
                });
            },
        );
    }

    group.finish();
}

/// Benchmark continuous splitting across chunk sizes
fn bench_continuous_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("continuous_split");
    let body = continuous_body(2000);
    let config = FeedConfig::continuous();
    group.throughput(Throughput::Bytes(body.len() as u64));

    for chunk_size in [1, 64, 4096, 65536] {
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &chunk_size,
            |b, &chunk_size| {
                b.iter(|| {
                    let result = split_chunks(
                        FeedMode::Continuous,
                        &config,
                        body.chunks(chunk_size),
                    );
                    black_box(result)
                });
            },
        );
    }

    group.finish();
}

/// Benchmark a single large record arriving in small pieces
fn bench_large_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("large_record");

    for size in [1_000, 100_000, 1_000_000] {
        let payload = json!({"id": "big", "data": "y".repeat(size)}).to_string();
        let body = format!("{{\"results\":[{payload}],\"last_seq\":1}}").into_bytes();
        let config = FeedConfig::long_poll();
        group.throughput(Throughput::Bytes(body.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &body, |b, body| {
            b.iter(|| black_box(split_chunks(FeedMode::LongPoll, &config, body.chunks(512))));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_long_poll_split,
    bench_continuous_split,
    bench_large_record,
);

criterion_main!(benches);
