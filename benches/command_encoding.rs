//! Command framing benchmark suite.
//!
//! Measures the cost of tagging and encoding command payloads:
//! - Payload field counts: 1, 16, 128
//! - Dropped sends (no connection) through the manager
//!
//! Run with: cargo bench --bench command_encoding
//! Results saved to: target/criterion/

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;
use std::hint::black_box;
use ws_command_client::protocol::{CommandData, encode_command};
use ws_command_client::{ConnectionManager, PageOrigin};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const FIELD_COUNTS: &[usize] = &[1, 16, 128];

fn payload(fields: usize) -> CommandData {
    (0..fields)
        .map(|i| (format!("field_{i}"), json!({ "x": i, "y": [1.0, 2.0, 3.0] })))
        .collect()
}

// ============================================================================
// Benchmark: Encode
// ============================================================================

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_command");

    for &count in FIELD_COUNTS {
        let data = payload(count);
        group.bench_with_input(BenchmarkId::new("fields", count), &data, |b, data| {
            b.iter(|| {
                let mut data = data.clone();
                black_box(encode_command(black_box("CreateEntity"), &mut data))
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Dropped Send
// ============================================================================

fn bench_dropped_send(c: &mut Criterion) {
    let manager = ConnectionManager::new(PageOrigin::default());
    let mut data = payload(16);

    c.bench_function("send_command_without_connection", |b| {
        b.iter(|| manager.send_command(black_box("ping"), &mut data));
    });
}

criterion_group!(benches, bench_encode, bench_dropped_send);
criterion_main!(benches);
