//! Benchmark for normalization and extraction
//! Run: cargo bench -p xcluster-core --bench fingerprint

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use xcluster_core::normalize::normalize;
use xcluster_core::parser::ParserRegistry;
use xcluster_core::{NormalizedLog, RawLogEntry};

const JAVA_TRACE: &str = "java.lang.NullPointerException\n\tat com.x.UserService.getUser(UserService.java:45)\n\tat com.x.Handler.handle(Handler.java:12)";
const TEMPLATE_MSG: &str = "Connection failed to 10.0.0.1:5432 at 2025-01-01T00:00:00Z for user 550e8400-e29b-41d4-a716-446655440000";

fn bench_normalize(c: &mut Criterion) {
    c.bench_function("normalize_single", |b| {
        b.iter(|| normalize(black_box(TEMPLATE_MSG)))
    });
}

fn sample_log(message: &str, stack_trace: Option<&str>) -> NormalizedLog {
    let raw = RawLogEntry {
        message: message.to_string(),
        timestamp: Some(chrono::Utc::now()),
        service_id: Some("payment-service".to_string()),
        level: Some(xcluster_core::LogLevel::Error),
        logger: Some("com.x.UserService".to_string()),
        exception_type: None,
        exception_message: None,
        stack_trace: stack_trace.map(|s| s.to_string()),
        hostname: None,
        trace_id: Some("trace-123".to_string()),
        request_id: None,
        fields: Default::default(),
    };
    NormalizedLog::from_raw(raw, "payment-service".to_string())
}

fn bench_extract(c: &mut Criterion) {
    let registry = ParserRegistry::default_registry();
    let log = sample_log("NullPointerException", Some(JAVA_TRACE));

    c.bench_function("extract_stack_traced", |b| {
        b.iter(|| registry.extract(black_box(&log)))
    });

    let stackless = sample_log(TEMPLATE_MSG, None);
    c.bench_function("extract_stack_less", |b| {
        b.iter(|| registry.extract(black_box(&stackless)))
    });
}

fn bench_batch_normalize(c: &mut Criterion) {
    let batch_sizes = [10, 100, 1000, 10000];
    let mut group = c.benchmark_group("batch_normalize");

    for size in batch_sizes {
        let msgs: Vec<String> = (0..size)
            .map(|i| format!("Connection failed to 10.0.0.{}:5432 at 2025-01-01T00:00:00Z", i % 255))
            .collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("normalize", size), &msgs, |b, msgs| {
            b.iter(|| msgs.iter().map(|m| normalize(m)).collect::<Vec<_>>())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_extract, bench_batch_normalize);
criterion_main!(benches);
