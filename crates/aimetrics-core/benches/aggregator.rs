//! Aggregation throughput over synthetic record batches

use aimetrics::analytics::{bucket_records, summarize_records, MetricsAggregator};
use aimetrics::db::{MemoryStore, MetricStore};
use aimetrics::models::{AiOperation, AiService, MetricRecord, NewMetricRecord, TimeRange};
use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tokio::runtime::Runtime;
use uuid::Uuid;

fn synthetic_records(count: usize) -> Vec<MetricRecord> {
    let now = Utc::now();
    (0..count)
        .map(|i| MetricRecord {
            id: Uuid::new_v4(),
            timestamp: now - Duration::seconds(i as i64 * 7 % 86_000 + 1),
            service: if i % 3 == 0 { AiService::HuggingFace } else { AiService::Groq },
            operation: AiOperation::Summarization,
            success: i % 17 != 0,
            response_time_ms: 50 + (i as u64 * 31) % 4000,
            error: None,
            tokens_used: Some(500),
            estimated_cost: 0.0001,
            confidence: (i % 4 != 0).then(|| (i % 100) as f64 / 100.0),
            suggestion_id: None,
            user_id: None,
        })
        .collect()
}

fn bench_pure_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("pure_aggregation");

    for size in [1_000usize, 10_000, 100_000] {
        let records = synthetic_records(size);
        let window = TimeRange::Last24Hours.window();
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("summarize", size), &records, |b, records| {
            b.iter(|| black_box(summarize_records(TimeRange::Last24Hours, window, records)));
        });

        group.bench_with_input(BenchmarkId::new("bucket_hourly", size), &records, |b, records| {
            b.iter(|| black_box(bucket_records(records, Duration::hours(1))));
        });
    }

    group.finish();
}

fn bench_memory_store_summary(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = Arc::new(MemoryStore::new());

    rt.block_on(async {
        for r in synthetic_records(10_000) {
            store
                .append(NewMetricRecord {
                    timestamp: r.timestamp,
                    service: r.service,
                    operation: r.operation,
                    success: r.success,
                    response_time_ms: r.response_time_ms,
                    error: r.error,
                    tokens_used: r.tokens_used,
                    estimated_cost: r.estimated_cost,
                    confidence: r.confidence,
                    suggestion_id: None,
                    user_id: None,
                })
                .await
                .unwrap();
        }
    });

    let aggregator = MetricsAggregator::new(store, 100_000);

    c.bench_function("memory_store_summary_10k", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(aggregator.summarize(TimeRange::Last24Hours).await) });
    });
}

criterion_group!(benches, bench_pure_aggregation, bench_memory_store_summary);
criterion_main!(benches);
