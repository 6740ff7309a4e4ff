//! Performance benchmarks for rating submission and read paths

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use tasting_room::rating::{AggregatorConfig, RatingAggregator};
use tasting_room::store::InMemoryDocumentStore;
use tasting_room::types::ItemType;

fn create_bench_aggregator() -> RatingAggregator {
    RatingAggregator::new(
        Arc::new(InMemoryDocumentStore::new()),
        AggregatorConfig::default(),
    )
}

fn bench_first_submission(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("first_submission", |b| {
        b.iter(|| {
            rt.block_on(async {
                let aggregator = create_bench_aggregator();
                black_box(
                    aggregator
                        .submit_rating(Some("bench_user"), "bench_item", 4, ItemType::Recipe)
                        .await,
                )
            })
        })
    });
}

fn bench_re_rating(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("re_rating_existing_item", |b| {
        b.iter(|| {
            rt.block_on(async {
                let aggregator = create_bench_aggregator();

                // Seed 20 raters so the aggregate update path is realistic
                for i in 0..20i64 {
                    let user = format!("user_{}", i);
                    let rating = (i % 5) + 1;
                    let _ = aggregator
                        .submit_rating(Some(&user), "bench_item", rating, ItemType::Recipe)
                        .await;
                }

                black_box(
                    aggregator
                        .submit_rating(Some("user_0"), "bench_item", 5, ItemType::Recipe)
                        .await,
                )
            })
        })
    });
}

fn bench_cached_stats_read(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let aggregator = create_bench_aggregator();
    rt.block_on(async {
        aggregator
            .submit_rating(Some("bench_user"), "bench_item", 4, ItemType::Recipe)
            .await
            .unwrap();
    });

    c.bench_function("cached_stats_read", |b| {
        b.iter(|| black_box(aggregator.get_rating_stats("bench_item")))
    });
}

fn bench_load_item_data(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let aggregator = create_bench_aggregator();
    rt.block_on(async {
        aggregator
            .submit_rating(Some("bench_user"), "bench_item", 4, ItemType::Recipe)
            .await
            .unwrap();
    });

    c.bench_function("load_item_data", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(
                    aggregator
                        .load_item_data(Some("bench_user"), "bench_item")
                        .await,
                )
            })
        })
    });
}

criterion_group!(
    benches,
    bench_first_submission,
    bench_re_rating,
    bench_cached_stats_read,
    bench_load_item_data
);
criterion_main!(benches);
