//! Conformance suite for the metric store backends
//!
//! Every scenario runs unchanged against the in-memory and the SQLite
//! backend; both must show identical upsert semantics.

use std::sync::Arc;

use assert_matches::assert_matches;
use metrics_relay::storage::{MetricStore, StorageError};
use metrics_relay::{Metric, MetricKind, MetricSet, MetricValue};
use pretty_assertions::assert_eq;

use crate::helpers;

async fn counter_accumulates(store: Arc<dyn MetricStore>) {
    store.upsert(Metric::counter("PollCount", 1)).await.unwrap();
    store.upsert(Metric::counter("PollCount", 1)).await.unwrap();

    assert_eq!(
        store.get("PollCount").await.unwrap(),
        Metric::counter("PollCount", 2)
    );
}

async fn gauge_last_write_wins(store: Arc<dyn MetricStore>) {
    for value in [3.5, -1.25, 12.5] {
        store.upsert(Metric::gauge("Alloc", value)).await.unwrap();
    }

    assert_eq!(store.get("Alloc").await.unwrap(), Metric::gauge("Alloc", 12.5));
}

async fn batch_composes_duplicates(store: Arc<dyn MetricStore>) {
    store.upsert(Metric::counter("Requests", 10)).await.unwrap();

    store
        .batch_upsert(vec![
            Metric::counter("Requests", 3),
            Metric::gauge("Alloc", 1.0),
            Metric::counter("Requests", 4),
            Metric::gauge("Alloc", 2.0),
        ])
        .await
        .unwrap();

    assert_eq!(
        store.get("Requests").await.unwrap(),
        Metric::counter("Requests", 17)
    );
    assert_eq!(store.get("Alloc").await.unwrap(), Metric::gauge("Alloc", 2.0));
}

async fn kind_never_changes(store: Arc<dyn MetricStore>) {
    store.upsert(Metric::gauge("Alloc", 1.0)).await.unwrap();

    assert_matches!(
        store.upsert(Metric::counter("Alloc", 1)).await,
        Err(StorageError::KindMismatch {
            stored: MetricKind::Gauge,
            incoming: MetricKind::Counter,
            ..
        })
    );
    assert_eq!(store.get("Alloc").await.unwrap(), Metric::gauge("Alloc", 1.0));
}

async fn rejected_batch_is_not_applied(store: Arc<dyn MetricStore>) {
    store.upsert(Metric::gauge("Alloc", 1.0)).await.unwrap();

    let result = store
        .batch_upsert(vec![
            Metric::counter("PollCount", 5),
            Metric::gauge("Alloc", 2.0),
            Metric::counter("Alloc", 1),
        ])
        .await;

    assert!(result.is_err());
    assert_matches!(store.get("PollCount").await, Err(StorageError::NotFound(_)));
    assert_eq!(store.get("Alloc").await.unwrap(), Metric::gauge("Alloc", 1.0));
}

async fn counter_overflow_is_rejected(store: Arc<dyn MetricStore>) {
    store.upsert(Metric::counter("Big", i64::MAX)).await.unwrap();

    assert_matches!(
        store.upsert(Metric::counter("Big", 1)).await,
        Err(StorageError::CounterOverflow(_))
    );
    assert_eq!(store.get("Big").await.unwrap(), Metric::counter("Big", i64::MAX));
}

async fn reset_counter_zeroes(store: Arc<dyn MetricStore>) {
    store.upsert(Metric::counter("PollCount", 7)).await.unwrap();
    store.reset_counter("PollCount").await.unwrap();
    assert_eq!(
        store.get("PollCount").await.unwrap(),
        Metric::counter("PollCount", 0)
    );

    store.reset_counter("Fresh").await.unwrap();
    assert_eq!(store.get("Fresh").await.unwrap(), Metric::counter("Fresh", 0));

    store.upsert(Metric::gauge("Alloc", 1.0)).await.unwrap();
    assert_matches!(
        store.reset_counter("Alloc").await,
        Err(StorageError::KindMismatch { .. })
    );
}

async fn get_all_is_complete(store: Arc<dyn MetricStore>) {
    assert!(store.get_all().await.unwrap().is_empty());

    store
        .batch_upsert(vec![
            Metric::gauge("Alloc", 12.5),
            Metric::counter("PollCount", 3),
            Metric::gauge("RandomValue", 0.25),
        ])
        .await
        .unwrap();

    let expected: MetricSet = [
        Metric::gauge("Alloc", 12.5),
        Metric::counter("PollCount", 3),
        Metric::gauge("RandomValue", 0.25),
    ]
    .into_iter()
    .map(|metric| (metric.name.clone(), metric))
    .collect();

    assert_eq!(store.get_all().await.unwrap(), expected);
}

async fn missing_metric(store: Arc<dyn MetricStore>) {
    assert_matches!(store.get("nope").await, Err(StorageError::NotFound(name)) if name == "nope");
}

async fn concurrent_increments(store: Arc<dyn MetricStore>) {
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..25 {
                    store.upsert(Metric::counter("Requests", 1)).await.unwrap();
                }
            })
        })
        .collect();

    for task in futures::future::join_all(tasks).await {
        task.unwrap();
    }

    assert_eq!(
        store.get("Requests").await.unwrap(),
        Metric::counter("Requests", 200)
    );
}

async fn upsert_returns_stored_total(store: Arc<dyn MetricStore>) {
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                let mut totals = Vec::new();
                for _ in 0..10 {
                    let stored = store.upsert(Metric::counter("Requests", 1)).await.unwrap();
                    totals.push(stored.value);
                }
                totals
            })
        })
        .collect();

    let mut totals = Vec::new();
    for task in futures::future::join_all(tasks).await {
        totals.extend(task.unwrap());
    }
    totals.sort_by_key(|value| match value {
        MetricValue::Counter(total) => *total,
        MetricValue::Gauge(_) => i64::MIN,
    });

    // every write observed its own total, none saw another writer's
    let expected: Vec<_> = (1..=80).map(MetricValue::Counter).collect();
    assert_eq!(totals, expected);

    assert_eq!(
        store.upsert(Metric::gauge("Alloc", 1.5)).await.unwrap(),
        Metric::gauge("Alloc", 1.5)
    );
}

async fn gauge_value_is_exact(store: Arc<dyn MetricStore>) {
    let value = 96219326996.06847_f64;
    store.upsert(Metric::gauge("Alloc", value)).await.unwrap();

    let stored = store.get("Alloc").await.unwrap();
    assert_matches!(stored.value, MetricValue::Gauge(v) if v.to_bits() == value.to_bits());
}

async fn healthy(store: Arc<dyn MetricStore>) {
    let status = store.health_check().await.unwrap();
    assert!(status.healthy);
    assert!(status.metadata.contains_key("backend"));
}

macro_rules! conformance_suite {
    (@tests $make:path; $($scenario:ident),* $(,)?) => {
        $(
            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn $scenario() {
                let (_dir, store) = $make().await;
                super::$scenario(store).await;
            }
        )*
    };

    ($backend:ident, $make:path) => {
        mod $backend {
            use super::*;

            conformance_suite!(@tests $make;
                counter_accumulates,
                gauge_last_write_wins,
                batch_composes_duplicates,
                kind_never_changes,
                rejected_batch_is_not_applied,
                counter_overflow_is_rejected,
                reset_counter_zeroes,
                get_all_is_complete,
                missing_metric,
                concurrent_increments,
                upsert_returns_stored_total,
                gauge_value_is_exact,
                healthy,
            );
        }
    };
}

conformance_suite!(memory, helpers::memory_store);

#[cfg(feature = "storage-sqlite")]
conformance_suite!(sqlite, helpers::sqlite_store);
