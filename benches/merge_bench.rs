//! Benchmarks for the refresh path.
//!
//! Measures the grace-window merge at several collection sizes and
//! protection ratios, and envelope normalization for each shape.

use std::collections::HashSet;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use reconciler::envelope::{EnvelopeShape, RawEnvelope, ResponseEnvelopeParser};
use reconciler::entity::{Entity, RecordId};
use reconciler::reconcile::{Protection, ReconciliationMerger};
use reconciler::store::EntityStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Check {
    id: RecordId,
    status: String,
    score: u32,
}

impl Entity for Check {
    type Id = RecordId;
    const KIND: &'static str = "check";

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn differs_from(&self, other: &Self) -> bool {
        self.status != other.status
    }
}

fn checks(size: usize, status: &str) -> Vec<Check> {
    (0..size)
        .map(|index| Check {
            id: RecordId::new(format!("qc-{index}")),
            status: status.to_string(),
            score: u32::try_from(index).unwrap_or(u32::MAX),
        })
        .collect()
}

// =============================================================================
// merge Benchmark
// =============================================================================

fn benchmark_merge(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("merge");

    for size in [100, 1_000, 10_000] {
        let server = checks(size, "pending");
        let store: EntityStore<Check> = checks(size, "approved").into_iter().collect();

        // Nothing protected: every id takes the server value
        group.bench_with_input(BenchmarkId::new("unprotected", size), &size, |bencher, _| {
            let protection = Protection::none();
            bencher.iter(|| {
                black_box(ReconciliationMerger::merge(
                    black_box(server.clone()),
                    &store,
                    &protection,
                ))
            });
        });

        // One id in ten recently confirmed
        group.bench_with_input(BenchmarkId::new("confirmed_10pct", size), &size, |bencher, _| {
            let protection = Protection {
                confirmed: (0..size)
                    .step_by(10)
                    .map(|index| RecordId::new(format!("qc-{index}")))
                    .collect::<HashSet<_>>(),
                ..Protection::none()
            };
            bencher.iter(|| {
                black_box(ReconciliationMerger::merge(
                    black_box(server.clone()),
                    &store,
                    &protection,
                ))
            });
        });
    }

    group.finish();
}

// =============================================================================
// parse Benchmark
// =============================================================================

fn benchmark_parse(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("parse");
    let records: Vec<Value> = checks(1_000, "pending")
        .iter()
        .map(|check| serde_json::to_value(check).unwrap_or(Value::Null))
        .collect();

    for shape in [
        EnvelopeShape::Bare,
        EnvelopeShape::Data,
        EnvelopeShape::Items,
        EnvelopeShape::Paginated,
    ] {
        let body = RawEnvelope::wrap(shape, records.clone(), None).into_value();
        group.bench_with_input(BenchmarkId::new("shape", shape), &body, |bencher, body| {
            bencher.iter(|| black_box(ResponseEnvelopeParser::parse::<Check>(black_box(body.clone()))));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_merge, benchmark_parse);
criterion_main!(benches);
