//! Benchmarks for the collection append and scan hot paths.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use strata_column::{ColumnDataAppendState, ColumnDataCollection, ColumnDataScanState, DataChunk};
use strata_common::config::BufferConfig;
use strata_common::constants::VECTOR_SIZE;
use strata_common::types::{LogicalType, Value};
use strata_storage::BufferManager;

fn full_chunk(types: &[LogicalType]) -> DataChunk {
    let mut chunk = DataChunk::from_types(types);
    for i in 0..VECTOR_SIZE {
        chunk
            .append_row(&[
                Value::Int64(i as i64),
                Value::varchar(format!("payload-{i}")),
            ])
            .unwrap();
    }
    chunk
}

fn bench_append(c: &mut Criterion) {
    let types = vec![LogicalType::Int64, LogicalType::Varchar];
    let chunk = full_chunk(&types);

    let mut group = c.benchmark_group("collection_append");
    for chunks in [4usize, 32] {
        group.throughput(Throughput::Elements((chunks * VECTOR_SIZE) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chunks), &chunks, |b, &chunks| {
            b.iter(|| {
                let manager = Arc::new(BufferManager::new(BufferConfig::default()));
                let mut collection = ColumnDataCollection::new(manager, types.clone());
                let mut state = ColumnDataAppendState::default();
                collection.initialize_append(&mut state);
                for _ in 0..chunks {
                    collection.append(&mut state, &chunk).unwrap();
                }
                collection
            });
        });
    }
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let types = vec![LogicalType::Int64, LogicalType::Varchar];
    let chunk = full_chunk(&types);
    let manager = Arc::new(BufferManager::new(BufferConfig::default()));
    let mut collection = ColumnDataCollection::new(manager, types);
    for _ in 0..32 {
        collection.append_chunk(&chunk).unwrap();
    }

    let mut group = c.benchmark_group("collection_scan");
    group.throughput(Throughput::Elements(collection.count() as u64));
    group.bench_function("scan_32_chunks", |b| {
        b.iter(|| {
            let mut state = ColumnDataScanState::default();
            collection.initialize_scan(&mut state);
            let mut out = DataChunk::default();
            let mut rows = 0usize;
            loop {
                collection.scan(&mut state, &mut out).unwrap();
                if out.is_empty() {
                    break;
                }
                rows += out.len();
            }
            rows
        });
    });
    group.finish();
}

criterion_group!(benches, bench_append, bench_scan);
criterion_main!(benches);
