//! Integration tests for the columnar collection: append/scan round trips,
//! combine semantics and pin accounting.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use strata_column::{
    ColumnDataAppendState, ColumnDataCollection, ColumnDataScanState, DataChunk,
};
use strata_common::config::BufferConfig;
use strata_common::constants::VECTOR_SIZE;
use strata_common::types::{LogicalType, Value};
use strata_storage::BufferManager;

fn buffer_manager() -> Arc<BufferManager> {
    Arc::new(BufferManager::new(BufferConfig::default()))
}

fn scan_rows(collection: &ColumnDataCollection) -> Vec<Vec<Value>> {
    let mut state = ColumnDataScanState::default();
    collection.initialize_scan(&mut state);
    let mut chunk = DataChunk::default();
    let mut rows = Vec::new();
    loop {
        collection.scan(&mut state, &mut chunk).unwrap();
        if chunk.is_empty() {
            break;
        }
        for row in 0..chunk.len() {
            rows.push(
                (0..chunk.column_count())
                    .map(|col| chunk.value(col, row).clone())
                    .collect(),
            );
        }
    }
    rows
}

fn random_string(rng: &mut StdRng) -> String {
    let len = rng.gen_range(0..64);
    (0..len)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}

#[test]
fn test_round_trip_2000_rows_int_varchar() {
    let manager = buffer_manager();
    let types = vec![LogicalType::Int32, LogicalType::Varchar];
    let mut collection =
        ColumnDataCollection::with_block_size(Arc::clone(&manager), types.clone(), 4096);

    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let mut expected: Vec<Vec<Value>> = Vec::with_capacity(2000);
    let mut state = ColumnDataAppendState::default();
    collection.initialize_append(&mut state);

    let mut chunk = DataChunk::from_types(&types);
    for i in 0..2000i32 {
        let row = vec![Value::Int32(i), Value::varchar(random_string(&mut rng))];
        chunk.append_row(&row).unwrap();
        expected.push(row);
        if chunk.len() == VECTOR_SIZE {
            collection.append(&mut state, &chunk).unwrap();
            chunk.reset();
        }
    }
    collection.append(&mut state, &chunk).unwrap();
    drop(state);

    collection.verify().unwrap();
    assert_eq!(collection.count(), 2000);
    assert!(collection.segment_count() >= 1);

    let rows = scan_rows(&collection);
    assert_eq!(rows, expected);

    // After all states drop, no block remains pinned.
    assert_eq!(manager.pinned_block_count(), 0);
}

#[test]
fn test_row_order_preserved_across_many_chunks() {
    let mut collection = ColumnDataCollection::new(buffer_manager(), vec![LogicalType::Int64]);
    let mut next = 0i64;
    for chunk_size in [1usize, 7, 100, VECTOR_SIZE, 3] {
        let mut chunk = DataChunk::from_types(&[LogicalType::Int64]);
        for _ in 0..chunk_size {
            chunk.append_row(&[Value::Int64(next)]).unwrap();
            next += 1;
        }
        collection.append_chunk(&chunk).unwrap();
    }

    let rows = scan_rows(&collection);
    assert_eq!(rows.len(), next as usize);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row[0], Value::Int64(i as i64));
    }
}

#[test]
fn test_count_conservation_through_reset() {
    let mut collection = ColumnDataCollection::new(buffer_manager(), vec![LogicalType::Int32]);
    let mut chunk = DataChunk::from_types(&[LogicalType::Int32]);
    for i in 0..500 {
        chunk.append_row(&[Value::Int32(i)]).unwrap();
    }
    collection.append_chunk(&chunk).unwrap();
    collection.append_chunk(&chunk).unwrap();
    assert_eq!(collection.count(), 1000);

    collection.reset();
    assert_eq!(collection.count(), 0);

    collection.append_chunk(&chunk).unwrap();
    assert_eq!(collection.count(), 500);
    collection.verify().unwrap();
}

#[test]
fn test_combine_preserves_order_and_empties_source() {
    let manager = buffer_manager();
    let types = vec![LogicalType::Int32, LogicalType::Varchar];
    let mut a = ColumnDataCollection::new(Arc::clone(&manager), types.clone());
    let mut b = ColumnDataCollection::new(Arc::clone(&manager), types.clone());

    let mut chunk = DataChunk::from_types(&types);
    for i in 0..100 {
        chunk
            .append_row(&[Value::Int32(i), Value::varchar(format!("a{i}"))])
            .unwrap();
    }
    a.append_chunk(&chunk).unwrap();

    chunk.reset();
    for i in 100..300 {
        chunk
            .append_row(&[Value::Int32(i), Value::varchar(format!("b{i}"))])
            .unwrap();
    }
    b.append_chunk(&chunk).unwrap();

    a.combine(&mut b).unwrap();
    a.verify().unwrap();
    b.verify().unwrap();
    assert_eq!(a.count(), 300);
    assert_eq!(b.count(), 0);

    let rows = scan_rows(&a);
    assert_eq!(rows.len(), 300);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row[0], Value::Int32(i as i32));
    }
}

#[test]
fn test_nested_types_round_trip() {
    let types = vec![
        LogicalType::list(LogicalType::Varchar),
        LogicalType::struct_of(vec![
            ("id", LogicalType::Int64),
            ("tags", LogicalType::list(LogicalType::Int32)),
        ]),
        LogicalType::map(LogicalType::Varchar, LogicalType::Int32),
    ];
    let mut collection =
        ColumnDataCollection::with_block_size(buffer_manager(), types.clone(), 4096);

    let mut rng = StdRng::seed_from_u64(7);
    let mut chunk = DataChunk::from_types(&types);
    let mut expected = Vec::new();
    for i in 0..200i64 {
        let list = Value::List(
            (0..rng.gen_range(0..5))
                .map(|j| Value::varchar(format!("item-{i}-{j}")))
                .collect(),
        );
        let nested = Value::Struct(vec![
            Value::Int64(i),
            Value::List((0..rng.gen_range(0..4)).map(Value::Int32).collect()),
        ]);
        let map = Value::List(vec![Value::Struct(vec![
            Value::varchar(format!("k{i}")),
            Value::Int32(i as i32),
        ])]);
        let row = vec![list, nested, map];
        chunk.append_row(&row).unwrap();
        expected.push(row);
    }
    collection.append_chunk(&chunk).unwrap();
    collection.verify().unwrap();

    assert_eq!(scan_rows(&collection), expected);
}

#[test]
fn test_failed_append_leaves_collection_intact() {
    let manager = Arc::new(BufferManager::new(
        BufferConfig::default().with_memory_limit(16 * 1024),
    ));
    let types = vec![LogicalType::Varchar];
    let mut collection =
        ColumnDataCollection::with_block_size(Arc::clone(&manager), types.clone(), 4096);

    let mut small = DataChunk::from_types(&types);
    for i in 0..10 {
        small.append_row(&[Value::varchar(format!("row{i}"))]).unwrap();
    }
    collection.append_chunk(&small).unwrap();
    let before = scan_rows(&collection);

    let mut big = DataChunk::from_types(&types);
    for _ in 0..100 {
        big.append_row(&[Value::varchar("x".repeat(1024))]).unwrap();
    }
    assert!(collection.append_chunk(&big).is_err());

    // The failed append rolled back; the prior contents are unchanged.
    collection.verify().unwrap();
    assert_eq!(collection.count(), 10);
    assert_eq!(scan_rows(&collection), before);
    assert_eq!(manager.pinned_block_count(), 0);
}
