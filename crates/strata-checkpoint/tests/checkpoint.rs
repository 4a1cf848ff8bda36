//! End-to-end checkpoint tests: write an image, reopen the database file,
//! and verify the catalog and table data survive.

use std::path::Path;
use std::sync::Arc;

use tempfile::tempdir;

use strata_catalog::{
    Binder, Catalog, CreateMacroInfo, CreateSchemaInfo, CreateSequenceInfo, CreateTableInfo,
    CreateViewInfo, DEFAULT_SCHEMA,
};
use strata_checkpoint::CheckpointManager;
use strata_column::{ColumnDataScanState, DataChunk};
use strata_common::config::{BlockConfig, BufferConfig};
use strata_common::types::{LogicalType, Value};
use strata_storage::{BlockManager, BufferManager, FileBlockManager};

fn open_managers(path: &Path) -> (Arc<dyn BlockManager>, Arc<BufferManager>) {
    let block_manager: Arc<dyn BlockManager> = Arc::new(
        FileBlockManager::open(path, &BlockConfig::default().with_block_size(4096)).unwrap(),
    );
    let buffer_manager = Arc::new(BufferManager::new(BufferConfig::default()));
    (block_manager, buffer_manager)
}

fn table_rows(catalog: &Catalog, schema: &str, table: &str) -> Vec<Vec<Value>> {
    let table = catalog.table(schema, table).unwrap();
    let data = table.data.read();
    let mut state = ColumnDataScanState::default();
    data.initialize_scan(&mut state);
    let mut chunk = DataChunk::default();
    let mut rows = Vec::new();
    loop {
        data.scan(&mut state, &mut chunk).unwrap();
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

/// Builds the S5 catalog: schemas `main` and `s1`, table `s1.t(a INT)`
/// with rows {1,2,3}, view `s1.v`, sequence `s1.seq`, macro `s1.m`.
fn build_catalog(buffer_manager: &Arc<BufferManager>) -> Catalog {
    let catalog = Catalog::new();
    catalog.create_schema(&CreateSchemaInfo::new("s1")).unwrap();

    let binder = Binder::new(Arc::clone(buffer_manager));
    let info = CreateTableInfo::new("t")
        .in_schema("s1")
        .with_column("a", LogicalType::Int32);
    let bound = binder.bind_create_table_info(info).unwrap();
    let table = catalog.create_table(bound).unwrap();

    let mut chunk = DataChunk::from_types(&[LogicalType::Int32]);
    for v in [1, 2, 3] {
        chunk.append_row(&[Value::Int32(v)]).unwrap();
    }
    table.data.write().append_chunk(&chunk).unwrap();

    catalog
        .create_view(CreateViewInfo::new("v", "select a from t").in_schema("s1"))
        .unwrap();
    catalog
        .create_sequence(CreateSequenceInfo::new("seq").in_schema("s1"))
        .unwrap();
    catalog
        .create_function(
            CreateMacroInfo::new("m", "a + 1")
                .in_schema("s1")
                .with_parameters(vec!["a".to_string()]),
        )
        .unwrap();
    catalog
}

#[test]
fn test_checkpoint_and_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("strata.db");

    {
        let (block_manager, buffer_manager) = open_managers(&path);
        let catalog = build_catalog(&buffer_manager);
        let manager = CheckpointManager::new(block_manager, buffer_manager);
        manager.create_checkpoint(&catalog).unwrap();
    }

    // Reopen the file and replay the image into a fresh catalog.
    let (block_manager, buffer_manager) = open_managers(&path);
    let manager = CheckpointManager::new(block_manager, Arc::clone(&buffer_manager));
    let catalog = Catalog::new();
    manager.load_from_storage(&catalog).unwrap();

    assert!(catalog.schema(DEFAULT_SCHEMA).is_ok());
    let s1 = catalog.schema("s1").unwrap();
    assert!(s1.view("v").is_ok());
    assert!(s1.sequence("seq").is_ok());
    assert!(s1.macro_entry("m").is_ok());

    let rows = table_rows(&catalog, "s1", "t");
    assert_eq!(
        rows,
        vec![
            vec![Value::Int32(1)],
            vec![Value::Int32(2)],
            vec![Value::Int32(3)],
        ]
    );
}

#[test]
fn test_load_empty_database_is_a_no_op() {
    let dir = tempdir().unwrap();
    let (block_manager, buffer_manager) = open_managers(&dir.path().join("empty.db"));
    let manager = CheckpointManager::new(block_manager, buffer_manager);

    let catalog = Catalog::new();
    manager.load_from_storage(&catalog).unwrap();
    assert_eq!(catalog.schema_count(), 1);
}

#[test]
fn test_checkpoint_idempotence() {
    // Write, load, write again: the second image describes the same
    // catalog.
    let dir = tempdir().unwrap();
    let path = dir.path().join("strata.db");

    {
        let (block_manager, buffer_manager) = open_managers(&path);
        let catalog = build_catalog(&buffer_manager);
        CheckpointManager::new(block_manager, buffer_manager)
            .create_checkpoint(&catalog)
            .unwrap();
    }

    // Load and immediately checkpoint the loaded state.
    {
        let (block_manager, buffer_manager) = open_managers(&path);
        let manager = CheckpointManager::new(block_manager, Arc::clone(&buffer_manager));
        let catalog = Catalog::new();
        manager.load_from_storage(&catalog).unwrap();
        manager.create_checkpoint(&catalog).unwrap();
    }

    // The final image still round-trips everything.
    let (block_manager, buffer_manager) = open_managers(&path);
    let manager = CheckpointManager::new(block_manager, Arc::clone(&buffer_manager));
    let catalog = Catalog::new();
    manager.load_from_storage(&catalog).unwrap();

    let s1 = catalog.schema("s1").unwrap();
    assert!(s1.view("v").is_ok());
    assert!(s1.sequence("seq").is_ok());
    assert!(s1.macro_entry("m").is_ok());
    let mut rows = table_rows(&catalog, "s1", "t");
    rows.sort_by_key(|row| match &row[0] {
        Value::Int32(v) => *v,
        _ => i32::MAX,
    });
    assert_eq!(
        rows,
        vec![
            vec![Value::Int32(1)],
            vec![Value::Int32(2)],
            vec![Value::Int32(3)],
        ]
    );
}

#[test]
fn test_sequence_position_survives_checkpoint() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("strata.db");

    {
        let (block_manager, buffer_manager) = open_managers(&path);
        let catalog = Catalog::new();
        let sequence = catalog
            .create_sequence(CreateSequenceInfo::new("ids"))
            .unwrap();
        assert_eq!(sequence.next_value().unwrap(), 1);
        assert_eq!(sequence.next_value().unwrap(), 2);
        CheckpointManager::new(block_manager, buffer_manager)
            .create_checkpoint(&catalog)
            .unwrap();
    }

    let (block_manager, buffer_manager) = open_managers(&path);
    let manager = CheckpointManager::new(block_manager, buffer_manager);
    let catalog = Catalog::new();
    manager.load_from_storage(&catalog).unwrap();

    let sequence = catalog.schema(DEFAULT_SCHEMA).unwrap().sequence("ids").unwrap();
    assert_eq!(sequence.next_value().unwrap(), 3);
}

#[test]
fn test_uncommitted_checkpoint_leaves_previous_image_intact() {
    // Blocks written without a header update are orphans: the previously
    // committed image keeps loading.
    let dir = tempdir().unwrap();
    let path = dir.path().join("strata.db");

    {
        let (block_manager, buffer_manager) = open_managers(&path);
        let catalog = build_catalog(&buffer_manager);
        CheckpointManager::new(Arc::clone(&block_manager), buffer_manager)
            .create_checkpoint(&catalog)
            .unwrap();

        // Simulate a crash mid-checkpoint: allocate and write blocks on
        // top of the committed image but never write a header.
        block_manager.start_checkpoint();
        let orphan = block_manager.allocate_block().unwrap();
        block_manager.write_block(orphan, &vec![0xAB; 4096]).unwrap();
    }

    let (block_manager, buffer_manager) = open_managers(&path);
    let manager = CheckpointManager::new(block_manager, Arc::clone(&buffer_manager));
    let catalog = Catalog::new();
    manager.load_from_storage(&catalog).unwrap();

    assert_eq!(table_rows(&catalog, "s1", "t").len(), 3);
}

#[test]
fn test_multiple_tables_share_the_data_stream() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("strata.db");

    {
        let (block_manager, buffer_manager) = open_managers(&path);
        let catalog = Catalog::new();
        let binder = Binder::new(Arc::clone(&buffer_manager));
        for (name, values) in [("t1", 0..100), ("t2", 100..350)] {
            let info = CreateTableInfo::new(name)
                .with_column("v", LogicalType::Int64)
                .with_column("s", LogicalType::Varchar);
            let bound = binder.bind_create_table_info(info).unwrap();
            let table = catalog.create_table(bound).unwrap();
            let mut chunk =
                DataChunk::from_types(&[LogicalType::Int64, LogicalType::Varchar]);
            for v in values {
                chunk
                    .append_row(&[Value::Int64(v), Value::varchar(format!("row{v}"))])
                    .unwrap();
            }
            table.data.write().append_chunk(&chunk).unwrap();
        }
        CheckpointManager::new(block_manager, buffer_manager)
            .create_checkpoint(&catalog)
            .unwrap();
    }

    let (block_manager, buffer_manager) = open_managers(&path);
    let manager = CheckpointManager::new(block_manager, Arc::clone(&buffer_manager));
    let catalog = Catalog::new();
    manager.load_from_storage(&catalog).unwrap();

    let t1 = table_rows(&catalog, DEFAULT_SCHEMA, "t1");
    let t2 = table_rows(&catalog, DEFAULT_SCHEMA, "t2");
    assert_eq!(t1.len(), 100);
    assert_eq!(t2.len(), 250);
    assert_eq!(t1[0], vec![Value::Int64(0), Value::varchar("row0")]);
    assert_eq!(
        t2[249],
        vec![Value::Int64(349), Value::varchar("row349")]
    );
}
