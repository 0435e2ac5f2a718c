//! Tests for M5: Concurrent Access
//! Covers TC-5.1, TC-5.2
//!
//! Run individual tests with:
//! cargo test tc_5_1 -- --nocapture
//! cargo test m5_concurrency -- --nocapture

use std::sync::Arc;
use std::thread;
use tessera::{DataType, IndexRegistry, IndexerKind, Predicate, RegistryConfig, Row, Value};

fn registry() -> Arc<IndexRegistry> {
    Arc::new(
        IndexRegistry::new(
            RegistryConfig::new()
                .column("id", DataType::Int64, IndexerKind::Range)
                .column("shard", DataType::Int32, IndexerKind::Equality)
                .column("note", DataType::String, IndexerKind::Unindexed)
                .tree_degree(8),
        )
        .unwrap(),
    )
}

fn row(r: &IndexRegistry, id: i64, shard: i32) -> Row {
    Row::from_values(r.schema(), &[Value::Int64(id), Value::Int32(shard), Value::from("n")]).unwrap()
}

mod tc_5_1_writers_and_readers {
    use super::*;

    #[test]
    fn test_parallel_inserts_and_queries() {
        let r = registry();
        let writers: Vec<_> = (0..8)
            .map(|t| {
                let r = Arc::clone(&r);
                thread::spawn(move || {
                    for batch in 0..10 {
                        let rows: Vec<Row> = (0..100)
                            .map(|i| row(&r, t * 10_000 + batch * 100 + i, t as i32))
                            .collect();
                        r.bulk_insert(rows).unwrap();
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|t| {
                let r = Arc::clone(&r);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let rows = r.aggregate(&Predicate::eq(1, t as i32).to_bytes()).unwrap();
                        // Batches land whole, never half-way
                        assert_eq!(rows.len() % 100, 0);
                    }
                })
            })
            .collect();

        for h in writers.into_iter().chain(readers) {
            h.join().unwrap();
        }

        assert_eq!(r.count(), 8_000);
        for shard in 0..8 {
            let rows = r.aggregate(&Predicate::eq(1, shard).to_bytes()).unwrap();
            assert_eq!(rows.len(), 1_000);
        }
        let range = r.aggregate(&Predicate::between(0, 20_000i64, 29_999i64).to_bytes()).unwrap();
        assert_eq!(range.len(), 1_000);
    }
}

mod tc_5_2_removers {
    use super::*;

    #[test]
    fn test_concurrent_removes_partition_rows() {
        let r = registry();
        r.bulk_insert((0..4_000).map(|i| row(&r, i, (i % 4) as i32))).unwrap();

        let removers: Vec<_> = (0..4)
            .map(|shard| {
                let r = Arc::clone(&r);
                thread::spawn(move || r.remove(&Predicate::eq(1, shard).to_bytes()).unwrap())
            })
            .collect();
        let removed: usize = removers.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(removed, 4_000);
        assert_eq!(r.count(), 0);
        for column in 0..r.column_count() {
            assert_eq!(tessera::IndexRead::count(&r.indexer(column).unwrap().read()), 0);
        }
    }
}
