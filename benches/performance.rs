//! Performance benchmarks for backup export.

use beads_backup::{
    export_table, BackupConfig, BackupExporter, Cancellation, MemoryStore, RowSource, SqlValue,
    Statement, EVENTS, SNAPSHOT_ENTITIES,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tempfile::TempDir;

fn issues_store(rows: usize) -> MemoryStore {
    let store = MemoryStore::new();
    store.create_table("issues", &["id", "title", "description", "priority"]);
    for i in 0..rows {
        store
            .insert(
                "issues",
                vec![
                    SqlValue::text(format!("bd-{i}")),
                    SqlValue::text(format!("Issue number {i}")),
                    SqlValue::Bytes(vec![b'x'; 200]),
                    SqlValue::Int((i % 5) as i64),
                ],
            )
            .unwrap();
    }
    store
}

/// Benchmark full-snapshot export with varying table sizes
fn bench_snapshot_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_export");

    for rows in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("rows", rows), &rows, |b, &rows| {
            let dir = TempDir::new().unwrap();
            let store = issues_store(rows);
            let path = dir.path().join("issues.jsonl");
            let source = RowSource::single(Statement::new("SELECT * FROM `issues` ORDER BY `id` ASC"));
            let ctx = Cancellation::new();

            b.iter(|| {
                black_box(export_table(&store, &ctx, &source, &path).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark a run that finds nothing changed
fn bench_short_circuit(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = issues_store(1_000);
    for spec in SNAPSHOT_ENTITIES.iter().skip(1) {
        store.create_table(spec.table, spec.columns);
    }
    store.create_table("events", EVENTS.columns);
    let exporter = BackupExporter::new(&store, BackupConfig::in_dir(dir.path()));
    let ctx = Cancellation::new();
    exporter.run(&ctx, true).unwrap();

    c.bench_function("short_circuit", |b| {
        b.iter(|| {
            black_box(exporter.run(&ctx, false).unwrap());
        });
    });
}

criterion_group!(benches, bench_snapshot_export, bench_short_circuit);
criterion_main!(benches);
