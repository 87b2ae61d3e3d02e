//! Error handling and edge case tests.

use beads_backup::{
    BackupConfig, BackupError, BackupExporter, BackupState, Cancellation, MemoryStore, SqlValue,
    EVENTS, STATE_FILE,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn beads_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.create_table("issues", &["id", "title"]);
    store.create_table("comments", &["id", "issue_id", "author", "text", "created_at"]);
    store.create_table(
        "dependencies",
        &["issue_id", "depends_on_id", "type", "created_at", "created_by"],
    );
    store.create_table("labels", &["issue_id", "label"]);
    store.create_table("config", &["key", "value"]);
    store.create_table("events", EVENTS.columns);
    store
}

fn issue(id: &str) -> Vec<SqlValue> {
    vec![SqlValue::text(id), SqlValue::text("title")]
}

fn event(id: i64) -> Vec<SqlValue> {
    vec![
        SqlValue::Int(id),
        SqlValue::text("bd-1"),
        SqlValue::text("created"),
        SqlValue::text("alice"),
        SqlValue::Null,
        SqlValue::Null,
        SqlValue::Null,
        SqlValue::Timestamp(None),
    ]
}

fn seeded() -> MemoryStore {
    let store = beads_store();
    store.insert("issues", issue("bd-1")).unwrap();
    for id in 1..=3 {
        store.insert("events", event(id)).unwrap();
    }
    store
}

struct Fixture {
    _tmp: TempDir,
    dir: PathBuf,
    config: BackupConfig,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let config = BackupConfig::in_dir(tmp.path());
    Fixture {
        dir: tmp.path().join("backup"),
        _tmp: tmp,
        config,
    }
}

impl Fixture {
    fn read(&self, name: &str) -> Vec<u8> {
        fs::read(self.dir.join(name)).unwrap()
    }
}

// --- Failed Runs ---

#[test]
fn test_failure_in_third_entity_leaves_state_untouched() {
    let fx = fixture();
    let store = seeded();
    let exporter = BackupExporter::new(&store, fx.config.clone());
    let ctx = Cancellation::new();
    let before = exporter.run(&ctx, false).unwrap().into_state();
    let state_bytes = fx.read(STATE_FILE);
    let events_bytes = fx.read("events.jsonl");

    store.insert("issues", issue("bd-2")).unwrap();
    store.insert("events", event(4)).unwrap();
    store.fail_queries_on("dependencies");

    let err = exporter.run(&ctx, false).unwrap_err();

    assert!(matches!(
        err,
        BackupError::Entity {
            entity: "dependencies",
            ..
        }
    ));
    assert!(err.to_string().starts_with("backup dependencies:"));
    assert_eq!(fx.read(STATE_FILE), state_bytes);
    assert_eq!(fx.read("events.jsonl"), events_bytes);
    assert_eq!(exporter.load_state().unwrap(), before);

    // Entities before the failure are independent snapshots and may be fresh.
    let issues = String::from_utf8(fx.read("issues.jsonl")).unwrap();
    assert_eq!(issues.lines().count(), 2);
}

#[test]
fn test_recovers_after_failure() {
    let fx = fixture();
    let store = seeded();
    let exporter = BackupExporter::new(&store, fx.config.clone());
    let ctx = Cancellation::new();
    exporter.run(&ctx, false).unwrap();

    store.insert("events", event(4)).unwrap();
    store.fail_queries_on("labels");
    assert!(exporter.run(&ctx, false).is_err());

    store.heal();
    let state = exporter.run(&ctx, false).unwrap().into_state();

    assert_eq!(state.last_watermark, 4);
    let events = String::from_utf8(fx.read("events.jsonl")).unwrap();
    assert_eq!(events.lines().count(), 4);
}

#[test]
fn test_cancellation_mid_run() {
    let fx = fixture();
    let store = seeded();
    store
        .insert("labels", vec![SqlValue::text("bd-1"), SqlValue::text("ui")])
        .unwrap();
    let exporter = BackupExporter::new(&store, fx.config.clone());
    exporter.run(&Cancellation::new(), false).unwrap();
    let state_bytes = fx.read(STATE_FILE);
    let labels_bytes = fx.read("labels.jsonl");

    store
        .insert("labels", vec![SqlValue::text("bd-1"), SqlValue::text("backend")])
        .unwrap();
    let ctx = Cancellation::new();
    store.cancel_on_query("labels", &ctx);

    let err = exporter.run(&ctx, false).unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(fx.read("labels.jsonl"), labels_bytes);
    assert_eq!(fx.read(STATE_FILE), state_bytes);
}

#[test]
fn test_revision_failure_writes_nothing() {
    let fx = fixture();
    let store = seeded();
    store.fail_revision(true);
    let exporter = BackupExporter::new(&store, fx.config.clone());

    let err = exporter.run(&Cancellation::new(), false).unwrap_err();

    assert!(matches!(err, BackupError::Query(_)));
    assert!(store.executed().is_empty());
    assert!(!fx.dir.join("issues.jsonl").exists());
    assert!(!fx.dir.join(STATE_FILE).exists());
}

#[test]
fn test_missing_shadow_companion_table_is_entity_error() {
    let fx = fixture();
    let store = seeded();
    // The probe table exists, so every entity expects its shadow table.
    store.create_table("wisps", &["id", "title"]);
    store.create_table("wisp_comments", &["id", "issue_id", "author", "text", "created_at"]);
    store.create_table(
        "wisp_dependencies",
        &["issue_id", "depends_on_id", "type", "created_at", "created_by"],
    );
    let exporter = BackupExporter::new(&store, fx.config.clone());

    let err = exporter.run(&Cancellation::new(), false).unwrap_err();

    assert!(matches!(err, BackupError::Entity { entity: "labels", .. }));
    assert!(!fx.dir.join(STATE_FILE).exists());
}

#[test]
fn test_corrupt_state_file_aborts() {
    let fx = fixture();
    fs::create_dir_all(&fx.dir).unwrap();
    fs::write(fx.dir.join(STATE_FILE), "{\"lastWatermark\": \"nope\"").unwrap();
    let store = seeded();
    let exporter = BackupExporter::new(&store, fx.config.clone());

    let err = exporter.run(&Cancellation::new(), false).unwrap_err();

    assert!(matches!(err, BackupError::Deserialization(_)));
    assert!(store.executed().is_empty());
}

#[test]
fn test_missing_state_file_is_fresh_start() {
    let fx = fixture();
    let store = seeded();
    let exporter = BackupExporter::new(&store, fx.config.clone());

    assert_eq!(exporter.load_state().unwrap(), BackupState::default());
    let state = exporter.run(&Cancellation::new(), false).unwrap().into_state();
    assert_eq!(state.last_watermark, 3);
}

#[test]
fn test_no_temp_files_left_behind() {
    let fx = fixture();
    let store = seeded();
    let exporter = BackupExporter::new(&store, fx.config.clone());
    exporter.run(&Cancellation::new(), false).unwrap();
    store.insert("issues", issue("bd-9")).unwrap();
    store.fail_scan_after("config", 0);
    let _ = exporter.run(&Cancellation::new(), false);

    let stray: Vec<_> = fs::read_dir(&fx.dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".backup-tmp-"))
        .collect();
    assert!(stray.is_empty());
}

// --- Known Hazards ---

/// The watermark only reaches disk with the state file. When the run fails
/// after the event append but before the state is saved, the next run
/// appends the same events again.
#[test]
fn test_failure_after_append_replays_events_on_next_run() {
    let fx = fixture();
    let store = seeded();
    let exporter = BackupExporter::new(&store, fx.config.clone());
    let ctx = Cancellation::new();
    exporter.run(&ctx, false).unwrap();

    store.insert("events", event(4)).unwrap();
    store.insert("events", event(5)).unwrap();
    store.fail_revision(true);

    // Forced, so the only revision read is the one after the append.
    assert!(exporter.run(&ctx, true).is_err());
    assert_eq!(exporter.load_state().unwrap().last_watermark, 3);
    let events = String::from_utf8(fx.read("events.jsonl")).unwrap();
    assert_eq!(events.lines().count(), 5);

    store.heal();
    let state = exporter.run(&ctx, false).unwrap().into_state();

    assert_eq!(state.last_watermark, 5);
    let events = String::from_utf8(fx.read("events.jsonl")).unwrap();
    let ids: Vec<i64> = events
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 4, 5]);
}
