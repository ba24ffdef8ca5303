use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mod_api::ManualClock;
use plugin_backpack::{
    Backpack, FileSystem, ItemStack, LoadOrigin, RecordKey, RecordStore, StoreError,
    StoredRecord, TokioFileSystem,
};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// A backpack whose first slot holds item `generation`, so every saved
/// version can be told apart on disk.
fn generation(generation: i32) -> Backpack {
    Backpack::from_stacks(&[ItemStack {
        id: generation,
        count: 1,
        slot_idx: 0,
        ammo: 0,
        decay: 0,
    }])
}

fn key() -> RecordKey {
    "42:1".parse().unwrap()
}

struct Fixture {
    dir: TempDir,
    clock: Arc<ManualClock>,
    store: Arc<RecordStore<Backpack>>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_fs(Arc::new(TokioFileSystem))
    }

    fn with_fs(fs: Arc<dyn FileSystem>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::at(2025, 6, 1, 12, 0, 0));
        let store = Arc::new(RecordStore::new(dir.path(), fs, clock.clone()));
        Self { dir, clock, store }
    }

    /// Generation stored in the file next to the primary with `suffix`
    /// (`""` for the primary itself).
    async fn generation_in(&self, suffix: &str) -> Option<i64> {
        let path = if suffix.is_empty() {
            self.store.primary_path(&key())
        } else {
            self.store.companion_path(&key(), suffix)
        };
        let bytes = tokio::fs::read(&path).await.ok()?;
        let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
        value["items"][0]["id"].as_i64()
    }

    async fn corrupt(&self, suffix: &str, contents: &str) {
        let path = if suffix.is_empty() {
            self.store.primary_path(&key())
        } else {
            self.store.companion_path(&key(), suffix)
        };
        tokio::fs::write(path, contents).await.unwrap();
    }
}

// ============================================================================
// Save and rotation
// ============================================================================

#[tokio::test]
async fn test_save_then_load() {
    let f = Fixture::new();
    f.store.save(&key(), &generation(1)).await.unwrap();

    let loaded = f.store.load(&key()).await;
    assert_eq!(loaded.origin, LoadOrigin::Primary);
    assert_eq!(loaded.record, generation(1));
    assert!(f.dir.path().join("42.vb1.json").exists());
    assert!(!f.dir.path().join("42.vb1.json.tmp").exists());
    assert!(!f.dir.path().join("42.vb1.json.bak1").exists());
}

#[tokio::test]
async fn test_rotation_keeps_previous_generations() {
    let f = Fixture::new();
    for g in 1..=3 {
        f.store.save(&key(), &generation(g)).await.unwrap();
    }
    assert_eq!(f.generation_in("").await, Some(3));
    assert_eq!(f.generation_in("bak1").await, Some(2));
    assert_eq!(f.generation_in("bak2").await, Some(1));
    assert_eq!(f.generation_in("bak3").await, None);

    f.store.save(&key(), &generation(4)).await.unwrap();
    assert_eq!(f.generation_in("bak1").await, Some(3));
    assert_eq!(f.generation_in("bak2").await, Some(2));
    assert_eq!(f.generation_in("bak3").await, Some(1));
}

#[tokio::test]
async fn test_doomsday_generation_survives_a_day() {
    let f = Fixture::new();
    for g in 1..=5 {
        f.store.save(&key(), &generation(g)).await.unwrap();
    }
    // .bak3 was written moments ago, so it is kept.
    assert_eq!(f.generation_in("bak1").await, Some(4));
    assert_eq!(f.generation_in("bak2").await, Some(3));
    assert_eq!(f.generation_in("bak3").await, Some(1));

    f.clock.advance_secs(23 * 3600);
    f.store.save(&key(), &generation(6)).await.unwrap();
    assert_eq!(f.generation_in("bak3").await, Some(1));

    f.clock.advance_secs(3600);
    f.store.save(&key(), &generation(7)).await.unwrap();
    assert_eq!(f.generation_in("").await, Some(7));
    assert_eq!(f.generation_in("bak1").await, Some(6));
    assert_eq!(f.generation_in("bak2").await, Some(5));
    assert_eq!(f.generation_in("bak3").await, Some(4));
}

#[tokio::test]
async fn test_saved_documents_carry_timestamp() {
    let f = Fixture::new();
    f.store.save(&key(), &generation(1)).await.unwrap();

    let bytes = tokio::fs::read(f.store.primary_path(&key())).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let saved_at: DateTime<Utc> = serde_json::from_value(value["saved_at"].clone()).unwrap();
    assert_eq!(saved_at.to_rfc3339(), "2025-06-01T12:00:00+00:00");
    assert_eq!(value["items"].as_array().unwrap().len(), 40);
}

// ============================================================================
// Load and recovery
// ============================================================================

#[tokio::test]
async fn test_missing_record_loads_empty() {
    let f = Fixture::new();
    let loaded = f.store.load(&key()).await;
    assert_eq!(loaded.origin, LoadOrigin::Fresh);
    assert_eq!(loaded.record, Backpack::empty());
    assert_eq!(loaded.reward, None);
}

#[tokio::test]
async fn test_legacy_document_without_timestamp_loads() {
    let f = Fixture::new();
    f.corrupt("", r#"{"items":[{"id":8,"count":3,"slotIdx":0,"ammo":0,"decay":0}]}"#)
        .await;
    let loaded = f.store.load(&key()).await;
    assert_eq!(loaded.origin, LoadOrigin::Primary);
    assert_eq!(loaded.record.items[0].id, 8);
}

#[tokio::test]
async fn test_truncated_primary_is_salvaged() {
    let f = Fixture::new();
    let a = generation(77);
    f.store.save(&key(), &a).await.unwrap();

    let path = f.store.primary_path(&key());
    let bytes = tokio::fs::read(&path).await.unwrap();
    tokio::fs::write(&path, &bytes[..bytes.len() - 40]).await.unwrap();

    let loaded = f.store.load(&key()).await;
    assert_eq!(loaded.origin, LoadOrigin::Salvaged);
    assert_eq!(loaded.record, a);
}

#[tokio::test]
async fn test_corrupt_primary_recovers_previous_save() {
    let f = Fixture::new();
    f.store.save(&key(), &generation(1)).await.unwrap();
    f.store.save(&key(), &generation(2)).await.unwrap();
    f.corrupt("", "not json at all").await;

    let loaded = f.store.load(&key()).await;
    assert_eq!(loaded.origin, LoadOrigin::Backup("bak1".into()));
    assert_eq!(loaded.record, generation(1));
}

#[tokio::test]
async fn test_recovery_order() {
    let f = Fixture::new();
    for g in 1..=4 {
        f.store.save(&key(), &generation(g)).await.unwrap();
        if g >= 2 {
            f.store.create_admin_backup(&key()).await.unwrap();
        }
    }
    // bak1..3 hold 3, 2, 1 and vbobak1..3 hold 4, 3, 2
    f.corrupt("", "{").await;

    let expect = |suffix: &str, g: i32| (LoadOrigin::Backup(suffix.to_string()), generation(g));

    let loaded = f.store.load(&key()).await;
    assert_eq!((loaded.origin, loaded.record), expect("bak1", 3));

    f.corrupt("bak1", "{").await;
    let loaded = f.store.load(&key()).await;
    assert_eq!((loaded.origin, loaded.record), expect("bak2", 2));

    f.corrupt("bak2", "{").await;
    let loaded = f.store.load(&key()).await;
    assert_eq!((loaded.origin, loaded.record), expect("bak3", 1));

    f.corrupt("bak3", "{").await;
    let loaded = f.store.load(&key()).await;
    assert_eq!((loaded.origin, loaded.record), expect("vbobak1", 4));

    f.corrupt("vbobak1", "{").await;
    let loaded = f.store.load(&key()).await;
    assert_eq!((loaded.origin, loaded.record), expect("vbobak2", 3));

    f.corrupt("vbobak2", "{").await;
    let loaded = f.store.load(&key()).await;
    assert_eq!((loaded.origin, loaded.record), expect("vbobak3", 2));

    f.corrupt("vbobak3", "{").await;
    let loaded = f.store.load(&key()).await;
    assert_eq!(loaded.origin, LoadOrigin::Unrecoverable);
    assert_eq!(loaded.record, Backpack::empty());
}

// ============================================================================
// Verification
// ============================================================================

/// Loses every item on the way to disk for temporary files.
struct LossyFileSystem {
    inner: TokioFileSystem,
}

#[async_trait]
impl FileSystem for LossyFileSystem {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if path.extension().is_some_and(|ext| ext == "tmp") {
            return self.inner.write(path, br#"{"items":[]}"#).await;
        }
        self.inner.write(path, contents).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.inner.rename(from, to).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.inner.copy(from, to).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        self.inner.remove(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path).await
    }

    async fn modified(&self, path: &Path) -> io::Result<DateTime<Utc>> {
        self.inner.modified(path).await
    }
}

#[tokio::test]
async fn test_failed_verification_keeps_primary() {
    let good = Fixture::new();
    good.store.save(&key(), &generation(1)).await.unwrap();

    let lossy = RecordStore::<Backpack>::new(
        good.dir.path(),
        Arc::new(LossyFileSystem {
            inner: TokioFileSystem,
        }),
        good.clock.clone(),
    );
    let err = lossy.save(&key(), &generation(2)).await.unwrap_err();
    assert!(matches!(err, StoreError::VerificationFailed(_)));

    assert_eq!(good.generation_in("").await, Some(1));
    assert!(!good.dir.path().join("42.vb1.json.tmp").exists());
    assert_eq!(good.store.load(&key()).await.record, generation(1));
}

// ============================================================================
// Admin backups and concurrency
// ============================================================================

#[tokio::test]
async fn test_admin_backup_chain() {
    let f = Fixture::new();
    assert!(!f.store.create_admin_backup(&key()).await.unwrap());

    for g in 1..=4 {
        f.store.save(&key(), &generation(g)).await.unwrap();
        assert!(f.store.create_admin_backup(&key()).await.unwrap());
    }
    assert_eq!(f.generation_in("vbobak1").await, Some(4));
    assert_eq!(f.generation_in("vbobak2").await, Some(3));
    assert_eq!(f.generation_in("vbobak3").await, Some(2));
}

#[tokio::test]
async fn test_concurrent_saves_leave_one_valid_primary() {
    let f = Fixture::new();
    let other: RecordKey = "43:1".parse().unwrap();

    let mut tasks = Vec::new();
    for g in 1..=10 {
        let store = f.store.clone();
        let target = if g % 2 == 0 { key() } else { other.clone() };
        tasks.push(tokio::spawn(async move {
            store.save(&target, &generation(g)).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    for k in [key(), other] {
        let loaded = f.store.load(&k).await;
        assert_eq!(loaded.origin, LoadOrigin::Primary);
        assert_eq!(loaded.record.occupied(), 1);
    }
}
