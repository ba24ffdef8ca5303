//! Durable per-key JSON documents with verified saves and rotating backups.
//!
//! Files kept for key `42:1` in the data directory:
//!
//! ```text
//! 42.vb1.json             primary
//! 42.vb1.json.tmp         save in progress, verified before it replaces the primary
//! 42.vb1.json.bak1..3     rotated on every save; .bak3 is the doomsday generation
//! 42.vb1.json.vbobak1..3  rotated on every admin backup
//! ```
//!
//! `load` never fails. A corrupt primary is replaced by the first readable
//! backup (regular chain first, then the admin chain), then by whatever
//! can be salvaged from the corrupt bytes, then by an empty document.

use crate::error::{StoreError, StoreResult};
use crate::fs::FileSystem;
use crate::key::RecordKey;
use crate::record::StoredRecord;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use mod_api::{Clock, Reward};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

const BACKUP_SUFFIXES: [&str; 3] = ["bak1", "bak2", "bak3"];
const ADMIN_BACKUP_SUFFIXES: [&str; 3] = ["vbobak1", "vbobak2", "vbobak3"];
const TEMP_SUFFIX: &str = "tmp";

/// `.bak3` is only replaced once the snapshot it holds is this old.
pub const DOOMSDAY_RETENTION_HOURS: i64 = 24;

/// Where a loaded record came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOrigin {
    Primary,
    /// Recovered from the named backup generation (`bak1`, `vbobak2`, ...).
    Backup(String),
    Salvaged,
    /// No record existed; the initial contents were handed out.
    Initial,
    /// No record existed and there are no initial contents.
    Fresh,
    /// The record was corrupt and nothing could be recovered.
    Unrecoverable,
}

#[derive(Debug, Clone)]
pub struct Loaded<R> {
    pub record: R,
    pub origin: LoadOrigin,
    /// Reward that comes with initial contents.
    pub reward: Option<Reward>,
}

impl<R> Loaded<R> {
    fn new(record: R, origin: LoadOrigin) -> Self {
        Self {
            record,
            origin,
            reward: None,
        }
    }
}

/// Contents handed out the first time a key is loaded.
#[derive(Debug, Clone)]
pub struct InitialRecord<R> {
    pub record: R,
    pub reward: Option<Reward>,
}

/// Decides what a key that has never been saved starts with.
#[async_trait]
pub trait InitialRecordPolicy<R>: Send + Sync {
    async fn initial_record(&self, key: &RecordKey) -> Option<InitialRecord<R>>;
}

/// On-disk document: the record plus when it was written.
#[derive(Deserialize)]
struct Envelope<R> {
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    record: R,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, R> {
    saved_at: DateTime<Utc>,
    #[serde(flatten)]
    record: &'a R,
}

pub struct RecordStore<R: StoredRecord> {
    dir: PathBuf,
    fs: Arc<dyn FileSystem>,
    clock: Arc<dyn Clock>,
    initial: Option<Arc<dyn InitialRecordPolicy<R>>>,
    locks: DashMap<RecordKey, Arc<Mutex<()>>>,
}

impl<R: StoredRecord> RecordStore<R> {
    pub fn new(dir: impl Into<PathBuf>, fs: Arc<dyn FileSystem>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            fs,
            clock,
            initial: None,
            locks: DashMap::new(),
        }
    }

    pub fn with_initial_records(mut self, policy: Arc<dyn InitialRecordPolicy<R>>) -> Self {
        self.initial = Some(policy);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn primary_path(&self, key: &RecordKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Path of a file kept next to the primary, e.g. `bak2` or `vbobak1`.
    pub fn companion_path(&self, key: &RecordKey, suffix: &str) -> PathBuf {
        companion(&self.primary_path(key), suffix)
    }

    fn lock_for(&self, key: &RecordKey) -> Arc<Mutex<()>> {
        Arc::clone(&self.locks.entry(key.clone()).or_default())
    }

    // ========================================================================
    // Load
    // ========================================================================

    #[instrument(skip(self), fields(key = %key))]
    pub async fn load(&self, key: &RecordKey) -> Loaded<R> {
        self.load_with(key, true).await
    }

    /// Like [`RecordStore::load`], but a missing record is always fresh and
    /// the initial-record policy is never consulted.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn load_existing(&self, key: &RecordKey) -> Loaded<R> {
        self.load_with(key, false).await
    }

    async fn load_with(&self, key: &RecordKey, use_initial: bool) -> Loaded<R> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        let primary = self.primary_path(key);
        if !self.fs.exists(&primary).await {
            if !use_initial {
                debug!("Record {} does not exist yet", key);
                return Loaded::new(R::empty(), LoadOrigin::Fresh);
            }
            return self.initial_or_fresh(key).await;
        }

        let corrupt = match self.fs.read(&primary).await {
            Ok(bytes) => match parse::<R>(&bytes) {
                Ok(envelope) => return Loaded::new(envelope.record, LoadOrigin::Primary),
                Err(e) => {
                    warn!("Record {} is corrupt: {}", key, e);
                    Some(bytes)
                }
            },
            Err(e) => {
                warn!("Failed to read record {}: {}", key, e);
                None
            }
        };

        for suffix in BACKUP_SUFFIXES.iter().chain(ADMIN_BACKUP_SUFFIXES.iter()) {
            let path = companion(&primary, suffix);
            if !self.fs.exists(&path).await {
                continue;
            }
            match self.read_envelope(&path).await {
                Ok(envelope) => {
                    info!("Recovered record {} from .{}", key, suffix);
                    return Loaded::new(envelope.record, LoadOrigin::Backup(suffix.to_string()));
                }
                Err(e) => debug!("Backup .{} unusable: {}", suffix, e),
            }
        }

        if let Some(record) = corrupt.as_deref().and_then(R::salvage) {
            warn!(
                "Partially recovered record {} ({} occupied slots)",
                key,
                record.occupied()
            );
            return Loaded::new(record, LoadOrigin::Salvaged);
        }

        error!("Record {} could not be recovered; starting empty", key);
        Loaded::new(R::empty(), LoadOrigin::Unrecoverable)
    }

    async fn initial_or_fresh(&self, key: &RecordKey) -> Loaded<R> {
        if let Some(policy) = &self.initial {
            if let Some(initial) = policy.initial_record(key).await {
                info!("Created record {} from its initial contents", key);
                return Loaded {
                    record: initial.record,
                    origin: LoadOrigin::Initial,
                    reward: initial.reward,
                };
            }
        }
        debug!("Created new empty record {}", key);
        Loaded::new(R::empty(), LoadOrigin::Fresh)
    }

    // ========================================================================
    // Save
    // ========================================================================

    /// Rotates backups, writes a temporary file, reads it back and only then
    /// replaces the primary. On a failed check the primary is untouched.
    #[instrument(skip(self, record), fields(key = %key))]
    pub async fn save(&self, key: &RecordKey, record: &R) -> StoreResult<()> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        let primary = self.primary_path(key);
        if let Err(e) = self.rotate_backups(&primary).await {
            warn!("Could not rotate backups for {}: {}", key, e);
        }

        let envelope = EnvelopeRef {
            saved_at: self.clock.now(),
            record,
        };
        let json = serde_json::to_vec_pretty(&envelope).map_err(StoreError::Serialization)?;

        let temp = companion(&primary, TEMP_SUFFIX);
        self.fs
            .write(&temp, &json)
            .await
            .map_err(|e| StoreError::FileWrite(temp.clone(), e))?;

        if !self.verify(&temp, record).await {
            if let Err(e) = self.fs.remove(&temp).await {
                warn!("Failed to remove {}: {}", temp.display(), e);
            }
            error!("Save of {} failed verification; primary left as it was", key);
            return Err(StoreError::VerificationFailed(temp));
        }

        self.rename(&temp, &primary).await?;
        info!("Saved record {} ({} occupied slots)", key, record.occupied());
        Ok(())
    }

    /// Same slot count and same number of occupied slots as `expected`.
    async fn verify(&self, path: &Path, expected: &R) -> bool {
        match self.read_envelope(path).await {
            Ok(envelope) => {
                envelope.record.slot_count() == expected.slot_count()
                    && envelope.record.occupied() == expected.occupied()
            }
            Err(e) => {
                debug!("Verification read failed: {}", e);
                false
            }
        }
    }

    /// `.bak2 -> .bak3` (unless `.bak3` is protected), `.bak1 -> .bak2`,
    /// primary copied to `.bak1`.
    async fn rotate_backups(&self, primary: &Path) -> StoreResult<()> {
        if !self.fs.exists(primary).await {
            return Ok(());
        }
        let [bak1, bak2, bak3] = BACKUP_SUFFIXES.map(|s| companion(primary, s));

        if self.fs.exists(&bak2).await {
            if self.doomsday_expired(&bak3).await {
                self.rename(&bak2, &bak3).await?;
                debug!("Promoted .bak2 to doomsday backup");
            } else {
                debug!("Preserving doomsday backup {}", bak3.display());
            }
        }
        if self.fs.exists(&bak1).await {
            self.rename(&bak1, &bak2).await?;
        }
        self.copy(primary, &bak1).await
    }

    async fn doomsday_expired(&self, bak3: &Path) -> bool {
        if !self.fs.exists(bak3).await {
            return true;
        }
        let stamped = match self.read_envelope(bak3).await {
            Ok(envelope) => envelope.saved_at,
            Err(_) => None,
        };
        let saved_at = match stamped {
            Some(saved_at) => saved_at,
            None => match self.fs.modified(bak3).await {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("Cannot tell the age of {}: {}", bak3.display(), e);
                    return true;
                }
            },
        };
        self.clock.now() - saved_at >= Duration::hours(DOOMSDAY_RETENTION_HOURS)
    }

    // ========================================================================
    // Admin backups
    // ========================================================================

    /// Snapshots the primary into the admin chain. Returns `false` when there
    /// is no primary to snapshot.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn create_admin_backup(&self, key: &RecordKey) -> StoreResult<bool> {
        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        let primary = self.primary_path(key);
        if !self.fs.exists(&primary).await {
            debug!("No record {} to back up", key);
            return Ok(false);
        }

        let [first, second, third] = ADMIN_BACKUP_SUFFIXES.map(|s| companion(&primary, s));
        if self.fs.exists(&second).await {
            self.rename(&second, &third).await?;
        }
        if self.fs.exists(&first).await {
            self.rename(&first, &second).await?;
        }
        self.copy(&primary, &first).await?;

        info!("Created admin backup of {}", key);
        Ok(true)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn read_envelope(&self, path: &Path) -> StoreResult<Envelope<R>> {
        let bytes = self
            .fs
            .read(path)
            .await
            .map_err(|e| StoreError::FileRead(path.to_path_buf(), e))?;
        parse(&bytes).map_err(|e| StoreError::Deserialization(path.to_path_buf(), e))
    }

    async fn rename(&self, from: &Path, to: &Path) -> StoreResult<()> {
        self.fs
            .rename(from, to)
            .await
            .map_err(|e| StoreError::FileRename(from.to_path_buf(), to.to_path_buf(), e))
    }

    async fn copy(&self, from: &Path, to: &Path) -> StoreResult<()> {
        self.fs
            .copy(from, to)
            .await
            .map_err(|e| StoreError::FileCopy(from.to_path_buf(), to.to_path_buf(), e))
    }
}

fn parse<R: StoredRecord>(bytes: &[u8]) -> Result<Envelope<R>, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// `<primary>.<suffix>`
fn companion(primary: &Path, suffix: &str) -> PathBuf {
    let mut name = primary.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_companion_appends_suffix() {
        let path = companion(Path::new("/data/42.vb1.json"), "bak2");
        assert_eq!(path, PathBuf::from("/data/42.vb1.json.bak2"));
    }
}
