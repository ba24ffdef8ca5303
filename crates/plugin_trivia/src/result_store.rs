//! Durable record of the last finished round, so winners can still claim
//! after a restart.

use crate::error::{ResultStoreError, ResultStoreResult};
use chrono::{DateTime, Utc};
use mod_api::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::{fs as tokio_fs, io::AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

const ROUND_ID_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Winners of the last round and who among them has claimed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRoundResult {
    pub round_id: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub winners: BTreeSet<PlayerId>,
    #[serde(default)]
    pub claimed: BTreeSet<PlayerId>,
}

impl PersistedRoundResult {
    pub fn new(finished_at: DateTime<Utc>, dry_run: bool, winners: BTreeSet<PlayerId>) -> Self {
        Self {
            round_id: finished_at.format(ROUND_ID_FORMAT).to_string(),
            dry_run,
            winners,
            claimed: BTreeSet::new(),
        }
    }

    pub fn is_winner(&self, player: PlayerId) -> bool {
        self.winners.contains(&player)
    }

    pub fn has_claimed(&self, player: PlayerId) -> bool {
        self.claimed.contains(&player)
    }

    /// Marks a winner as paid. Returns false for non-winners and repeat claims.
    pub fn record_claim(&mut self, player: PlayerId) -> bool {
        self.is_winner(player) && self.claimed.insert(player)
    }

    /// Drops claims that do not belong to a winner.
    fn normalize(&mut self) {
        let winners = &self.winners;
        self.claimed.retain(|p| winners.contains(p));
    }
}

/// Stores a single [`PersistedRoundResult`] at a fixed path, overwriting it
/// on every change.
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored result; `Ok(None)` when nothing was stored yet.
    #[instrument(skip(self))]
    pub async fn load(&self) -> ResultStoreResult<Option<PersistedRoundResult>> {
        if !self.path.exists() {
            debug!("No round result at {}", self.path.display());
            return Ok(None);
        }

        let contents = tokio_fs::read_to_string(&self.path)
            .await
            .map_err(|e| ResultStoreError::FileRead(self.path.clone(), e))?;
        let mut result: PersistedRoundResult = serde_json::from_str(&contents)
            .map_err(|e| ResultStoreError::Deserialization(self.path.clone(), e))?;

        if result.round_id.is_empty() {
            return Ok(None);
        }
        let before = result.claimed.len();
        result.normalize();
        if result.claimed.len() != before {
            warn!("Dropped claims without a matching winner from {}", self.path.display());
        }

        info!(
            "Last round id: {}, winners: {}, claimed: {}",
            result.round_id,
            result.winners.len(),
            result.claimed.len()
        );
        Ok(Some(result))
    }

    /// Writes through a temporary file and renames it over the old result.
    #[instrument(skip(self, result), fields(round_id = %result.round_id))]
    pub async fn save(&self, result: &PersistedRoundResult) -> ResultStoreResult<()> {
        let temp_path = self.path.with_extension("tmp");
        let json = serde_json::to_string_pretty(result).map_err(ResultStoreError::Serialization)?;

        let mut file = tokio_fs::File::create(&temp_path)
            .await
            .map_err(|e| ResultStoreError::FileCreate(temp_path.clone(), e))?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| ResultStoreError::FileWrite(temp_path.clone(), e))?;
        file.sync_all()
            .await
            .map_err(|e| ResultStoreError::FileSync(temp_path.clone(), e))?;
        drop(file);

        tokio_fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| ResultStoreError::FileRename(temp_path, self.path.clone(), e))?;

        debug!("Saved round result to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn finished_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 4, 13, 2, 7).unwrap()
    }

    #[test]
    fn test_round_id_format() {
        let result = PersistedRoundResult::new(finished_at(), false, BTreeSet::new());
        assert_eq!(result.round_id, "2025-05-04T13:02:07Z");
    }

    #[test]
    fn test_record_claim_keeps_claimed_subset_of_winners() {
        let winners = [PlayerId(1)].into_iter().collect();
        let mut result = PersistedRoundResult::new(finished_at(), false, winners);
        assert!(!result.record_claim(PlayerId(2)));
        assert!(result.record_claim(PlayerId(1)));
        assert!(!result.record_claim(PlayerId(1)));
        assert!(result.claimed.is_subset(&result.winners));
    }

    #[test]
    fn test_json_layout() {
        let winners = [PlayerId(3)].into_iter().collect();
        let result = PersistedRoundResult::new(finished_at(), true, winners);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["roundId"], "2025-05-04T13:02:07Z");
        assert_eq!(value["dryRun"], true);
        assert_eq!(value["winners"], serde_json::json!([3]));
        assert_eq!(value["claimed"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("trivia_state.json"));
        assert_eq!(store.load().await.unwrap(), None);

        let winners = [PlayerId(1), PlayerId(2)].into_iter().collect();
        let mut result = PersistedRoundResult::new(finished_at(), false, winners);
        result.record_claim(PlayerId(2));
        store.save(&result).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(result));
        assert!(!dir.path().join("trivia_state.tmp").exists());
    }

    #[tokio::test]
    async fn test_load_drops_foreign_claims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trivia_state.json");
        tokio_fs::write(&path, r#"{"roundId":"r","winners":[1],"claimed":[1,9]}"#)
            .await
            .unwrap();

        let loaded = ResultStore::new(&path).load().await.unwrap().unwrap();
        assert_eq!(loaded.claimed.into_iter().collect::<Vec<_>>(), vec![PlayerId(1)]);
        assert!(!loaded.dry_run);
    }

    #[tokio::test]
    async fn test_load_treats_empty_round_id_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trivia_state.json");
        tokio_fs::write(&path, r#"{"roundId":"","winners":[],"claimed":[]}"#)
            .await
            .unwrap();
        assert_eq!(ResultStore::new(&path).load().await.unwrap(), None);
    }
}
