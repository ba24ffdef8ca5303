//! Starter kit handed out the first time a player opens the starter slot.

use crate::key::RecordKey;
use crate::record::{Backpack, ItemStack};
use crate::store::{InitialRecord, InitialRecordPolicy};
use async_trait::async_trait;
use mod_api::Reward;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, info, warn};

fn default_credits_reward() -> u64 {
    10_000
}

/// Contents of `StarterKitContents.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarterKit {
    #[serde(default)]
    pub items: Vec<ItemStack>,
    /// Credits paid once, together with the first opening.
    #[serde(default = "default_credits_reward")]
    pub credits_reward: u64,
}

/// Fills one slot from the starter kit file.
///
/// The file is read on every first access, so edits apply without a restart.
#[derive(Debug, Clone)]
pub struct StarterKitPolicy {
    path: PathBuf,
    slot: u8,
}

impl StarterKitPolicy {
    pub fn new(path: impl Into<PathBuf>, slot: u8) -> Self {
        Self {
            path: path.into(),
            slot,
        }
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    pub async fn load_kit(&self) -> Option<StarterKit> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Starter kit {} unavailable: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(kit) => Some(kit),
            Err(e) => {
                error!("Invalid starter kit {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl InitialRecordPolicy<Backpack> for StarterKitPolicy {
    async fn initial_record(&self, key: &RecordKey) -> Option<InitialRecord<Backpack>> {
        if key.slot() != self.slot {
            return None;
        }
        let kit = self.load_kit().await?;
        if kit.items.is_empty() {
            info!("No starter kit items configured");
            return None;
        }

        info!("Starter kit with {} items for {}", kit.items.len(), key);
        Some(InitialRecord {
            record: Backpack::from_stacks(&kit.items),
            reward: (kit.credits_reward > 0).then_some(Reward::Credits(kit.credits_reward)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StoredRecord;

    async fn policy_with(json: &str) -> (tempfile::TempDir, StarterKitPolicy) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("StarterKitContents.json");
        tokio::fs::write(&path, json).await.unwrap();
        (dir, StarterKitPolicy::new(path, 6))
    }

    #[tokio::test]
    async fn test_kit_only_fills_its_slot() {
        let (_dir, policy) =
            policy_with(r#"{"items":[{"id":100,"count":2,"slotIdx":9}],"creditsReward":500}"#).await;

        assert!(policy.initial_record(&"1:5".parse().unwrap()).await.is_none());

        let initial = policy.initial_record(&"1:6".parse().unwrap()).await.unwrap();
        assert_eq!(initial.record.occupied(), 1);
        assert_eq!(initial.record.items[0].slot_idx, 0);
        assert_eq!(initial.reward, Some(Reward::Credits(500)));
    }

    #[tokio::test]
    async fn test_default_and_zero_reward() {
        let (_dir, policy) = policy_with(r#"{"items":[{"id":1,"count":1,"slotIdx":0}]}"#).await;
        let initial = policy.initial_record(&"1:6".parse().unwrap()).await.unwrap();
        assert_eq!(initial.reward, Some(Reward::Credits(10_000)));

        let (_dir, policy) =
            policy_with(r#"{"items":[{"id":1,"count":1,"slotIdx":0}],"creditsReward":0}"#).await;
        let initial = policy.initial_record(&"1:6".parse().unwrap()).await.unwrap();
        assert_eq!(initial.reward, None);
    }

    #[tokio::test]
    async fn test_missing_or_empty_kit() {
        let policy = StarterKitPolicy::new("/nonexistent/StarterKitContents.json", 6);
        assert!(policy.initial_record(&"1:6".parse().unwrap()).await.is_none());

        let (_dir, policy) = policy_with(r#"{"items":[]}"#).await;
        assert!(policy.initial_record(&"1:6".parse().unwrap()).await.is_none());
    }
}
