use mod_api::PlayerId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Backpack settings, the `[backpack]` section of the host configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackpackConfig {
    /// Players own slots `1..=player_slots` (`/vb1` ...).
    pub player_slots: u8,
    /// Slot filled from the starter kit on first access; 0 disables the kit.
    pub starter_slot: u8,
    pub starter_kit_path: PathBuf,
    /// Players allowed to open other players' backpacks.
    pub admin_ids: Vec<PlayerId>,
}

impl Default for BackpackConfig {
    fn default() -> Self {
        Self {
            player_slots: 6,
            starter_slot: 6,
            starter_kit_path: PathBuf::from("StarterKitContents.json"),
            admin_ids: Vec::new(),
        }
    }
}

impl BackpackConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=9).contains(&self.player_slots) {
            return Err(format!(
                "backpack.player_slots must be 1-9, got {}",
                self.player_slots
            ));
        }
        if self.starter_slot > self.player_slots {
            return Err(format!(
                "backpack.starter_slot {} is beyond player_slots {}",
                self.starter_slot, self.player_slots
            ));
        }
        Ok(())
    }

    pub fn is_admin(&self, player: PlayerId) -> bool {
        self.admin_ids.contains(&player)
    }
}
