//! Player-facing backpack sessions.
//!
//! A session runs from opening a backpack to closing its window. Each record
//! is held by at most one opener at a time.

use crate::config::BackpackConfig;
use crate::error::{BackpackError, BackpackResult};
use crate::key::RecordKey;
use crate::record::{Backpack, ItemStack};
use crate::store::{LoadOrigin, RecordStore};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use mod_api::{Messenger, PlayerId, Reward, RewardGrantor};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
struct Session {
    key: RecordKey,
    /// Opened by an admin on someone else's behalf.
    remote: bool,
    /// The record had no file when the session began.
    fresh: bool,
}

/// A backpack ready to show.
#[derive(Debug, Clone)]
pub struct OpenedBackpack {
    pub key: RecordKey,
    pub title: String,
    pub backpack: Backpack,
    pub origin: LoadOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Saved,
    /// An admin closed with no items at all, or left a record that did not
    /// exist yet empty; nothing was written.
    SkippedEmpty,
}

pub struct BackpackService {
    config: BackpackConfig,
    store: Arc<RecordStore<Backpack>>,
    messenger: Arc<dyn Messenger>,
    grantor: Arc<dyn RewardGrantor>,
    sessions: DashMap<PlayerId, Session>,
    in_use: DashMap<RecordKey, PlayerId>,
}

impl BackpackService {
    pub fn new(
        config: BackpackConfig,
        store: Arc<RecordStore<Backpack>>,
        messenger: Arc<dyn Messenger>,
        grantor: Arc<dyn RewardGrantor>,
    ) -> Self {
        Self {
            config,
            store,
            messenger,
            grantor,
            sessions: DashMap::new(),
            in_use: DashMap::new(),
        }
    }

    pub fn config(&self) -> &BackpackConfig {
        &self.config
    }

    pub fn store(&self) -> &RecordStore<Backpack> {
        &self.store
    }

    pub fn is_admin(&self, player: PlayerId) -> bool {
        self.config.is_admin(player)
    }

    /// The record `player` currently has open.
    pub fn open_key(&self, player: PlayerId) -> Option<RecordKey> {
        self.sessions.get(&player).map(|s| s.key.clone())
    }

    /// Opens one of the player's own backpacks.
    pub async fn open(&self, player: PlayerId, slot: u8) -> BackpackResult<OpenedBackpack> {
        self.check_slot(player, slot)?;
        let key = RecordKey::for_player(player, slot);
        self.hold(player, &key)?;

        let loaded = self.store.load(&key).await;
        if loaded.origin == LoadOrigin::Initial {
            self.hand_out_initial(player, &key, &loaded.record, loaded.reward)
                .await;
        }

        self.begin_session(player, key.clone(), false, false);
        debug!("Player {} opened backpack {}", player, key);
        Ok(OpenedBackpack {
            key,
            title: format!("Virtual Backpack {slot}"),
            backpack: loaded.record,
            origin: loaded.origin,
        })
    }

    /// Opens `target`'s backpack for an admin. The current contents are
    /// snapshotted into the admin backup chain first.
    pub async fn admin_open(
        &self,
        admin: PlayerId,
        target: PlayerId,
        slot: u8,
    ) -> BackpackResult<OpenedBackpack> {
        if !self.is_admin(admin) {
            warn!("Player {} attempted /vbopen without permission", admin);
            self.tell(admin, "[Backpack] You do not have permission to use /vbopen.");
            return Err(BackpackError::NotAdmin(admin));
        }
        self.check_slot(admin, slot)?;
        let key = RecordKey::for_player(target, slot);
        self.hold(admin, &key)?;

        if let Err(e) = self.store.create_admin_backup(&key).await {
            warn!("Admin backup of {} failed: {}", key, e);
        }
        // Initial contents stay for the owner's own first open.
        let loaded = self.store.load_existing(&key).await;

        self.begin_session(admin, key.clone(), true, loaded.origin == LoadOrigin::Fresh);
        info!("Admin {} opened backpack {}", admin, key);
        Ok(OpenedBackpack {
            key,
            title: format!("Virtual Backpack {slot} (player {target})"),
            backpack: loaded.record,
            origin: loaded.origin,
        })
    }

    /// Saves the contents of the window `opener` just closed and ends the
    /// session. The record is released even if the save fails.
    pub async fn close(
        &self,
        opener: PlayerId,
        items: Vec<ItemStack>,
    ) -> BackpackResult<CloseOutcome> {
        let Some((_, session)) = self.sessions.remove(&opener) else {
            return Err(BackpackError::NoOpenBackpack(opener));
        };

        let outcome = if session.remote && items.is_empty() {
            warn!(
                "Admin close with empty items for {}; skipping save to prevent data loss",
                session.key
            );
            Ok(CloseOutcome::SkippedEmpty)
        } else if session.fresh && !items.iter().any(ItemStack::is_occupied) {
            debug!("Nothing placed in new record {}; not creating it", session.key);
            Ok(CloseOutcome::SkippedEmpty)
        } else {
            self.save_session(opener, &session, items).await
        };

        self.release(opener, &session.key);
        outcome
    }

    /// Drops whatever `player` has open without saving, e.g. on disconnect.
    pub fn abandon(&self, player: PlayerId) {
        if let Some((_, session)) = self.sessions.remove(&player) {
            info!("Player {} left with backpack {} open; not saved", player, session.key);
            self.release(player, &session.key);
        }
    }

    async fn save_session(
        &self,
        opener: PlayerId,
        session: &Session,
        items: Vec<ItemStack>,
    ) -> BackpackResult<CloseOutcome> {
        let key = &session.key;
        if let Err(e) = self.store.save(key, &Backpack::from_slots(items)).await {
            error!("Failed to save backpack {}: {}", key, e);
            self.tell(opener, "[Backpack] Could not save your backpack. Contact admin.");
            return Err(e.into());
        }

        if session.remote {
            info!("Admin {} saved backpack {}", opener, key);
            if let Some(owner) = key.player() {
                self.tell(
                    owner,
                    &format!("An admin has updated your Virtual Backpack #{}.", key.slot()),
                );
            }
        }
        Ok(CloseOutcome::Saved)
    }

    /// Writes initial contents straight away so they, and their reward, are
    /// only ever handed out once.
    async fn hand_out_initial(
        &self,
        player: PlayerId,
        key: &RecordKey,
        backpack: &Backpack,
        reward: Option<Reward>,
    ) {
        if let Err(e) = self.store.save(key, backpack).await {
            error!("Failed to persist starter contents of {}: {}", key, e);
            return;
        }
        let Some(reward) = reward else {
            return;
        };
        match self.grantor.grant(player, reward).await {
            Ok(()) => info!("Awarded {} to player {} with backpack {}", reward, player, key),
            Err(e) => {
                warn!("Starter reward for player {} failed: {}", player, e);
                self.tell(player, "[Backpack] Failed to grant starter credits. Contact admin.");
            }
        }
    }

    fn check_slot(&self, actor: PlayerId, slot: u8) -> BackpackResult<()> {
        let max = self.config.player_slots;
        if slot == 0 || slot > max {
            self.tell(actor, &format!("[Backpack] Backpack slots are 1-{max}."));
            return Err(BackpackError::InvalidSlot { slot, max });
        }
        Ok(())
    }

    /// Reserves `key` for `opener`. Reopening one's own record is allowed.
    fn hold(&self, opener: PlayerId, key: &RecordKey) -> BackpackResult<()> {
        match self.in_use.entry(key.clone()) {
            Entry::Occupied(entry) if *entry.get() != opener => {
                self.tell(opener, &format!("[Backpack] Backpack {} is already in use.", key));
                Err(BackpackError::InUse(key.clone()))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(entry) => {
                entry.insert(opener);
                Ok(())
            }
        }
    }

    fn begin_session(&self, opener: PlayerId, key: RecordKey, remote: bool, fresh: bool) {
        let session = Session {
            key: key.clone(),
            remote,
            fresh,
        };
        let previous = self.sessions.insert(opener, session);
        if let Some(previous) = previous {
            if previous.key != key {
                debug!("Player {} switched from {} to {}", opener, previous.key, key);
                self.release(opener, &previous.key);
            }
        }
    }

    fn release(&self, opener: PlayerId, key: &RecordKey) {
        self.in_use.remove_if(key, |_, holder| *holder == opener);
    }

    fn tell(&self, player: PlayerId, text: &str) {
        self.messenger.send_private(player, text);
    }
}
