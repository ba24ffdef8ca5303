//! Display-name resolution.
//!
//! Resolving an entity id to a player name needs a round-trip to the host,
//! which must never happen inside a mod's critical section. [`NameCache`]
//! answers synchronously from what it already knows, starts a background
//! lookup for what it does not, and falls back to a label derived from the id
//! in the meantime.

use crate::types::PlayerId;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Names the host reports for players it could not resolve.
const PLACEHOLDER_NAMES: &[&str] = &["Unknown Player"];

/// Asynchronous lookup of a player's display name.
#[async_trait]
pub trait PlayerDirectory: Send + Sync {
    async fn lookup_name(&self, player: PlayerId) -> Option<String>;
}

/// Label used when a player's real name is not known yet.
pub fn fallback_name(player: PlayerId) -> String {
    format!("Player_{player}")
}

/// Cache of player display names, filled by connect events and background
/// lookups.
#[derive(Clone, Default)]
pub struct NameCache {
    names: Arc<DashMap<PlayerId, String>>,
    pending: Arc<DashMap<PlayerId, ()>>,
    directory: Option<Arc<dyn PlayerDirectory>>,
}

impl NameCache {
    /// A cache that only knows what it is told through [`NameCache::remember`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that resolves unknown players through `directory`.
    pub fn with_directory(directory: Arc<dyn PlayerDirectory>) -> Self {
        Self {
            directory: Some(directory),
            ..Self::default()
        }
    }

    /// Returns the cached name, or the fallback label while a background
    /// lookup is started. Never waits.
    pub fn display_name(&self, player: PlayerId) -> String {
        if let Some(name) = self.cached(player) {
            return name;
        }
        self.request(player);
        fallback_name(player)
    }

    pub fn cached(&self, player: PlayerId) -> Option<String> {
        self.names.get(&player).map(|entry| entry.value().clone())
    }

    pub fn remember(&self, player: PlayerId, name: &str) {
        let name = name.trim();
        if name.is_empty() || PLACEHOLDER_NAMES.contains(&name) {
            return;
        }
        self.names.insert(player, name.to_string());
        debug!("Cached player name {} -> {}", player, name);
    }

    pub fn forget(&self, player: PlayerId) {
        self.names.remove(&player);
    }

    pub fn is_pending(&self, player: PlayerId) -> bool {
        self.pending.contains_key(&player)
    }

    /// Starts a background lookup unless one is already in flight.
    fn request(&self, player: PlayerId) {
        let Some(directory) = self.directory.clone() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime available to resolve player {}", player);
            return;
        };
        if self.pending.insert(player, ()).is_some() {
            return;
        }

        let cache = self.clone();
        runtime.spawn(async move {
            match directory.lookup_name(player).await {
                Some(name) => cache.remember(player, &name),
                None => warn!("Name lookup returned nothing for player {}", player),
            }
            cache.pending.remove(&player);
        });
    }
}

impl std::fmt::Debug for NameCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameCache")
            .field("cached", &self.names.len())
            .field("pending", &self.pending.len())
            .field("has_directory", &self.directory.is_some())
            .finish()
    }
}
