//! # Virtual Backpack
//!
//! Extra per-player storage. Every backpack is one JSON document kept by a
//! [`RecordStore`], which never hands out a half-written file:
//!
//! - saves go to a temporary file that is read back and checked before it
//!   replaces the primary
//! - every save rotates three backup generations; the oldest one is kept for
//!   at least a day
//! - admin edits snapshot into a separate three-generation chain
//! - a corrupt primary is recovered from backups, then salvaged, then reset
//!
//! [`BackpackService`] adds sessions on top: players open their own slots,
//! admins open other players' slots, and closing the window saves.

pub mod config;
pub mod error;
pub mod fs;
pub mod key;
pub mod record;
pub mod service;
pub mod starter;
pub mod store;

pub use config::BackpackConfig;
pub use error::{BackpackError, BackpackResult, StoreError, StoreResult};
pub use fs::{FileSystem, TokioFileSystem};
pub use key::RecordKey;
pub use record::{Backpack, ItemStack, StoredRecord, BACKPACK_SLOTS};
pub use service::{BackpackService, CloseOutcome, OpenedBackpack};
pub use starter::{StarterKit, StarterKitPolicy};
pub use store::{
    InitialRecord, InitialRecordPolicy, LoadOrigin, Loaded, RecordStore, DOOMSDAY_RETENTION_HOURS,
};
