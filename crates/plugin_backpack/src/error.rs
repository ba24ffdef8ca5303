//! Error types for the backpack plugin

use crate::key::RecordKey;
use mod_api::PlayerId;
use std::{io::Error as IoError, path::PathBuf};
use thiserror::Error;

/// Record store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read file {0}: {1}")]
    FileRead(PathBuf, IoError),

    #[error("Failed to write to file {0}: {1}")]
    FileWrite(PathBuf, IoError),

    #[error("Failed to rename file from {0} to {1}: {2}")]
    FileRename(PathBuf, PathBuf, IoError),

    #[error("Failed to copy file from {0} to {1}: {2}")]
    FileCopy(PathBuf, PathBuf, IoError),

    #[error("Failed to remove file {0}: {1}")]
    FileRemove(PathBuf, IoError),

    #[error("Failed to serialize record: {0}")]
    Serialization(serde_json::Error),

    #[error("Failed to deserialize file {0}: {1}")]
    Deserialization(PathBuf, serde_json::Error),

    #[error("Written record {0} did not read back intact")]
    VerificationFailed(PathBuf),

    #[error("Invalid record key '{0}'")]
    InvalidKey(String),
}

/// Backpack session errors
#[derive(Debug, Error)]
pub enum BackpackError {
    #[error("Backpack slot {slot} is outside 1-{max}")]
    InvalidSlot { slot: u8, max: u8 },

    #[error("Player {0} is not a backpack admin")]
    NotAdmin(PlayerId),

    #[error("Backpack {0} is already open")]
    InUse(RecordKey),

    #[error("Player {0} has no backpack open")]
    NoOpenBackpack(PlayerId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type BackpackResult<T> = Result<T, BackpackError>;
