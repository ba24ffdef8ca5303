//! Error types for the trivia plugin

use std::{io::Error as IoError, path::PathBuf};
use thiserror::Error;

/// Question bank loading errors
#[derive(Debug, Error)]
pub enum BankError {
    #[error("Failed to read question file {0}: {1}")]
    FileRead(PathBuf, IoError),

    #[error("Failed to write question file {0}: {1}")]
    FileWrite(PathBuf, IoError),

    #[error("Failed to serialize seed questions: {0}")]
    Serialization(serde_json::Error),

    #[error("Failed to deserialize question file {0}: {1}")]
    Deserialization(PathBuf, serde_json::Error),
}

/// Round result persistence errors
#[derive(Debug, Error)]
pub enum ResultStoreError {
    #[error("Failed to read file {0}: {1}")]
    FileRead(PathBuf, IoError),

    #[error("Failed to create file {0}: {1}")]
    FileCreate(PathBuf, IoError),

    #[error("Failed to write to file {0}: {1}")]
    FileWrite(PathBuf, IoError),

    #[error("Failed to sync file {0}: {1}")]
    FileSync(PathBuf, IoError),

    #[error("Failed to rename file from {0} to {1}: {2}")]
    FileRename(PathBuf, PathBuf, IoError),

    #[error("Failed to serialize round result: {0}")]
    Serialization(serde_json::Error),

    #[error("Failed to deserialize file {0}: {1}")]
    Deserialization(PathBuf, serde_json::Error),
}

pub type BankResult<T> = Result<T, BankError>;
pub type ResultStoreResult<T> = Result<T, ResultStoreError>;
