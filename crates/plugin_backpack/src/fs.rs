//! Whole-file filesystem operations the record store is built on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use std::path::Path;
use tokio::{fs as tokio_fs, io::AsyncWriteExt};

#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Creates or truncates `path` and flushes `contents` to disk.
    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Replaces `to` if it exists.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    async fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;

    async fn remove(&self, path: &Path) -> io::Result<()>;

    async fn exists(&self, path: &Path) -> bool;

    async fn modified(&self, path: &Path) -> io::Result<DateTime<Utc>>;
}

/// The local disk, through `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFileSystem;

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio_fs::read(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut file = tokio_fs::File::create(path).await?;
        file.write_all(contents).await?;
        file.sync_all().await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio_fs::rename(from, to).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio_fs::copy(from, to).await.map(|_| ())
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        tokio_fs::remove_file(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio_fs::try_exists(path).await.unwrap_or(false)
    }

    async fn modified(&self, path: &Path) -> io::Result<DateTime<Utc>> {
        let metadata = tokio_fs::metadata(path).await?;
        Ok(metadata.modified()?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rename_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem;
        let a = dir.path().join("a");
        let b = dir.path().join("b");

        fs.write(&a, b"new").await.unwrap();
        fs.write(&b, b"old").await.unwrap();
        fs.rename(&a, &b).await.unwrap();

        assert!(!fs.exists(&a).await);
        assert_eq!(fs.read(&b).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_copy_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem;
        let a = dir.path().join("a");
        let b = dir.path().join("b");

        fs.write(&a, b"data").await.unwrap();
        fs.copy(&a, &b).await.unwrap();
        fs.remove(&a).await.unwrap();

        assert!(!fs.exists(&a).await);
        assert_eq!(fs.read(&b).await.unwrap(), b"data");
        assert!(fs.modified(&b).await.is_ok());
    }
}
