//! Destination file management with offset-addressed writes.
//!
//! Chunks complete in arbitrary order; correctness comes from writing
//! each chunk at its absolute offset into a pre-sized file rather than
//! serialising completions. Workers hold independent handles addressing
//! disjoint regions.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, BufWriter};

use crate::error::DownloadError;

/// Handle to the destination file shared by all workers.
#[derive(Debug, Clone)]
pub(crate) struct DestFile {
    path: Arc<PathBuf>,
}

impl DestFile {
    /// Creates or truncates the destination, pre-sizing it when the
    /// resource size is known.
    pub async fn create(path: &Path, size: u64) -> Result<Self, DownloadError> {
        let file = File::create(path)
            .await
            .map_err(|e| DownloadError::destination(path, e))?;
        if size > 0 {
            file.set_len(size)
                .await
                .map_err(|e| DownloadError::destination(path, e))?;
        }
        Ok(Self {
            path: Arc::new(path.to_path_buf()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens an independent buffered handle positioned at an absolute
    /// offset. Offset 0 on a freshly truncated file doubles as the
    /// sequential path for single-stream downloads.
    pub async fn writer_at(&self, offset: u64) -> Result<BufWriter<File>, DownloadError> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(self.path.as_ref())
            .await
            .map_err(|e| DownloadError::destination(self.path(), e))?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))
                .await
                .map_err(|e| DownloadError::io(self.path(), e))?;
        }
        Ok(BufWriter::new(file))
    }
}

/// Verifies the destination can be opened for writing, creating it when
/// missing. Existing content is left untouched.
pub(crate) async fn ensure_writable(path: &Path) -> Result<(), DownloadError> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .await
        .map(|_| ())
        .map_err(|e| DownloadError::destination(path, e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_create_pre_sizes_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.bin");

        DestFile::create(&path, 128).await.unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 128);
    }

    #[tokio::test]
    async fn test_writers_at_disjoint_offsets() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.bin");
        let dest = DestFile::create(&path, 10).await.unwrap();

        let mut tail = dest.writer_at(5).await.unwrap();
        tail.write_all(b"56789").await.unwrap();
        tail.flush().await.unwrap();

        let mut head = dest.writer_at(0).await.unwrap();
        head.write_all(b"01234").await.unwrap();
        head.flush().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"0123456789");
    }

    #[tokio::test]
    async fn test_create_truncates_existing_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.bin");
        std::fs::write(&path, b"previous content").unwrap();

        DestFile::create(&path, 4).await.unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_ensure_writable_preserves_existing_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.bin");
        std::fs::write(&path, b"keep me").unwrap();

        ensure_writable(&path).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
    }

    #[tokio::test]
    async fn test_ensure_writable_rejects_missing_parent() {
        let result = ensure_writable(Path::new("/definitely/missing/parent/out.bin")).await;
        assert!(matches!(result, Err(DownloadError::Destination { .. })));
    }
}
