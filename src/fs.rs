//! File system abstraction for testability.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Returns the `.part` path an artifact is written to before it is renamed into place.
#[must_use]
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Abstraction over file system operations for testability.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Returns the size of a file if it exists.
    async fn file_size(&self, path: &Path) -> Option<u64>;

    /// Creates all directories in the given path.
    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Writes `data` to `{path}.part`, then renames it to `path`.
    ///
    /// A crash mid-write leaves at most a `.part` file behind, never a
    /// truncated file at `path`.
    async fn write_atomic(&self, path: &Path, data: &[u8]) -> std::io::Result<()>;

    /// Writes `data` to `path`, replacing any existing file.
    async fn write_file(&self, path: &Path, data: &[u8]) -> std::io::Result<()>;
}

/// Default file system implementation using `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    /// Creates a new `TokioFileSystem` instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn file_size(&self, path: &Path) -> Option<u64> {
        tokio::fs::metadata(path)
            .await
            .ok()
            .filter(std::fs::Metadata::is_file)
            .map(|m| m.len())
    }

    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn write_atomic(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        let pp = part_path(path);
        if let Err(e) = tokio::fs::write(&pp, data).await {
            let _ = tokio::fs::remove_file(&pp).await;
            return Err(e);
        }
        tokio::fs::rename(&pp, path).await
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(path, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn part_path_appends_extension() {
        assert_eq!(
            part_path(Path::new("pdf/rc001.pdf")),
            PathBuf::from("pdf/rc001.pdf.part")
        );
    }

    #[tokio::test]
    async fn tokio_fs_file_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.pdf");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"hello").unwrap();

        let fs = TokioFileSystem::new();
        assert_eq!(fs.file_size(&path).await, Some(5));
        assert_eq!(fs.file_size(&dir.path().join("nonexistent.pdf")).await, None);
    }

    #[tokio::test]
    async fn tokio_fs_directory_has_no_size() {
        let dir = TempDir::new().unwrap();
        let fs = TokioFileSystem::new();
        assert_eq!(fs.file_size(dir.path()).await, None);
    }

    #[tokio::test]
    async fn tokio_fs_create_dir_all() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");

        let fs = TokioFileSystem::new();
        fs.create_dir_all(&nested).await.unwrap();
        assert!(nested.exists());
    }

    #[tokio::test]
    async fn tokio_fs_write_atomic_leaves_no_part() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("card.pdf");

        let fs = TokioFileSystem::new();
        fs.write_atomic(&path, b"%PDF").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF");
        assert!(!part_path(&path).exists());
    }

    #[tokio::test]
    async fn tokio_fs_write_file_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("card.htm");
        std::fs::write(&path, "old old old").unwrap();

        let fs = TokioFileSystem::new();
        fs.write_file(&path, b"new").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }
}
