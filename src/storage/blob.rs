//! Blob storage for downloaded media

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Stores image and thumbnail payloads under relative paths
pub trait BlobStore: Send + Sync {
    /// Writes `bytes` to `path`, replacing any existing blob
    fn save(&self, path: &str, bytes: &[u8]) -> io::Result<()>;

    /// Removes the blob at `path`; a missing blob is not an error
    fn delete(&self, path: &str) -> io::Result<()>;
}

/// Blob store backed by a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a relative blob path, refusing anything that escapes the root
    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|c| {
            !matches!(c, std::path::Component::Normal(_) | std::path::Component::CurDir)
        });
        if escapes || path.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid blob path: {}", path),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for LocalBlobStore {
    fn save(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        let full_path = self.resolve(path)?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full_path, bytes)
    }

    fn delete(&self, path: &str) -> io::Result<()> {
        let full_path = self.resolve(path)?;
        match fs::remove_file(full_path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Replaces every character outside `[A-Za-z0-9._-]` with an underscore
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_creates_directories() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store.save("post_images/123.png", b"png").unwrap();

        let written = fs::read(dir.path().join("post_images/123.png")).unwrap();
        assert_eq!(written, b"png");
    }

    #[test]
    fn test_delete_removes_file() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store.save("post_thumbnails/1.jpg", b"jpg").unwrap();
        store.delete("post_thumbnails/1.jpg").unwrap();

        assert!(!dir.path().join("post_thumbnails/1.jpg").exists());
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert!(store.delete("post_images/none.png").is_ok());
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path());

        assert!(store.save("../outside.png", b"x").is_err());
        assert!(store.save("/etc/passwd", b"x").is_err());
        assert!(store.delete("").is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("1700000000123.png"), "1700000000123.png");
        assert_eq!(sanitize_filename("../a b/c.jpg"), ".._a_b_c.jpg");
        assert_eq!(sanitize_filename("ünï.webm"), "_n_.webm");
        assert_eq!(sanitize_filename("üï.webm"), "__.webm");
    }
}
