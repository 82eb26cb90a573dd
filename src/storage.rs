//! Filesystem-backed object store for uploaded book bytes.
//!
//! Objects are addressed by opaque keys shaped like
//! `{owner_id}/{book_id}-{random suffix}.epub`. The random suffix keeps
//! keys unpredictable and collision-free even if a record id leaks.

use crate::error::{AppError, Result};
use std::path::PathBuf;
use tokio::fs;

/// Object store rooted at a configured directory.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    /// Open the store, creating the root directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Derive a fresh object key for a book.
    pub fn object_key(owner_id: &str, book_id: &str) -> String {
        let suffix: [u8; 6] = rand::random();
        let suffix: String = suffix.iter().map(|b| format!("{:02x}", b)).collect();
        format!("{}/{}-{}.epub", owner_id, book_id, suffix)
    }

    /// Resolve a key to a path under the root. Every key component must
    /// be a plain file or directory name; traversal sequences are rejected.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for component in key.split('/') {
            if component.is_empty()
                || component == "."
                || component == ".."
                || component.contains('\\')
            {
                return Err(AppError::Validation(format!("Invalid object key: {}", key)));
            }
            path.push(component);
        }
        Ok(path)
    }

    /// Write an object's bytes under the given key.
    pub async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        Ok(())
    }

    /// Open an object for streaming; returns the file handle and its size.
    pub async fn open_object(&self, key: &str) -> Result<(fs::File, u64)> {
        let path = self.resolve(key)?;
        let file = fs::File::open(&path)
            .await
            .map_err(|_| AppError::NotFound("Book file".to_string()))?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Remove an object. Returns whether it existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
