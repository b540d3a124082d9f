//! Durable text blobs
//!
//! A [`TextStore`] reads and writes one piece of text. It knows nothing about
//! what the text means; decoding is left to [`crate::persistent`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::LibraryContext;

/// Read/write/exists over a single durable text blob
pub trait TextStore {
    /// Read the stored text
    ///
    /// Fails with [`io::ErrorKind::NotFound`] when nothing has been stored.
    fn read_text(&self) -> io::Result<String>;

    /// Replace the stored text
    fn write_text(&mut self, text: &str) -> io::Result<()>;

    /// Whether any text is stored (says nothing about whether it is valid)
    fn exists(&self) -> bool;
}

/// A text blob kept in a file
#[derive(Debug, Clone)]
pub struct FileTextStore {
    path: PathBuf,
}

impl FileTextStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store for one (account, profile) pair inside `dir`
    ///
    /// The file is named `<account>.<profile>.data`.
    pub fn for_context(dir: &Path, context: &LibraryContext) -> Self {
        Self::new(dir.join(format!("{}.{}.data", context.account, context.profile)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the stored file. A file that is already gone is not an error.
    pub fn delete(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl TextStore for FileTextStore {
    fn read_text(&self) -> io::Result<String> {
        std::fs::read_to_string(&self.path)
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, text)
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// A text blob kept in memory
///
/// Clones share the same blob, so a handle kept by the host sees every write
/// made through the store.
#[derive(Debug, Clone, Default)]
pub struct MemoryTextStore {
    text: Arc<Mutex<Option<String>>>,
}

impl MemoryTextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `text`
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Arc::new(Mutex::new(Some(text.into()))),
        }
    }

    /// Snapshot of the stored text
    pub fn text(&self) -> Option<String> {
        self.slot().clone()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.text.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TextStore for MemoryTextStore {
    fn read_text(&self) -> io::Result<String> {
        self.slot()
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no text stored"))
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        *self.slot() = Some(text.to_string());
        Ok(())
    }

    fn exists(&self) -> bool {
        self.slot().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = FileTextStore::new(dir.path().join("nested/dir/blob.data"));

        assert!(!store.exists());
        assert_eq!(
            store.read_text().unwrap_err().kind(),
            io::ErrorKind::NotFound
        );

        store.write_text("hello").unwrap();
        assert!(store.exists());
        assert_eq!(store.read_text().unwrap(), "hello");
    }

    #[test]
    fn test_file_store_name_from_context() {
        let context = LibraryContext::new("acct", "main", "dev");
        let store = FileTextStore::for_context(Path::new("/tmp/tealium"), &context);
        assert_eq!(store.path(), Path::new("/tmp/tealium/acct.main.data"));
    }

    #[test]
    fn test_file_store_delete() {
        let dir = TempDir::new().unwrap();
        let mut store = FileTextStore::new(dir.path().join("blob.data"));
        store.delete().unwrap();

        store.write_text("x").unwrap();
        store.delete().unwrap();
        assert!(!store.exists());
    }

    #[test]
    fn test_memory_store_clones_share_text() {
        let handle = MemoryTextStore::new();
        let mut store = handle.clone();
        assert!(!handle.exists());

        store.write_text("shared").unwrap();
        assert!(handle.exists());
        assert_eq!(handle.text().as_deref(), Some("shared"));
    }
}
