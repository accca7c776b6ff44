//! In-memory filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use spud_core::{Error, FileSystem, Result};

/// [`FileSystem`] over a map of paths to contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), contents.into());
    }

    /// Add a file holding `words` in little-endian order, as SPIR-V is stored.
    pub fn insert_words(&mut self, path: impl Into<PathBuf>, words: &[u32]) {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self.insert(path, bytes);
    }
}

impl FileSystem for MemoryFileSystem {
    fn read_all_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.display().to_string()))
    }
}
