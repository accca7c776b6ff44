//! Filesystem collaborator.
//!
//! The renderer only ever needs whole-file binary reads (precompiled shader
//! bytecode), so the contract is a single operation.

use std::io::ErrorKind;
use std::path::Path;

use crate::error::{Error, Result};

/// Read-only access to files by path.
pub trait FileSystem {
    /// Read the entire file at `path` as raw bytes.
    fn read_all_bytes(&self, path: &Path) -> Result<Vec<u8>>;
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn read_all_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            _ => Error::Io(e),
        })
    }
}
