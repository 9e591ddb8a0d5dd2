//! ROM image buffer
//!
//! An immutable byte buffer holding one ECU ROM, either loaded from disk or
//! published by a completed transfer. The codec only ever reads from it.

use crate::types::Result;
use std::path::Path;

/// An immutable ROM image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomImage {
    bytes: Vec<u8>,
}

impl RomImage {
    /// Wrap an in-memory buffer (e.g. the payload of a completed download)
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Load a ROM image from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        log::info!("Loaded ROM image {:?} ({} bytes)", path, bytes.len());
        Ok(Self { bytes })
    }

    /// Total size of the image in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the image holds no bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw byte view of the whole image
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
