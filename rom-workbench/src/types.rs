//! Core types for the ROM workbench library
//!
//! This module defines the error taxonomy shared by the definition model,
//! the table codec and the transfer engine. Errors carry enough context
//! (table name, address, transport stage) to diagnose from a log alone.

use std::fmt;

/// Result type for workbench operations
pub type Result<T> = std::result::Result<T, WorkbenchError>;

/// Transport step that failed during security access or transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStage {
    /// Opening the diagnostic session
    Session,
    /// Requesting the seed bytes
    Seed,
    /// Deriving the key from the seed
    KeyDerivation,
    /// Submitting the key to unlock security access
    Unlock,
    /// A bounded memory read during transfer
    ChunkRead,
}

impl fmt::Display for TransportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportStage::Session => write!(f, "diag session"),
            TransportStage::Seed => write!(f, "seed request"),
            TransportStage::KeyDerivation => write!(f, "key derivation"),
            TransportStage::Unlock => write!(f, "security unlock"),
            TransportStage::ChunkRead => write!(f, "memory read"),
        }
    }
}

/// Errors that can occur across the workbench core
#[derive(Debug, thiserror::Error)]
pub enum WorkbenchError {
    #[error("Failed to parse definition: {0}")]
    Parse(String),

    #[error("Malformed address '{text}': {trailing} trailing non-numeric character(s)")]
    MalformedAddress { text: String, trailing: usize },

    #[error("Invalid transfer configuration: {0}")]
    Config(String),

    #[error("ECU transport failure during {stage}: {detail}")]
    Transport {
        stage: TransportStage,
        detail: String,
    },

    #[error("Table '{table}': read of {len} bytes at 0x{address:X} exceeds ROM size 0x{rom_len:X}")]
    OutOfBounds {
        table: String,
        address: u64,
        len: usize,
        rom_len: usize,
    },

    #[error("Table '{table}': scaling '{scaling}' is not resolved")]
    MissingScaling { table: String, scaling: String },

    #[error("Table '{table}': {detail}")]
    MalformedDefinition { table: String, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl WorkbenchError {
    /// Build a transport error with stage context
    pub fn transport(stage: TransportStage, detail: impl Into<String>) -> Self {
        WorkbenchError::Transport {
            stage,
            detail: detail.into(),
        }
    }
}
