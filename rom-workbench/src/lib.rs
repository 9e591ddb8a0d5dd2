//! ROM Workbench Library
//!
//! A library for ECU ROM tuning workbenches: parses declarative table
//! definitions, decodes ROM images into typed numeric grids, and downloads
//! ROM memory out of a live ECU over a diagnostic transport.
//!
//! # Architecture
//!
//! The library is intentionally minimal and focused on the engine work:
//! - Builds a linked [`DefinitionSet`] from the attribute records an
//!   external markup parser supplies
//! - Decodes 1D/2D/3D tables out of an immutable [`RomImage`]
//! - Negotiates UDS seed/key security access against an [`EcuTransport`]
//! - Streams ECU memory in bounded chunks with polled progress and
//!   cooperative cancellation
//!
//! The library does NOT:
//! - Render tables or lay out any UI
//! - Persist settings, layouts or download history
//! - Parse XML/JSON documents (the application layer adapts them into
//!   attribute records)
//! - Implement an ECU key-derivation algorithm (the transport owns it)
//!
//! # Example Usage
//!
//! ```no_run
//! use rom_workbench::{build_definition, DefinitionRecords, RomImage, TableCodec};
//! use std::path::Path;
//!
//! // Records come from whatever parses the definition document
//! let records = DefinitionRecords::default();
//! let set = build_definition(&records);
//!
//! let rom = RomImage::from_file(Path::new("stock.bin")).unwrap();
//! for table in &set.tables {
//!     match TableCodec::decode(&set, table, &rom) {
//!         Ok(grid) => println!("{}: {}x{}", table.name, grid.rows, grid.cols),
//!         Err(e) => eprintln!("{} is not decodable: {}", table.name, e),
//!     }
//! }
//! ```

// Public modules
pub mod codec;
pub mod definition;
pub mod rom;
pub mod security;
pub mod transfer;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use codec::{read_f32_be, TableCodec, TableGrid};
pub use definition::{
    build_definition, DefinitionRecords, DefinitionSet, DefinitionStats, RomIdentity, Scaling,
    ScalingRecord, TableDefinition, TableKind, TableRecord,
};
pub use rom::RomImage;
pub use security::{negotiate, EXTENDED_DIAG_SESSION};
pub use transfer::{
    Downloader, TransferConfig, TransferOutcome, TransferPhase, TransferSnapshot,
};
pub use transport::EcuTransport;
pub use types::{Result, TransportStage, WorkbenchError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an empty definition set decodes nothing
        let set = build_definition(&DefinitionRecords::default());
        let stats = set.stats();
        assert_eq!(stats.num_tables, 0);
        assert_eq!(stats.num_scalings, 0);
    }
}
