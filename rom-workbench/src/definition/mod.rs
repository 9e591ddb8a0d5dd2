//! ROM definition metadata
//!
//! The data model for one ECU/ROM variant (identity, scalings, tables) and
//! its construction from the attribute records an external markup parser
//! supplies.

pub mod build;
pub mod model;

pub use build::{
    build_definition, parse_address, parse_hex_address, DefinitionRecords, ScalingRecord,
    TableRecord,
};
pub use model::{
    DefinitionSet, DefinitionStats, RomIdentity, Scaling, TableDefinition, TableKind,
};
