//! Definition data model
//!
//! The parsed metadata for one ECU/ROM variant: identity fields, named
//! scaling descriptors and a tree of table descriptors. One `DefinitionSet`
//! is built per opened definition document; the model itself carries no
//! global state, so independent sets can coexist.

use std::fmt;

/// A named numeric-format descriptor referenced by tables
///
/// Immutable after construction. The expression strings are opaque metadata
/// copied through for editors that evaluate them; this library does not.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaling {
    /// Unique name, the key tables resolve against
    pub name: String,
    /// Engineering unit (e.g. "RPM", "psi")
    pub units: String,
    /// Raw-to-engineering formula string (unevaluated)
    pub to_expr: String,
    /// Engineering-to-raw formula string (unevaluated)
    pub from_expr: String,
    /// printf-style display format (e.g. "%.2f")
    pub display_format: String,
    /// Declared storage type string (e.g. "float")
    pub storage_type: String,
    /// Declared byte order string. Stored for display only; the decode
    /// path is fixed big-endian regardless of this attribute.
    pub endianness: String,
    /// Minimum engineering value
    pub min: f32,
    /// Maximum engineering value
    pub max: f32,
    /// Edit increment
    pub increment: f32,
}

/// Table dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Flat array of cells
    OneD,
    /// One axis sub-table supplying a header row
    TwoD,
    /// Two axis sub-tables and a data plane
    ThreeD,
}

impl TableKind {
    /// Parse a declared type string ("1D"/"2D"/"3D", case-insensitive)
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "1D" => Some(TableKind::OneD),
            "2D" => Some(TableKind::TwoD),
            "3D" => Some(TableKind::ThreeD),
            _ => None,
        }
    }

    /// Number of axis sub-tables this kind requires
    pub fn expected_axes(&self) -> usize {
        match self {
            TableKind::OneD => 0,
            TableKind::TwoD => 1,
            TableKind::ThreeD => 2,
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::OneD => write!(f, "1D"),
            TableKind::TwoD => write!(f, "2D"),
            TableKind::ThreeD => write!(f, "3D"),
        }
    }
}

/// One table descriptor, possibly with axis sub-tables
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    /// Display name
    pub name: String,
    /// Grouping category (e.g. "Fuel")
    pub category: String,
    /// Declared dimensionality
    pub kind: TableKind,
    /// Nesting level from the definition document
    pub level: i32,
    /// Absolute byte offset into the ROM image
    pub address: u64,
    /// Number of 4-byte cells along this table's own axis
    pub element_count: u32,
    /// If true, the first axis is Y and the second is X
    pub swap_axes: bool,
    /// Declared scaling name, resolved against the owning set
    pub scaling_name: String,
    /// Index into the owning set's scaling collection, None if the name
    /// did not resolve (the table is then undecodable)
    pub scaling: Option<usize>,
    /// Axis sub-tables: empty for 1D, [X] for 2D, [X, Y] for 3D
    /// (swap_axes flips the 3D assignment)
    pub axes: Vec<TableDefinition>,
}

/// Identity fields from the definition document's romid block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RomIdentity {
    pub xml_id: Option<String>,
    /// Address of the internal id string inside the ROM
    pub internal_id_address: u64,
    pub internal_id_string: Option<String>,
    pub ecu_id: Option<String>,
    pub market: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub submodel: Option<String>,
    pub transmission: Option<String>,
    pub year: Option<String>,
    pub flash_method: Option<String>,
    pub mem_model: Option<String>,
    pub checksum_module: Option<String>,
}

/// The full parsed metadata for one ECU/ROM variant
///
/// Owns the scaling collection and the table tree. Tables reference
/// scalings by index into `scalings`; use [`DefinitionSet::scaling_for`]
/// to follow the reference.
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    /// Identity fields
    pub identity: RomIdentity,
    /// All scaling descriptors, in document order
    pub scalings: Vec<Scaling>,
    /// All root table descriptors, in document order
    pub tables: Vec<TableDefinition>,
}

/// Definition statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefinitionStats {
    /// Number of scaling descriptors
    pub num_scalings: usize,
    /// Number of root tables
    pub num_tables: usize,
    /// Number of axis sub-tables across all roots
    pub num_axes: usize,
    /// Tables (roots and axes) whose scaling did not resolve
    pub num_unresolved: usize,
}

impl DefinitionSet {
    /// Create an empty definition set
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a scaling by collection index
    pub fn scaling(&self, index: usize) -> Option<&Scaling> {
        self.scalings.get(index)
    }

    /// Resolve a scaling name to its collection index by exact match
    pub fn find_scaling(&self, name: &str) -> Option<usize> {
        self.scalings.iter().position(|s| s.name == name)
    }

    /// Follow a table's resolved scaling reference
    pub fn scaling_for(&self, table: &TableDefinition) -> Option<&Scaling> {
        table.scaling.and_then(|idx| self.scalings.get(idx))
    }

    /// Find a root table by name
    pub fn find_table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Get definition statistics
    pub fn stats(&self) -> DefinitionStats {
        let num_axes: usize = self.tables.iter().map(|t| t.axes.len()).sum();
        let num_unresolved = self
            .tables
            .iter()
            .flat_map(|t| std::iter::once(t).chain(t.axes.iter()))
            .filter(|t| t.scaling.is_none())
            .count();

        DefinitionStats {
            num_scalings: self.scalings.len(),
            num_tables: self.tables.len(),
            num_axes,
            num_unresolved,
        }
    }
}
