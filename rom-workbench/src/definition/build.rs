//! Definition construction from attribute records
//!
//! Builds a linked [`DefinitionSet`] out of the flat string-keyed records
//! an external markup parser produces. Construction is permissive the way
//! the definition documents in the wild demand: a malformed scaling or
//! table disables that entity only, its siblings still load, and every
//! skipped entity leaves a log line naming it.

use crate::definition::model::{
    DefinitionSet, RomIdentity, Scaling, TableDefinition, TableKind,
};
use crate::types::{Result, WorkbenchError};
use std::collections::HashMap;

/// Raw attributes of one scaling element
#[derive(Debug, Clone, Default)]
pub struct ScalingRecord {
    pub attrs: HashMap<String, String>,
}

/// Raw attributes of one table element, with one level of axis nesting
#[derive(Debug, Clone, Default)]
pub struct TableRecord {
    pub attrs: HashMap<String, String>,
    pub axes: Vec<TableRecord>,
}

/// Everything a definition document provides, in document order
#[derive(Debug, Clone, Default)]
pub struct DefinitionRecords {
    /// Identity (field name, value) pairs from the romid block
    pub identity: Vec<(String, String)>,
    pub scalings: Vec<ScalingRecord>,
    pub tables: Vec<TableRecord>,
}

/// Parse an address string
///
/// If the string contains `0x`, the number is read from that point in base
/// 16; otherwise the whole string is read in base 10. Trailing characters
/// after the numeric prefix are a [`WorkbenchError::MalformedAddress`]
/// carrying the remainder length, never silently truncated.
pub fn parse_address(text: &str) -> Result<u64> {
    let text = text.trim();
    let (digits, radix) = match text.find("0x") {
        Some(pos) => (&text[pos + 2..], 16),
        None => (text, 10),
    };
    parse_radix(text, digits, radix)
}

/// Parse a table address string, always base 16, `0x` prefix optional
pub fn parse_hex_address(text: &str) -> Result<u64> {
    let text = text.trim();
    let digits = text.strip_prefix("0x").unwrap_or(text);
    parse_radix(text, digits, 16)
}

fn parse_radix(original: &str, digits: &str, radix: u32) -> Result<u64> {
    let consumed = digits
        .chars()
        .take_while(|c| c.is_digit(radix))
        .count();
    let trailing = digits.len() - consumed;
    if consumed == 0 || trailing > 0 {
        return Err(WorkbenchError::MalformedAddress {
            text: original.to_string(),
            trailing: if consumed == 0 { digits.len() } else { trailing },
        });
    }
    u64::from_str_radix(&digits[..consumed], radix).map_err(|_| {
        WorkbenchError::MalformedAddress {
            text: original.to_string(),
            trailing: 0,
        }
    })
}

/// Build a fully linked definition set from raw records
///
/// Never fails wholesale: identity fields, scalings and tables that do not
/// parse are logged and dropped (or left unresolved) entity by entity.
pub fn build_definition(records: &DefinitionRecords) -> DefinitionSet {
    let mut set = DefinitionSet::new();

    for (field, value) in &records.identity {
        set_identity_field(&mut set.identity, field, value);
    }
    if let Some(xml_id) = &set.identity.xml_id {
        log::info!("Definition xmlid = {}", xml_id);
    }

    log::info!("Processing {} scalings", records.scalings.len());
    for record in &records.scalings {
        if let Some(scaling) = build_scaling(record) {
            set.scalings.push(scaling);
        }
    }

    log::info!("Processing {} tables", records.tables.len());
    for record in &records.tables {
        if let Some(table) = build_table(record, &set, false) {
            set.tables.push(table);
        }
    }

    let stats = set.stats();
    log::info!(
        "Definition loaded: {} scalings, {} tables, {} axes, {} unresolved",
        stats.num_scalings,
        stats.num_tables,
        stats.num_axes,
        stats.num_unresolved
    );
    set
}

/// Populate one identity field by name, ignoring unknown names
pub fn set_identity_field(identity: &mut RomIdentity, field: &str, value: &str) {
    if value.is_empty() {
        return;
    }

    let slot = match field {
        "xmlid" => &mut identity.xml_id,
        "internalidaddress" => {
            match parse_address(value) {
                Ok(address) => identity.internal_id_address = address,
                Err(e) => log::warn!("Ignoring internalidaddress: {}", e),
            }
            return;
        }
        "internalidstring" => &mut identity.internal_id_string,
        "ecuid" => &mut identity.ecu_id,
        "market" => &mut identity.market,
        "make" => &mut identity.make,
        "model" => &mut identity.model,
        "submodel" => &mut identity.submodel,
        "transmission" => &mut identity.transmission,
        "year" => &mut identity.year,
        "flashmethod" => &mut identity.flash_method,
        "memmodel" => &mut identity.mem_model,
        "checksummodule" => &mut identity.checksum_module,
        _ => {
            log::warn!("Unknown identity field '{}'", field);
            return;
        }
    };
    *slot = Some(value.to_string());
}

fn build_scaling(record: &ScalingRecord) -> Option<Scaling> {
    let name = match record.attrs.get("name") {
        Some(name) if !name.is_empty() => name.clone(),
        _ => {
            log::error!("Invalid scaling: missing name");
            return None;
        }
    };

    Some(Scaling {
        name,
        units: attr_string(&record.attrs, "units"),
        to_expr: attr_string(&record.attrs, "toexpr"),
        from_expr: attr_string(&record.attrs, "frexpr"),
        display_format: attr_string(&record.attrs, "format"),
        storage_type: attr_string(&record.attrs, "storagetype"),
        endianness: attr_string(&record.attrs, "endian"),
        min: attr_f32(&record.attrs, "min"),
        max: attr_f32(&record.attrs, "max"),
        increment: attr_f32(&record.attrs, "inc"),
    })
}

fn build_table(record: &TableRecord, set: &DefinitionSet, is_axis: bool) -> Option<TableDefinition> {
    let name = match record.attrs.get("name") {
        Some(name) if !name.is_empty() => name.clone(),
        _ => {
            log::error!("Invalid table: missing name");
            return None;
        }
    };

    let address = match record.attrs.get("address") {
        Some(text) => match parse_hex_address(text) {
            Ok(address) => address,
            Err(e) => {
                log::error!("Skipping table '{}': {}", name, e);
                return None;
            }
        },
        None => {
            log::error!("Skipping table '{}': missing address", name);
            return None;
        }
    };

    // Axis sub-tables are flat arrays by construction; roots without a
    // usable type decode as 1D and trip the axis-count check later.
    let kind = match record.attrs.get("type").and_then(|t| TableKind::parse(t)) {
        Some(kind) => kind,
        None if is_axis => TableKind::OneD,
        None => {
            log::warn!("Table '{}' has no usable type, treating as 1D", name);
            TableKind::OneD
        }
    };

    let scaling_name = attr_string(&record.attrs, "scaling");
    let scaling = if scaling_name.is_empty() {
        log::error!("Table '{}' is missing its scaling attribute", name);
        None
    } else {
        let resolved = set.find_scaling(&scaling_name);
        if resolved.is_none() {
            log::warn!(
                "Could not locate scaling '{}' for table '{}'",
                scaling_name,
                name
            );
        }
        resolved
    };

    let mut axes = Vec::new();
    if !is_axis {
        for axis_record in &record.axes {
            if !axis_record.axes.is_empty() {
                log::debug!("Ignoring sub-tables nested below an axis of '{}'", name);
            }
            if let Some(axis) = build_table(axis_record, set, true) {
                axes.push(axis);
            }
        }
    }

    Some(TableDefinition {
        name,
        category: attr_string(&record.attrs, "category"),
        kind,
        level: attr_i32(&record.attrs, "level"),
        address,
        element_count: attr_u32(&record.attrs, "elements"),
        swap_axes: attr_bool(&record.attrs, "swapxy"),
        scaling_name,
        scaling,
        axes,
    })
}

fn attr_string(attrs: &HashMap<String, String>, key: &str) -> String {
    attrs.get(key).cloned().unwrap_or_default()
}

/// Permissive float attribute: malformed or absent values default to 0.0
fn attr_f32(attrs: &HashMap<String, String>, key: &str) -> f32 {
    attrs
        .get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0.0)
}

fn attr_u32(attrs: &HashMap<String, String>, key: &str) -> u32 {
    attrs
        .get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

fn attr_i32(attrs: &HashMap<String, String>, key: &str) -> i32 {
    attrs
        .get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

fn attr_bool(attrs: &HashMap<String, String>, key: &str) -> bool {
    matches!(
        attrs.get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true") | Some("1") | Some("yes")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_address_decimal() {
        assert_eq!(parse_address("4096").unwrap(), 4096);
    }

    #[test]
    fn test_parse_address_hex_prefix() {
        assert_eq!(parse_address("0x1000").unwrap(), 0x1000);
    }

    #[test]
    fn test_parse_address_embedded_hex() {
        // The number starts at the 0x substring, wherever it sits
        assert_eq!(parse_address("base 0xFFFF8000").unwrap(), 0xFFFF_8000);
    }

    #[test]
    fn test_parse_address_trailing_remainder() {
        let err = parse_address("0x1000zz").unwrap_err();
        match err {
            WorkbenchError::MalformedAddress { trailing, .. } => assert_eq!(trailing, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_address_empty_digits() {
        assert!(parse_address("garbage").is_err());
        assert!(parse_address("0x").is_err());
    }

    #[test]
    fn test_parse_hex_address_without_prefix() {
        assert_eq!(parse_hex_address("8000").unwrap(), 0x8000);
        assert_eq!(parse_hex_address("0x8000").unwrap(), 0x8000);
    }

    #[test]
    fn test_identity_fields() {
        let mut identity = RomIdentity::default();
        set_identity_field(&mut identity, "xmlid", "MX8 2004 EU");
        set_identity_field(&mut identity, "internalidaddress", "0x2000");
        set_identity_field(&mut identity, "make", "Mazda");
        set_identity_field(&mut identity, "notafield", "whatever");
        set_identity_field(&mut identity, "year", "");

        assert_eq!(identity.xml_id.as_deref(), Some("MX8 2004 EU"));
        assert_eq!(identity.internal_id_address, 0x2000);
        assert_eq!(identity.make.as_deref(), Some("Mazda"));
        assert_eq!(identity.year, None);
    }

    #[test]
    fn test_malformed_identity_address_leaves_field_unset() {
        let mut identity = RomIdentity::default();
        set_identity_field(&mut identity, "internalidaddress", "0x20G0");
        assert_eq!(identity.internal_id_address, 0);
    }

    #[test]
    fn test_scaling_defaults() {
        let record = ScalingRecord {
            attrs: attrs(&[("name", "Load"), ("units", "g/rev"), ("min", "not a number")]),
        };
        let scaling = build_scaling(&record).unwrap();
        assert_eq!(scaling.name, "Load");
        assert_eq!(scaling.units, "g/rev");
        assert_eq!(scaling.min, 0.0);
        assert_eq!(scaling.max, 0.0);
        assert_eq!(scaling.increment, 0.0);
    }

    #[test]
    fn test_scaling_without_name_is_dropped() {
        let record = ScalingRecord {
            attrs: attrs(&[("units", "RPM")]),
        };
        assert!(build_scaling(&record).is_none());
    }

    fn fuel_map_records() -> DefinitionRecords {
        DefinitionRecords {
            identity: vec![("xmlid".to_string(), "TEST".to_string())],
            scalings: vec![
                ScalingRecord {
                    attrs: attrs(&[
                        ("name", "FuelScale"),
                        ("format", "%.2f"),
                        ("min", "10"),
                        ("max", "20"),
                        ("inc", "0.05"),
                    ]),
                },
                ScalingRecord {
                    attrs: attrs(&[("name", "RpmScale"), ("format", "%d")]),
                },
            ],
            tables: vec![TableRecord {
                attrs: attrs(&[
                    ("name", "Fuel Map"),
                    ("type", "3D"),
                    ("category", "Fuel"),
                    ("address", "0x1000"),
                    ("elements", "16"),
                    ("scaling", "FuelScale"),
                ]),
                axes: vec![
                    TableRecord {
                        attrs: attrs(&[
                            ("name", "Fuel Map RPM"),
                            ("address", "0x2000"),
                            ("elements", "16"),
                            ("scaling", "RpmScale"),
                        ]),
                        axes: Vec::new(),
                    },
                    TableRecord {
                        attrs: attrs(&[
                            ("name", "Fuel Map Load"),
                            ("address", "0x2100"),
                            ("elements", "12"),
                            ("scaling", "LoadScale"), // does not resolve
                        ]),
                        axes: Vec::new(),
                    },
                ],
            }],
        }
    }

    #[test]
    fn test_build_definition_links_scalings() {
        let set = build_definition(&fuel_map_records());

        assert_eq!(set.identity.xml_id.as_deref(), Some("TEST"));
        let table = set.find_table("Fuel Map").unwrap();
        assert_eq!(table.kind, TableKind::ThreeD);
        assert_eq!(table.address, 0x1000);
        assert_eq!(table.axes.len(), 2);
        assert_eq!(set.scaling_for(table).unwrap().name, "FuelScale");
        assert_eq!(set.scaling_for(&table.axes[0]).unwrap().name, "RpmScale");
    }

    #[test]
    fn test_unresolved_scaling_keeps_table() {
        let set = build_definition(&fuel_map_records());
        let table = set.find_table("Fuel Map").unwrap();

        // The Load axis names a scaling that does not exist; the axis is
        // kept but unresolved, and the stats report it.
        assert!(table.axes[1].scaling.is_none());
        assert_eq!(set.stats().num_unresolved, 1);
    }

    #[test]
    fn test_bad_table_address_disables_entity_only() {
        let mut records = fuel_map_records();
        records.tables.push(TableRecord {
            attrs: attrs(&[
                ("name", "Broken"),
                ("type", "1D"),
                ("address", "0xZZZZ"),
                ("elements", "4"),
                ("scaling", "FuelScale"),
            ]),
            axes: Vec::new(),
        });

        let set = build_definition(&records);
        assert!(set.find_table("Broken").is_none());
        assert!(set.find_table("Fuel Map").is_some());
    }

    #[test]
    fn test_missing_scaling_attribute_is_per_table() {
        let mut records = fuel_map_records();
        records.tables.push(TableRecord {
            attrs: attrs(&[
                ("name", "No Scaling"),
                ("type", "1D"),
                ("address", "0x3000"),
                ("elements", "4"),
            ]),
            axes: Vec::new(),
        });

        let set = build_definition(&records);
        let table = set.find_table("No Scaling").unwrap();
        assert!(table.scaling.is_none());
        assert!(table.scaling_name.is_empty());
    }

    #[test]
    fn test_swap_axes_attribute() {
        let record = TableRecord {
            attrs: attrs(&[
                ("name", "Timing"),
                ("type", "3D"),
                ("address", "4000"),
                ("swapxy", "true"),
                ("scaling", "x"),
            ]),
            axes: Vec::new(),
        };
        let set = DefinitionSet::new();
        let table = build_table(&record, &set, false).unwrap();
        assert!(table.swap_axes);
        assert_eq!(table.address, 0x4000);
    }
}
