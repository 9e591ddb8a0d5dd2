//! Definition document loading
//!
//! Adapts JSON definition documents into the attribute records the library
//! builds from. The document mirrors the classic definition layout: a
//! `romid` object of identity fields, a `scalings` array and a `tables`
//! array with one level of `axes` nesting. All attribute values are carried
//! as strings; numbers in the document are stringified as written.

use anyhow::{Context, Result};
use rom_workbench::{DefinitionRecords, ScalingRecord, TableRecord};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Load a JSON definition document into raw records
pub fn load_definition(path: &Path) -> Result<DefinitionRecords> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read definition file: {:?}", path))?;
    let doc: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse definition file: {:?}", path))?;

    log::info!("Loaded definition document {:?}", path);
    Ok(records_from_value(&doc))
}

fn records_from_value(doc: &Value) -> DefinitionRecords {
    let mut records = DefinitionRecords::default();

    if let Some(romid) = doc.get("romid").and_then(Value::as_object) {
        for (field, value) in romid {
            records
                .identity
                .push((field.clone(), value_to_string(value)));
        }
    }

    if let Some(scalings) = doc.get("scalings").and_then(Value::as_array) {
        for scaling in scalings {
            if let Some(obj) = scaling.as_object() {
                records.scalings.push(ScalingRecord {
                    attrs: attr_map(obj),
                });
            }
        }
    }

    if let Some(tables) = doc.get("tables").and_then(Value::as_array) {
        for table in tables {
            if let Some(record) = table_record(table) {
                records.tables.push(record);
            }
        }
    }

    records
}

fn table_record(value: &Value) -> Option<TableRecord> {
    let obj = value.as_object()?;
    let axes = obj
        .get("axes")
        .and_then(Value::as_array)
        .map(|axes| axes.iter().filter_map(table_record).collect())
        .unwrap_or_default();

    Some(TableRecord {
        attrs: attr_map(obj),
        axes,
    })
}

fn attr_map(obj: &serde_json::Map<String, Value>) -> HashMap<String, String> {
    obj.iter()
        .filter(|(key, _)| key.as_str() != "axes")
        .map(|(key, value)| (key.clone(), value_to_string(value)))
        .collect()
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rom_workbench::{build_definition, TableKind};

    const DOC: &str = r#"{
        "romid": {
            "xmlid": "SIM 1.0",
            "internalidaddress": "0x2000",
            "make": "Mazda"
        },
        "scalings": [
            { "name": "Rpm", "units": "RPM", "format": "%d", "min": 0, "max": 9000, "inc": 50 },
            { "name": "Boost", "units": "psi", "format": "%.2f" }
        ],
        "tables": [
            {
                "name": "Boost Map", "type": "3D", "category": "Boost",
                "address": "0x1000", "elements": 12, "scaling": "Boost",
                "axes": [
                    { "name": "Boost Map RPM", "address": "0x2000", "elements": 4, "scaling": "Rpm" },
                    { "name": "Boost Map Load", "address": "0x3000", "elements": 3, "scaling": "Boost" }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_records_from_document() {
        let doc: Value = serde_json::from_str(DOC).unwrap();
        let records = records_from_value(&doc);

        assert_eq!(records.scalings.len(), 2);
        assert_eq!(records.tables.len(), 1);
        assert_eq!(records.tables[0].axes.len(), 2);
        // Numbers arrive stringified
        assert_eq!(
            records.scalings[0].attrs.get("max").map(String::as_str),
            Some("9000")
        );
        assert!(records
            .identity
            .iter()
            .any(|(k, v)| k == "make" && v == "Mazda"));
    }

    #[test]
    fn test_records_build_into_linked_set() {
        let doc: Value = serde_json::from_str(DOC).unwrap();
        let set = build_definition(&records_from_value(&doc));

        assert_eq!(set.identity.internal_id_address, 0x2000);
        let table = set.find_table("Boost Map").unwrap();
        assert_eq!(table.kind, TableKind::ThreeD);
        assert_eq!(table.element_count, 12);
        assert_eq!(set.scaling_for(table).unwrap().name, "Boost");
        assert_eq!(set.stats().num_unresolved, 0);
    }
}
