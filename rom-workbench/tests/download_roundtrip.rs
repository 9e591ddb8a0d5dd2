//! End-to-end: download a ROM image out of a simulated ECU, then decode a
//! 3D table straight out of the downloaded bytes.

use rom_workbench::{
    build_definition, DefinitionRecords, Downloader, EcuTransport, Result, ScalingRecord,
    TableCodec, TableRecord, TransferConfig, TransferOutcome, TransferPhase,
};
use std::collections::HashMap;
use std::thread;
use std::time::Duration;

/// Simulated ECU backed by an in-memory flash image
struct SimEcu {
    flash: Vec<u8>,
    unlocked: bool,
}

impl SimEcu {
    fn new(flash: Vec<u8>) -> Self {
        Self {
            flash,
            unlocked: false,
        }
    }
}

impl EcuTransport for SimEcu {
    fn open_diag_session(&mut self, session_type: u8) -> bool {
        session_type == rom_workbench::EXTENDED_DIAG_SESSION
    }

    fn request_seed(&mut self) -> Result<Vec<u8>> {
        Ok(vec![0x3B, 0x72, 0xC1])
    }

    fn compute_key(&mut self, seed: &[u8]) -> Result<Vec<u8>> {
        Ok(seed.iter().map(|b| b ^ 0x73).collect())
    }

    fn unlock(&mut self, key: &[u8]) -> bool {
        self.unlocked = key == [0x3B ^ 0x73, 0x72 ^ 0x73, 0xC1 ^ 0x73];
        self.unlocked
    }

    fn read_memory(&mut self, address: u64, length: u16, out: &mut [u8]) -> bool {
        if !self.unlocked {
            return false;
        }
        let start = address as usize;
        let end = start + length as usize;
        if end > self.flash.len() {
            return false;
        }
        out[..length as usize].copy_from_slice(&self.flash[start..end]);
        true
    }
}

fn put_f32(flash: &mut [u8], offset: usize, value: f32) {
    flash[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

/// Flash image with a 4x3 boost map at 0x1000, RPM axis at 0x2000 and
/// load axis at 0x3000.
fn build_flash() -> Vec<u8> {
    let mut flash = vec![0u8; 0x8000];
    for xi in 0..4usize {
        for yi in 0..3usize {
            let offset = 0x1000 + xi * (3 * 4) + yi * 4;
            put_f32(&mut flash, offset, 0.5 + (xi * 3 + yi) as f32);
        }
    }
    for xi in 0..4usize {
        put_f32(&mut flash, 0x2000 + xi * 4, 1000.0 * (xi + 1) as f32);
    }
    for yi in 0..3usize {
        put_f32(&mut flash, 0x3000 + yi * 4, 0.3 * (yi + 1) as f32);
    }
    flash
}

fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn boost_map_records() -> DefinitionRecords {
    DefinitionRecords {
        identity: vec![
            ("xmlid".to_string(), "SIM 1.0".to_string()),
            ("ecuid".to_string(), "N3F1".to_string()),
        ],
        scalings: vec![
            ScalingRecord {
                attrs: attrs(&[("name", "Boost"), ("units", "psi"), ("format", "%.2f")]),
            },
            ScalingRecord {
                attrs: attrs(&[("name", "Rpm"), ("units", "RPM"), ("format", "%d")]),
            },
            ScalingRecord {
                attrs: attrs(&[("name", "Load"), ("units", "g/rev"), ("format", "%.2f")]),
            },
        ],
        tables: vec![TableRecord {
            attrs: attrs(&[
                ("name", "Boost Map"),
                ("type", "3D"),
                ("category", "Boost"),
                ("address", "0x1000"),
                ("elements", "12"),
                ("scaling", "Boost"),
            ]),
            axes: vec![
                TableRecord {
                    attrs: attrs(&[
                        ("name", "Boost Map RPM"),
                        ("address", "0x2000"),
                        ("elements", "4"),
                        ("scaling", "Rpm"),
                    ]),
                    axes: Vec::new(),
                },
                TableRecord {
                    attrs: attrs(&[
                        ("name", "Boost Map Load"),
                        ("address", "0x3000"),
                        ("elements", "3"),
                        ("scaling", "Load"),
                    ]),
                    axes: Vec::new(),
                },
            ],
        }],
    }
}

#[test]
fn test_download_then_decode() {
    let flash = build_flash();
    let ecu = SimEcu::new(flash.clone());

    let mut downloader = Downloader::new();
    let config = TransferConfig {
        start_address: 0,
        total_size: 0x8000,
        chunk_size: 0x100,
    };
    downloader.start(ecu, config).unwrap();

    let rom = loop {
        if let Some(outcome) = downloader.try_finish() {
            match outcome {
                TransferOutcome::Completed(rom) => break rom,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        thread::sleep(Duration::from_millis(1));
    };

    assert_eq!(downloader.snapshot().phase, TransferPhase::Idle);
    assert_eq!(rom.len(), 0x8000);
    assert_eq!(rom.as_bytes(), flash.as_slice());

    // The downloaded bytes decode like any file-loaded image
    let set = build_definition(&boost_map_records());
    let table = set.find_table("Boost Map").unwrap();
    let grid = TableCodec::decode(&set, table, &rom).unwrap();

    assert_eq!((grid.rows, grid.cols), (4, 5));
    assert_eq!(grid.get(0, 0), None);
    assert_eq!(grid.get(0, 1), Some(1000.0));
    assert_eq!(grid.get(0, 4), Some(4000.0));
    assert!((grid.get(1, 0).unwrap() - 0.3).abs() < 1e-6);

    // (xi=2, yi=1): 0x1000 + 2*(3*4) + 1*4, sentinel 0.5 + 2*3 + 1
    assert_eq!(grid.get(2, 3), Some(7.5));
    assert_eq!(grid.cell_format.as_deref(), Some("%.2f"));
    assert_eq!(grid.x_format.as_deref(), Some("%d"));
}

#[test]
fn test_locked_ecu_fails_download() {
    struct DeadEcu;
    impl EcuTransport for DeadEcu {
        fn open_diag_session(&mut self, _: u8) -> bool {
            false
        }
        fn request_seed(&mut self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        fn compute_key(&mut self, _: &[u8]) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        fn unlock(&mut self, _: &[u8]) -> bool {
            false
        }
        fn read_memory(&mut self, _: u64, _: u16, _: &mut [u8]) -> bool {
            false
        }
    }

    let mut downloader = Downloader::new();
    let config = TransferConfig {
        start_address: 0,
        total_size: 0x1000,
        chunk_size: 0x100,
    };
    downloader.start(DeadEcu, config).unwrap();

    loop {
        if let Some(outcome) = downloader.try_finish() {
            assert!(matches!(outcome, TransferOutcome::Failed(_)));
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
}
