//! Simulated ECU transport
//!
//! Serves an in-memory flash image over the [`EcuTransport`] interface so
//! the download path can be exercised on the bench without a vehicle. The
//! seed/key exchange is a fixed XOR schedule; reads are refused until the
//! unlock succeeds, like the real module.

use rom_workbench::{EcuTransport, Result};

const SEED: [u8; 3] = [0x52, 0x58, 0x38];
const KEY_MASK: u8 = 0xA5;

/// A bench ECU backed by a flash image
pub struct SimulatedEcu {
    flash: Vec<u8>,
    unlocked: bool,
}

impl SimulatedEcu {
    pub fn new(flash: Vec<u8>) -> Self {
        Self {
            flash,
            unlocked: false,
        }
    }

    /// Size of the backing flash image
    pub fn flash_size(&self) -> usize {
        self.flash.len()
    }
}

impl EcuTransport for SimulatedEcu {
    fn open_diag_session(&mut self, session_type: u8) -> bool {
        session_type == rom_workbench::EXTENDED_DIAG_SESSION
    }

    fn request_seed(&mut self) -> Result<Vec<u8>> {
        Ok(SEED.to_vec())
    }

    fn compute_key(&mut self, seed: &[u8]) -> Result<Vec<u8>> {
        Ok(seed.iter().map(|b| b ^ KEY_MASK).collect())
    }

    fn unlock(&mut self, key: &[u8]) -> bool {
        let expected: Vec<u8> = SEED.iter().map(|b| b ^ KEY_MASK).collect();
        self.unlocked = key == expected.as_slice();
        self.unlocked
    }

    fn read_memory(&mut self, address: u64, length: u16, out: &mut [u8]) -> bool {
        if !self.unlocked {
            log::warn!("Simulated ECU refused read at 0x{:X}: not unlocked", address);
            return false;
        }
        let start = address as usize;
        let Some(end) = start.checked_add(length as usize) else {
            return false;
        };
        if end > self.flash.len() || out.len() < length as usize {
            return false;
        }
        out[..length as usize].copy_from_slice(&self.flash[start..end]);
        true
    }
}
