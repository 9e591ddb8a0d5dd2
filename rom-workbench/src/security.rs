//! UDS security access negotiation
//!
//! Runs the seed/key challenge that unlocks privileged memory reads:
//! diagnostic session, seed request, key derivation, key submission. Each
//! step short-circuits the sequence with a stage-tagged error; a failed
//! negotiation is re-run from the first step, never resumed.

use crate::transport::EcuTransport;
use crate::types::{Result, TransportStage, WorkbenchError};

/// Session type opened before requesting a seed
pub const EXTENDED_DIAG_SESSION: u8 = 0x85;

/// Negotiate security access with the ECU
///
/// Seed and key material stays inside this function and is dropped when it
/// returns, success or failure. There is no retry; the caller restarts the
/// whole sequence if it wants another attempt.
pub fn negotiate<T: EcuTransport + ?Sized>(ecu: &mut T) -> Result<()> {
    if !ecu.open_diag_session(EXTENDED_DIAG_SESSION) {
        log::error!("Security access failed: could not open diag session");
        return Err(WorkbenchError::transport(
            TransportStage::Session,
            format!("no session of type 0x{:02X}", EXTENDED_DIAG_SESSION),
        ));
    }
    log::info!("Diag session 0x{:02X} opened", EXTENDED_DIAG_SESSION);

    let seed = ecu.request_seed().map_err(|e| {
        log::error!("Security access failed: could not get seed: {}", e);
        e
    })?;
    log::info!("Got key seed: {}", hex_bytes(&seed));

    let key = ecu.compute_key(&seed).map_err(|e| {
        log::error!("Security access failed: could not derive key: {}", e);
        e
    })?;
    log::info!("Derived key: {}", hex_bytes(&key));

    if !ecu.unlock(&key) {
        log::error!("Security access failed: ECU rejected the key");
        return Err(WorkbenchError::transport(
            TransportStage::Unlock,
            "ECU rejected the key",
        ));
    }
    log::info!("Security access granted");
    Ok(())
}

fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{:02X}", b))
        .collect::<Vec<_>>()
        .join(", ")
}
