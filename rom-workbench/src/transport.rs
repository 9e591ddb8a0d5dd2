//! ECU transport interface
//!
//! The narrow interface the workbench expects from a vehicle diagnostic
//! transport (J2534 passthrough, socket bridge, bench simulator). The
//! ECU-specific key derivation lives behind this trait too; the workbench
//! only orchestrates the exchange.

use crate::types::Result;

/// A diagnostic connection to one ECU
///
/// Implementations own the wire protocol. The boolean-returning operations
/// mirror the UDS positive/negative response split; the byte-returning ones
/// report their own failure detail.
pub trait EcuTransport {
    /// Open a diagnostic session of the given type. Returns false on a
    /// negative or absent response.
    fn open_diag_session(&mut self, session_type: u8) -> bool;

    /// Request the security-access seed. Length is transport-defined.
    fn request_seed(&mut self) -> Result<Vec<u8>>;

    /// Derive the unlock key from a seed using the ECU-specific algorithm.
    fn compute_key(&mut self, seed: &[u8]) -> Result<Vec<u8>>;

    /// Submit the key. Returns false if the ECU rejects it.
    fn unlock(&mut self, key: &[u8]) -> bool;

    /// Read `length` bytes of ECU memory at `address` into `out`.
    /// Returns false on any transport or negative-response failure;
    /// `out` content is unspecified in that case.
    fn read_memory(&mut self, address: u64, length: u16, out: &mut [u8]) -> bool;
}
