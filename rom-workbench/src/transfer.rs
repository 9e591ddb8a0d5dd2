//! Chunked ROM download engine
//!
//! Orchestrates a cancellable bulk read of ECU memory on a worker thread
//! after security access succeeds. The caller polls progress snapshots and
//! collects the result; the destination buffer is published only when the
//! transfer completes, so a partially written image is never visible to
//! the decode path.

use crate::rom::RomImage;
use crate::security;
use crate::transport::EcuTransport;
use crate::types::{Result, TransportStage, WorkbenchError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// Transfer lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPhase {
    /// No transfer in flight
    Idle,
    /// Seed/key negotiation running
    SecurityHandshake,
    /// Chunk loop running
    Transferring,
    /// All chunks read; buffer belongs to the caller
    Completed,
    /// A negotiation step or chunk read failed
    Failed,
    /// Cancellation observed between chunks
    Cancelled,
}

impl TransferPhase {
    /// True once the worker has stopped for good
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferPhase::Completed | TransferPhase::Failed | TransferPhase::Cancelled
        )
    }
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferPhase::Idle => write!(f, "idle"),
            TransferPhase::SecurityHandshake => write!(f, "security handshake"),
            TransferPhase::Transferring => write!(f, "transferring"),
            TransferPhase::Completed => write!(f, "completed"),
            TransferPhase::Failed => write!(f, "failed"),
            TransferPhase::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Parameters of one ROM download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// First ECU memory address to read
    pub start_address: u64,
    /// Total bytes to transfer
    pub total_size: u32,
    /// Bytes per bounded memory read
    pub chunk_size: u16,
}

impl TransferConfig {
    /// One past the last address of the transfer window
    pub fn end_address(&self) -> u64 {
        self.start_address + self.total_size as u64
    }

    /// Reject configurations that could never transfer anything
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(WorkbenchError::Config(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if self.total_size == 0 {
            return Err(WorkbenchError::Config(
                "total_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Point-in-time view of a transfer, for polling UIs
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransferSnapshot {
    pub phase: TransferPhase,
    pub bytes_done: u32,
    pub total_size: u32,
    /// bytes_done / total_size, exactly 1.0 at completion
    pub progress: f32,
}

impl TransferSnapshot {
    fn idle() -> Self {
        Self {
            phase: TransferPhase::Idle,
            bytes_done: 0,
            total_size: 0,
            progress: 0.0,
        }
    }
}

/// Terminal result of a transfer, yielded once by [`Downloader::try_finish`]
#[derive(Debug)]
pub enum TransferOutcome {
    /// Every chunk was read; the image is now the caller's
    Completed(RomImage),
    /// Cancelled between chunks. Content past `bytes_done` is unspecified.
    Cancelled { partial: Vec<u8>, bytes_done: u32 },
    /// A negotiation step or chunk read failed; no buffer survives
    Failed(WorkbenchError),
}

/// State shared between the worker and the polling caller
struct Shared {
    bytes_done: AtomicU32,
    cancel: AtomicBool,
    phase: Mutex<TransferPhase>,
}

impl Shared {
    fn set_phase(&self, phase: TransferPhase) {
        *lock(&self.phase) = phase;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What the worker thread hands back through its join handle
enum WorkerExit {
    Completed(Vec<u8>),
    Cancelled { partial: Vec<u8>, bytes_done: u32 },
    Failed(WorkbenchError),
}

struct ActiveTransfer {
    shared: Arc<Shared>,
    handle: JoinHandle<WorkerExit>,
    total_size: u32,
}

/// Owner of at most one in-flight ROM download
///
/// `start` spawns the worker, `snapshot` serves the progress sink,
/// `request_cancel` flips the cooperative flag, and `try_finish` joins a
/// finished worker and yields the outcome. A new transfer cannot start
/// until the previous one has been collected.
pub struct Downloader {
    active: Option<ActiveTransfer>,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader {
    pub fn new() -> Self {
        Self { active: None }
    }

    /// True while a worker exists, finished or not
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Start a download on a worker thread
    ///
    /// Fails with a configuration error if a transfer is already active
    /// (including one that finished but was not yet collected) or if the
    /// config has a zero chunk or total size. On a validation failure no
    /// thread is spawned and the downloader stays idle.
    pub fn start<T>(&mut self, transport: T, config: TransferConfig) -> Result<()>
    where
        T: EcuTransport + Send + 'static,
    {
        if self.active.is_some() {
            return Err(WorkbenchError::Config(
                "a transfer is already in progress".to_string(),
            ));
        }
        config.validate()?;

        let shared = Arc::new(Shared {
            bytes_done: AtomicU32::new(0),
            cancel: AtomicBool::new(false),
            phase: Mutex::new(TransferPhase::SecurityHandshake),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("rom-transfer".to_string())
            .spawn(move || run_transfer(transport, config, worker_shared))?;

        self.active = Some(ActiveTransfer {
            shared,
            handle,
            total_size: config.total_size,
        });
        Ok(())
    }

    /// Current phase and progress
    pub fn snapshot(&self) -> TransferSnapshot {
        match &self.active {
            None => TransferSnapshot::idle(),
            Some(active) => {
                // Phase first: the worker publishes bytes_done before the
                // terminal phase, so a Completed snapshot always carries
                // the full count.
                let phase = *lock(&active.shared.phase);
                let bytes_done = active.shared.bytes_done.load(Ordering::Acquire);
                TransferSnapshot {
                    phase,
                    bytes_done,
                    total_size: active.total_size,
                    progress: bytes_done as f32 / active.total_size as f32,
                }
            }
        }
    }

    /// Ask the worker to stop. Observed between chunks, so the worst-case
    /// latency is one chunk's transport round-trip.
    pub fn request_cancel(&self) {
        if let Some(active) = &self.active {
            log::info!("Transfer cancellation requested");
            active.shared.cancel.store(true, Ordering::Release);
        }
    }

    /// Collect a finished transfer
    ///
    /// Returns None while the worker is still running (or none exists).
    /// On Some, the worker thread has been joined and the downloader is
    /// ready for the next transfer.
    pub fn try_finish(&mut self) -> Option<TransferOutcome> {
        if !self
            .active
            .as_ref()
            .map(|a| a.handle.is_finished())
            .unwrap_or(false)
        {
            return None;
        }
        let active = self.active.take()?;
        let outcome = match active.handle.join() {
            Ok(WorkerExit::Completed(buffer)) => {
                TransferOutcome::Completed(RomImage::from_bytes(buffer))
            }
            Ok(WorkerExit::Cancelled { partial, bytes_done }) => {
                TransferOutcome::Cancelled { partial, bytes_done }
            }
            Ok(WorkerExit::Failed(e)) => TransferOutcome::Failed(e),
            Err(_) => {
                log::error!("Transfer worker panicked");
                TransferOutcome::Failed(WorkbenchError::Unknown(
                    "transfer worker panicked".to_string(),
                ))
            }
        };
        Some(outcome)
    }
}

impl Drop for Downloader {
    fn drop(&mut self) {
        // Never leak a worker: cancel and join whatever is still running
        if let Some(active) = self.active.take() {
            active.shared.cancel.store(true, Ordering::Release);
            let _ = active.handle.join();
        }
    }
}

fn run_transfer<T: EcuTransport>(
    mut transport: T,
    config: TransferConfig,
    shared: Arc<Shared>,
) -> WorkerExit {
    log::info!("Starting ROM download");
    if let Err(e) = security::negotiate(&mut transport) {
        shared.set_phase(TransferPhase::Failed);
        return WorkerExit::Failed(e);
    }

    // Allocated after the handshake; a rejected key costs no memory
    let mut buffer = vec![0u8; config.total_size as usize];
    let end_address = config.end_address();
    shared.set_phase(TransferPhase::Transferring);
    log::info!(
        "Starting transfer: total=0x{:X} chunk=0x{:X} start=0x{:X} end=0x{:X}",
        config.total_size,
        config.chunk_size,
        config.start_address,
        end_address
    );

    let mut address = config.start_address;
    let mut bytes_done: u32 = 0;
    while address < end_address {
        if shared.cancel.load(Ordering::Acquire) {
            log::info!(
                "Transfer cancelled at 0x{:X} ({} bytes read)",
                address,
                bytes_done
            );
            shared.set_phase(TransferPhase::Cancelled);
            return WorkerExit::Cancelled {
                partial: buffer,
                bytes_done,
            };
        }

        let chunk = (config.chunk_size as u64).min(end_address - address) as u16;
        let offset = bytes_done as usize;
        let out = &mut buffer[offset..offset + chunk as usize];
        if !transport.read_memory(address, chunk, out) {
            log::error!("Transfer failed: memory read at 0x{:X}", address);
            shared.set_phase(TransferPhase::Failed);
            return WorkerExit::Failed(WorkbenchError::transport(
                TransportStage::ChunkRead,
                format!("read of {} bytes at 0x{:X}", chunk, address),
            ));
        }

        address += chunk as u64;
        bytes_done += chunk as u32;
        shared.bytes_done.store(bytes_done, Ordering::Release);
    }

    log::info!("Transfer complete: {} bytes", bytes_done);
    shared.set_phase(TransferPhase::Completed);
    WorkerExit::Completed(buffer)
}
