//! Lock-free rings between a deck's control side and its renderer
//!
//! Two kinds of traffic cross here, both over bounded `rtrb` SPSC rings:
//!
//! - **Kernel delivery**: the boot thread hands the freshly built kernel to
//!   the renderer. Capacity one; the renderer polls it until it arrives.
//! - **Auxiliary commands**: latency-insensitive diagnostics ("news"). The
//!   renderer drains [`AuxCommand`]s at the start of every quantum and pushes
//!   [`AuxReply`]s back.
//!
//! Play, drop and pitch never travel through these rings; they are registers
//! in the control block.
//!
//! # Usage
//!
//! ```ignore
//! let (mut tx, mut rx) = aux_channel();
//!
//! // Control thread: request counters (non-blocking)
//! tx.push(AuxCommand::ReportTelemetry);
//!
//! // Render thread: drain at quantum start
//! while let Ok(cmd) = rx.pop() { /* ... */ }
//! ```

use super::kernel::RenderKernel;

/// Commands sent from the control side to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxCommand {
    /// Reply with the current [`DeckTelemetry`]
    ReportTelemetry,
    /// Zero all counters
    ResetTelemetry,
}

/// Replies sent from the renderer back to the control side
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuxReply {
    Telemetry(DeckTelemetry),
}

/// Diagnostic counters kept by the renderer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeckTelemetry {
    /// Quanta processed since the last reset
    pub quanta_rendered: u64,
    /// Quanta that produced silence (stopped, booting or sync contention)
    pub silent_quanta: u64,
    /// Drops picked up and handed to the kernel
    pub drops_applied: u64,
    /// Drop snapshots that overlapped a write and were retried
    pub drops_deferred: u64,
    /// Stylus publishes skipped because a reader held the lock
    pub stylus_skips: u64,
    /// Quanta silenced because the sync-lock was held by a load
    pub sync_contention: u64,
    /// Whether a kernel has been installed
    pub kernel_installed: bool,
    /// Stylus position at the time of the report
    pub stylus: f64,
}

/// Capacity of each auxiliary ring
pub const AUX_QUEUE_CAPACITY: usize = 16;

/// Producer half of the auxiliary command ring (control side)
pub type AuxSender = rtrb::Producer<AuxCommand>;
/// Consumer half of the auxiliary command ring (render side)
pub type AuxReceiver = rtrb::Consumer<AuxCommand>;
/// Producer half of the reply ring (render side)
pub type ReplySender = rtrb::Producer<AuxReply>;
/// Consumer half of the reply ring (control side)
pub type ReplyReceiver = rtrb::Consumer<AuxReply>;

/// Producer half of the kernel delivery ring (boot thread)
pub type KernelSender = rtrb::Producer<Box<dyn RenderKernel>>;
/// Consumer half of the kernel delivery ring (render side)
pub type KernelReceiver = rtrb::Consumer<Box<dyn RenderKernel>>;

/// Create the auxiliary command ring
pub fn aux_channel() -> (AuxSender, AuxReceiver) {
    rtrb::RingBuffer::new(AUX_QUEUE_CAPACITY)
}

/// Create the reply ring
pub fn reply_channel() -> (ReplySender, ReplyReceiver) {
    rtrb::RingBuffer::new(AUX_QUEUE_CAPACITY)
}

/// Create the single-slot kernel delivery ring
pub fn kernel_channel() -> (KernelSender, KernelReceiver) {
    rtrb::RingBuffer::new(1)
}
