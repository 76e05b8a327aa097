//! Render callback - one quantum per invocation, on the audio thread
//!
//! [`DeckRenderer::process`] never allocates, never logs and never waits on a
//! lock. Anything that could go wrong degrades to a silent quantum.
//!
//! Per-quantum sequence once the kernel is installed:
//!
//! 1. Drain auxiliary commands
//! 2. Stopped → silence, no kernel call
//! 3. `try_lock` the sync-lock (held by a load → silence)
//! 4. Apply a pending drop (sequence-checked snapshot)
//! 5. Smooth pitch toward its target and run the kernel once
//! 6. Publish the stylus position, still under the sync-lock (skipped while
//!    a reader holds the stylus-lock)
//! 7. Copy the output region to the host buffers

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use super::block::{ControlBlock, DropPoll};
use super::command::{AuxCommand, AuxReceiver, AuxReply, DeckTelemetry, KernelReceiver, ReplySender};
use super::kernel::RenderKernel;
use super::lock::LockKind;
use crate::types::{DeckId, PlayState};

/// Deck boot phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    /// Control block allocated, no kernel requested
    Created = 0,
    /// Kernel is being built on the boot thread
    Booting = 1,
    /// Kernel installed on the render thread
    Ready = 2,
    /// Kernel build failed; the deck stays silent
    Failed = 3,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Lifecycle::Booting,
            2 => Lifecycle::Ready,
            3 => Lifecycle::Failed,
            _ => Lifecycle::Created,
        }
    }
}

/// Lock-free state shared between a deck's facade and its renderer
///
/// Lives outside the control block: neither field takes part in a
/// multi-word invariant.
#[derive(Debug)]
pub struct DeckAtomics {
    /// Target pitch multiplier (f32 bits)
    pitch: AtomicU32,
    /// Current [`Lifecycle`] phase
    lifecycle: AtomicU8,
}

impl DeckAtomics {
    pub fn new() -> Self {
        Self {
            pitch: AtomicU32::new(1.0f32.to_bits()),
            lifecycle: AtomicU8::new(Lifecycle::Created as u8),
        }
    }

    #[inline]
    pub fn pitch(&self) -> f32 {
        f32::from_bits(self.pitch.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_pitch(&self, pitch: f32) {
        self.pitch.store(pitch.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set_lifecycle(&self, phase: Lifecycle) {
        self.lifecycle.store(phase as u8, Ordering::Release);
    }

    /// Move `from` → `to`; false if the phase was something else
    pub fn advance(&self, from: Lifecycle, to: Lifecycle) -> bool {
        self.lifecycle
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for DeckAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// Render-thread half of a deck
pub struct DeckRenderer {
    id: DeckId,
    block: Arc<ControlBlock>,
    atomics: Arc<DeckAtomics>,
    kernel: Option<Box<dyn RenderKernel>>,
    kernel_rx: KernelReceiver,
    aux_rx: AuxReceiver,
    reply_tx: ReplySender,
    /// Counter of the last drop handed to the kernel
    last_drop: u32,
    /// Pitch actually used for the previous quantum
    current_pitch: f32,
    /// Fraction of the distance to the target pitch covered per quantum
    pitch_smoothing: f32,
    telemetry: DeckTelemetry,
}

impl DeckRenderer {
    pub(crate) fn new(
        id: DeckId,
        block: Arc<ControlBlock>,
        atomics: Arc<DeckAtomics>,
        kernel_rx: KernelReceiver,
        aux_rx: AuxReceiver,
        reply_tx: ReplySender,
        pitch_smoothing: f32,
    ) -> Self {
        let current_pitch = atomics.pitch();
        Self {
            id,
            block,
            atomics,
            kernel: None,
            kernel_rx,
            aux_rx,
            reply_tx,
            last_drop: 0,
            current_pitch,
            pitch_smoothing: pitch_smoothing.clamp(f32::MIN_POSITIVE, 1.0),
            telemetry: DeckTelemetry::default(),
        }
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    /// The control block this renderer reads (same region as the facade's)
    pub fn block(&self) -> &Arc<ControlBlock> {
        &self.block
    }

    /// Render one quantum into `left` and `right`
    ///
    /// Always returns `true`: the host must keep invoking the renderer.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) -> bool {
        self.drain_aux();
        self.telemetry.quanta_rendered += 1;

        if self.kernel.is_none() {
            self.poll_kernel();
        }
        let Some(kernel) = self.kernel.as_mut() else {
            silence(&mut self.telemetry, left, right);
            return true;
        };

        if self.block.play_state() == PlayState::Stopped {
            silence(&mut self.telemetry, left, right);
            return true;
        }

        let sync = self.block.lock(LockKind::Sync);
        let Some(guard) = sync.try_lock() else {
            self.telemetry.sync_contention += 1;
            silence(&mut self.telemetry, left, right);
            return true;
        };

        match self.block.poll_drop(self.last_drop) {
            DropPoll::Ready { counter, position } => {
                kernel.relocate(position);
                self.last_drop = counter;
                self.telemetry.drops_applied += 1;
            }
            DropPoll::Deferred => self.telemetry.drops_deferred += 1,
            DropPoll::Unchanged => {}
        }

        let target = self.atomics.pitch();
        self.current_pitch += (target - self.current_pitch) * self.pitch_smoothing;
        if (target - self.current_pitch).abs() < 1e-6 {
            self.current_pitch = target;
        }

        let track = self.block.track_view(&guard);
        kernel.render(&self.block, &track, self.current_pitch);

        // Publish before releasing the sync-lock; a load resets the stylus under it
        if !self.block.try_publish_stylus(kernel.stylus()) {
            self.telemetry.stylus_skips += 1;
        }
        drop(guard);

        self.block.copy_output(left, right);
        true
    }

    fn poll_kernel(&mut self) {
        if let Ok(kernel) = self.kernel_rx.pop() {
            self.kernel = Some(kernel);
            self.telemetry.kernel_installed = true;
            self.atomics.set_lifecycle(Lifecycle::Ready);
        }
    }

    fn drain_aux(&mut self) {
        while let Ok(command) = self.aux_rx.pop() {
            match command {
                AuxCommand::ReportTelemetry => {
                    let mut report = self.telemetry;
                    report.stylus = self.kernel.as_ref().map_or(0.0, |k| k.stylus());
                    // A full reply ring drops the report; the caller can ask again
                    let _ = self.reply_tx.push(AuxReply::Telemetry(report));
                }
                AuxCommand::ResetTelemetry => {
                    self.telemetry = DeckTelemetry {
                        kernel_installed: self.kernel.is_some(),
                        ..DeckTelemetry::default()
                    };
                }
            }
        }
    }
}

#[inline]
fn silence(telemetry: &mut DeckTelemetry, left: &mut [f32], right: &mut [f32]) {
    left.fill(0.0);
    right.fill(0.0);
    telemetry.silent_quanta += 1;
}
