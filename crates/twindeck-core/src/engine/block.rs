//! Control block - the shared region between control and render threads
//!
//! The block is a fixed-size slice of atomic words, allocated once and shared
//! through `Arc`. Every access is an atomic load or store, so a torn *value*
//! is possible (64-bit registers span two words) but undefined behaviour is
//! not. The lock discipline for each register lives next to its accessors:
//!
//! | Register        | Writer                  | Reader                         |
//! |-----------------|-------------------------|--------------------------------|
//! | output region   | render (kernel)         | render (copy to host)          |
//! | play-state      | control, lock-free      | render, every quantum          |
//! | drop pair       | control, drop-lock      | render, sequence check         |
//! | length/offset   | control, sync-lock      | kernel, under render try-lock  |
//! | sample store    | control, sync-lock      | kernel, under render try-lock  |
//! | stylus position | render, stylus try-lock | control, stylus lock           |

use std::sync::atomic::{fence, AtomicU32, Ordering};

use super::error::DeckResult;
use super::layout::{self, Capacity};
use super::lock::{LockGuard, LockKind, SpinLock, SpinPolicy};
use crate::types::{PlayState, StereoSample, QUANTUM_FRAMES};

/// Result of polling the drop registers from the render thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DropPoll {
    /// No drop published since the last one applied
    Unchanged,
    /// A drop is being written or changed mid-snapshot; retry next quantum
    Deferred,
    /// A complete (counter, position) pair
    Ready { counter: u32, position: f64 },
}

/// Length and channel offsets of the loaded track
///
/// Only meaningful while the sync-lock is held by the reader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackView {
    /// Track length in samples
    pub length: f64,
    /// Number of whole frames stored
    pub frames: usize,
    /// First word of the left channel
    pub left: usize,
    /// First word of the right channel
    pub right: usize,
}

/// Shared memory region used as the deck's register file
pub struct ControlBlock {
    words: Box<[AtomicU32]>,
    capacity: Capacity,
}

impl ControlBlock {
    /// Allocate a zeroed block (control thread only, at deck creation)
    pub fn new(capacity: Capacity) -> Self {
        let words = (0..capacity.words()).map(|_| AtomicU32::new(0)).collect();
        log::debug!(
            "Allocated control block: {} pages, {} bytes, {} max track frames",
            capacity.pages(),
            capacity.bytes(),
            capacity.max_track_frames()
        );
        Self { words, capacity }
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Borrow one of the block's lock words
    pub fn lock(&self, kind: LockKind) -> SpinLock<'_> {
        let index = match kind {
            LockKind::Sync => layout::SYNC_LOCK,
            LockKind::Drop => layout::DROP_LOCK,
            LockKind::Stylus => layout::STYLUS_LOCK,
        };
        SpinLock::new(&self.words[index], kind)
    }

    // ─────────────────────────────────────────────────────────────
    // Word helpers
    // ─────────────────────────────────────────────────────────────

    #[inline]
    fn load_f32(&self, index: usize) -> f32 {
        f32::from_bits(self.words[index].load(Ordering::Relaxed))
    }

    #[inline]
    fn store_f32(&self, index: usize, value: f32) {
        self.words[index].store(value.to_bits(), Ordering::Relaxed);
    }

    /// Two-word read; can tear unless the register's lock rule is followed
    #[inline]
    fn load_f64(&self, index: usize) -> f64 {
        let low = self.words[index].load(Ordering::Relaxed) as u64;
        let high = self.words[index + 1].load(Ordering::Relaxed) as u64;
        f64::from_bits((high << 32) | low)
    }

    #[inline]
    fn store_f64(&self, index: usize, value: f64) {
        let bits = value.to_bits();
        self.words[index].store(bits as u32, Ordering::Relaxed);
        self.words[index + 1].store((bits >> 32) as u32, Ordering::Relaxed);
    }

    // ─────────────────────────────────────────────────────────────
    // Play-state (lock-free single word)
    // ─────────────────────────────────────────────────────────────

    #[inline]
    pub fn play_state(&self) -> PlayState {
        PlayState::from_register(self.words[layout::PLAY_STATE].load(Ordering::Acquire))
    }

    #[inline]
    pub fn set_play_state(&self, state: PlayState) {
        self.words[layout::PLAY_STATE].store(state.to_register(), Ordering::Release);
    }

    // ─────────────────────────────────────────────────────────────
    // Drop pair (drop-lock for writers, sequence check for the reader)
    // ─────────────────────────────────────────────────────────────

    /// Last published drop counter (even when no write is in flight)
    #[inline]
    pub fn drop_counter(&self) -> u32 {
        self.words[layout::DROP_COUNTER].load(Ordering::Acquire)
    }

    /// Publish a drop position; returns the new (even) counter
    ///
    /// The counter goes odd before the position words change and even again
    /// after, so a reader can detect a snapshot that overlapped the write.
    pub fn publish_drop(&self, position: f64, policy: &SpinPolicy) -> DeckResult<u32> {
        let guard = self.lock(LockKind::Drop).lock(policy)?;
        Ok(self.write_drop(&guard, position))
    }

    /// Sequence-protected drop write; the caller holds the drop-lock
    pub(crate) fn write_drop(&self, guard: &LockGuard<'_>, position: f64) -> u32 {
        debug_assert_eq!(guard.kind(), LockKind::Drop);
        let counter = &self.words[layout::DROP_COUNTER];
        let start = counter.load(Ordering::Relaxed);
        counter.store(start.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        self.store_f64(layout::DROP_POSITION, position);

        let published = start.wrapping_add(2);
        counter.store(published, Ordering::Release);
        published
    }

    /// Snapshot the drop pair if it changed since `last_applied`
    ///
    /// Never waits: an in-flight or overlapping write yields `Deferred`.
    #[inline]
    pub fn poll_drop(&self, last_applied: u32) -> DropPoll {
        let counter = &self.words[layout::DROP_COUNTER];
        let before = counter.load(Ordering::Acquire);
        if before == last_applied {
            return DropPoll::Unchanged;
        }
        if before & 1 == 1 {
            return DropPoll::Deferred;
        }

        let position = self.load_f64(layout::DROP_POSITION);
        fence(Ordering::Acquire);
        let after = counter.load(Ordering::Relaxed);

        if after == before {
            DropPoll::Ready {
                counter: before,
                position,
            }
        } else {
            DropPoll::Deferred
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Track registers and sample store (sync-lock)
    // ─────────────────────────────────────────────────────────────

    /// Write length and right-channel offset together
    pub(crate) fn write_track_registers(&self, guard: &LockGuard<'_>, length: f64, right: usize) {
        debug_assert_eq!(guard.kind(), LockKind::Sync);
        self.store_f64(layout::TRACK_LENGTH, length);
        self.words[layout::CHANNEL_OFFSET].store(right as u32, Ordering::Relaxed);
    }

    /// Copy samples into the sample store starting at word `start`
    pub(crate) fn write_samples(&self, guard: &LockGuard<'_>, start: usize, samples: &[f32]) {
        debug_assert_eq!(guard.kind(), LockKind::Sync);
        for (word, &sample) in self.words[start..start + samples.len()].iter().zip(samples) {
            word.store(sample.to_bits(), Ordering::Relaxed);
        }
    }

    /// Read the track registers as one unit
    ///
    /// Callers must hold the sync-lock (the render thread via `try_lock`).
    #[inline]
    pub fn track_view(&self, guard: &LockGuard<'_>) -> TrackView {
        debug_assert_eq!(guard.kind(), LockKind::Sync);
        let length = self.load_f64(layout::TRACK_LENGTH);
        let right = self.words[layout::CHANNEL_OFFSET].load(Ordering::Relaxed) as usize;
        TrackView {
            length,
            frames: right.saturating_sub(layout::SAMPLE_STORE),
            left: layout::SAMPLE_STORE,
            right,
        }
    }

    /// Read one stereo frame of the loaded track
    #[inline]
    pub fn frame(&self, track: &TrackView, index: usize) -> StereoSample {
        if index >= track.frames {
            return StereoSample::silence();
        }
        StereoSample::new(
            self.load_f32(track.left + index),
            self.load_f32(track.right + index),
        )
    }

    // ─────────────────────────────────────────────────────────────
    // Output region (render thread)
    // ─────────────────────────────────────────────────────────────

    #[inline]
    pub fn write_output(&self, frame: usize, sample: StereoSample) {
        self.store_f32(layout::OUTPUT_LEFT + frame, sample.left);
        self.store_f32(layout::OUTPUT_RIGHT + frame, sample.right);
    }

    /// Copy the output region into host channel buffers
    pub fn copy_output(&self, left: &mut [f32], right: &mut [f32]) {
        for (frame, out) in left.iter_mut().take(QUANTUM_FRAMES).enumerate() {
            *out = self.load_f32(layout::OUTPUT_LEFT + frame);
        }
        for (frame, out) in right.iter_mut().take(QUANTUM_FRAMES).enumerate() {
            *out = self.load_f32(layout::OUTPUT_RIGHT + frame);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Canonical stylus position (render-owned, stylus-lock)
    // ─────────────────────────────────────────────────────────────

    /// Publish the stylus position from the render thread
    ///
    /// Returns false (and writes nothing) while a reader holds the lock.
    #[inline]
    pub fn try_publish_stylus(&self, position: f64) -> bool {
        match self.lock(LockKind::Stylus).try_lock() {
            Some(_guard) => {
                self.store_f64(layout::STYLUS_POSITION, position);
                true
            }
            None => false,
        }
    }

    /// Read the stylus position without tearing (control thread)
    pub fn read_stylus(&self, policy: &SpinPolicy) -> DeckResult<f64> {
        let _guard = self.lock(LockKind::Stylus).lock(policy)?;
        Ok(self.load_f64(layout::STYLUS_POSITION))
    }

    /// Overwrite the stylus position from the control thread (load only)
    pub(crate) fn write_stylus(&self, guard: &LockGuard<'_>, position: f64) {
        debug_assert_eq!(guard.kind(), LockKind::Stylus);
        self.store_f64(layout::STYLUS_POSITION, position);
    }
}
