//! Control block layout
//!
//! The control block is addressed in 32-bit words. The output region sits at
//! the lowest addresses (read every quantum), the registers occupy a small
//! reserved block directly above it, and the sample store takes the rest.
//!
//! ```text
//! word 0        128        256                 268                      capacity
//!      ┌─────────┬──────────┬───────────────────┬──────────────────────────┐
//!      │ out  L  │  out  R  │     registers     │ left samples │ right ... │
//!      └─────────┴──────────┴───────────────────┴──────────────────────────┘
//! ```
//!
//! 64-bit registers span two consecutive words, low word first.

use super::error::{DeckError, DeckResult};
use crate::types::QUANTUM_FRAMES;

/// Left output channel (one quantum)
pub const OUTPUT_LEFT: usize = 0;
/// Right output channel (one quantum)
pub const OUTPUT_RIGHT: usize = OUTPUT_LEFT + QUANTUM_FRAMES;

/// Play-state (0 = stopped, 1 = playing)
pub const PLAY_STATE: usize = OUTPUT_RIGHT + QUANTUM_FRAMES;
/// Drop sequence counter (odd while a drop is being written)
pub const DROP_COUNTER: usize = PLAY_STATE + 1;
/// Word offset of the right-channel data in the sample store
pub const CHANNEL_OFFSET: usize = DROP_COUNTER + 1;
/// Lock word guarding length, offset and sample store rewrites
pub const SYNC_LOCK: usize = CHANNEL_OFFSET + 1;
/// Lock word serializing drop writers
pub const DROP_LOCK: usize = SYNC_LOCK + 1;
/// Lock word guarding the canonical stylus position
pub const STYLUS_LOCK: usize = DROP_LOCK + 1;
/// Track length in samples (f64, two words)
pub const TRACK_LENGTH: usize = STYLUS_LOCK + 1;
/// Drop position in samples (f64, two words)
pub const DROP_POSITION: usize = TRACK_LENGTH + 2;
/// Canonical stylus position in samples (f64, two words)
pub const STYLUS_POSITION: usize = DROP_POSITION + 2;

/// First word of the sample store (left channel data starts here)
pub const SAMPLE_STORE: usize = STYLUS_POSITION + 2;

/// Allocation granule, in bytes
pub const PAGE_BYTES: usize = 1 << 16;

const WORD_BYTES: usize = std::mem::size_of::<u32>();

/// Words needed per frame of track data (two f32 channels)
const FRAME_WORDS: u64 = 2;

/// Largest block, in words (offsets into the block are stored as `u32`)
pub const MAX_BLOCK_WORDS: u64 = u32::MAX as u64;

fn too_large(minutes: f64, sample_rate: u32) -> DeckError {
    DeckError::invalid(format!(
        "{minutes} minutes at {sample_rate}Hz exceeds the largest control block ({MAX_BLOCK_WORDS} words)"
    ))
}

/// Fixed size of a control block, decided before it is shared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pages: usize,
}

impl Capacity {
    /// Size a block for tracks up to `minutes` long at `sample_rate`
    ///
    /// The byte count covers the reserved block plus both channels and is
    /// rounded up to whole pages.
    pub fn for_duration(minutes: f64, sample_rate: u32) -> DeckResult<Self> {
        if !minutes.is_finite() || minutes <= 0.0 {
            return Err(DeckError::invalid(format!(
                "buffer duration must be a positive number of minutes, got {minutes}"
            )));
        }
        if sample_rate == 0 {
            return Err(DeckError::invalid("sample rate must be non-zero"));
        }

        let frames = (minutes * 60.0 * sample_rate as f64).ceil();
        if !frames.is_finite() || frames > MAX_BLOCK_WORDS as f64 {
            return Err(too_large(minutes, sample_rate));
        }

        let page_words = (PAGE_BYTES / WORD_BYTES) as u64;
        let words = (frames as u64)
            .checked_mul(FRAME_WORDS)
            .and_then(|w| w.checked_add(SAMPLE_STORE as u64))
            .and_then(|w| w.div_ceil(page_words).checked_mul(page_words))
            .filter(|&w| w <= MAX_BLOCK_WORDS)
            .ok_or_else(|| too_large(minutes, sample_rate))?;
        let bytes = words
            .checked_mul(WORD_BYTES as u64)
            .and_then(|b| usize::try_from(b).ok())
            .ok_or_else(|| too_large(minutes, sample_rate))?;

        Ok(Self {
            pages: bytes / PAGE_BYTES,
        })
    }

    /// Number of allocation pages
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Total size in words
    pub fn words(&self) -> usize {
        self.pages * PAGE_BYTES / WORD_BYTES
    }

    /// Total size in bytes
    pub fn bytes(&self) -> usize {
        self.pages * PAGE_BYTES
    }

    /// Longest track (in frames) the sample store can hold
    pub fn max_track_frames(&self) -> usize {
        (self.words() - SAMPLE_STORE) / 2
    }
}
