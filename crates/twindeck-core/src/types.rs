//! Common types for Twindeck
//!
//! This module contains the fundamental audio types shared by the engine,
//! the host and the player: stereo frames, quantum buffers and deck ids.

use std::fmt;
use std::ops::{Index, IndexMut};

/// Default sample rate (44.1kHz, the rate decoded tracks are expected at)
pub const SAMPLE_RATE: u32 = 44_100;

/// Frames produced by one invocation of the render callback
pub const QUANTUM_FRAMES: usize = 128;

/// Audio sample type (32-bit float everywhere)
pub type Sample = f32;

/// A single stereo sample (left and right channels)
///
/// Uses `#[repr(C)]` to ensure predictable memory layout: [left, right].
/// This enables zero-copy conversion between `&mut [f32]` device buffers
/// (interleaved stereo) and `&mut [StereoSample]` using bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Get the peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

/// A fixed-length buffer of stereo samples
///
/// Allocated once (outside the audio thread) and reused for every quantum.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    /// Get the number of stereo samples in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Fill the buffer with silence
    pub fn fill_silence(&mut self) {
        self.samples.fill(StereoSample::silence());
    }

    /// Sum separate left and right channel slices into this buffer
    ///
    /// Real-time safe: never allocates. Extra input frames are ignored.
    pub fn add_channels(&mut self, left: &[Sample], right: &[Sample]) {
        for ((dst, &l), &r) in self.samples.iter_mut().zip(left).zip(right) {
            *dst += StereoSample::new(l, r);
        }
    }

    /// Get the peak amplitude in the buffer
    pub fn peak(&self) -> Sample {
        self.samples.iter().map(|s| s.peak()).fold(0.0, Sample::max)
    }
}

impl Index<usize> for StereoBuffer {
    type Output = StereoSample;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl IndexMut<usize> for StereoBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.samples[index]
    }
}

/// Deck identifier (0 = A, 1 = B)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeckId(u8);

impl DeckId {
    pub const A: DeckId = DeckId(0);
    pub const B: DeckId = DeckId(1);

    /// Zero-based deck index
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Parse a deck letter ("a", "B") as typed on the console
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "a" | "A" => Some(Self::A),
            "b" | "B" => Some(Self::B),
            _ => None,
        }
    }

    /// Get the deck letter for display
    pub fn letter(&self) -> char {
        // Only A and B can be constructed
        char::from(b'A' + self.0)
    }
}

impl fmt::Display for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Playback state of a deck, as stored in the play-state register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
}

impl PlayState {
    /// Register encoding (0 = stopped, 1 = playing)
    #[inline]
    pub fn to_register(self) -> u32 {
        match self {
            PlayState::Stopped => 0,
            PlayState::Playing => 1,
        }
    }

    /// Decode a register value; anything non-zero means playing
    #[inline]
    pub fn from_register(value: u32) -> Self {
        if value == 0 {
            PlayState::Stopped
        } else {
            PlayState::Playing
        }
    }
}

impl From<bool> for PlayState {
    fn from(playing: bool) -> Self {
        if playing {
            PlayState::Playing
        } else {
            PlayState::Stopped
        }
    }
}
