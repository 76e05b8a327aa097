//! Quantum host - adapts fixed-size deck quanta to device buffers
//!
//! Audio devices ask for whatever buffer size they negotiated; decks render
//! exactly [`QUANTUM_FRAMES`] at a time. The host renders whole quanta on
//! demand, sums all decks into one stereo quantum and hands it out frame by
//! frame across device callbacks. All buffers are allocated up front.

use super::render::DeckRenderer;
use crate::types::{StereoBuffer, StereoSample, QUANTUM_FRAMES};

/// Owns every deck renderer on the audio thread
pub struct QuantumHost {
    renderers: Vec<DeckRenderer>,
    /// Per-deck scratch channels (one quantum each)
    left: Vec<f32>,
    right: Vec<f32>,
    /// Sum of all decks for the current quantum
    mix: StereoBuffer,
    /// Next frame of `mix` to hand out (`QUANTUM_FRAMES` = exhausted)
    cursor: usize,
    quanta: u64,
}

impl QuantumHost {
    pub fn new(renderers: Vec<DeckRenderer>) -> Self {
        log::debug!(
            "Quantum host created for decks [{}]",
            renderers
                .iter()
                .map(|r| r.id().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Self {
            renderers,
            left: vec![0.0; QUANTUM_FRAMES],
            right: vec![0.0; QUANTUM_FRAMES],
            mix: StereoBuffer::silence(QUANTUM_FRAMES),
            cursor: QUANTUM_FRAMES,
            quanta: 0,
        }
    }

    /// Number of decks driven by this host
    pub fn deck_count(&self) -> usize {
        self.renderers.len()
    }

    /// Quanta rendered since creation
    pub fn quanta_rendered(&self) -> u64 {
        self.quanta
    }

    /// Render the next quantum of every deck and sum them
    fn render_quantum(&mut self) {
        self.mix.fill_silence();
        for renderer in &mut self.renderers {
            renderer.process(&mut self.left, &mut self.right);
            self.mix.add_channels(&self.left, &self.right);
        }
        self.cursor = 0;
        self.quanta += 1;
    }

    #[inline]
    fn next_frame(&mut self) -> StereoSample {
        if self.cursor == QUANTUM_FRAMES {
            self.render_quantum();
        }
        let frame = self.mix[self.cursor];
        self.cursor += 1;
        frame
    }

    /// Fill a buffer of stereo frames
    pub fn fill_stereo(&mut self, out: &mut [StereoSample]) {
        for frame in out {
            *frame = self.next_frame();
        }
    }

    /// Fill an interleaved device buffer with `channels` channels per frame
    ///
    /// Mono devices get a downmix; channels past the second are zeroed.
    pub fn fill_interleaved(&mut self, out: &mut [f32], channels: usize) {
        match channels {
            0 => {}
            2 if out.len() % 2 == 0 => {
                self.fill_stereo(bytemuck::cast_slice_mut::<f32, StereoSample>(out));
            }
            1 => {
                for sample in out {
                    let frame = self.next_frame();
                    *sample = 0.5 * (frame.left + frame.right);
                }
            }
            _ => {
                for frame_out in out.chunks_mut(channels) {
                    let frame = self.next_frame();
                    frame_out[0] = frame.left;
                    if let Some(right) = frame_out.get_mut(1) {
                        *right = frame.right;
                    }
                    for extra in frame_out.iter_mut().skip(2) {
                        *extra = 0.0;
                    }
                }
            }
        }
    }
}
