//! Render kernel - interpolated stylus reads against the sample store
//!
//! The render callback treats the kernel as a black box: it relocates the
//! stylus on drops, and once per quantum asks it to advance by
//! `pitch × QUANTUM_FRAMES` samples while writing one stereo block into the
//! control block's output region.
//!
//! Kernels are produced by a [`KernelFactory`]. The stock factory is
//! [`KernelRegistry`], an explicit object handed to every deck at boot. It
//! compiles the shared [`KernelModule`] once and builds one [`StylusKernel`]
//! per deck from it.
//!
//! ## Interpolation Methods
//!
//! - **Linear**: Fast, acceptable quality. Interpolates between 2 adjacent samples.
//! - **Cubic**: Better quality, uses Catmull-Rom spline (4 samples).
//!
//! Both reproduce the stored sample exactly at integer stylus positions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::block::{ControlBlock, TrackView};
use crate::types::{StereoSample, QUANTUM_FRAMES};

/// Interpolation method for variable-speed playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Linear interpolation (2-point) - fast, acceptable quality
    Linear,
    /// Cubic Catmull-Rom interpolation (4-point) - better quality
    #[default]
    Cubic,
}

impl InterpolationMethod {
    /// Get display name for logs
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Linear => "Linear (Fast)",
            Self::Cubic => "Cubic (Good)",
        }
    }
}

/// Kernel settings shared by every deck built from one registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub interpolation: InterpolationMethod,
}

/// Errors raised while building a kernel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    #[error("Kernel build failed: {0}")]
    Build(String),
}

/// The opaque per-deck resampling kernel
///
/// Called only from the render thread. Implementations must not allocate,
/// block or log inside [`render`](RenderKernel::render).
pub trait RenderKernel: Send {
    /// Move the stylus to `position` (in samples) before the next render
    fn relocate(&mut self, position: f64);

    /// Advance the stylus by one quantum and write the block to the output region
    fn render(&mut self, block: &ControlBlock, track: &TrackView, pitch: f32);

    /// Current stylus position in samples
    fn stylus(&self) -> f64;
}

/// Something that can build render kernels for decks
///
/// `build` runs on a deck's boot thread, never on the render thread.
pub trait KernelFactory: Send + Sync {
    fn build(&self) -> Result<Box<dyn RenderKernel>, KernelError>;
}

/// Immutable, shareable kernel description (compiled once per registry)
#[derive(Debug, Clone, PartialEq)]
pub struct KernelModule {
    pub interpolation: InterpolationMethod,
    pub quantum_frames: usize,
}

/// Explicit kernel registry handed to decks at boot
///
/// Replaces a process-wide cached module: whoever owns the registry owns the
/// module, and the module is compiled at most once per registry.
pub struct KernelRegistry {
    config: KernelConfig,
    module: OnceLock<Arc<KernelModule>>,
    built: AtomicUsize,
}

impl KernelRegistry {
    pub fn new(config: KernelConfig) -> Self {
        Self {
            config,
            module: OnceLock::new(),
            built: AtomicUsize::new(0),
        }
    }

    /// The compiled module (initialized on first use)
    pub fn module(&self) -> Arc<KernelModule> {
        Arc::clone(self.module.get_or_init(|| {
            log::info!(
                "Compiling render kernel module ({}, {} frames/quantum)",
                self.config.interpolation.display_name(),
                QUANTUM_FRAMES
            );
            Arc::new(KernelModule {
                interpolation: self.config.interpolation,
                quantum_frames: QUANTUM_FRAMES,
            })
        }))
    }

    /// Number of kernels built so far
    pub fn kernels_built(&self) -> usize {
        self.built.load(Ordering::Relaxed)
    }
}

impl KernelFactory for KernelRegistry {
    fn build(&self) -> Result<Box<dyn RenderKernel>, KernelError> {
        let kernel = StylusKernel::new(self.module());
        self.built.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(kernel))
    }
}

/// Stock kernel: interpolated reads, clamped at end of track
pub struct StylusKernel {
    module: Arc<KernelModule>,
    stylus: f64,
}

impl StylusKernel {
    pub fn new(module: Arc<KernelModule>) -> Self {
        Self {
            module,
            stylus: 0.0,
        }
    }

    #[inline]
    fn read(&self, block: &ControlBlock, track: &TrackView, position: f64) -> StereoSample {
        let index = position.floor() as usize;
        let frac = (position - position.floor()) as f32;

        match self.module.interpolation {
            InterpolationMethod::Linear => {
                let s0 = block.frame(track, index);
                let s1 = block.frame(track, index + 1);
                lerp_sample(s0, s1, frac)
            }
            InterpolationMethod::Cubic => {
                let s1 = block.frame(track, index);
                let s0 = match index.checked_sub(1) {
                    Some(prev) => block.frame(track, prev),
                    None => s1,
                };
                let s2 = block.frame(track, index + 1);
                let s3 = block.frame(track, index + 2);
                cubic_interpolate(s0, s1, s2, s3, frac)
            }
        }
    }
}

impl RenderKernel for StylusKernel {
    fn relocate(&mut self, position: f64) {
        self.stylus = position.max(0.0);
    }

    fn render(&mut self, block: &ControlBlock, track: &TrackView, pitch: f32) {
        let end = track.length.min(track.frames as f64);
        let step = pitch as f64;

        for frame in 0..self.module.quantum_frames {
            if self.stylus >= end {
                // Clamp at end of track; keep emitting silence
                self.stylus = end;
                block.write_output(frame, StereoSample::silence());
                continue;
            }
            block.write_output(frame, self.read(block, track, self.stylus));
            self.stylus += step;
        }
    }

    fn stylus(&self) -> f64 {
        self.stylus
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Interpolation Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Linear interpolation between two samples
#[inline]
fn lerp_sample(s0: StereoSample, s1: StereoSample, t: f32) -> StereoSample {
    if t == 0.0 {
        return s0;
    }
    StereoSample {
        left: s0.left + (s1.left - s0.left) * t,
        right: s0.right + (s1.right - s0.right) * t,
    }
}

/// Cubic Catmull-Rom interpolation (4-point)
///
/// The spline passes through all control points and has continuous first
/// derivatives.
#[inline]
fn cubic_interpolate(
    s0: StereoSample,
    s1: StereoSample,
    s2: StereoSample,
    s3: StereoSample,
    t: f32,
) -> StereoSample {
    if t == 0.0 {
        return s1;
    }
    let t2 = t * t;
    let t3 = t2 * t;

    // Catmull-Rom basis functions (tension = 0.5)
    let c0 = -0.5 * t3 + t2 - 0.5 * t;
    let c1 = 1.5 * t3 - 2.5 * t2 + 1.0;
    let c2 = -1.5 * t3 + 2.0 * t2 + 0.5 * t;
    let c3 = 0.5 * t3 - 0.5 * t2;

    StereoSample {
        left: s0.left * c0 + s1.left * c1 + s2.left * c2 + s3.left * c3,
        right: s0.right * c0 + s1.right * c1 + s2.right * c2 + s3.right * c3,
    }
}
