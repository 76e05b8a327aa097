//! Audio output via CPAL
//!
//! A single stereo output stream on any cpal host. The stream's data
//! callback owns a [`QuantumHost`](crate::engine::QuantumHost), which
//! renders the decks in fixed quanta and slices them into device buffers.
//!
//! # Example Usage
//!
//! ```ignore
//! use twindeck_core::audio::{start_audio_system, AudioConfig};
//!
//! let host = QuantumHost::new(vec![renderer_a, renderer_b]);
//! let handle = start_audio_system(&AudioConfig::default(), host)?;
//! // keep `handle` alive for as long as audio should play
//! ```

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE};
pub use cpal_backend::{start_audio_system, AudioHandle};
pub use device::{default_output_device, find_device_by_id, get_output_devices, OutputDevice};
pub use error::{AudioError, AudioResult};
