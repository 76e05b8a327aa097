//! CPAL output stream
//!
//! One stereo output stream drives every deck:
//!
//! ```text
//! ┌──────────────────┐  registers   ┌─────────────────────┐
//! │  Control thread  │─────────────►│   ControlBlock(s)   │
//! │  (Deck facades)  │◄─────────────│   (shared atomics)  │
//! └──────────────────┘  stylus read └──────────┬──────────┘
//!                                              │ per quantum
//!                                   ┌──────────▼──────────┐
//!                                   │  CPAL audio thread  │
//!                                   │ (owns QuantumHost)  │
//!                                   └─────────────────────┘
//! ```
//!
//! The host is moved into the data callback; nothing is shared behind a
//! mutex.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::config::AudioConfig;
use super::device::{default_output_device, find_device_by_id};
use super::error::{AudioError, AudioResult};
use crate::engine::QuantumHost;
use crate::types::SAMPLE_RATE;

/// Handle to the running output stream
///
/// Keeps the stream alive. Drop this to stop audio.
pub struct AudioHandle {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
    buffer_size: u32,
    channels: u16,
}

impl AudioHandle {
    /// Name of the output device
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Get the sample rate of the audio system
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the buffer size in frames (as requested from the device)
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Device channel count
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Get the audio latency in milliseconds (one-way, output only)
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Open the configured output device and start rendering `host` into it
pub fn start_audio_system(config: &AudioConfig, host: QuantumHost) -> AudioResult<AudioHandle> {
    let device = match &config.device {
        Some(id) => find_device_by_id(id)?,
        None => default_output_device()?,
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let (supported_config, buffer_size) = get_output_config(&device, config)?;
    let sample_rate = supported_config.sample_rate().0;
    let target_rate = config.sample_rate.unwrap_or(SAMPLE_RATE);
    if sample_rate != target_rate {
        log::warn!(
            "Device runs at {}Hz but decks play at {}Hz; playback speed will be off",
            sample_rate,
            target_rate
        );
    }

    let stream_config = StreamConfig {
        channels: supported_config.channels(),
        sample_rate: supported_config.sample_rate(),
        buffer_size: CpalBufferSize::Fixed(buffer_size),
    };

    let handle_channels = stream_config.channels;
    let latency_ms = (buffer_size as f32 / sample_rate as f32) * 1000.0;
    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency), {} decks",
        stream_config.channels,
        sample_rate,
        buffer_size,
        latency_ms,
        host.deck_count()
    );

    let stream = build_output_stream(&device, &stream_config, host)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    Ok(AudioHandle {
        _stream: stream,
        device_name,
        sample_rate,
        buffer_size,
        channels: handle_channels,
    })
}

/// Pick the best output configuration for a device
///
/// Returns (SupportedStreamConfig, buffer_size_in_frames)
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<(cpal::SupportedStreamConfig, u32)> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let target_sample_rate = config.sample_rate.unwrap_or(SAMPLE_RATE);
    let in_range = |c: &cpal::SupportedStreamConfigRange| {
        target_sample_rate >= c.min_sample_rate().0 && target_sample_rate <= c.max_sample_rate().0
    };

    // The data callback is written for f32 samples
    let best_config = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .find(|c| c.channels() >= 2 && in_range(c))
        .or_else(|| {
            supported_configs
                .iter()
                .filter(|c| c.sample_format() == SampleFormat::F32)
                .find(|c| c.channels() >= 2)
        })
        .or_else(|| {
            supported_configs
                .iter()
                .find(|c| c.sample_format() == SampleFormat::F32)
        })
        .ok_or_else(|| {
            AudioError::ConfigError("No f32 output configuration available".to_string())
        })?;

    let sample_rate = if in_range(best_config) {
        cpal::SampleRate(target_sample_rate)
    } else {
        let fallback = best_config.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target_sample_rate,
            fallback.0
        );
        fallback
    };

    let buffer_size = config.buffer_size.frames();
    log::debug!(
        "Selected buffer size: {} frames for {:?}",
        buffer_size,
        config.buffer_size
    );

    Ok((best_config.clone().with_sample_rate(sample_rate), buffer_size))
}

/// Build the output stream, moving the host into the data callback
fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut host: QuantumHost,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                host.fill_interleaved(data, channels);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}
