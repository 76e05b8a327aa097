//! Audio backend configuration
//!
//! Device selection and buffer settings for the single stereo output.

use serde::{Deserialize, Serialize};

/// Largest buffer size accepted from configuration (frames)
pub const MAX_BUFFER_SIZE: u32 = 8192;

/// Default buffer size when no preference is specified (frames)
/// 512 frames is a safe default that works on most systems
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Preferred buffer size for the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferSize {
    /// Use [`DEFAULT_BUFFER_SIZE`]
    #[default]
    Default,
    /// Request a specific buffer size in frames (clamped to 64..=MAX_BUFFER_SIZE)
    Fixed(u32),
    /// Small buffer (256 frames) for responsive control
    LowLatency,
}

impl BufferSize {
    /// Buffer size to request from the device, in frames
    pub fn frames(&self) -> u32 {
        match self {
            BufferSize::Default => DEFAULT_BUFFER_SIZE,
            BufferSize::Fixed(frames) => (*frames).clamp(64, MAX_BUFFER_SIZE),
            BufferSize::LowLatency => 256,
        }
    }

    /// Latency in milliseconds for a given sample rate
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        (self.frames() as f32 / sample_rate as f32) * 1000.0
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (ALSA, CoreAudio, ...)
/// so devices from different hosts can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier; None searches every host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Get a display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the audio backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device (None = system default)
    pub device: Option<DeviceId>,
    /// Preferred buffer size
    pub buffer_size: BufferSize,
    /// Preferred sample rate (None = the engine's sample rate)
    pub sample_rate: Option<u32>,
}

impl AudioConfig {
    /// Set the output device
    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    /// Set a fixed buffer size in frames
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    /// Set the preferred sample rate
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_frames() {
        assert_eq!(BufferSize::Default.frames(), DEFAULT_BUFFER_SIZE);
        assert_eq!(BufferSize::Fixed(16).frames(), 64);
        assert_eq!(BufferSize::Fixed(100_000).frames(), MAX_BUFFER_SIZE);
        assert_eq!(BufferSize::LowLatency.frames(), 256);
        assert!((BufferSize::Fixed(441).latency_ms(44_100) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_device_label() {
        assert_eq!(DeviceId::new("hw:0,0").display_label(), "hw:0,0");
        assert_eq!(
            DeviceId::with_host("hw:0,0", "ALSA").display_label(),
            "[ALSA] hw:0,0"
        );
    }

    #[test]
    fn test_audio_config_yaml() {
        let config = AudioConfig::default()
            .with_device(DeviceId::with_host("Speakers", "CoreAudio"))
            .with_buffer_frames(256)
            .with_sample_rate(48_000);
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: AudioConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);

        let partial: AudioConfig = serde_yaml::from_str("buffer_size: lowlatency\n").unwrap();
        assert_eq!(partial.buffer_size, BufferSize::LowLatency);
        assert_eq!(partial.device, None);
    }
}
