//! Engine configuration document

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;
use crate::engine::{DeckConfig, KernelConfig, SpinPolicy};
use crate::types::SAMPLE_RATE;

/// Top-level engine settings, stored as YAML
///
/// ```yaml
/// sample_rate: 44100
/// max_track_minutes: 8.0
/// spin:
///   max_attempts: 1000000
/// kernel:
///   interpolation: cubic
/// pitch_smoothing: 1.0
/// audio:
///   buffer_size: default
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate decks play tracks at
    pub sample_rate: u32,
    /// Longest track a deck can hold (fixes each control block's size)
    pub max_track_minutes: f64,
    /// Retry budget for control-thread lock acquisition
    pub spin: SpinPolicy,
    /// Render kernel settings
    pub kernel: KernelConfig,
    /// Fraction of a pitch change applied per quantum (1.0 = immediate)
    pub pitch_smoothing: f32,
    /// Output device settings
    pub audio: AudioConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let deck = DeckConfig::default();
        Self {
            sample_rate: SAMPLE_RATE,
            max_track_minutes: deck.max_track_minutes,
            spin: deck.spin,
            kernel: KernelConfig::default(),
            pitch_smoothing: deck.pitch_smoothing,
            audio: AudioConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Settings for each deck
    pub fn deck_config(&self) -> DeckConfig {
        DeckConfig {
            sample_rate: self.sample_rate,
            max_track_minutes: self.max_track_minutes,
            spin: self.spin,
            pitch_smoothing: self.pitch_smoothing,
        }
    }

    /// Audio settings with the engine's sample rate as the device preference
    pub fn audio_config(&self) -> AudioConfig {
        let mut audio = self.audio.clone();
        audio.sample_rate.get_or_insert(self.sample_rate);
        audio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config, save_config};
    use crate::engine::InterpolationMethod;

    #[test]
    fn test_partial_document_keeps_defaults() {
        let yaml = "max_track_minutes: 12\nkernel:\n  interpolation: linear\n";
        let config: EngineConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.max_track_minutes, 12.0);
        assert_eq!(config.kernel.interpolation, InterpolationMethod::Linear);
        assert_eq!(config.sample_rate, SAMPLE_RATE);
        assert_eq!(config.spin, SpinPolicy::default());
    }

    #[test]
    fn test_deck_config_follows_engine_settings() {
        let config = EngineConfig {
            sample_rate: 48_000,
            pitch_smoothing: 0.25,
            ..EngineConfig::default()
        };
        let deck = config.deck_config();
        assert_eq!(deck.sample_rate, 48_000);
        assert_eq!(deck.pitch_smoothing, 0.25);
        assert_eq!(config.audio_config().sample_rate, Some(48_000));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let config = EngineConfig {
            spin: SpinPolicy::with_max_attempts(5000),
            ..EngineConfig::default()
        };

        save_config(&config, &path).unwrap();
        let loaded: EngineConfig = load_config(&path);
        assert_eq!(loaded, config);
    }
}
