//! Player configuration
//!
//! Stored as YAML in the user's config directory.
//! Default location: ~/.config/twindeck/config.yaml

use std::path::Path;

use serde::{Deserialize, Serialize};
use twindeck_core::config::{load_config, EngineConfig};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Engine, kernel and audio device settings
    pub engine: EngineConfig,
    /// Startup behaviour
    pub startup: StartupConfig,
}

/// Startup section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// How long to wait for both decks to become ready, in milliseconds
    pub ready_timeout_ms: u64,
    /// Start playing tracks given on the command line right after loading
    pub autoplay: bool,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            ready_timeout_ms: 5000,
            autoplay: true,
        }
    }
}

/// Load the player config, falling back to defaults
pub fn load(path: &Path) -> PlayerConfig {
    load_config(path)
}
