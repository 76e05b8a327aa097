//! Standard locations for twindeck configuration files

use std::path::PathBuf;

/// Directory holding twindeck configuration
///
/// Returns: `~/.config/twindeck` (platform config dir, falling back to `.`)
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("twindeck")
}

/// Default config file path
///
/// Returns: `~/.config/twindeck/config.yaml`
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_layout() {
        let path = default_config_path();
        assert!(path.ends_with("twindeck/config.yaml"));
        assert_eq!(path.parent(), Some(config_dir().as_path()));
    }
}
