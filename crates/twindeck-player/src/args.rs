//! Command line arguments
//!
//! ```text
//! twindeck-player [--config PATH] [--list-devices] [A=track.wav] [B=track.wav]
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use twindeck_core::DeckId;

/// Parsed command line
#[derive(Debug, Default, PartialEq)]
pub struct CliArgs {
    /// Config file to use instead of the default location
    pub config: Option<PathBuf>,
    /// Print output devices and exit
    pub list_devices: bool,
    /// Tracks to load at startup
    pub tracks: Vec<(DeckId, PathBuf)>,
}

impl CliArgs {
    /// Parse arguments (without the program name)
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args.next().context("--config needs a path")?;
                    parsed.config = Some(PathBuf::from(path));
                }
                "--list-devices" => parsed.list_devices = true,
                other => {
                    let Some((letter, path)) = other.split_once('=') else {
                        bail!("unexpected argument '{}' (expected DECK=path)", other);
                    };
                    let deck = DeckId::from_letter(letter)
                        .with_context(|| format!("unknown deck '{}'", letter))?;
                    if path.is_empty() {
                        bail!("missing track path for deck {}", deck);
                    }
                    parsed.tracks.retain(|(d, _)| *d != deck);
                    parsed.tracks.push((deck, PathBuf::from(path)));
                }
            }
        }
        Ok(parsed)
    }
}
