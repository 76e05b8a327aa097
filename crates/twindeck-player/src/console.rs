//! Console commands typed on stdin
//!
//! ```text
//! play a | stop a | drop a 12.5 | pitch b 1.02 | pos a | load b track.wav | news a | reset a | help | quit
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Error};
use twindeck_core::DeckId;

/// One parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Play(DeckId),
    Stop(DeckId),
    /// Relocate to a time in seconds
    Drop { deck: DeckId, seconds: f64 },
    Pitch { deck: DeckId, value: f32 },
    /// Print the stylus position
    Pos(DeckId),
    Load { deck: DeckId, path: PathBuf },
    /// Print the renderer's diagnostic counters
    News(DeckId),
    /// Zero the diagnostic counters
    Reset(DeckId),
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  play <deck>            start playback (deck = a | b)
  stop <deck>            stop playback
  drop <deck> <seconds>  jump to a position
  pitch <deck> <value>   set the pitch multiplier (1.0 = normal)
  pos <deck>             print the current position
  load <deck> <path>     load a WAV file (deck stops at 0:00)
  news <deck>            print render diagnostics
  reset <deck>           zero the render diagnostics
  help                   show this text
  quit                   exit";

impl FromStr for ConsoleCommand {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            bail!("empty command");
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "play" => ConsoleCommand::Play(deck(words.next())?),
            "stop" => ConsoleCommand::Stop(deck(words.next())?),
            "drop" => ConsoleCommand::Drop {
                deck: deck(words.next())?,
                seconds: number(words.next(), "seconds")?,
            },
            "pitch" => ConsoleCommand::Pitch {
                deck: deck(words.next())?,
                value: number(words.next(), "pitch")?,
            },
            "pos" => ConsoleCommand::Pos(deck(words.next())?),
            "load" => {
                let deck = deck(words.next())?;
                let path = words.collect::<Vec<_>>().join(" ");
                if path.is_empty() {
                    bail!("load needs a file path");
                }
                return Ok(ConsoleCommand::Load {
                    deck,
                    path: PathBuf::from(path),
                });
            }
            "news" => ConsoleCommand::News(deck(words.next())?),
            "reset" => ConsoleCommand::Reset(deck(words.next())?),
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" | "q" => ConsoleCommand::Quit,
            other => bail!("unknown command '{}' (try 'help')", other),
        };

        if let Some(extra) = words.next() {
            bail!("unexpected '{}' after {}", extra, verb);
        }
        Ok(command)
    }
}

fn deck(word: Option<&str>) -> Result<DeckId, Error> {
    let word = word.context("missing deck (a or b)")?;
    DeckId::from_letter(word).ok_or_else(|| anyhow!("unknown deck '{}'", word))
}

fn number<T: FromStr>(word: Option<&str>, what: &str) -> Result<T, Error> {
    let word = word.with_context(|| format!("missing {}", what))?;
    word.parse()
        .map_err(|_| anyhow!("'{}' is not a valid {}", word, what))
}
