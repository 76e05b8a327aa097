//! Two-deck player: executes console commands against the decks

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use twindeck_core::engine::{AuxReply, Deck};
use twindeck_core::DeckId;

use crate::console::{ConsoleCommand, HELP};
use crate::decode::read_wav;

/// What the console loop should do after a command
#[derive(Debug, PartialEq)]
pub enum Flow {
    /// Print the message and read the next line
    Continue(String),
    Quit,
}

/// Owns the control side of every deck
pub struct Player {
    decks: Vec<Deck>,
    sample_rate: u32,
}

impl Player {
    pub fn new(decks: Vec<Deck>, sample_rate: u32) -> Self {
        Self { decks, sample_rate }
    }

    pub fn deck(&self, id: DeckId) -> Result<&Deck> {
        self.decks
            .iter()
            .find(|d| d.id() == id)
            .with_context(|| format!("deck {} is not running", id))
    }

    /// Load a WAV file onto a deck (stops the deck)
    pub fn load_file(&self, id: DeckId, path: &std::path::Path) -> Result<f64> {
        let track = read_wav(path, self.sample_rate)?;
        let deck = self.deck(id)?;
        deck.load(track)
            .with_context(|| format!("Failed to load {:?} on deck {}", path, id))?;
        Ok(deck.track_length() / self.sample_rate as f64)
    }

    /// Run one command
    pub fn execute(&self, command: ConsoleCommand) -> Result<Flow> {
        let message = match command {
            ConsoleCommand::Play(id) => {
                self.deck(id)?.play(true);
                format!("deck {} playing", id)
            }
            ConsoleCommand::Stop(id) => {
                self.deck(id)?.play(false);
                format!("deck {} stopped", id)
            }
            ConsoleCommand::Drop { deck, seconds } => {
                let position = seconds * self.sample_rate as f64;
                self.deck(deck)?.drop(position)?;
                format!("deck {} dropped at {}", deck, clock(seconds))
            }
            ConsoleCommand::Pitch { deck, value } => {
                self.deck(deck)?.set_pitch(value)?;
                format!("deck {} pitch {:.3}", deck, value)
            }
            ConsoleCommand::Pos(id) => {
                let deck = self.deck(id)?;
                let seconds = deck.read()? / self.sample_rate as f64;
                let length = deck.track_length() / self.sample_rate as f64;
                format!("deck {} at {} / {}", id, clock(seconds), clock(length))
            }
            ConsoleCommand::Load { deck, path } => {
                let seconds = self.load_file(deck, &path)?;
                format!("deck {} loaded {:?} ({})", deck, path, clock(seconds))
            }
            ConsoleCommand::News(id) => self.news(id)?,
            ConsoleCommand::Reset(id) => {
                self.deck(id)?.reset_telemetry()?;
                format!("deck {} diagnostics reset", id)
            }
            ConsoleCommand::Help => HELP.to_string(),
            ConsoleCommand::Quit => return Ok(Flow::Quit),
        };
        Ok(Flow::Continue(message))
    }

    fn news(&self, id: DeckId) -> Result<String> {
        let deck = self.deck(id)?;
        deck.request_telemetry()?;

        let deadline = Instant::now() + Duration::from_millis(250);
        loop {
            if let Some(AuxReply::Telemetry(t)) = deck.poll_reply() {
                return Ok(format!(
                    "deck {} ({:?}): {} quanta, {} silent, {} drops applied, {} deferred, \
                     {} stylus skips, {} sync contention, stylus {:.1}",
                    id,
                    deck.lifecycle(),
                    t.quanta_rendered,
                    t.silent_quanta,
                    t.drops_applied,
                    t.drops_deferred,
                    t.stylus_skips,
                    t.sync_contention,
                    t.stylus
                ));
            }
            if Instant::now() >= deadline {
                anyhow::bail!("deck {} did not answer (is audio running?)", id);
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

/// Format seconds as m:ss.s
fn clock(seconds: f64) -> String {
    let minutes = (seconds / 60.0).floor();
    format!("{}:{:04.1}", minutes as u64, seconds - minutes * 60.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use twindeck_core::engine::{DeckConfig, KernelConfig, KernelRegistry, QuantumHost, Track};
    use twindeck_core::QUANTUM_FRAMES;

    const SR: u32 = 44_100;

    fn decks() -> (Player, QuantumHost) {
        let config = DeckConfig {
            max_track_minutes: 0.1,
            ..DeckConfig::default()
        };
        let (a, ra) = Deck::new(DeckId::A, &config).unwrap();
        let (b, rb) = Deck::new(DeckId::B, &config).unwrap();
        (Player::new(vec![a, b], SR), QuantumHost::new(vec![ra, rb]))
    }

    fn pump(host: &mut QuantumHost, quanta: usize) {
        let mut buffer = vec![0.0; 2 * QUANTUM_FRAMES];
        for _ in 0..quanta {
            host.fill_interleaved(&mut buffer, 2);
        }
    }

    #[test]
    fn test_clock_format() {
        assert_eq!(clock(0.0), "0:00.0");
        assert_eq!(clock(75.3), "1:15.3");
    }

    #[test]
    fn test_transport_commands() {
        let (player, mut host) = decks();
        let registry = Arc::new(KernelRegistry::new(KernelConfig::default()));
        player.deck(DeckId::A).unwrap().boot(registry).unwrap();
        while !player.deck(DeckId::A).unwrap().is_ready() {
            pump(&mut host, 1);
            std::thread::sleep(Duration::from_millis(1));
        }

        let deck = player.deck(DeckId::A).unwrap();
        deck.load(Track::new(vec![0.1; 2 * SR as usize], vec![0.1; 2 * SR as usize]).unwrap())
            .unwrap();

        player
            .execute(ConsoleCommand::Drop {
                deck: DeckId::A,
                seconds: 1.0,
            })
            .unwrap();
        player.execute(ConsoleCommand::Play(DeckId::A)).unwrap();
        assert!(deck.is_playing());
        pump(&mut host, 1);
        assert_eq!(deck.read().unwrap(), SR as f64 + QUANTUM_FRAMES as f64);

        let Flow::Continue(message) = player.execute(ConsoleCommand::Pos(DeckId::A)).unwrap()
        else {
            panic!("pos should not quit");
        };
        assert!(message.contains("0:01.0 / 0:02.0"), "{}", message);

        player.execute(ConsoleCommand::Stop(DeckId::A)).unwrap();
        assert!(!deck.is_playing());
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let (player, _host) = decks();
        assert!(player
            .execute(ConsoleCommand::Pitch {
                deck: DeckId::B,
                value: 9.0
            })
            .is_err());
        assert!(player
            .execute(ConsoleCommand::Drop {
                deck: DeckId::B,
                seconds: 3.0
            })
            .is_err());
    }

    #[test]
    fn test_news_reads_renderer_counters() {
        let (player, mut host) = decks();
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                while !done.load(Ordering::Relaxed) {
                    pump(&mut host, 1);
                    std::thread::sleep(Duration::from_millis(1));
                }
            });

            let result = player.execute(ConsoleCommand::News(DeckId::B));
            done.store(true, Ordering::Relaxed);
            let Flow::Continue(message) = result.unwrap() else {
                panic!("news should not quit");
            };
            assert!(message.starts_with("deck B (Created)"), "{}", message);
        });
    }

    #[test]
    fn test_reset_is_queued() {
        let (player, _host) = decks();
        let Flow::Continue(message) = player.execute(ConsoleCommand::Reset(DeckId::A)).unwrap()
        else {
            panic!("reset should not quit");
        };
        assert_eq!(message, "deck A diagnostics reset");
    }

    #[test]
    fn test_quit() {
        let (player, _host) = decks();
        assert_eq!(player.execute(ConsoleCommand::Quit).unwrap(), Flow::Quit);
    }
}
