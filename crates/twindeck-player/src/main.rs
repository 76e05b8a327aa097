//! Twindeck Player - two decks on one stereo output, driven from the console
//!
//! Startup:
//! 1. Load config (`--config PATH` or ~/.config/twindeck/config.yaml)
//! 2. Create decks A and B and hand their renderers to the audio stream
//! 3. Boot both render kernels and wait until the decks are ready
//! 4. Load tracks given as `A=track.wav` / `B=track.wav`, then read commands
//!
//! Set `RUST_LOG=debug` for protocol-level logging.

mod args;
mod config;
mod console;
mod decode;
mod player;

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use twindeck_core::audio::{get_output_devices, start_audio_system};
use twindeck_core::config::default_config_path;
use twindeck_core::engine::{Deck, KernelFactory, KernelRegistry, QuantumHost};
use twindeck_core::DeckId;

use args::CliArgs;
use console::ConsoleCommand;
use player::{Flow, Player};

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = CliArgs::parse(std::env::args().skip(1))?;

    if args.list_devices {
        for device in get_output_devices()? {
            println!("{}", device);
        }
        return Ok(());
    }

    log::info!("twindeck-player starting up");

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = config::load(&config_path);
    let engine = &config.engine;

    let registry: Arc<dyn KernelFactory> = Arc::new(KernelRegistry::new(engine.kernel));
    let deck_config = engine.deck_config();

    let mut decks = Vec::new();
    let mut renderers = Vec::new();
    for id in [DeckId::A, DeckId::B] {
        let (deck, renderer) = Deck::new(id, &deck_config)
            .with_context(|| format!("Failed to create deck {}", id))?;
        decks.push(deck);
        renderers.push(renderer);
    }

    let audio = start_audio_system(&engine.audio_config(), QuantumHost::new(renderers))
        .context("Failed to start audio output")?;
    log::info!(
        "Output: {} ({} Hz, {} frames, ~{:.1}ms)",
        audio.device_name(),
        audio.sample_rate(),
        audio.buffer_size(),
        audio.latency_ms()
    );

    for deck in &decks {
        deck.boot(Arc::clone(&registry))?;
    }
    let timeout = Duration::from_millis(config.startup.ready_timeout_ms);
    for deck in &decks {
        deck.wait_ready(timeout)?;
    }
    log::info!("Decks ready");

    let player = Player::new(decks, engine.sample_rate);
    for (id, path) in &args.tracks {
        match player.load_file(*id, path) {
            Ok(seconds) => {
                log::info!("Deck {}: {:?} ({:.1}s)", id, path, seconds);
                if config.startup.autoplay {
                    player.deck(*id)?.play(true);
                }
            }
            Err(e) => log::error!("{:#}", e),
        }
    }

    run_console(&player)?;

    log::info!("Shutting down");
    drop(audio);
    Ok(())
}

/// Read commands from stdin until `quit` or end of input
fn run_console(player: &Player) -> Result<()> {
    println!("twindeck ready - type 'help' for commands");
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }

        let outcome = line
            .parse::<ConsoleCommand>()
            .and_then(|command| player.execute(command));
        match outcome {
            Ok(Flow::Continue(message)) => println!("{}", message),
            Ok(Flow::Quit) => return Ok(()),
            Err(e) => println!("error: {:#}", e),
        }
    }
}
