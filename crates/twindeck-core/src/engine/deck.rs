//! Deck control facade
//!
//! A [`Deck`] is the control-thread half of one playback deck. Every
//! operation validates its arguments first and then becomes either a
//! lock-free register store or a short, bounded, lock-guarded write into the
//! shared [`ControlBlock`]. The matching [`DeckRenderer`] is handed to the
//! audio thread.
//!
//! ```ignore
//! let (deck, renderer) = Deck::new(DeckId::A, &DeckConfig::default())?;
//! // move `renderer` into the audio callback, then:
//! deck.boot(registry.clone())?;
//! deck.load(track)?;
//! deck.play(true);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::block::ControlBlock;
use super::command::{
    aux_channel, kernel_channel, reply_channel, AuxCommand, AuxReply, AuxSender, KernelSender,
    ReplyReceiver,
};
use super::error::{DeckError, DeckResult};
use super::kernel::KernelFactory;
use super::layout::Capacity;
use super::load::transition;
use super::lock::SpinPolicy;
use super::render::{DeckAtomics, DeckRenderer, Lifecycle};
use super::track::Track;
use crate::types::{DeckId, PlayState, SAMPLE_RATE};

/// Highest accepted pitch multiplier
pub const MAX_PITCH: f32 = 4.0;

/// Per-deck settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    /// Sample rate tracks are played at
    pub sample_rate: u32,
    /// Longest track the deck can hold, in minutes (fixes the block size)
    pub max_track_minutes: f64,
    /// Retry budget for control-thread lock acquisition
    pub spin: SpinPolicy,
    /// Fraction of the remaining pitch change applied per quantum (1.0 = immediate)
    pub pitch_smoothing: f32,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            max_track_minutes: 8.0,
            spin: SpinPolicy::default(),
            pitch_smoothing: 1.0,
        }
    }
}

/// Control-thread half of a deck
pub struct Deck {
    id: DeckId,
    block: Arc<ControlBlock>,
    atomics: Arc<DeckAtomics>,
    spin: SpinPolicy,
    sample_rate: u32,
    /// Loaded track length (f64 bits), cached for drop validation
    track_length: AtomicU64,
    /// Taken by the first `boot`
    kernel_tx: Mutex<Option<KernelSender>>,
    aux_tx: Mutex<AuxSender>,
    reply_rx: Mutex<ReplyReceiver>,
    boot_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Deck {
    /// Allocate a deck's control block and wire its rings
    ///
    /// Returns the facade and the renderer to hand to the audio thread.
    pub fn new(id: DeckId, config: &DeckConfig) -> DeckResult<(Deck, DeckRenderer)> {
        let capacity = Capacity::for_duration(config.max_track_minutes, config.sample_rate)?;
        let block = Arc::new(ControlBlock::new(capacity));
        let atomics = Arc::new(DeckAtomics::new());

        let (kernel_tx, kernel_rx) = kernel_channel();
        let (aux_tx, aux_rx) = aux_channel();
        let (reply_tx, reply_rx) = reply_channel();

        let renderer = DeckRenderer::new(
            id,
            Arc::clone(&block),
            Arc::clone(&atomics),
            kernel_rx,
            aux_rx,
            reply_tx,
            config.pitch_smoothing,
        );

        log::info!(
            "Deck {} created ({:.1} min capacity, {} pages)",
            id,
            config.max_track_minutes,
            capacity.pages()
        );

        let deck = Deck {
            id,
            block,
            atomics,
            spin: config.spin,
            sample_rate: config.sample_rate,
            track_length: AtomicU64::new(0f64.to_bits()),
            kernel_tx: Mutex::new(Some(kernel_tx)),
            aux_tx: Mutex::new(aux_tx),
            reply_rx: Mutex::new(reply_rx),
            boot_thread: Mutex::new(None),
        };
        Ok((deck, renderer))
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The shared region (same allocation the renderer reads)
    pub fn block(&self) -> &Arc<ControlBlock> {
        &self.block
    }

    // ─────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────

    /// Build the render kernel on a background thread
    ///
    /// Moves the deck from `Created` to `Booting`. The renderer marks it
    /// `Ready` once it picks the kernel up.
    pub fn boot(&self, factory: Arc<dyn KernelFactory>) -> DeckResult<()> {
        if !self.atomics.advance(Lifecycle::Created, Lifecycle::Booting) {
            return Err(DeckError::invalid(format!(
                "deck {} already booted ({:?})",
                self.id,
                self.atomics.lifecycle()
            )));
        }

        let Some(mut kernel_tx) = lock_unpoisoned(&self.kernel_tx).take() else {
            self.atomics.set_lifecycle(Lifecycle::Failed);
            return Err(DeckError::KernelUnavailable(format!(
                "deck {} has no kernel channel",
                self.id
            )));
        };

        let id = self.id;
        let atomics = Arc::clone(&self.atomics);
        let handle = thread::Builder::new()
            .name(format!("deck-{}-boot", id))
            .spawn(move || match factory.build() {
                Ok(kernel) => {
                    if kernel_tx.push(kernel).is_err() {
                        log::error!("Deck {}: kernel slot already filled", id);
                        atomics.set_lifecycle(Lifecycle::Failed);
                        return;
                    }
                    log::info!("Deck {}: render kernel built, waiting for renderer", id);
                }
                Err(e) => {
                    log::error!("Deck {}: {}", id, e);
                    atomics.set_lifecycle(Lifecycle::Failed);
                }
            })
            .map_err(|e| {
                self.atomics.set_lifecycle(Lifecycle::Failed);
                DeckError::KernelUnavailable(format!("failed to spawn boot thread: {e}"))
            })?;

        *lock_unpoisoned(&self.boot_thread) = Some(handle);
        log::debug!("Deck {} booting", self.id);
        Ok(())
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.atomics.lifecycle()
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle() == Lifecycle::Ready
    }

    /// Poll until the renderer has installed the kernel
    ///
    /// The renderer must be running for the deck to become ready.
    pub fn wait_ready(&self, timeout: Duration) -> DeckResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.lifecycle() {
                Lifecycle::Ready => return Ok(()),
                Lifecycle::Failed => {
                    return Err(DeckError::KernelUnavailable(format!(
                        "deck {} failed to boot",
                        self.id
                    )))
                }
                Lifecycle::Created | Lifecycle::Booting => {}
            }
            if Instant::now() >= deadline {
                return Err(DeckError::KernelUnavailable(format!(
                    "deck {} not ready after {:?}",
                    self.id, timeout
                )));
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────

    /// Start or stop playback (observed within one quantum)
    pub fn play(&self, playing: bool) {
        self.block.set_play_state(PlayState::from(playing));
    }

    pub fn is_playing(&self) -> bool {
        self.block.play_state() == PlayState::Playing
    }

    /// Relocate the stylus to `position` samples
    ///
    /// Returns the published drop counter.
    pub fn drop(&self, position: f64) -> DeckResult<u32> {
        let length = self.track_length();
        if !position.is_finite() || position < 0.0 || position > length {
            return Err(DeckError::invalid(format!(
                "drop position {position} outside loaded track (0..={length})"
            )));
        }
        let counter = self.block.publish_drop(position, &self.spin)?;
        log::debug!("Deck {}: drop to {} (counter {})", self.id, position, counter);
        Ok(counter)
    }

    /// Set the target pitch multiplier
    pub fn set_pitch(&self, pitch: f32) -> DeckResult<()> {
        if !pitch.is_finite() || !(0.0..=MAX_PITCH).contains(&pitch) {
            return Err(DeckError::invalid(format!(
                "pitch {pitch} outside 0..={MAX_PITCH}"
            )));
        }
        self.atomics.set_pitch(pitch);
        Ok(())
    }

    /// Target pitch multiplier
    pub fn pitch(&self) -> f32 {
        self.atomics.pitch()
    }

    /// Canonical stylus position, in samples
    pub fn read(&self) -> DeckResult<f64> {
        self.block.read_stylus(&self.spin)
    }

    // ─────────────────────────────────────────────────────────────
    // Tracks
    // ─────────────────────────────────────────────────────────────

    /// Replace the loaded track; the deck is left stopped at position zero
    pub fn load(&self, track: Track) -> DeckResult<()> {
        let frames = track.len();
        let duration = track.duration_secs(self.sample_rate);
        let loaded = transition(&self.block, track, &self.spin)?;
        self.track_length
            .store(loaded.length.to_bits(), Ordering::Release);
        log::info!(
            "Deck {}: loaded {} frames ({:.1}s)",
            self.id,
            frames,
            duration
        );
        Ok(())
    }

    /// Length of the loaded track in samples (0 when empty)
    pub fn track_length(&self) -> f64 {
        f64::from_bits(self.track_length.load(Ordering::Acquire))
    }

    // ─────────────────────────────────────────────────────────────
    // Auxiliary channel
    // ─────────────────────────────────────────────────────────────

    /// Ask the renderer for its diagnostic counters
    pub fn request_telemetry(&self) -> DeckResult<()> {
        self.send_aux(AuxCommand::ReportTelemetry)
    }

    /// Zero the renderer's diagnostic counters
    pub fn reset_telemetry(&self) -> DeckResult<()> {
        self.send_aux(AuxCommand::ResetTelemetry)
    }

    /// Next reply from the renderer, if any
    pub fn poll_reply(&self) -> Option<AuxReply> {
        lock_unpoisoned(&self.reply_rx).pop().ok()
    }

    fn send_aux(&self, command: AuxCommand) -> DeckResult<()> {
        lock_unpoisoned(&self.aux_tx)
            .push(command)
            .map_err(|_| DeckError::QueueFull)
    }
}

impl Drop for Deck {
    fn drop(&mut self) {
        if let Some(handle) = lock_unpoisoned(&self.boot_thread).take() {
            if handle.join().is_err() {
                log::warn!("Deck {}: boot thread panicked", self.id);
            }
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command::DeckTelemetry;
    use crate::engine::kernel::{KernelConfig, KernelError, KernelRegistry, RenderKernel};
    use crate::types::QUANTUM_FRAMES;
    use std::sync::atomic::AtomicBool;

    const SR: u32 = 44_100;

    fn config(seconds: f64) -> DeckConfig {
        DeckConfig {
            max_track_minutes: seconds / 60.0,
            ..DeckConfig::default()
        }
    }

    /// Boot a deck and pump its renderer until the kernel is installed
    fn ready_deck(seconds: f64) -> (Deck, DeckRenderer) {
        let (deck, mut renderer) = Deck::new(DeckId::A, &config(seconds)).unwrap();
        deck.boot(Arc::new(KernelRegistry::new(KernelConfig::default())))
            .unwrap();
        let mut scratch = [0.0; QUANTUM_FRAMES];
        let mut scratch_r = [0.0; QUANTUM_FRAMES];
        let deadline = Instant::now() + Duration::from_secs(5);
        while !deck.is_ready() {
            assert!(Instant::now() < deadline, "deck never became ready");
            renderer.process(&mut scratch, &mut scratch_r);
            thread::sleep(Duration::from_millis(1));
        }
        (deck, renderer)
    }

    fn constant_track(frames: usize, value: f32) -> Track {
        Track::new(vec![value; frames], vec![-value; frames]).unwrap()
    }

    fn ramp_track(frames: usize) -> Track {
        let left = (0..frames).map(|i| (i % 1000) as f32 / 1000.0).collect();
        let right = (0..frames).map(|i| -((i % 1000) as f32) / 1000.0).collect();
        Track::new(left, right).unwrap()
    }

    fn quantum(renderer: &mut DeckRenderer) -> (Vec<f32>, Vec<f32>) {
        let mut left = vec![0.0; QUANTUM_FRAMES];
        let mut right = vec![0.0; QUANTUM_FRAMES];
        assert!(renderer.process(&mut left, &mut right));
        (left, right)
    }

    #[test]
    fn test_drop_then_play_reads_within_one_quantum() {
        let (deck, mut renderer) = ready_deck(10.0);
        deck.load(ramp_track(10 * SR as usize)).unwrap();

        let target = 5.0 * SR as f64;
        deck.drop(target).unwrap();
        deck.play(true);
        quantum(&mut renderer);

        let position = deck.read().unwrap();
        assert!(
            (position - target).abs() <= QUANTUM_FRAMES as f64,
            "read {} not within a quantum of {}",
            position,
            target
        );
    }

    #[test]
    fn test_stop_gives_silent_quantum() {
        let (deck, mut renderer) = ready_deck(1.0);
        deck.load(constant_track(SR as usize, 0.25)).unwrap();
        deck.play(true);
        let (left, _) = quantum(&mut renderer);
        assert!(left.iter().all(|&s| s == 0.25));

        deck.play(false);
        let (left, right) = quantum(&mut renderer);
        assert!(left.iter().chain(&right).all(|&s| s == 0.0));
    }

    #[test]
    fn test_load_then_play_starts_at_track_start() {
        let (deck, mut renderer) = ready_deck(1.0);
        let track = ramp_track(SR as usize);
        let expected_left = track.left()[..QUANTUM_FRAMES].to_vec();
        let expected_right = track.right()[..QUANTUM_FRAMES].to_vec();

        deck.load(track).unwrap();
        deck.play(true);
        let (left, right) = quantum(&mut renderer);

        assert_eq!(left, expected_left);
        assert_eq!(right, expected_right);
    }

    #[test]
    fn test_load_while_playing_forces_stop() {
        let (deck, mut renderer) = ready_deck(1.0);
        deck.load(constant_track(SR as usize, 0.5)).unwrap();
        deck.play(true);
        quantum(&mut renderer);
        quantum(&mut renderer);
        assert!(deck.read().unwrap() > 0.0);

        deck.load(constant_track(SR as usize / 2, 0.75)).unwrap();
        assert!(!deck.is_playing());
        assert_eq!(deck.read().unwrap(), 0.0);
        let (left, _) = quantum(&mut renderer);
        assert!(left.iter().all(|&s| s == 0.0));

        deck.play(true);
        let (left, right) = quantum(&mut renderer);
        assert!(left.iter().all(|&s| s == 0.75));
        assert!(right.iter().all(|&s| s == -0.75));
        assert_eq!(deck.track_length(), (SR / 2) as f64);
    }

    #[test]
    fn test_concurrent_loads_never_expose_mixed_tracks() {
        let (deck, mut renderer) = ready_deck(1.0);
        let values = [0.125f32, 0.25, 0.5, 0.75];
        let done = AtomicBool::new(false);

        thread::scope(|scope| {
            scope.spawn(|| {
                while !done.load(Ordering::Relaxed) {
                    let (left, right) = quantum(&mut renderer);
                    let heard: Vec<f32> = left.iter().copied().filter(|&s| s != 0.0).collect();
                    if let Some(&first) = heard.first() {
                        assert!(values.contains(&first), "unexpected sample {}", first);
                        assert!(heard.iter().all(|&s| s == first), "quantum mixes two tracks");
                    }
                    for (l, r) in left.iter().zip(&right) {
                        assert_eq!(*l, -*r);
                    }
                }
            });

            for round in 0..40 {
                let value = values[round % values.len()];
                deck.load(constant_track(SR as usize / 4, value)).unwrap();
                deck.play(true);
                thread::sleep(Duration::from_millis(1));
            }
            done.store(true, Ordering::Relaxed);
        });
    }

    #[test]
    fn test_reads_never_go_backwards_during_playback() {
        let (deck, mut renderer) = ready_deck(2.0);
        deck.load(ramp_track(2 * SR as usize)).unwrap();
        deck.play(true);
        let done = AtomicBool::new(false);

        thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..600 {
                    quantum(&mut renderer);
                }
                done.store(true, Ordering::Release);
            });

            let mut last = 0.0;
            while !done.load(Ordering::Acquire) {
                let position = deck.read().unwrap();
                assert!(position >= last, "position went back: {} -> {}", last, position);
                last = position;
            }
        });
    }

    #[test]
    fn test_drop_validation() {
        let (deck, _renderer) = ready_deck(1.0);
        // Nothing loaded: only zero is inside the track
        assert!(deck.drop(0.0).is_ok());
        assert!(deck.drop(1.0).is_err());

        deck.load(constant_track(1000, 0.1)).unwrap();
        assert!(deck.drop(1000.0).is_ok());
        assert!(matches!(
            deck.drop(1000.5),
            Err(DeckError::InvalidArgument(_))
        ));
        assert!(deck.drop(-1.0).is_err());
        assert!(deck.drop(f64::NAN).is_err());
    }

    #[test]
    fn test_drop_counters_strictly_increase() {
        let (deck, _renderer) = ready_deck(1.0);
        deck.load(constant_track(1000, 0.1)).unwrap();
        let counters: Vec<u32> = (0..10).map(|i| deck.drop(i as f64 * 10.0).unwrap()).collect();
        assert!(counters.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_facade_and_renderer_share_one_block() {
        let (deck, renderer) = Deck::new(DeckId::B, &config(1.0)).unwrap();
        assert!(Arc::ptr_eq(deck.block(), renderer.block()));
        assert_eq!(renderer.id(), DeckId::B);
        assert_eq!(deck.sample_rate(), SR);
        assert_eq!(deck.lifecycle(), Lifecycle::Created);
    }

    #[test]
    fn test_pitch_validation() {
        let (deck, _renderer) = Deck::new(DeckId::B, &config(1.0)).unwrap();
        assert_eq!(deck.pitch(), 1.0);
        deck.set_pitch(1.08).unwrap();
        assert_eq!(deck.pitch(), 1.08);
        assert!(deck.set_pitch(-0.1).is_err());
        assert!(deck.set_pitch(MAX_PITCH + 0.5).is_err());
        assert!(deck.set_pitch(f32::INFINITY).is_err());
        assert_eq!(deck.pitch(), 1.08);
    }

    #[test]
    fn test_oversized_load_is_rejected() {
        let (deck, _renderer) = Deck::new(DeckId::A, &config(0.5)).unwrap();
        let result = deck.load(constant_track(SR as usize, 0.1));
        assert!(matches!(result, Err(DeckError::InvalidArgument(_))));
        assert_eq!(deck.track_length(), 0.0);
    }

    #[test]
    fn test_boot_twice_is_rejected() {
        let (deck, _renderer) = ready_deck(0.5);
        let registry = Arc::new(KernelRegistry::new(KernelConfig::default()));
        assert!(deck.boot(registry).is_err());
        assert_eq!(deck.lifecycle(), Lifecycle::Ready);
    }

    struct BrokenFactory;

    impl KernelFactory for BrokenFactory {
        fn build(&self) -> Result<Box<dyn RenderKernel>, KernelError> {
            Err(KernelError::Build("no module".into()))
        }
    }

    #[test]
    fn test_failed_boot_stays_silent() {
        let (deck, mut renderer) = Deck::new(DeckId::A, &config(0.5)).unwrap();
        deck.boot(Arc::new(BrokenFactory)).unwrap();
        let err = deck.wait_ready(Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, DeckError::KernelUnavailable(_)));
        assert_eq!(deck.lifecycle(), Lifecycle::Failed);

        deck.load(constant_track(1000, 0.5)).unwrap();
        deck.play(true);
        let (left, _) = quantum(&mut renderer);
        assert!(left.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_telemetry_round_trip() {
        let (deck, mut renderer) = ready_deck(0.5);
        deck.load(constant_track(1000, 0.1)).unwrap();
        deck.play(true);
        quantum(&mut renderer);

        deck.request_telemetry().unwrap();
        assert!(deck.poll_reply().is_none());
        quantum(&mut renderer);

        let Some(AuxReply::Telemetry(report)) = deck.poll_reply() else {
            panic!("no telemetry reply");
        };
        let DeckTelemetry {
            drops_applied,
            kernel_installed,
            stylus,
            ..
        } = report;
        assert_eq!(drops_applied, 1);
        assert!(kernel_installed);
        assert_eq!(stylus, QUANTUM_FRAMES as f64);
    }

    #[test]
    fn test_full_aux_queue_reports_queue_full() {
        let (deck, _renderer) = Deck::new(DeckId::A, &config(0.5)).unwrap();
        let mut result = Ok(());
        for _ in 0..=crate::engine::command::AUX_QUEUE_CAPACITY {
            result = deck.request_telemetry();
        }
        assert_eq!(result, Err(DeckError::QueueFull));
    }
}
