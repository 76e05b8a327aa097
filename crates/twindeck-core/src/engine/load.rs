//! Load/transition protocol
//!
//! Replaces a deck's track while the render thread keeps running. The whole
//! rewrite happens under the sync-lock; the render thread sees either the old
//! track, the new one, or (for the quanta in between) silence.

use super::block::ControlBlock;
use super::error::{DeckError, DeckResult};
use super::layout::SAMPLE_STORE;
use super::lock::{LockKind, SpinPolicy};
use super::track::Track;
use crate::types::PlayState;

/// Summary of a completed transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadedTrack {
    /// Track length in samples
    pub length: f64,
    /// Word offset of the right channel
    pub channel_offset: usize,
    /// Counter of the implicit drop-to-zero
    pub drop_counter: u32,
}

/// Swap `track` into `block`
///
/// Order of effects: stop, drop to zero, stylus to zero, length and offset,
/// left channel, right channel. The sync, drop and stylus locks are all
/// taken (in that order) before the first write, so nothing is written if
/// the track does not fit or any of them stays busy.
pub fn transition(block: &ControlBlock, track: Track, policy: &SpinPolicy) -> DeckResult<LoadedTrack> {
    let frames = track.len();
    let max_frames = block.capacity().max_track_frames();
    if frames > max_frames {
        return Err(DeckError::invalid(format!(
            "track of {frames} frames exceeds deck capacity of {max_frames} frames"
        )));
    }

    let sync = block.lock(LockKind::Sync);
    let guard = sync.lock(policy)?;
    let drop_lock = block.lock(LockKind::Drop);
    let drop_guard = drop_lock.lock(policy)?;
    let stylus_lock = block.lock(LockKind::Stylus);
    let stylus_guard = stylus_lock.lock(policy)?;

    block.set_play_state(PlayState::Stopped);
    let drop_counter = block.write_drop(&drop_guard, 0.0);
    block.write_stylus(&stylus_guard, 0.0);
    // Drops and position reads may proceed while the samples are copied
    drop(stylus_guard);
    drop(drop_guard);

    let length = frames as f64;
    let channel_offset = SAMPLE_STORE + frames;
    block.write_track_registers(&guard, length, channel_offset);
    block.write_samples(&guard, SAMPLE_STORE, track.left());
    block.write_samples(&guard, channel_offset, track.right());

    drop(guard);

    log::debug!(
        "Transition complete: {} frames, right channel at word {}",
        frames,
        channel_offset
    );

    Ok(LoadedTrack {
        length,
        channel_offset,
        drop_counter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::block::DropPoll;
    use crate::engine::layout::Capacity;

    fn block() -> ControlBlock {
        ControlBlock::new(Capacity::for_duration(0.01, 44_100).unwrap())
    }

    fn track(frames: usize) -> Track {
        let left = (0..frames).map(|i| i as f32 / frames as f32).collect();
        let right = (0..frames).map(|i| -(i as f32) / frames as f32).collect();
        Track::new(left, right).unwrap()
    }

    #[test]
    fn test_transition_writes_registers_and_channels() {
        let block = block();
        block.set_play_state(PlayState::Playing);

        let loaded = transition(&block, track(1000), &SpinPolicy::default()).unwrap();

        assert_eq!(loaded.length, 1000.0);
        assert_eq!(loaded.channel_offset, SAMPLE_STORE + 1000);
        assert_eq!(block.play_state(), PlayState::Stopped);
        assert_eq!(
            block.poll_drop(0),
            DropPoll::Ready {
                counter: loaded.drop_counter,
                position: 0.0
            }
        );
        assert_eq!(block.read_stylus(&SpinPolicy::default()).unwrap(), 0.0);

        let guard = block.lock(LockKind::Sync).try_lock().unwrap();
        let view = block.track_view(&guard);
        assert_eq!(view.frames, 1000);
        assert_eq!(block.frame(&view, 500).left, 0.5);
        assert_eq!(block.frame(&view, 500).right, -0.5);
    }

    #[test]
    fn test_oversized_track_is_rejected_before_locking() {
        let block = block();
        let too_long = block.capacity().max_track_frames() + 1;
        let _held = block.lock(LockKind::Sync).try_lock().unwrap();

        let err = transition(&block, track(too_long), &SpinPolicy::with_max_attempts(1)).unwrap_err();
        assert!(matches!(err, DeckError::InvalidArgument(_)));
    }

    #[test]
    fn test_busy_sync_lock_leaves_block_untouched() {
        let block = block();
        block.set_play_state(PlayState::Playing);
        let _held = block.lock(LockKind::Sync).try_lock().unwrap();

        let err = transition(&block, track(10), &SpinPolicy::with_max_attempts(8)).unwrap_err();
        assert_eq!(
            err,
            DeckError::Busy {
                lock: LockKind::Sync,
                attempts: 8
            }
        );
        assert_eq!(block.play_state(), PlayState::Playing);
        assert_eq!(block.drop_counter(), 0);
    }

    #[test]
    fn test_busy_drop_or_stylus_lock_leaves_deck_playing() {
        let policy = SpinPolicy::default();
        for kind in [LockKind::Drop, LockKind::Stylus] {
            let block = block();
            transition(&block, track(100), &policy).unwrap();
            block.set_play_state(PlayState::Playing);
            block.publish_drop(50.0, &policy).unwrap();

            let held = block.lock(kind).try_lock().unwrap();
            let err = transition(&block, track(10), &SpinPolicy::with_max_attempts(8)).unwrap_err();
            assert_eq!(
                err,
                DeckError::Busy {
                    lock: kind,
                    attempts: 8
                }
            );
            drop(held);

            assert_eq!(block.play_state(), PlayState::Playing);
            assert_eq!(block.drop_counter(), 4);
            let guard = block.lock(LockKind::Sync).try_lock().unwrap();
            assert_eq!(block.track_view(&guard).frames, 100);
        }
    }

    #[test]
    fn test_reload_shorter_track_moves_channel_offset() {
        let block = block();
        let policy = SpinPolicy::default();
        transition(&block, track(2000), &policy).unwrap();
        let second = transition(&block, track(100), &policy).unwrap();

        assert_eq!(second.channel_offset, SAMPLE_STORE + 100);
        assert_eq!(second.drop_counter, 4);
        let guard = block.lock(LockKind::Sync).try_lock().unwrap();
        assert_eq!(block.track_view(&guard).frames, 100);
    }
}
