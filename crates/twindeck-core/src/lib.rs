//! Twindeck Core - two-deck playback engine
//!
//! Decks share a fixed-size block of atomic registers with the audio thread.
//! The control side writes play-state, drops, pitch and whole tracks; the
//! render side produces one quantum per callback without ever waiting.

pub mod audio;
pub mod config;
pub mod engine;
pub mod types;

pub use types::*;
