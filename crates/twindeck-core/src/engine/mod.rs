//! Playback engine - control block, lock discipline and render callback
//!
//! This module contains the two halves of every deck and what they share:
//! - ControlBlock: fixed-size region of atomic words used as a register file
//! - SpinLock: bounded lock words inside the block
//! - DeckRenderer: per-quantum render callback (audio thread)
//! - Deck: validating control facade (control thread)
//! - QuantumHost: sums deck quanta into device buffers

mod block;
mod command;
mod deck;
mod error;
mod host;
mod kernel;
mod layout;
mod load;
mod lock;
mod render;
mod track;

pub use block::{ControlBlock, DropPoll, TrackView};
pub use command::*;
pub use deck::{Deck, DeckConfig, MAX_PITCH};
pub use error::{DeckError, DeckResult};
pub use host::QuantumHost;
pub use kernel::{
    InterpolationMethod, KernelConfig, KernelError, KernelFactory, KernelModule, KernelRegistry,
    RenderKernel, StylusKernel,
};
pub use layout::*;
pub use load::{transition, LoadedTrack};
pub use lock::{LockGuard, LockKind, SpinLock, SpinPolicy, DEFAULT_MAX_ATTEMPTS};
pub use render::{DeckAtomics, DeckRenderer, Lifecycle};
pub use track::Track;
