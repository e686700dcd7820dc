//! Core data types for the tactus voice engine.
//!
//! This crate defines what flows between the layers: performance events
//! going in, per-voice control signals coming out, and the scale and pitch
//! arithmetic both sides agree on.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod event;
pub mod pitch;
mod scale;
mod signal_buffer;

pub use event::{Event, EventKind};
pub use pitch::{bend_to_octaves, master_tune_offset, semitones_to_bend};
pub use scale::{EqualTemperament, Scale};
pub use signal_buffer::{
    SignalBuffer, Stream, MAX_BLOCK_SIZE, MAX_INPUT_CHANNELS, MAX_VOICES, STREAMS_PER_VOICE,
};
