//! Real-time core of the tactus voice engine.
//!
//! Drains timestamped performance events and renders per-voice control
//! signals once per audio buffer, without locking or allocating.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod change_list;
mod config;
mod drift;
mod engine;
mod error;
mod event_queue;
mod playing;
mod processor;
mod voice;
mod voice_pool;

pub use change_list::{ChangeList, MAX_CHANGES};
pub use config::{
    config_channel, ConfigReceiver, ConfigSender, EngineConfig, Protocol, ALL_NOTES_OFF,
    ALL_SOUND_OFF, CONFIG_QUEUE_CAPACITY, DEFAULT_X_CONTROLLER, Y_CONTROLLER,
};
pub use drift::DRIFT_INTERVAL_SECONDS;
pub use engine::{EngineState, VoiceEngine};
pub use error::{ConfigError, EngineError, SendError};
pub use event_queue::{event_channel, EventQueue, EventSender, DEFAULT_QUEUE_CAPACITY};
pub use playing::{PendingStack, PlayingEvents, MAX_PENDING_EVENTS, MAX_PLAYING_EVENTS};
pub use processor::{ProcessorInfo, SignalProcessor};
pub use voice::{Voice, VoiceState};
pub use voice_pool::{Allocation, VoiceId, VoicePool};
