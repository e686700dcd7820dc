//! Error types for the engine and its producer side.

use core::fmt;

use tc_ir::Event;

/// Host-facing construction and setup errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineError {
    /// Sample rate is zero, negative or not finite.
    InvalidSampleRate(f32),
    /// Requested pool capacity exceeds `MAX_VOICES`.
    InvalidCapacity(usize),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidSampleRate(sr) => write!(f, "Invalid sample rate: {}", sr),
            EngineError::InvalidCapacity(n) => write!(f, "Invalid voice capacity: {}", n),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EngineError {}

/// A configuration field that cannot be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Field is NaN or infinite.
    NonFinite(&'static str),
    /// Field must not be negative.
    Negative(&'static str),
    /// The engine has not drained earlier snapshots yet.
    QueueFull,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NonFinite(field) => write!(f, "Config field `{}` is not finite", field),
            ConfigError::Negative(field) => write!(f, "Config field `{}` is negative", field),
            ConfigError::QueueFull => write!(f, "Config queue full"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Rejected event, handed back to the producer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SendError {
    /// Queue is full.
    Full(Event),
    /// Event is stamped earlier than the previous one.
    OutOfOrder(Event),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Full(e) => write!(f, "Event queue full, dropped {:?} at {}", e.kind, e.time),
            SendError::OutOfOrder(e) => {
                write!(f, "Event {:?} at {} is earlier than the last queued event", e.kind, e.time)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SendError {}
