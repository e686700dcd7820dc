//! Per-voice control signal storage with planar layout.

use alloc::vec;
use alloc::vec::Vec;

/// Hard ceiling on the voice pool size.
pub const MAX_VOICES: usize = 16;

/// Largest buffer the engine renders in one call.
pub const MAX_BLOCK_SIZE: usize = 512;

/// Number of output streams per voice.
pub const STREAMS_PER_VOICE: usize = 8;

/// Number of expressive-protocol input channels (1-based, 1..=16).
pub const MAX_INPUT_CHANNELS: usize = 16;

/// One of the eight control streams every voice produces, in output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stream {
    Pitch = 0,
    Gate = 1,
    Velocity = 2,
    /// Constant equal to the voice's pool index.
    VoiceIndex = 3,
    Aftertouch = 4,
    Mod1 = 5,
    Mod2 = 6,
    Mod3 = 7,
}

impl Stream {
    /// All streams in output order.
    pub const ALL: [Stream; STREAMS_PER_VOICE] = [
        Stream::Pitch,
        Stream::Gate,
        Stream::Velocity,
        Stream::VoiceIndex,
        Stream::Aftertouch,
        Stream::Mod1,
        Stream::Mod2,
        Stream::Mod3,
    ];

    /// Output name, as exposed to a patching host.
    pub const fn name(self) -> &'static str {
        match self {
            Stream::Pitch => "pitch",
            Stream::Gate => "gate",
            Stream::Velocity => "vel",
            Stream::VoiceIndex => "voice",
            Stream::Aftertouch => "after",
            Stream::Mod1 => "moda",
            Stream::Mod2 => "modb",
            Stream::Mod3 => "modc",
        }
    }
}

/// Control signals for a pool of voices.
///
/// Data is stored as `voices * STREAMS_PER_VOICE` contiguous planes of
/// `frames` samples each. Plane `voice * 8 + stream` holds one stream of
/// one voice.
#[derive(Clone, Debug)]
pub struct SignalBuffer {
    data: Vec<f32>,
    voices: usize,
    frames: usize,
}

impl SignalBuffer {
    /// Create a zeroed buffer for `voices` voices of `frames` samples.
    pub fn new(voices: usize, frames: usize) -> Self {
        Self {
            data: vec![0.0; voices * STREAMS_PER_VOICE * frames],
            voices,
            frames,
        }
    }

    /// Number of voices.
    pub fn voices(&self) -> usize {
        self.voices
    }

    /// Number of frames per plane.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Number of planes.
    pub fn planes(&self) -> usize {
        self.voices * STREAMS_PER_VOICE
    }

    /// Read-only access to one plane by flat index.
    pub fn plane(&self, index: usize) -> &[f32] {
        let start = index * self.frames;
        &self.data[start..start + self.frames]
    }

    /// Mutable access to one plane by flat index.
    pub fn plane_mut(&mut self, index: usize) -> &mut [f32] {
        let start = index * self.frames;
        let len = self.frames;
        &mut self.data[start..start + len]
    }

    /// Read-only access to one stream of one voice.
    pub fn stream(&self, voice: usize, stream: Stream) -> &[f32] {
        self.plane(voice * STREAMS_PER_VOICE + stream as usize)
    }

    /// Mutable access to one stream of one voice.
    pub fn stream_mut(&mut self, voice: usize, stream: Stream) -> &mut [f32] {
        self.plane_mut(voice * STREAMS_PER_VOICE + stream as usize)
    }

    /// All eight planes of one voice, in stream order.
    pub fn voice_mut(&mut self, voice: usize) -> &mut [f32] {
        let start = voice * STREAMS_PER_VOICE * self.frames;
        let len = STREAMS_PER_VOICE * self.frames;
        &mut self.data[start..start + len]
    }

    /// Set every stream of one voice to zero.
    pub fn silence_voice(&mut self, voice: usize) {
        self.voice_mut(voice).fill(0.0);
    }
}
