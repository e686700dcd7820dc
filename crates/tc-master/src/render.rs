//! Offline block rendering into a flat recording.

use tc_engine::{SendError, VoiceEngine};
use tc_ir::{Event, Scale, SignalBuffer, Stream, MAX_BLOCK_SIZE, STREAMS_PER_VOICE};

use crate::Controller;

/// Every stream of every voice over a whole render.
#[derive(Clone, Debug)]
pub struct Recording {
    voices: usize,
    sample_rate: f32,
    planes: Vec<Vec<f32>>,
}

impl Recording {
    pub fn new(voices: usize, sample_rate: f32, frames: usize) -> Self {
        Self {
            voices,
            sample_rate,
            planes: (0..voices * STREAMS_PER_VOICE)
                .map(|_| Vec::with_capacity(frames))
                .collect(),
        }
    }

    pub fn voices(&self) -> usize {
        self.voices
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Frames recorded so far.
    pub fn frames(&self) -> usize {
        self.planes.first().map_or(0, Vec::len)
    }

    pub fn stream(&self, voice: usize, stream: Stream) -> &[f32] {
        &self.planes[voice * STREAMS_PER_VOICE + stream as usize]
    }

    /// Append the first `frames` samples of each plane of `block`.
    pub fn append(&mut self, block: &SignalBuffer, frames: usize) {
        for (index, plane) in self.planes.iter_mut().enumerate() {
            plane.extend_from_slice(&block.plane(index)[..frames]);
        }
    }
}

/// Render `total_frames` through `engine` in blocks of `block` frames.
///
/// Script times are relative to the engine clock at the start of the
/// render and must be in order. Each event is queued just before the block
/// it falls in, so scripts longer than the queue are fine.
pub fn render_offline<S: Scale>(
    controller: &mut Controller,
    engine: &mut VoiceEngine<S>,
    script: &[Event],
    total_frames: usize,
    block: usize,
) -> Result<Recording, SendError> {
    let block = block.clamp(1, MAX_BLOCK_SIZE);
    let start = engine.sample_time();
    let mut out = SignalBuffer::new(engine.capacity(), block);
    let mut recording = Recording::new(engine.capacity(), engine.sample_rate(), total_frames);
    let mut script = script.iter().peekable();
    let mut rendered = 0;

    while rendered < total_frames {
        let n = block.min(total_frames - rendered);
        let end = (rendered + n) as u64;
        while let Some(event) = script.next_if(|e| e.time < end) {
            controller.send(event.at(start + event.time))?;
        }
        engine.process(n, &mut out);
        recording.append(&out, n);
        rendered += n;
    }
    log::debug!("rendered {} frames offline", rendered);
    Ok(recording)
}
