//! Headless controller for the tactus voice engine.
//!
//! Owns the producer side of the engine's queues: stamps and sends events,
//! stages configuration, and drives the engine either from a paced render
//! thread or offline.

mod csv;
mod render;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tc_engine::{config_channel, event_channel, ConfigSender, EventSender};

// Re-export common types so callers don't need tc-ir/tc-engine directly.
pub use tc_engine::{
    ConfigError, EngineConfig, EngineError, Protocol, SendError, SignalProcessor, VoiceEngine,
    DEFAULT_QUEUE_CAPACITY,
};
pub use tc_ir::{Event, EventKind, SignalBuffer, Stream, MAX_BLOCK_SIZE};

pub use csv::{recording_to_csv, write_csv};
pub use render::{render_offline, Recording};

/// Control-thread handle to one engine.
pub struct Controller {
    events: EventSender,
    config: ConfigSender,
    staged: EngineConfig,
    next_source: u32,
    sample_rate: f32,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    stop_signal: Arc<AtomicBool>,
    sample_time: Arc<AtomicU64>,
    thread: Option<JoinHandle<VoiceEngine>>,
}

impl Controller {
    /// Create an engine with `capacity` voices and the controller feeding it.
    pub fn new(capacity: usize, sample_rate: f32) -> Result<(Self, VoiceEngine), EngineError> {
        Self::with_queue_capacity(capacity, sample_rate, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(
        capacity: usize,
        sample_rate: f32,
        queue_capacity: usize,
    ) -> Result<(Self, VoiceEngine), EngineError> {
        let (events, queue) = event_channel(queue_capacity);
        let (config, receiver) = config_channel();
        let mut engine = VoiceEngine::new(capacity, sample_rate, queue)?;
        engine.attach_config(receiver);
        log::info!("engine ready: {} voices at {} Hz", capacity, sample_rate);
        let controller = Self {
            events,
            config,
            staged: EngineConfig::default(),
            next_source: 1,
            sample_rate,
            playback: None,
        };
        Ok((controller, engine))
    }

    // --- Configuration ---

    /// Stage a configuration. The engine applies it at its next buffer.
    pub fn configure(&mut self, config: EngineConfig) -> Result<(), ConfigError> {
        self.config.send(config)?;
        log::info!(
            "staged config: {} voices, {:?}, unison {}",
            config.voices,
            config.protocol,
            config.unison
        );
        self.staged = config;
        Ok(())
    }

    /// Last configuration accepted by `configure`.
    pub fn config(&self) -> &EngineConfig {
        &self.staged
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    // --- Events ---

    pub fn send(&mut self, event: Event) -> Result<(), SendError> {
        self.events.push(event)
    }

    /// Send a note-on under a fresh source id. Returns the id for the
    /// matching note-off.
    pub fn note_on(
        &mut self,
        channel: u8,
        note: f32,
        velocity: f32,
        time: u64,
    ) -> Result<u32, SendError> {
        let source = self.next_source;
        self.send(Event::note_on(source, channel, note, velocity, time))?;
        self.next_source = self.next_source.wrapping_add(1).max(1);
        Ok(source)
    }

    pub fn note_off(&mut self, source: u32, channel: u8, time: u64) -> Result<(), SendError> {
        self.send(Event::note_off(source, channel, time))
    }

    // --- Paced playback ---

    /// Run the engine on its own thread, one `block` every block period.
    pub fn play(&mut self, engine: VoiceEngine, block: usize) {
        self.stop();

        let stop_signal = Arc::new(AtomicBool::new(false));
        let sample_time = Arc::new(AtomicU64::new(engine.sample_time()));
        let stop = stop_signal.clone();
        let time = sample_time.clone();
        let sample_rate = self.sample_rate;

        let thread = std::thread::spawn(move || render_thread(engine, block, sample_rate, stop, time));
        log::info!("render thread started, {} frame blocks", block);

        self.playback = Some(PlaybackHandle {
            stop_signal,
            sample_time,
            thread: Some(thread),
        });
    }

    /// Stop the render thread and take the engine back.
    pub fn stop(&mut self) -> Option<VoiceEngine> {
        let mut pb = self.playback.take()?;
        pb.stop_signal.store(true, Ordering::Relaxed);
        let engine = pb.thread.take()?.join().ok();
        log::info!("render thread stopped");
        engine
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_some()
    }

    /// Engine clock as last published by the render thread.
    pub fn sample_time(&self) -> Option<u64> {
        let pb = self.playback.as_ref()?;
        Some(pb.sample_time.load(Ordering::Relaxed))
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn render_thread(
    mut engine: VoiceEngine,
    block: usize,
    sample_rate: f32,
    stop_signal: Arc<AtomicBool>,
    sample_time: Arc<AtomicU64>,
) -> VoiceEngine {
    let block = block.clamp(1, MAX_BLOCK_SIZE);
    let mut out = SignalBuffer::new(engine.capacity(), block);
    let period = Duration::from_secs_f64(block as f64 / sample_rate as f64);

    while !stop_signal.load(Ordering::Relaxed) {
        engine.process(block, &mut out);
        sample_time.store(engine.sample_time(), Ordering::Relaxed);
        std::thread::sleep(period);
    }
    engine
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_ids_are_fresh() {
        let (mut ctrl, _engine) = Controller::new(2, 48000.0).unwrap();
        let a = ctrl.note_on(1, 60.0, 1.0, 0).unwrap();
        let b = ctrl.note_on(1, 62.0, 1.0, 0).unwrap();
        assert_ne!(a, b);
        assert!(a > 0 && b > 0);
    }

    #[test]
    fn out_of_order_send_is_rejected() {
        let (mut ctrl, _engine) = Controller::new(2, 48000.0).unwrap();
        ctrl.note_on(1, 60.0, 1.0, 100).unwrap();
        assert!(matches!(
            ctrl.note_on(1, 62.0, 1.0, 50),
            Err(SendError::OutOfOrder(_))
        ));
    }

    #[test]
    fn configure_validates() {
        let (mut ctrl, _engine) = Controller::new(2, 48000.0).unwrap();
        let bad = EngineConfig {
            glide: -1.0,
            ..EngineConfig::default()
        };
        assert!(ctrl.configure(bad).is_err());
        assert_eq!(ctrl.config().glide, 0.0);
    }

    #[test]
    fn configure_reaches_engine() {
        let (mut ctrl, mut engine) = Controller::new(4, 48000.0).unwrap();
        ctrl.configure(EngineConfig {
            voices: 3,
            ..EngineConfig::default()
        })
        .unwrap();
        let mut out = SignalBuffer::new(4, 32);
        engine.process(32, &mut out);
        assert_eq!(engine.voice_count(), 3);
    }

    #[test]
    fn play_and_stop_returns_engine() {
        let (mut ctrl, engine) = Controller::new(2, 48000.0).unwrap();
        ctrl.play(engine, 64);
        assert!(ctrl.is_playing());
        std::thread::sleep(Duration::from_millis(20));
        let engine = ctrl.stop().unwrap();
        assert!(!ctrl.is_playing());
        assert!(engine.sample_time() > 0);
    }

    #[test]
    fn bad_sample_rate_is_an_error() {
        assert!(matches!(
            Controller::new(2, 0.0),
            Err(EngineError::InvalidSampleRate(_))
        ));
    }
}
