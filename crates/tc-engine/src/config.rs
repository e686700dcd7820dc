//! Engine configuration and the channel that stages it for the audio thread.

use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::error::ConfigError;

/// Input protocol the engine interprets events with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Protocol {
    /// Note-channel messages: one bend and pressure per channel.
    #[default]
    Conventional,
    /// Per-note channels, channel 1 is the global bus.
    Expressive,
    /// Continuous touch: notes arrive with x/y/z updates.
    ContinuousTouch,
}

/// Smoothing for pressure, amplitude and mod lists outside continuous touch.
pub const CONTROL_GLIDE_SECONDS: f32 = 0.001;

/// Lowest rate continuous-touch smoothing is computed from.
pub const MIN_DATA_RATE: f32 = 100.0;

/// Default expressive binding for the x axis.
pub const DEFAULT_X_CONTROLLER: u8 = 73;

/// Expressive binding for the y axis.
pub const Y_CONTROLLER: u8 = 74;

/// Controller that silences everything.
pub const ALL_SOUND_OFF: u8 = 120;

/// Controller that releases every held note.
pub const ALL_NOTES_OFF: u8 = 123;

/// Everything a host or control thread can change on a running engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    /// Active voices, clamped to the pool capacity.
    pub voices: usize,
    pub protocol: Protocol,
    /// Pitch wheel range in semitones.
    pub bend_range: f32,
    /// Controller numbers for mod1, mod2 and mod3.
    pub controllers: [u8; 3],
    /// Expressive controller for mod2.
    pub x_controller: u8,
    pub unison: bool,
    /// Retrigger when a unison note is revived.
    pub glissando: bool,
    /// Round-robin free voice search.
    pub rotate: bool,
    /// Pitch and bend glide in seconds.
    pub glide: f32,
    /// Continuous-touch update rate in Hz.
    pub data_rate: f32,
    /// Master tuning in Hz.
    pub master_tune: f32,
    /// Per-voice micro-detune amount. Zero disables drift.
    pub drift: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            voices: 0,
            protocol: Protocol::Conventional,
            bend_range: 7.0,
            controllers: [1, 2, 3],
            x_controller: DEFAULT_X_CONTROLLER,
            unison: false,
            glissando: false,
            rotate: true,
            glide: 0.0,
            data_rate: 100.0,
            master_tune: tc_ir::pitch::A440,
            drift: 0.0,
        }
    }
}

impl EngineConfig {
    /// Check every numeric field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        finite("bend_range", self.bend_range)?;
        non_negative("glide", self.glide)?;
        non_negative("data_rate", self.data_rate)?;
        finite("master_tune", self.master_tune)?;
        non_negative("drift", self.drift)?;
        Ok(())
    }

    /// Copy of `self` where every field that fails validation is replaced
    /// by the value in `prior`.
    pub fn sanitized(mut self, prior: &EngineConfig) -> EngineConfig {
        if let Err(e) = finite("bend_range", self.bend_range) {
            log::warn!("{}; keeping {}", e, prior.bend_range);
            self.bend_range = prior.bend_range;
        }
        if let Err(e) = non_negative("glide", self.glide) {
            log::warn!("{}; keeping {}", e, prior.glide);
            self.glide = prior.glide;
        }
        if let Err(e) = non_negative("data_rate", self.data_rate) {
            log::warn!("{}; keeping {}", e, prior.data_rate);
            self.data_rate = prior.data_rate;
        }
        if let Err(e) = finite("master_tune", self.master_tune) {
            log::warn!("{}; keeping {}", e, prior.master_tune);
            self.master_tune = prior.master_tune;
        }
        if let Err(e) = non_negative("drift", self.drift) {
            log::warn!("{}; keeping {}", e, prior.drift);
            self.drift = prior.drift;
        }
        self
    }

    /// Glide time for continuous-touch smoothing.
    pub fn touch_glide(&self) -> f32 {
        1.0 / self.data_rate.max(MIN_DATA_RATE)
    }

    /// Glide time for amplitude, pressure and mod lists.
    pub fn control_glide(&self) -> f32 {
        match self.protocol {
            Protocol::ContinuousTouch => self.touch_glide(),
            Protocol::Conventional | Protocol::Expressive => CONTROL_GLIDE_SECONDS,
        }
    }
}

fn finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite(field))
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(ConfigError::Negative(field));
    }
    Ok(())
}

/// Snapshots a control thread can stage before the engine drains them.
pub const CONFIG_QUEUE_CAPACITY: usize = 8;

/// Create a connected config sender/receiver pair.
pub fn config_channel() -> (ConfigSender, ConfigReceiver) {
    let (producer, consumer) = HeapRb::<EngineConfig>::new(CONFIG_QUEUE_CAPACITY).split();
    (ConfigSender { producer }, ConfigReceiver { consumer })
}

/// Control-thread half of the config channel.
pub struct ConfigSender {
    producer: HeapProd<EngineConfig>,
}

impl ConfigSender {
    /// Validate and stage a snapshot for the next buffer boundary.
    pub fn send(&mut self, config: EngineConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.producer
            .try_push(config)
            .map_err(|_| ConfigError::QueueFull)
    }
}

/// Engine half of the config channel.
pub struct ConfigReceiver {
    consumer: HeapCons<EngineConfig>,
}

impl ConfigReceiver {
    /// Drain every staged snapshot and return the newest.
    pub fn latest(&mut self) -> Option<EngineConfig> {
        let mut newest = None;
        while let Some(config) = self.consumer.try_pop() {
            newest = Some(config);
        }
        newest
    }
}
