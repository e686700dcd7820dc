//! Main events-to-signals engine.

use alloc::vec;
use alloc::vec::Vec;
use core::array;

use tc_ir::{
    bend_to_octaves, master_tune_offset, EqualTemperament, Event, EventKind, Scale, SignalBuffer,
    Stream, MAX_BLOCK_SIZE, MAX_INPUT_CHANNELS, MAX_VOICES, STREAMS_PER_VOICE,
};

use crate::change_list::ChangeList;
use crate::config::{
    ConfigReceiver, EngineConfig, Protocol, ALL_NOTES_OFF, ALL_SOUND_OFF, DEFAULT_X_CONTROLLER,
    Y_CONTROLLER,
};
use crate::drift::{Drift, DRIFT_INTERVAL_SECONDS};
use crate::error::EngineError;
use crate::event_queue::EventQueue;
use crate::playing::{PendingStack, PlayingEvents};
use crate::processor::{ProcessorInfo, SignalProcessor};
use crate::voice::{Voice, VoiceState};
use crate::voice_pool::{Allocation, VoicePool};

/// Expressive global channel.
const MAIN_CHANNEL: u8 = 1;

// Scratch planes, each MAX_BLOCK_SIZE long. TEMP must stay first.
const BUS_TEMP: usize = 0;
const BUS_BEND: usize = 1;
const BUS_PRESSURE: usize = 2;
const BUS_MOD1: usize = 3;
const BUS_MOD2: usize = 4;
const BUS_MOD3: usize = 5;
const BUS_CHANNEL_BEND: usize = 6;
const BUS_COUNT: usize = BUS_CHANNEL_BEND + MAX_INPUT_CHANNELS;

static INFO: ProcessorInfo = ProcessorInfo {
    name: "Events to signals",
    short_name: "e2s",
    streams_per_voice: STREAMS_PER_VOICE,
};

/// Engine-wide mutable state.
#[derive(Clone, Copy, Debug)]
pub struct EngineState {
    /// Applied configuration.
    pub config: EngineConfig,
    pub sustain: bool,
    /// Sample time of the first frame of the next buffer.
    pub buffer_start: u64,
    /// Master tune offset in octaves.
    pub master_pitch: f32,
}

/// Turns queued performance events into per-voice control signals.
pub struct VoiceEngine<S: Scale = EqualTemperament> {
    state: EngineState,
    pool: VoicePool,
    /// Expressive channel-1 buses: bend, pressure, mods.
    main: Voice,
    /// Expressive per-channel bend, indexed by channel - 1.
    channel_bend: [ChangeList; MAX_INPUT_CHANNELS],
    playing: PlayingEvents,
    pending: PendingStack,
    queue: EventQueue,
    config_rx: Option<ConfigReceiver>,
    staged: Option<EngineConfig>,
    drift: Drift,
    scale: S,
    sample_rate: f32,
    buses: Vec<f32>,
}

impl VoiceEngine<EqualTemperament> {
    /// Create an engine with `capacity` voices using 12-TET.
    pub fn new(capacity: usize, sample_rate: f32, queue: EventQueue) -> Result<Self, EngineError> {
        Self::with_scale(capacity, sample_rate, queue, EqualTemperament::default())
    }
}

impl<S: Scale> VoiceEngine<S> {
    /// Create an engine with `capacity` voices and a custom scale.
    pub fn with_scale(
        capacity: usize,
        sample_rate: f32,
        queue: EventQueue,
        scale: S,
    ) -> Result<Self, EngineError> {
        check_sample_rate(sample_rate)?;
        if capacity > MAX_VOICES {
            return Err(EngineError::InvalidCapacity(capacity));
        }
        let config = EngineConfig::default();
        let mut engine = Self {
            state: EngineState {
                config,
                sustain: false,
                buffer_start: 0,
                master_pitch: 0.0,
            },
            pool: VoicePool::new(capacity, sample_rate),
            main: Voice::new(sample_rate),
            channel_bend: array::from_fn(|_| ChangeList::new(sample_rate)),
            playing: PlayingEvents::new(),
            pending: PendingStack::new(),
            queue,
            config_rx: None,
            staged: None,
            drift: Drift::new(sample_rate),
            scale,
            sample_rate,
            buses: vec![0.0; BUS_COUNT * MAX_BLOCK_SIZE],
        };
        engine.apply_glides();
        Ok(engine)
    }

    /// Take staged configurations from a control thread.
    pub fn attach_config(&mut self, receiver: ConfigReceiver) {
        self.config_rx = Some(receiver);
    }

    /// Stage a configuration for the next buffer boundary. A later call
    /// before the boundary replaces it.
    pub fn stage_config(&mut self, config: EngineConfig) {
        self.staged = Some(config);
    }

    /// Applied configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.state.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) -> Result<(), EngineError> {
        check_sample_rate(sample_rate)?;
        self.sample_rate = sample_rate;
        self.pool.set_sample_rate(sample_rate);
        self.main.set_sample_rate(sample_rate);
        for list in &mut self.channel_bend {
            list.set_sample_rate(sample_rate);
        }
        self.drift.set_sample_rate(sample_rate);
        self.apply_glides();
        Ok(())
    }

    /// Replace the note-to-pitch mapping. Applies to later notes.
    pub fn set_scale(&mut self, scale: S) {
        self.scale = scale;
    }

    /// Move the engine clock. Events are scheduled against it.
    pub fn set_sample_time(&mut self, time: u64) {
        self.state.buffer_start = time;
    }

    /// Sample time of the next buffer.
    pub fn sample_time(&self) -> u64 {
        self.state.buffer_start
    }

    pub fn voice(&self, id: usize) -> Option<&Voice> {
        self.pool.get(id)
    }

    pub fn voice_count(&self) -> usize {
        self.pool.count()
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Notes waiting under the sounding one in unison mode.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Held notes being tracked.
    pub fn playing_len(&self) -> usize {
        self.playing.len()
    }

    /// Events waiting in the queue.
    pub fn queued_events(&self) -> usize {
        self.queue.elements_available()
    }

    /// Render one buffer of `frames` samples.
    pub fn process(&mut self, frames: usize, out: &mut SignalBuffer) {
        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| self.render_block(frames, out));
        #[cfg(not(feature = "alloc_check"))]
        self.render_block(frames, out);
    }

    fn render_block(&mut self, frames: usize, out: &mut SignalBuffer) {
        self.latch_config();

        if frames > MAX_BLOCK_SIZE {
            log::warn!("block of {} frames clamped to {}", frames, MAX_BLOCK_SIZE);
        }
        let n = frames.min(MAX_BLOCK_SIZE).min(out.frames());
        if n == 0 {
            return;
        }

        for voice in self.pool.active_mut() {
            if voice.is_active() {
                voice.age += n as u64;
            }
        }
        if self.state.config.drift > 0.0 && self.drift.advance(n) {
            let Self { pool, drift, .. } = self;
            for (id, voice) in pool.active_mut().iter_mut().enumerate() {
                voice.drift.add_change(drift.target(id), 1);
            }
        }

        self.process_events(n);
        self.write_outputs(n, out);
        self.clear_changes();
        self.state.buffer_start += n as u64;
    }

    fn process_events(&mut self, n: usize) {
        let start = self.state.buffer_start;
        let end = start + n as u64;
        while let Some(time) = self.queue.peek().map(|e| e.time) {
            if time >= end {
                break;
            }
            let Some(event) = self.queue.pop() else {
                break;
            };
            if time < start {
                log::debug!("late {:?} at {} played at buffer start {}", event.kind, time, start);
            }
            self.dispatch(&event.at(time.saturating_sub(start)));
        }
    }

    /// Apply one event stamped in buffer-local time.
    fn dispatch(&mut self, event: &Event) {
        match event.kind {
            EventKind::NoteOn => {
                if self.state.config.unison {
                    self.unison_note_on(event);
                } else {
                    self.note_on(event);
                }
            }
            EventKind::NoteOff => {
                if self.state.config.unison {
                    self.unison_note_off(event);
                } else {
                    self.note_off(event);
                }
            }
            EventKind::NoteUpdate => self.note_update(event),
            EventKind::Sustain => self.sustain(event),
            EventKind::Controller => self.controller(event),
            EventKind::PitchBend => self.pitch_bend(event),
            EventKind::NotePressure => self.note_pressure(event),
            EventKind::ChannelPressure => self.channel_pressure(event),
            EventKind::Null => {}
        }
    }

    fn note_on(&mut self, event: &Event) {
        if self.playing.insert(*event).is_none() {
            log::debug!("playing table full, dropped note {} from {}", event.value1, event.source);
            return;
        }
        let rotate = self.state.config.rotate;
        let Some(allocation) = self.pool.allocate(event.value1, rotate) else {
            self.playing.remove_source(event.source);
            return;
        };
        let scale = &self.scale;
        if let Some(voice) = self.pool.get_mut(allocation.id()) {
            match allocation {
                Allocation::Free(_) => voice.note_on(event, scale),
                Allocation::Stolen(_) => voice.steal(event, scale, true),
            }
        }
    }

    fn note_off(&mut self, event: &Event) {
        self.playing.remove_source(event.source);
        let sustain = self.state.sustain;
        for voice in self.pool.active_mut() {
            if voice.is_held_by(event.source) {
                if sustain {
                    voice.sustain();
                } else {
                    voice.note_off(event);
                }
            }
        }
    }

    fn unison_note_on(&mut self, event: &Event) {
        if self.pool.count() == 0 {
            return;
        }
        if self.playing.insert(*event).is_none() {
            log::debug!("playing table full, dropped note {} from {}", event.value1, event.source);
            return;
        }
        let sounding = self
            .pool
            .get(0)
            .filter(|v| v.state == VoiceState::On)
            .map(|v| v.current_event);
        if let Some(displaced) = sounding {
            if self.pending.push(displaced).is_err() {
                log::debug!("pending stack full, forgetting note from {}", displaced.source);
            }
            self.playing.remove_source(displaced.source);
        }
        let scale = &self.scale;
        for voice in self.pool.active_mut() {
            voice.note_on(event, scale);
        }
    }

    fn unison_note_off(&mut self, event: &Event) {
        self.playing.remove_source(event.source);
        let sounding = self
            .pool
            .get(0)
            .is_some_and(|v| v.instigator == Some(event.source));
        if !sounding {
            self.pending.remove_source(event.source);
            return;
        }
        if let Some(revived) = self.pending.pop() {
            let revived = revived.at(event.time);
            let retrigger = self.state.config.glissando;
            let scale = &self.scale;
            for voice in self.pool.active_mut() {
                voice.steal(&revived, scale, retrigger);
            }
            return;
        }
        let sustain = self.state.sustain;
        for voice in self.pool.active_mut() {
            if voice.state != VoiceState::On {
                continue;
            }
            if sustain {
                voice.sustain();
            } else {
                voice.note_off(event);
            }
        }
    }

    fn note_update(&mut self, event: &Event) {
        let scale = &self.scale;
        for voice in self.pool.active_mut() {
            if voice.is_held_by(event.source) {
                voice.note_update(event, scale);
            }
        }
    }

    fn sustain(&mut self, event: &Event) {
        self.state.sustain = event.pedal_down();
        if self.state.sustain {
            return;
        }
        for voice in self.pool.active_mut() {
            if voice.state == VoiceState::Sustain {
                let off = Event::note_off(voice.instigator.unwrap_or(0), voice.channel, event.time);
                voice.note_off(&off);
            }
        }
    }

    /// Release every sounding voice and forget held and displaced notes.
    fn all_notes_off(&mut self, event: &Event) {
        self.playing.clear();
        self.pending.clear();
        for voice in self.pool.active_mut() {
            if voice.is_active() {
                voice.note_off(event);
            }
        }
    }

    fn controller(&mut self, event: &Event) {
        let number = event.controller_number();
        let value = event.value2;
        let time = event.time as usize;
        let config = self.state.config;

        match config.protocol {
            Protocol::Conventional => match number {
                ALL_SOUND_OFF => {
                    if value == 0.0 {
                        self.clear();
                    }
                }
                ALL_NOTES_OFF => {
                    if value == 0.0 {
                        self.all_notes_off(event);
                    }
                }
                _ => {
                    let Some(slot) = config.controllers.iter().position(|&c| c == number) else {
                        return;
                    };
                    for voice in self.pool.active_mut() {
                        if let Some(list) = voice.mod_mut(slot) {
                            list.add_change(value, time);
                        }
                    }
                }
            },
            Protocol::Expressive if event.channel == MAIN_CHANNEL => match number {
                ALL_SOUND_OFF => {
                    if value == 0.0 {
                        self.clear();
                    }
                }
                ALL_NOTES_OFF => {
                    if value == 0.0 {
                        self.all_notes_off(event);
                    }
                }
                _ => expressive_mod(&mut self.main, &config, number, value, time),
            },
            Protocol::Expressive => {
                for voice in self.pool.active_mut() {
                    if voice.is_held_by(event.source) {
                        expressive_mod(voice, &config, number, value, time);
                    }
                }
            }
            Protocol::ContinuousTouch => {}
        }
    }

    fn pitch_bend(&mut self, event: &Event) {
        let bend = bend_to_octaves(event.value1, self.state.config.bend_range);
        let time = event.time as usize;
        match self.state.config.protocol {
            Protocol::Conventional => {
                for voice in self.pool.active_mut() {
                    voice.pitch_bend.add_change(bend, time);
                }
            }
            Protocol::Expressive => {
                if event.channel == MAIN_CHANNEL {
                    self.main.pitch_bend.add_change(bend, time);
                } else if let Some(list) = channel_list(&mut self.channel_bend, event.channel) {
                    list.add_change(bend, time);
                }
            }
            Protocol::ContinuousTouch => {}
        }
    }

    fn note_pressure(&mut self, event: &Event) {
        if self.state.config.protocol != Protocol::Conventional {
            return;
        }
        let time = event.time as usize;
        for voice in self.pool.active_mut() {
            if voice.instigator == Some(event.source) {
                voice.note_pressure.add_change(event.value2, time);
            }
        }
    }

    fn channel_pressure(&mut self, event: &Event) {
        let time = event.time as usize;
        let pressure = event.value1;
        match self.state.config.protocol {
            Protocol::Conventional => {
                for voice in self.pool.active_mut() {
                    voice.channel_pressure.add_change(pressure, time);
                }
            }
            Protocol::Expressive => {
                if event.channel == MAIN_CHANNEL {
                    self.main.channel_pressure.add_change(pressure, time);
                    return;
                }
                for voice in self.pool.active_mut() {
                    if voice.is_held_by(event.source) {
                        voice.channel_pressure.add_change(pressure, time);
                    }
                }
            }
            Protocol::ContinuousTouch => {}
        }
    }

    fn write_outputs(&mut self, n: usize, out: &mut SignalBuffer) {
        let config = self.state.config;
        let master_pitch = self.state.master_pitch;
        let Self {
            pool,
            main,
            channel_bend,
            buses,
            ..
        } = self;
        let (temp, shared) = buses.split_at_mut((BUS_TEMP + 1) * MAX_BLOCK_SIZE);
        let temp = &mut temp[..n];

        if config.protocol == Protocol::Expressive {
            main.pitch_bend.render(bus_mut(shared, BUS_BEND, n));
            main.channel_pressure.render(bus_mut(shared, BUS_PRESSURE, n));
            main.mod1.render(bus_mut(shared, BUS_MOD1, n));
            main.mod2.render(bus_mut(shared, BUS_MOD2, n));
            main.mod3.render(bus_mut(shared, BUS_MOD3, n));
            for (i, list) in channel_bend.iter_mut().enumerate() {
                list.render(bus_mut(shared, BUS_CHANNEL_BEND + i, n));
            }
        }
        let shared: &[f32] = shared;

        let count = pool.count();
        let voices = pool.all_mut();
        for id in 0..out.voices() {
            let voice = match voices.get_mut(id) {
                Some(voice) if id < count => voice,
                _ => {
                    out.silence_voice(id);
                    continue;
                }
            };

            let pitch = &mut out.stream_mut(id, Stream::Pitch)[..n];
            voice.pitch.render(pitch);
            match config.protocol {
                Protocol::Conventional => voice.pitch_bend.add_into(pitch),
                Protocol::Expressive => {
                    add(pitch, bus(shared, BUS_BEND, n));
                    if (2..=MAX_INPUT_CHANNELS as u8).contains(&voice.channel) {
                        let index = BUS_CHANNEL_BEND + voice.channel as usize - 1;
                        add(pitch, bus(shared, index, n));
                    }
                }
                Protocol::ContinuousTouch => {}
            }
            if config.drift > 0.0 {
                voice.drift.render(temp);
                for (p, d) in pitch.iter_mut().zip(temp.iter()) {
                    *p += d * config.drift;
                }
            }
            if master_pitch != 0.0 {
                pitch.iter_mut().for_each(|p| *p += master_pitch);
            }

            voice.gate.render(&mut out.stream_mut(id, Stream::Gate)[..n]);
            voice.velocity.render(&mut out.stream_mut(id, Stream::Velocity)[..n]);
            out.stream_mut(id, Stream::VoiceIndex)[..n].fill(id as f32);

            let after = &mut out.stream_mut(id, Stream::Aftertouch)[..n];
            match config.protocol {
                Protocol::Conventional => {
                    voice.note_pressure.render(after);
                    voice.channel_pressure.add_into(after);
                }
                Protocol::Expressive => {
                    voice.channel_pressure.render(after);
                    add(after, bus(shared, BUS_PRESSURE, n));
                }
                Protocol::ContinuousTouch => voice.amp.render(after),
            }

            let expressive = config.protocol == Protocol::Expressive;
            let mod1 = &mut out.stream_mut(id, Stream::Mod1)[..n];
            voice.mod1.render(mod1);
            if expressive {
                add(mod1, bus(shared, BUS_MOD1, n));
            }
            let mod2 = &mut out.stream_mut(id, Stream::Mod2)[..n];
            voice.mod2.render(mod2);
            if expressive {
                add(mod2, bus(shared, BUS_MOD2, n));
                if config.x_controller == DEFAULT_X_CONTROLLER {
                    bipolar(mod2);
                }
            }
            let mod3 = &mut out.stream_mut(id, Stream::Mod3)[..n];
            voice.mod3.render(mod3);
            if expressive {
                add(mod3, bus(shared, BUS_MOD3, n));
                bipolar(mod3);
            }
        }
    }

    fn clear_changes(&mut self) {
        for voice in self.pool.all_mut() {
            voice.clear_changes();
        }
        self.main.clear_changes();
        for list in &mut self.channel_bend {
            list.clear_changes();
        }
    }

    /// All sound off: forget every note and drop pressures to zero.
    /// Pitch is kept so releasing synth voices do not jump.
    pub fn clear(&mut self) {
        self.playing.clear();
        self.pending.clear();
        for voice in self.pool.all_mut() {
            voice.clear_state();
            voice.clear_changes();
            voice.zero_pressure();
        }
        self.main.clear_state();
        self.main.clear_changes();
        self.main.zero_pressure();
        for list in &mut self.channel_bend {
            list.zero();
        }
        self.pool.reset_rotation();
    }

    /// Log each active voice at debug level.
    pub fn dump_voices(&self) {
        log::debug!("voices:");
        for (id, voice) in self.pool.active().iter().enumerate() {
            let state = match voice.state {
                VoiceState::Off => "off",
                VoiceState::On => " on",
                VoiceState::Sustain => "sus",
            };
            log::debug!(
                "    {}: [i: {:?}] {} note {} age {}",
                id,
                voice.instigator,
                state,
                voice.note,
                voice.age
            );
        }
        for event in self.pending.iter() {
            log::debug!("    pending: [i: {}] note {}", event.source, event.value1);
        }
    }

    fn latch_config(&mut self) {
        if let Some(newest) = self.config_rx.as_mut().and_then(ConfigReceiver::latest) {
            self.staged = Some(newest);
        }
        if let Some(next) = self.staged.take() {
            self.apply_config(next);
        }
    }

    fn apply_config(&mut self, next: EngineConfig) {
        let prev = self.state.config;
        let mut next = next.sanitized(&prev);

        let voices = self.pool.set_count(next.voices);
        if voices != next.voices {
            log::warn!("{} voices requested, pool holds {}", next.voices, voices);
        }
        next.voices = voices;

        match master_tune_offset(next.master_tune) {
            Some(offset) => self.state.master_pitch = offset,
            None => {
                log::warn!("master tune {} Hz out of range, keeping previous", next.master_tune);
                next.master_tune = prev.master_tune;
            }
        }

        if next.drift > 0.0 && prev.drift == 0.0 {
            self.drift.reset();
        }

        self.state.config = next;
        self.apply_glides();

        if next.voices != prev.voices || next.unison != prev.unison {
            self.clear();
        }
    }

    fn apply_glides(&mut self) {
        let config = self.state.config;
        let control = config.control_glide();
        for voice in self.pool.all_mut() {
            voice.set_glides(config.glide, control, DRIFT_INTERVAL_SECONDS);
        }
        self.main.set_glides(config.glide, control, DRIFT_INTERVAL_SECONDS);
        for list in &mut self.channel_bend {
            list.set_glide_time(config.glide);
        }
    }
}

impl<S: Scale + Send> SignalProcessor for VoiceEngine<S> {
    fn info(&self) -> &ProcessorInfo {
        &INFO
    }

    fn configure(&mut self, config: EngineConfig) {
        self.stage_config(config);
    }

    fn process(&mut self, frames: usize, out: &mut SignalBuffer) {
        VoiceEngine::process(self, frames, out);
    }

    fn reset(&mut self) {
        let dropped = self.queue.flush();
        if dropped > 0 {
            log::debug!("reset dropped {} queued events", dropped);
        }
        self.clear();
        self.state.sustain = false;
        self.drift.reset();
    }
}

fn check_sample_rate(sample_rate: f32) -> Result<(), EngineError> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        log::warn!("rejected sample rate {}", sample_rate);
        Err(EngineError::InvalidSampleRate(sample_rate))
    }
}

fn expressive_mod(voice: &mut Voice, config: &EngineConfig, number: u8, value: f32, time: usize) {
    if number == config.x_controller {
        voice.mod2.add_change(value, time);
    } else if number == Y_CONTROLLER {
        voice.mod3.add_change(value, time);
    } else if number == config.controllers[0] {
        voice.mod1.add_change(value, time);
    }
}

fn channel_list(lists: &mut [ChangeList; MAX_INPUT_CHANNELS], channel: u8) -> Option<&mut ChangeList> {
    if channel == 0 {
        return None;
    }
    lists.get_mut(channel as usize - 1)
}

#[inline]
fn bus(shared: &[f32], index: usize, n: usize) -> &[f32] {
    let start = (index - BUS_TEMP - 1) * MAX_BLOCK_SIZE;
    &shared[start..start + n]
}

#[inline]
fn bus_mut(shared: &mut [f32], index: usize, n: usize) -> &mut [f32] {
    let start = (index - BUS_TEMP - 1) * MAX_BLOCK_SIZE;
    &mut shared[start..start + n]
}

#[inline]
fn add(dst: &mut [f32], src: &[f32]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}

#[inline]
fn bipolar(buf: &mut [f32]) {
    for s in buf {
        *s = *s * 2.0 - 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config_channel;
    use crate::event_queue::{event_channel, EventSender};

    const SR: f32 = 48000.0;
    const N: usize = 64;
    const BEND_UP: u16 = 16383;

    fn engine(voices: usize) -> (VoiceEngine, EventSender) {
        engine_with(EngineConfig {
            voices,
            ..EngineConfig::default()
        })
    }

    fn engine_with(config: EngineConfig) -> (VoiceEngine, EventSender) {
        let (tx, rx) = event_channel(256);
        let mut e = VoiceEngine::new(8, SR, rx).unwrap();
        e.stage_config(config);
        (e, tx)
    }

    fn run(e: &mut VoiceEngine) -> SignalBuffer {
        let mut out = SignalBuffer::new(e.capacity(), N);
        e.process(N, &mut out);
        out
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    // === Construction tests ===

    #[test]
    fn rejects_bad_sample_rate() {
        let (_, rx) = event_channel(4);
        assert!(matches!(
            VoiceEngine::new(4, 0.0, rx),
            Err(EngineError::InvalidSampleRate(_))
        ));
        let (_, rx) = event_channel(4);
        assert!(matches!(
            VoiceEngine::new(4, f32::NAN, rx),
            Err(EngineError::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn rejects_oversized_pool() {
        let (_, rx) = event_channel(4);
        assert!(matches!(
            VoiceEngine::new(MAX_VOICES + 1, SR, rx),
            Err(EngineError::InvalidCapacity(17))
        ));
    }

    #[test]
    fn set_sample_rate_keeps_prior_on_error() {
        let (mut e, _tx) = engine(1);
        assert!(e.set_sample_rate(-1.0).is_err());
        assert_eq!(e.sample_rate(), SR);
        assert!(e.set_sample_rate(44100.0).is_ok());
        assert_eq!(e.sample_rate(), 44100.0);
    }

    // === Allocation tests ===

    #[test]
    fn single_note_scenario() {
        let (mut e, mut tx) = engine(1);
        tx.push(Event::note_on(1, 1, 60.0, 0.79, 0)).unwrap();
        let out = run(&mut e);

        assert_eq!(e.voice(0).unwrap().state, VoiceState::On);
        assert!(out.stream(0, Stream::Pitch).iter().all(|&p| p == -0.75));
        assert!(out.stream(0, Stream::Gate).iter().all(|&g| g == 1.0));
        assert!(out.stream(0, Stream::Velocity).iter().all(|&v| v == 0.79));
    }

    #[test]
    fn distinct_voices_up_to_count() {
        let (mut e, mut tx) = engine(4);
        for i in 0..4 {
            tx.push(Event::note_on(i, 1, 60.0 + i as f32, 1.0, i as u64)).unwrap();
        }
        run(&mut e);
        let mut owners: Vec<_> = (0..4).map(|v| e.voice(v).unwrap().instigator).collect();
        owners.sort();
        assert_eq!(owners, vec![Some(0), Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn single_voice_second_note_steals() {
        let (mut e, mut tx) = engine(1);
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        tx.push(Event::note_on(2, 1, 72.0, 1.0, 10)).unwrap();
        run(&mut e);
        let v = e.voice(0).unwrap();
        assert_eq!(v.instigator, Some(2));
        assert_eq!(v.note, 72.0);
    }

    #[test]
    fn steal_retriggers_gate() {
        let (mut e, mut tx) = engine(1);
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        run(&mut e);
        tx.push(Event::note_on(2, 1, 62.0, 1.0, N as u64 + 4)).unwrap();
        let out = run(&mut e);
        let gate = out.stream(0, Stream::Gate);
        assert_eq!(&gate[..6], &[1.0, 1.0, 1.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn steals_oldest_sustained_voice() {
        let (mut e, mut tx) = engine(2);
        tx.push(Event::sustain(1, true, 0)).unwrap();
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 1)).unwrap();
        tx.push(Event::note_off(1, 1, 2)).unwrap();
        run(&mut e);
        tx.push(Event::note_on(2, 1, 62.0, 1.0, N as u64)).unwrap();
        tx.push(Event::note_off(2, 1, N as u64 + 1)).unwrap();
        run(&mut e);
        assert_eq!(e.voice(0).unwrap().state, VoiceState::Sustain);
        assert_eq!(e.voice(1).unwrap().state, VoiceState::Sustain);

        tx.push(Event::note_on(3, 1, 90.0, 1.0, 2 * N as u64)).unwrap();
        run(&mut e);
        assert_eq!(e.voice(0).unwrap().instigator, Some(3));
        assert_eq!(e.voice(1).unwrap().instigator, Some(2));
    }

    #[test]
    fn full_playing_table_drops_note_on() {
        let (mut e, mut tx) = engine(1);
        for i in 0..=MAX_PLAYING as u32 {
            tx.push(Event::note_on(i, 1, 60.0, 1.0, i as u64)).unwrap();
        }
        run(&mut e);
        assert_eq!(e.playing_len(), MAX_PLAYING);
        assert_eq!(e.voice(0).unwrap().instigator, Some(MAX_PLAYING as u32 - 1));
    }

    const MAX_PLAYING: usize = crate::playing::MAX_PLAYING_EVENTS;

    // === Release tests ===

    #[test]
    fn note_off_releases_matching_voice() {
        let (mut e, mut tx) = engine(2);
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        tx.push(Event::note_on(2, 1, 64.0, 1.0, 0)).unwrap();
        tx.push(Event::note_off(1, 1, 20)).unwrap();
        let out = run(&mut e);
        assert_eq!(e.voice(0).unwrap().state, VoiceState::Off);
        assert_eq!(e.voice(1).unwrap().state, VoiceState::On);
        assert_eq!(out.stream(0, Stream::Gate)[19], 1.0);
        assert_eq!(out.stream(0, Stream::Gate)[20], 0.0);
        assert_eq!(out.stream(0, Stream::Velocity)[20], 0.0);
    }

    #[test]
    fn pedal_holds_then_releases() {
        let (mut e, mut tx) = engine(1);
        tx.push(Event::sustain(1, true, 0)).unwrap();
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        tx.push(Event::note_off(1, 1, 10)).unwrap();
        let out = run(&mut e);
        assert_eq!(e.voice(0).unwrap().state, VoiceState::Sustain);
        assert!(out.stream(0, Stream::Gate).iter().all(|&g| g == 1.0));

        tx.push(Event::sustain(1, false, N as u64 + 8)).unwrap();
        let out = run(&mut e);
        assert_eq!(e.voice(0).unwrap().state, VoiceState::Off);
        assert_eq!(e.voice(0).unwrap().instigator, None);
        assert_eq!(out.stream(0, Stream::Gate)[7], 1.0);
        assert_eq!(out.stream(0, Stream::Gate)[8], 0.0);
    }

    #[test]
    fn all_notes_off_scenario() {
        let (mut e, mut tx) = engine(3);
        for i in 0..3 {
            tx.push(Event::note_on(i, 1, 60.0 + i as f32, 1.0, 0)).unwrap();
        }
        tx.push(Event::controller(0, 1, ALL_NOTES_OFF, 0.0, 10)).unwrap();
        let out = run(&mut e);
        for v in 0..3 {
            assert_eq!(e.voice(v).unwrap().state, VoiceState::Off);
            assert_eq!(out.stream(v, Stream::Gate)[N - 1], 0.0);
        }
    }

    #[test]
    fn all_notes_off_frees_playing_table() {
        let (mut e, mut tx) = engine(2);
        for i in 0..MAX_PLAYING as u32 {
            tx.push(Event::note_on(i, 1, 40.0 + i as f32, 1.0, 0)).unwrap();
        }
        tx.push(Event::controller(0, 1, ALL_NOTES_OFF, 0.0, 10)).unwrap();
        run(&mut e);
        assert_eq!(e.playing_len(), 0);

        tx.push(Event::note_on(500, 1, 60.0, 1.0, N as u64)).unwrap();
        let out = run(&mut e);
        let v = (0..2).find(|&v| e.voice(v).unwrap().is_held_by(500));
        assert!(v.is_some());
        assert_eq!(out.stream(v.unwrap(), Stream::Gate)[N - 1], 1.0);
    }

    #[test]
    fn all_notes_off_empties_unison_stack() {
        let (mut e, mut tx) = engine_with(EngineConfig {
            voices: 2,
            unison: true,
            ..EngineConfig::default()
        });
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        tx.push(Event::note_on(2, 1, 64.0, 1.0, 1)).unwrap();
        tx.push(Event::controller(0, 1, ALL_NOTES_OFF, 0.0, 2)).unwrap();
        run(&mut e);
        assert_eq!(e.pending_len(), 0);

        tx.push(Event::note_on(3, 1, 67.0, 1.0, N as u64)).unwrap();
        tx.push(Event::note_off(3, 1, N as u64 + 10)).unwrap();
        let out = run(&mut e);
        for v in 0..2 {
            let voice = e.voice(v).unwrap();
            assert_eq!(voice.state, VoiceState::Off);
            assert_eq!(voice.instigator, None);
            assert_eq!(out.stream(v, Stream::Gate)[N - 1], 0.0);
        }
    }

    #[test]
    fn all_notes_off_needs_zero_value() {
        let (mut e, mut tx) = engine(1);
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        tx.push(Event::controller(0, 1, ALL_NOTES_OFF, 1.0, 10)).unwrap();
        run(&mut e);
        assert_eq!(e.voice(0).unwrap().state, VoiceState::On);
    }

    #[test]
    fn all_sound_off_clears_everything() {
        let (mut e, mut tx) = engine(2);
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        tx.push(Event::note_on(2, 1, 64.0, 1.0, 0)).unwrap();
        run(&mut e);
        tx.push(Event::controller(0, 1, ALL_SOUND_OFF, 0.0, N as u64 + 5)).unwrap();
        let out = run(&mut e);
        assert_eq!(e.playing_len(), 0);
        for v in 0..2 {
            assert!(!e.voice(v).unwrap().is_active());
            assert_eq!(out.stream(v, Stream::Gate)[N - 1], 0.0);
        }
    }

    // === Unison tests ===

    fn unison(voices: usize) -> (VoiceEngine, EventSender) {
        engine_with(EngineConfig {
            voices,
            unison: true,
            ..EngineConfig::default()
        })
    }

    #[test]
    fn unison_plays_on_all_voices() {
        let (mut e, mut tx) = unison(4);
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        run(&mut e);
        for v in 0..4 {
            assert!(e.voice(v).unwrap().is_held_by(1));
        }
    }

    #[test]
    fn unison_revives_previous_note() {
        let (mut e, mut tx) = unison(4);
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        tx.push(Event::note_on(2, 1, 64.0, 1.0, 8)).unwrap();
        tx.push(Event::note_off(2, 1, 16)).unwrap();
        let out = run(&mut e);
        for v in 0..4 {
            let voice = e.voice(v).unwrap();
            assert_eq!(voice.note, 60.0);
            assert_eq!(voice.instigator, Some(1));
            assert_eq!(voice.state, VoiceState::On);
        }
        assert_eq!(e.pending_len(), 0);
        assert_eq!(out.stream(0, Stream::Pitch)[N - 1], -0.75);
        // no glissando: gate stays high through the revival
        assert!(out.stream(0, Stream::Gate).iter().all(|&g| g == 1.0));
    }

    #[test]
    fn unison_glissando_retriggers() {
        let (mut e, mut tx) = engine_with(EngineConfig {
            voices: 2,
            unison: true,
            glissando: true,
            ..EngineConfig::default()
        });
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        tx.push(Event::note_on(2, 1, 64.0, 1.0, 8)).unwrap();
        tx.push(Event::note_off(2, 1, 16)).unwrap();
        let out = run(&mut e);
        assert_eq!(out.stream(1, Stream::Gate)[15], 0.0);
        assert_eq!(out.stream(1, Stream::Gate)[16], 1.0);
    }

    #[test]
    fn unison_buried_release_leaves_sounding_note() {
        let (mut e, mut tx) = unison(2);
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        tx.push(Event::note_on(2, 1, 64.0, 1.0, 1)).unwrap();
        tx.push(Event::note_off(1, 1, 2)).unwrap();
        run(&mut e);
        assert_eq!(e.pending_len(), 0);
        assert!(e.voice(0).unwrap().is_held_by(2));

        tx.push(Event::note_off(2, 1, N as u64)).unwrap();
        run(&mut e);
        assert_eq!(e.voice(0).unwrap().state, VoiceState::Off);
        assert_eq!(e.voice(1).unwrap().state, VoiceState::Off);
    }

    #[test]
    fn unison_change_clears() {
        let (mut e, mut tx) = engine(2);
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        run(&mut e);
        e.stage_config(EngineConfig {
            voices: 2,
            unison: true,
            ..EngineConfig::default()
        });
        run(&mut e);
        assert!(!e.voice(0).unwrap().is_active());
    }

    // === Controller and bend tests ===

    #[test]
    fn conventional_bend_reaches_all_voices() {
        let (mut e, mut tx) = engine(2);
        tx.push(Event::pitch_bend(0, 1, BEND_UP, 0)).unwrap();
        tx.push(Event::note_on(1, 1, 69.0, 1.0, 0)).unwrap();
        let out = run(&mut e);
        assert!(close(out.stream(0, Stream::Pitch)[N - 1], 7.0 / 12.0));
        assert!(close(out.stream(1, Stream::Pitch)[N - 1], 7.0 / 12.0));
    }

    #[test]
    fn conventional_controller_binding() {
        let (mut e, mut tx) = engine(2);
        tx.push(Event::controller(0, 1, 2, 0.6, 0)).unwrap();
        tx.push(Event::controller(0, 1, 9, 0.9, 0)).unwrap();
        let out = run(&mut e);
        assert_eq!(out.stream(1, Stream::Mod2)[N - 1], 0.6);
        assert_eq!(out.stream(1, Stream::Mod1)[N - 1], 0.0);
        assert_eq!(out.stream(1, Stream::Mod3)[N - 1], 0.0);
    }

    #[test]
    fn conventional_aftertouch_sums_pressures() {
        let (mut e, mut tx) = engine(1);
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        tx.push(Event::note_pressure(1, 1, 60.0, 0.5, 0)).unwrap();
        tx.push(Event::channel_pressure(0, 1, 0.25, 0)).unwrap();
        let out = run(&mut e);
        assert!(close(out.stream(0, Stream::Aftertouch)[N - 1], 0.75));
    }

    fn expressive(voices: usize) -> (VoiceEngine, EventSender) {
        engine_with(EngineConfig {
            voices,
            protocol: Protocol::Expressive,
            ..EngineConfig::default()
        })
    }

    #[test]
    fn expressive_main_bend_scenario() {
        let (mut e, mut tx) = expressive(4);
        let up_two = tc_ir::semitones_to_bend(2.0, 7.0);
        tx.push(Event::pitch_bend(0, 1, up_two, 0)).unwrap();
        tx.push(Event::note_on(5, 2, 60.0, 1.0, 0)).unwrap();
        let out = run(&mut e);
        let v = (0..4).find(|&v| e.voice(v).unwrap().is_held_by(5)).unwrap();
        // wheel rounding
        let pitch = out.stream(v, Stream::Pitch)[N - 1];
        assert!((pitch - (-0.75 + 2.0 / 12.0)).abs() < 1e-4);
    }

    #[test]
    fn expressive_channel_bend_follows_released_voice() {
        let (mut e, mut tx) = expressive(1);
        tx.push(Event::note_on(3, 3, 69.0, 1.0, 0)).unwrap();
        tx.push(Event::pitch_bend(3, 3, BEND_UP, 0)).unwrap();
        tx.push(Event::pitch_bend(4, 4, 0, 0)).unwrap();
        tx.push(Event::note_off(3, 3, 5)).unwrap();
        let out = run(&mut e);
        assert!(close(out.stream(0, Stream::Pitch)[N - 1], 7.0 / 12.0));
    }

    #[test]
    fn expressive_pressure_adds_main_bus() {
        let (mut e, mut tx) = expressive(1);
        tx.push(Event::note_on(7, 2, 60.0, 1.0, 0)).unwrap();
        tx.push(Event::channel_pressure(0, 1, 0.25, 0)).unwrap();
        tx.push(Event::channel_pressure(7, 2, 0.5, 0)).unwrap();
        tx.push(Event::note_pressure(7, 2, 60.0, 0.9, 0)).unwrap();
        let out = run(&mut e);
        assert!(close(out.stream(0, Stream::Aftertouch)[N - 1], 0.75));
    }

    #[test]
    fn expressive_axes_are_bipolar() {
        let (mut e, mut tx) = expressive(1);
        tx.push(Event::note_on(7, 2, 60.0, 1.0, 0)).unwrap();
        tx.push(Event::controller(7, 2, 73, 0.75, 0)).unwrap();
        tx.push(Event::controller(7, 2, Y_CONTROLLER, 0.25, 0)).unwrap();
        tx.push(Event::controller(0, 1, 1, 0.5, 0)).unwrap();
        let out = run(&mut e);
        assert!(close(out.stream(0, Stream::Mod2)[N - 1], 0.5));
        assert!(close(out.stream(0, Stream::Mod3)[N - 1], -0.5));
        assert!(close(out.stream(0, Stream::Mod1)[N - 1], 0.5));
    }

    #[test]
    fn expressive_custom_x_is_not_rescaled() {
        let (mut e, mut tx) = engine_with(EngineConfig {
            voices: 1,
            protocol: Protocol::Expressive,
            x_controller: 20,
            ..EngineConfig::default()
        });
        tx.push(Event::note_on(7, 2, 60.0, 1.0, 0)).unwrap();
        tx.push(Event::controller(7, 2, 20, 0.75, 0)).unwrap();
        let out = run(&mut e);
        assert!(close(out.stream(0, Stream::Mod2)[N - 1], 0.75));
    }

    #[test]
    fn touch_aftertouch_is_amplitude() {
        let (mut e, mut tx) = engine_with(EngineConfig {
            voices: 1,
            protocol: Protocol::ContinuousTouch,
            data_rate: SR,
            ..EngineConfig::default()
        });
        tx.push(Event::touch_on(4, 60.0, 1.0, 0.5, 0.25, 0)).unwrap();
        tx.push(Event::note_update(4, 60.0, 0.7, 0.5, 0.25, 0)).unwrap();
        tx.push(Event::pitch_bend(0, 1, BEND_UP, 0)).unwrap();
        tx.push(Event::controller(0, 1, 1, 1.0, 0)).unwrap();
        let out = run(&mut e);
        assert!(close(out.stream(0, Stream::Aftertouch)[N - 1], 0.7));
        assert_eq!(out.stream(0, Stream::Pitch)[N - 1], -0.75);
        assert_eq!(out.stream(0, Stream::Mod1)[N - 1], 0.0);
    }

    // === Timing tests ===

    #[test]
    fn future_events_stay_queued() {
        let (mut e, mut tx) = engine(1);
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 100)).unwrap();
        let out = run(&mut e);
        assert_eq!(e.queued_events(), 1);
        assert!(out.stream(0, Stream::Gate).iter().all(|&g| g == 0.0));

        let out = run(&mut e);
        assert_eq!(e.queued_events(), 0);
        assert_eq!(out.stream(0, Stream::Gate)[35], 0.0);
        assert_eq!(out.stream(0, Stream::Gate)[36], 1.0);
    }

    #[test]
    fn late_events_play_at_buffer_start() {
        let (mut e, mut tx) = engine(1);
        run(&mut e);
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 10)).unwrap();
        let out = run(&mut e);
        assert!(out.stream(0, Stream::Gate).iter().all(|&g| g == 1.0));
    }

    #[test]
    fn clock_advances_and_clamps() {
        let (mut e, _tx) = engine(1);
        run(&mut e);
        assert_eq!(e.sample_time(), N as u64);
        let mut big = SignalBuffer::new(8, 2 * MAX_BLOCK_SIZE);
        e.process(2 * MAX_BLOCK_SIZE, &mut big);
        assert_eq!(e.sample_time(), (N + MAX_BLOCK_SIZE) as u64);
        e.set_sample_time(0);
        assert_eq!(e.sample_time(), 0);
    }

    #[test]
    fn age_counts_while_active() {
        let (mut e, mut tx) = engine(2);
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        run(&mut e);
        run(&mut e);
        assert_eq!(e.voice(0).unwrap().age, N as u64);
        assert_eq!(e.voice(1).unwrap().age, 0);
    }

    // === Output tests ===

    #[test]
    fn voices_beyond_count_are_zero() {
        let (mut e, mut tx) = engine(2);
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        let mut out = SignalBuffer::new(8, N);
        out.voice_mut(3).fill(5.0);
        e.process(N, &mut out);
        assert!(out.voice_mut(3).iter().all(|&s| s == 0.0));
        assert!(out.stream(1, Stream::VoiceIndex).iter().all(|&s| s == 1.0));
        assert!(out.stream(0, Stream::VoiceIndex).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn voices_beyond_pool_are_zero() {
        let (mut e, mut tx) = engine(2);
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        let mut out = SignalBuffer::new(MAX_VOICES, N);
        for v in 0..MAX_VOICES {
            out.voice_mut(v).fill(5.0);
        }
        e.process(N, &mut out);
        for v in e.capacity()..MAX_VOICES {
            assert!(out.voice_mut(v).iter().all(|&s| s == 0.0));
        }
        assert_eq!(out.stream(0, Stream::Gate)[N - 1], 1.0);
    }

    #[test]
    fn set_scale_applies_to_later_notes() {
        let (mut e, mut tx) = engine(2);
        tx.push(Event::note_on(1, 1, 81.0, 1.0, 0)).unwrap();
        run(&mut e);
        e.set_scale(EqualTemperament::new(69.0, 24.0));
        tx.push(Event::note_on(2, 1, 81.0, 1.0, N as u64)).unwrap();
        let out = run(&mut e);
        let first = (0..2).find(|&v| e.voice(v).unwrap().is_held_by(1)).unwrap();
        let second = (0..2).find(|&v| e.voice(v).unwrap().is_held_by(2)).unwrap();
        assert_eq!(out.stream(first, Stream::Pitch)[N - 1], 1.0);
        assert_eq!(out.stream(second, Stream::Pitch)[N - 1], 0.5);
    }

    #[test]
    fn master_tune_offsets_pitch() {
        let (mut e, mut tx) = engine_with(EngineConfig {
            voices: 1,
            master_tune: 880.0,
            ..EngineConfig::default()
        });
        tx.push(Event::note_on(1, 1, 69.0, 1.0, 0)).unwrap();
        let out = run(&mut e);
        assert!(close(out.stream(0, Stream::Pitch)[0], 1.0));

        e.stage_config(EngineConfig {
            voices: 1,
            master_tune: 100.0,
            ..EngineConfig::default()
        });
        let out = run(&mut e);
        assert_eq!(e.config().master_tune, 880.0);
        assert!(close(out.stream(0, Stream::Pitch)[0], 1.0));
    }

    #[test]
    fn drift_moves_voice_targets() {
        let (mut e, mut tx) = engine_with(EngineConfig {
            voices: 2,
            drift: 1.0,
            ..EngineConfig::default()
        });
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 0)).unwrap();
        run(&mut e);
        assert_ne!(e.voice(0).unwrap().drift.target(), 0.0);
        assert_ne!(e.voice(1).unwrap().drift.target(), 0.0);

        let (mut e, _tx) = engine(2);
        run(&mut e);
        assert_eq!(e.voice(0).unwrap().drift.target(), 0.0);
    }

    // === Config tests ===

    #[test]
    fn config_latches_at_buffer_boundary() {
        let (mut e, _tx) = engine(3);
        assert_eq!(e.voice_count(), 0);
        run(&mut e);
        assert_eq!(e.voice_count(), 3);
    }

    #[test]
    fn voice_count_is_clamped() {
        let (mut e, _tx) = engine(40);
        run(&mut e);
        assert_eq!(e.voice_count(), 8);
        assert_eq!(e.config().voices, 8);
    }

    #[test]
    fn config_channel_newest_wins() {
        let (mut e, _tx) = engine(1);
        let (mut ctx, crx) = config_channel();
        e.attach_config(crx);
        for voices in [2, 5] {
            ctx.send(EngineConfig {
                voices,
                ..EngineConfig::default()
            })
            .unwrap();
        }
        run(&mut e);
        assert_eq!(e.voice_count(), 5);
    }

    #[test]
    fn invalid_fields_keep_prior_values() {
        let (mut e, _tx) = engine_with(EngineConfig {
            voices: 1,
            glide: 0.01,
            ..EngineConfig::default()
        });
        run(&mut e);
        e.stage_config(EngineConfig {
            voices: 1,
            glide: f32::NAN,
            bend_range: 2.0,
            ..EngineConfig::default()
        });
        run(&mut e);
        assert_eq!(e.config().glide, 0.01);
        assert_eq!(e.config().bend_range, 2.0);
    }

    #[test]
    fn glide_smooths_pitch() {
        let (mut e, mut tx) = engine_with(EngineConfig {
            voices: 1,
            glide: 0.001,
            ..EngineConfig::default()
        });
        tx.push(Event::note_on(1, 1, 69.0, 1.0, 0)).unwrap();
        run(&mut e);
        tx.push(Event::note_update(1, 81.0, 1.0, 0.0, 0.0, N as u64)).unwrap();
        let out = run(&mut e);
        let pitch = out.stream(0, Stream::Pitch);
        assert!(pitch[0] > 0.0 && pitch[0] < 1.0);
        assert_eq!(pitch[47], 1.0);
    }

    // === Processor tests ===

    #[test]
    fn processor_reset_flushes_queue() {
        let (mut e, mut tx) = engine(1);
        tx.push(Event::note_on(1, 1, 60.0, 1.0, 1000)).unwrap();
        run(&mut e);
        SignalProcessor::reset(&mut e);
        assert_eq!(e.queued_events(), 0);
        assert_eq!(e.info().streams_per_voice, STREAMS_PER_VOICE);
    }

    #[test]
    fn processor_configure_stages() {
        let (mut e, _tx) = engine(0);
        let p: &mut dyn SignalProcessor = &mut e;
        p.configure(EngineConfig {
            voices: 2,
            ..EngineConfig::default()
        });
        let mut out = SignalBuffer::new(8, N);
        p.process(N, &mut out);
        assert_eq!(e.voice_count(), 2);
    }
}
