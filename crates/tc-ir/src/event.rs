//! Performance events consumed by the voice engine.

/// What a performance event does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Start a note.
    NoteOn,
    /// Release a note.
    NoteOff,
    /// Continuous update of a held note (pitch, z, x, y).
    NoteUpdate,
    /// Sustain pedal change.
    Sustain,
    /// Continuous controller change.
    Controller,
    /// Pitch wheel change.
    PitchBend,
    /// Polyphonic (per-note) pressure.
    NotePressure,
    /// Channel-wide pressure.
    ChannelPressure,
    /// No-op.
    #[default]
    Null,
}

/// A timestamped performance event.
///
/// `source` identifies the gesture (a key, a touch) and stays stable from
/// the note-on to its note-off. The meaning of `value1..value4` depends on
/// `kind`; use the named constructors rather than filling them by hand.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    /// Originating gesture.
    pub source: u32,
    /// Input channel, 1-based. Channel 1 is the expressive main channel.
    pub channel: u8,
    /// Sample time on the engine clock.
    pub time: u64,
    pub value1: f32,
    pub value2: f32,
    pub value3: f32,
    pub value4: f32,
}

impl Event {
    /// Create an event with an empty payload.
    pub const fn new(kind: EventKind, source: u32, channel: u8, time: u64) -> Self {
        Self {
            kind,
            source,
            channel,
            time,
            value1: 0.0,
            value2: 0.0,
            value3: 0.0,
            value4: 0.0,
        }
    }

    /// Note-on with note number and velocity (0..1).
    pub fn note_on(source: u32, channel: u8, note: f32, velocity: f32, time: u64) -> Self {
        let mut e = Self::new(EventKind::NoteOn, source, channel, time);
        e.value1 = note;
        e.value2 = velocity;
        e
    }

    /// Touch-start note-on carrying the initial x/y position.
    pub fn touch_on(source: u32, note: f32, velocity: f32, x: f32, y: f32, time: u64) -> Self {
        let mut e = Self::note_on(source, 1, note, velocity, time);
        e.value3 = x;
        e.value4 = y;
        e
    }

    pub fn note_off(source: u32, channel: u8, time: u64) -> Self {
        Self::new(EventKind::NoteOff, source, channel, time)
    }

    /// Continuous update of a held touch: pitch, z, x and y.
    pub fn note_update(source: u32, note: f32, z: f32, x: f32, y: f32, time: u64) -> Self {
        let mut e = Self::new(EventKind::NoteUpdate, source, 1, time);
        e.value1 = note;
        e.value2 = z;
        e.value3 = x;
        e.value4 = y;
        e
    }

    pub fn sustain(channel: u8, down: bool, time: u64) -> Self {
        let mut e = Self::new(EventKind::Sustain, 0, channel, time);
        e.value1 = if down { 1.0 } else { 0.0 };
        e
    }

    /// Controller change. `value` is normalized to 0..1.
    pub fn controller(source: u32, channel: u8, number: u8, value: f32, time: u64) -> Self {
        let mut e = Self::new(EventKind::Controller, source, channel, time);
        e.value1 = number as f32;
        e.value2 = value;
        e
    }

    /// Pitch wheel change with the raw 14-bit wheel position.
    pub fn pitch_bend(source: u32, channel: u8, raw: u16, time: u64) -> Self {
        let mut e = Self::new(EventKind::PitchBend, source, channel, time);
        e.value1 = raw as f32;
        e
    }

    pub fn note_pressure(source: u32, channel: u8, note: f32, pressure: f32, time: u64) -> Self {
        let mut e = Self::new(EventKind::NotePressure, source, channel, time);
        e.value1 = note;
        e.value2 = pressure;
        e
    }

    pub fn channel_pressure(source: u32, channel: u8, pressure: f32, time: u64) -> Self {
        let mut e = Self::new(EventKind::ChannelPressure, source, channel, time);
        e.value1 = pressure;
        e
    }

    /// Copy of this event moved to another time.
    pub fn at(mut self, time: u64) -> Self {
        self.time = time;
        self
    }

    /// Controller number of a `Controller` event.
    pub fn controller_number(&self) -> u8 {
        self.value1 as u8
    }

    /// Whether a `Sustain` event presses the pedal.
    pub fn pedal_down(&self) -> bool {
        self.value1 > 0.5
    }
}
