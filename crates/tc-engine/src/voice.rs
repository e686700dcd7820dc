//! Voice: one playable slot and its parameter change lists.

use tc_ir::{Event, Scale};

use crate::change_list::ChangeList;

/// Voice lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoiceState {
    /// Free for allocation.
    #[default]
    Off,
    /// Key held.
    On,
    /// Key released while the sustain pedal is down.
    Sustain,
}

/// A single voice producing control signals.
#[derive(Clone, Debug)]
pub struct Voice {
    /// Voice lifecycle state.
    pub state: VoiceState,
    /// Source currently owning the voice. `None` while `Off`.
    pub instigator: Option<u32>,
    /// Input channel of the owning note. Kept after release so that
    /// per-channel bend keeps following the voice.
    pub channel: u8,
    /// Current note number.
    pub note: f32,
    /// Samples since the last (re)trigger, counted to the end of the
    /// current buffer.
    pub age: u64,
    /// Touch y position at note start.
    pub start_y: f32,
    /// Event currently sounding on this voice.
    pub current_event: Event,

    pub pitch: ChangeList,
    pub pitch_bend: ChangeList,
    pub gate: ChangeList,
    pub amp: ChangeList,
    pub velocity: ChangeList,
    pub note_pressure: ChangeList,
    pub channel_pressure: ChangeList,
    pub mod1: ChangeList,
    pub mod2: ChangeList,
    pub mod3: ChangeList,
    pub drift: ChangeList,
}

impl Voice {
    /// Create an idle voice.
    pub fn new(sample_rate: f32) -> Self {
        let list = ChangeList::new(sample_rate);
        Self {
            state: VoiceState::Off,
            instigator: None,
            channel: 0,
            note: 0.0,
            age: 0,
            start_y: 0.0,
            current_event: Event::default(),
            pitch: list.clone(),
            pitch_bend: list.clone(),
            gate: list.clone(),
            amp: list.clone(),
            velocity: list.clone(),
            note_pressure: list.clone(),
            channel_pressure: list.clone(),
            mod1: list.clone(),
            mod2: list.clone(),
            mod3: list.clone(),
            drift: list,
        }
    }

    fn lists_mut(&mut self) -> [&mut ChangeList; 11] {
        [
            &mut self.pitch,
            &mut self.pitch_bend,
            &mut self.gate,
            &mut self.amp,
            &mut self.velocity,
            &mut self.note_pressure,
            &mut self.channel_pressure,
            &mut self.mod1,
            &mut self.mod2,
            &mut self.mod3,
            &mut self.drift,
        ]
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        for list in self.lists_mut() {
            list.set_sample_rate(sample_rate);
        }
    }

    /// Set glide times. Gate and velocity always step.
    pub fn set_glides(&mut self, pitch: f32, control: f32, drift: f32) {
        self.pitch.set_glide_time(pitch);
        self.pitch_bend.set_glide_time(pitch);
        self.gate.set_glide_time(0.0);
        self.velocity.set_glide_time(0.0);
        for list in [
            &mut self.amp,
            &mut self.note_pressure,
            &mut self.channel_pressure,
            &mut self.mod1,
            &mut self.mod2,
            &mut self.mod3,
        ] {
            list.set_glide_time(control);
        }
        self.drift.set_glide_time(drift);
    }

    /// Mod list by binding slot: 0, 1 or 2.
    pub fn mod_mut(&mut self, slot: usize) -> Option<&mut ChangeList> {
        match slot {
            0 => Some(&mut self.mod1),
            1 => Some(&mut self.mod2),
            2 => Some(&mut self.mod3),
            _ => None,
        }
    }

    /// Whether the voice is sounding or sustained.
    pub fn is_active(&self) -> bool {
        self.state != VoiceState::Off
    }

    /// Whether the voice is held by `source`.
    pub fn is_held_by(&self, source: u32) -> bool {
        self.state == VoiceState::On && self.instigator == Some(source)
    }

    /// Start a new note.
    pub fn note_on(&mut self, event: &Event, scale: &impl Scale) {
        let time = event.time as usize;
        self.state = VoiceState::On;
        self.note = event.value1;

        self.pitch.add_change(scale.note_to_log_pitch(self.note), time);
        self.gate.add_change(1.0, time);
        self.velocity.add_change(event.value2, time);

        self.start_y = event.value4;
        self.age = 0;
        self.instigator = Some(event.source);
        self.channel = event.channel;
        self.current_event = *event;
    }

    /// Continuous update of a held touch: pitch, z, and the x/y axes.
    pub fn note_update(&mut self, event: &Event, scale: &impl Scale) {
        let time = event.time as usize;
        self.pitch.add_change(scale.note_to_log_pitch(event.value1), time);
        self.amp.add_change(event.value2, time);

        // dy from touch start, then bipolar x and y
        self.mod1.add_change(event.value4 - self.start_y, time);
        self.mod2.add_change(event.value3 * 2.0 - 1.0, time);
        self.mod3.add_change(event.value4 * 2.0 - 1.0, time);
    }

    /// Release the note.
    pub fn note_off(&mut self, event: &Event) {
        let time = event.time as usize;
        self.state = VoiceState::Off;
        self.instigator = None;

        self.gate.add_change(0.0, time);
        self.amp.add_change(0.0, time);
        self.velocity.add_change(0.0, time);
        self.note_pressure.add_change(0.0, time);
        // keeps pressure-driven envelopes closed after release
        self.channel_pressure.add_change(0.0, time);
        self.age = 0;
        self.current_event = *event;
    }

    /// Key released with the pedal down: hold the signals.
    pub fn sustain(&mut self) {
        self.state = VoiceState::Sustain;
    }

    /// Take over this voice for a new note.
    ///
    /// With `retrigger`, gate and note pressure drop to zero for one sample
    /// before the attack so downstream envelopes see a fresh edge. An event
    /// on the first sample of the buffer attacks one sample late to make
    /// room for the drop.
    pub fn steal(&mut self, event: &Event, scale: &impl Scale, retrigger: bool) {
        let time = (event.time as usize).max(1);
        let velocity = event.value2;

        self.state = VoiceState::On;
        self.instigator = Some(event.source);
        self.channel = event.channel;
        self.note = event.value1;
        self.age = 0;
        self.pitch.add_change(scale.note_to_log_pitch(self.note), time);

        if retrigger {
            self.gate.add_change(0.0, time - 1);
            self.note_pressure.add_change(0.0, time - 1);
        }

        self.gate.add_change(1.0, time);
        self.amp.add_change(velocity, time);
        self.velocity.add_change(velocity, time);
        self.current_event = *event;
    }

    /// Forget ownership and note data. Signals are untouched.
    pub fn clear_state(&mut self) {
        self.state = VoiceState::Off;
        self.instigator = None;
        self.channel = 0;
        self.note = 0.0;
        self.age = 0;
        self.start_y = 0.0;
        self.current_event = Event::default();
    }

    /// Drop pending changes on every list.
    pub fn clear_changes(&mut self) {
        for list in self.lists_mut() {
            list.clear_changes();
        }
    }

    /// Silence gate, amplitude, velocity and pressures. Pitch is kept so a
    /// releasing synth voice does not jump.
    pub fn zero_pressure(&mut self) {
        self.gate.zero();
        self.amp.zero();
        self.velocity.zero();
        self.note_pressure.zero();
        self.channel_pressure.zero();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tc_ir::EqualTemperament;

    const SR: f32 = 48000.0;

    fn render(list: &mut ChangeList, frames: usize) -> Vec<f32> {
        let mut buf = vec![0.0; frames];
        list.render(&mut buf);
        buf
    }

    #[test]
    fn note_on_takes_ownership() {
        let scale = EqualTemperament::default();
        let mut v = Voice::new(SR);
        v.age = 500;
        v.note_on(&Event::note_on(9, 3, 60.0, 0.5, 4), &scale);

        assert_eq!(v.state, VoiceState::On);
        assert_eq!(v.instigator, Some(9));
        assert_eq!(v.channel, 3);
        assert_eq!(v.note, 60.0);
        assert_eq!(v.age, 0);
        assert!(v.is_held_by(9));
    }

    #[test]
    fn note_on_writes_signals_at_event_time() {
        let scale = EqualTemperament::default();
        let mut v = Voice::new(SR);
        v.note_on(&Event::note_on(1, 1, 69.0, 0.8, 2), &scale);

        assert_eq!(render(&mut v.gate, 4), vec![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(render(&mut v.velocity, 4), vec![0.0, 0.0, 0.8, 0.8]);
        assert_eq!(render(&mut v.pitch, 4)[3], 0.0);
    }

    #[test]
    fn note_off_clears_owner_keeps_channel() {
        let scale = EqualTemperament::default();
        let mut v = Voice::new(SR);
        v.note_on(&Event::note_on(1, 5, 60.0, 1.0, 0), &scale);
        v.note_off(&Event::note_off(1, 5, 2));

        assert_eq!(v.state, VoiceState::Off);
        assert_eq!(v.instigator, None);
        assert_eq!(v.channel, 5);
        assert!(!v.is_held_by(1));
        assert_eq!(render(&mut v.gate, 4), vec![1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn sustain_holds_signals() {
        let scale = EqualTemperament::default();
        let mut v = Voice::new(SR);
        v.note_on(&Event::note_on(1, 1, 60.0, 1.0, 0), &scale);
        render(&mut v.gate, 4);
        v.sustain();

        assert_eq!(v.state, VoiceState::Sustain);
        assert_eq!(v.instigator, Some(1));
        assert_eq!(render(&mut v.gate, 4), vec![1.0; 4]);
    }

    #[test]
    fn steal_with_retrigger_drops_gate_for_one_sample() {
        let scale = EqualTemperament::default();
        let mut v = Voice::new(SR);
        v.note_on(&Event::note_on(1, 1, 60.0, 1.0, 0), &scale);
        render(&mut v.gate, 8);

        v.steal(&Event::note_on(2, 1, 64.0, 0.5, 4), &scale, true);
        assert_eq!(v.instigator, Some(2));
        assert_eq!(
            render(&mut v.gate, 8),
            vec![1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0]
        );
        assert_eq!(render(&mut v.amp, 8)[4], 0.5);
    }

    #[test]
    fn steal_at_time_zero_makes_room() {
        let scale = EqualTemperament::default();
        let mut v = Voice::new(SR);
        v.note_on(&Event::note_on(1, 1, 60.0, 1.0, 0), &scale);
        render(&mut v.gate, 4);

        v.steal(&Event::note_on(2, 1, 62.0, 1.0, 0), &scale, true);
        assert_eq!(render(&mut v.gate, 4), vec![0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn steal_without_retrigger_keeps_gate_high() {
        let scale = EqualTemperament::default();
        let mut v = Voice::new(SR);
        v.note_on(&Event::note_on(1, 1, 60.0, 1.0, 0), &scale);
        render(&mut v.gate, 4);

        v.steal(&Event::note_on(2, 1, 62.0, 1.0, 2), &scale, false);
        assert_eq!(render(&mut v.gate, 4), vec![1.0; 4]);
    }

    #[test]
    fn note_update_maps_touch_axes() {
        let scale = EqualTemperament::default();
        let mut v = Voice::new(SR);
        v.note_on(&Event::touch_on(4, 60.0, 1.0, 0.5, 0.25, 0), &scale);
        v.note_update(&Event::note_update(4, 60.5, 0.7, 0.75, 0.5, 0), &scale);

        assert_eq!(render(&mut v.amp, 1)[0], 0.7);
        assert_eq!(render(&mut v.mod1, 1)[0], 0.25);
        assert_eq!(render(&mut v.mod2, 1)[0], 0.5);
        assert_eq!(render(&mut v.mod3, 1)[0], 0.0);
        assert_eq!(v.instigator, Some(4));
    }

    #[test]
    fn zero_pressure_keeps_pitch() {
        let scale = EqualTemperament::default();
        let mut v = Voice::new(SR);
        v.note_on(&Event::note_on(1, 1, 81.0, 1.0, 0), &scale);
        render(&mut v.pitch, 1);
        render(&mut v.gate, 1);
        v.zero_pressure();

        assert_eq!(v.pitch.value(), 1.0);
        assert_eq!(v.gate.value(), 0.0);
    }

    #[test]
    fn set_glides_leaves_gate_stepping() {
        let mut v = Voice::new(1000.0);
        v.set_glides(0.01, 0.001, 10.0);
        assert_eq!(v.pitch.glide_samples(), 10);
        assert_eq!(v.pitch_bend.glide_samples(), 10);
        assert_eq!(v.gate.glide_samples(), 0);
        assert_eq!(v.velocity.glide_samples(), 0);
        assert_eq!(v.mod3.glide_samples(), 1);
        assert_eq!(v.drift.glide_samples(), 10000);
        assert!(v.mod_mut(3).is_none());
    }

    #[test]
    fn clear_state_frees_voice() {
        let scale = EqualTemperament::default();
        let mut v = Voice::new(SR);
        v.note_on(&Event::note_on(1, 2, 60.0, 1.0, 0), &scale);
        v.clear_state();
        assert_eq!(v.state, VoiceState::Off);
        assert_eq!(v.instigator, None);
        assert!(!v.is_active());
    }
}
