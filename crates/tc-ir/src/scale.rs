//! Note-number to log-pitch mapping.

/// Maps note numbers to pitch in octaves.
///
/// Log pitch 0.0 is A440 and each unit is one octave. Fractional notes
/// come from continuous-touch surfaces and must be accepted.
pub trait Scale {
    fn note_to_log_pitch(&self, note: f32) -> f32;
}

/// Twelve-tone equal temperament.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EqualTemperament {
    /// Note number that maps to log pitch 0.0.
    pub reference_note: f32,
    /// Notes per octave.
    pub divisions: f32,
}

impl EqualTemperament {
    pub const fn new(reference_note: f32, divisions: f32) -> Self {
        Self {
            reference_note,
            divisions,
        }
    }
}

impl Default for EqualTemperament {
    fn default() -> Self {
        Self::new(69.0, 12.0)
    }
}

impl Scale for EqualTemperament {
    fn note_to_log_pitch(&self, note: f32) -> f32 {
        (note - self.reference_note) / self.divisions
    }
}

impl<S: Scale + ?Sized> Scale for &S {
    fn note_to_log_pitch(&self, note: f32) -> f32 {
        (**self).note_to_log_pitch(note)
    }
}
