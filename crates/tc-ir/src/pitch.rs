//! Pitch arithmetic shared by the engine and its controllers.
//!
//! All pitches are in octaves relative to A440 (see [`crate::Scale`]).

/// Raw pitch wheel value at rest.
pub const BEND_CENTER: f32 = 8192.0;

/// Raw pitch wheel distance from center to either end.
pub const BEND_HALF_RANGE: f32 = 8191.0;

/// Reference frequency for the master tune offset.
pub const A440: f32 = 440.0;

/// Lowest accepted master tune in Hz.
pub const MASTER_TUNE_MIN: f32 = 220.0;

/// Highest accepted master tune in Hz.
pub const MASTER_TUNE_MAX: f32 = 880.0;

/// Convert a raw 14-bit wheel value to a pitch offset in octaves.
///
/// `range` is the bend range in semitones at full deflection.
pub fn bend_to_octaves(raw: f32, range: f32) -> f32 {
    let u = (raw - BEND_CENTER) / BEND_HALF_RANGE;
    u * range / 12.0
}

/// Raw wheel value producing `semitones` of bend at the given range.
///
/// Inverse of [`bend_to_octaves`], rounded to the nearest wheel step and
/// clamped to the 14-bit range.
pub fn semitones_to_bend(semitones: f32, range: f32) -> u16 {
    if range == 0.0 {
        return BEND_CENTER as u16;
    }
    let raw = BEND_CENTER + semitones / range * BEND_HALF_RANGE;
    libm::roundf(raw).clamp(0.0, 16383.0) as u16
}

/// Pitch offset for a master tune frequency, or `None` when the frequency
/// is outside the accepted range.
pub fn master_tune_offset(tune_hz: f32) -> Option<f32> {
    if (MASTER_TUNE_MIN..=MASTER_TUNE_MAX).contains(&tune_hz) {
        Some(libm::log2f(tune_hz / A440))
    } else {
        None
    }
}
