//! VoicePool: fixed voice storage, allocation and stealing.

use alloc::vec::Vec;

use crate::voice::{Voice, VoiceState};

/// Index of a voice in the pool.
pub type VoiceId = usize;

/// Note distance larger than any two notes can be apart.
const MAX_NOTE_DISTANCE: f32 = 128.0;

/// Where a new note landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Allocation {
    /// The voice was off.
    Free(VoiceId),
    /// The voice was taken from a sounding or sustained note.
    Stolen(VoiceId),
}

impl Allocation {
    pub fn id(self) -> VoiceId {
        match self {
            Allocation::Free(id) | Allocation::Stolen(id) => id,
        }
    }
}

/// Pre-sized pool of voices. Only the first `count` voices take part in
/// allocation and rendering.
pub struct VoicePool {
    voices: Vec<Voice>,
    count: usize,
    rotate_offset: usize,
}

impl VoicePool {
    /// Create a pool of `capacity` idle voices with none active.
    pub fn new(capacity: usize, sample_rate: f32) -> Self {
        Self {
            voices: (0..capacity).map(|_| Voice::new(sample_rate)).collect(),
            count: 0,
            rotate_offset: 0,
        }
    }

    /// Voices allocated up front.
    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    /// Voices taking part in allocation.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Set the active count, clamped to the capacity. Returns the applied
    /// count.
    pub fn set_count(&mut self, count: usize) -> usize {
        self.count = count.min(self.voices.len());
        self.count
    }

    /// The active voices.
    pub fn active(&self) -> &[Voice] {
        &self.voices[..self.count]
    }

    pub fn active_mut(&mut self) -> &mut [Voice] {
        &mut self.voices[..self.count]
    }

    /// Every voice, active or not.
    pub fn all_mut(&mut self) -> &mut [Voice] {
        &mut self.voices
    }

    pub fn get(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.get(id)
    }

    pub fn get_mut(&mut self, id: VoiceId) -> Option<&mut Voice> {
        self.voices.get_mut(id)
    }

    /// Restart round-robin allocation from voice 0.
    pub fn reset_rotation(&mut self) {
        self.rotate_offset = 0;
    }

    /// First `Off` voice, searching from the rotating offset when `rotate`
    /// is set. Moves the offset on success.
    pub fn find_free_voice(&mut self, rotate: bool) -> Option<VoiceId> {
        let len = self.count;
        for v in 0..len {
            let id = if rotate {
                (v + self.rotate_offset) % len
            } else {
                v
            };
            if self.voices[id].state == VoiceState::Off {
                self.rotate_offset = self.rotate_offset.wrapping_add(1);
                return Some(id);
            }
        }
        None
    }

    /// Sustained voice with the greatest age. Ties go to the lowest index.
    pub fn find_oldest_sustained(&self) -> Option<VoiceId> {
        let mut found = None;
        let mut max_age = 0;
        for (id, voice) in self.active().iter().enumerate() {
            if voice.state != VoiceState::Sustain {
                continue;
            }
            if found.is_none() || voice.age > max_age {
                max_age = voice.age;
                found = Some(id);
            }
        }
        found
    }

    /// Voice whose note is nearest `note`. Ties go to the lowest index.
    /// Always returns a valid index into a non-empty pool.
    pub fn find_nearest(&self, note: f32) -> VoiceId {
        let mut found = 0;
        let mut min_dist = MAX_NOTE_DISTANCE;
        for (id, voice) in self.active().iter().enumerate() {
            let dist = (note - voice.note).abs();
            if dist < min_dist {
                min_dist = dist;
                found = id;
            }
        }
        found
    }

    /// Pick a voice for `note`: a free one, else the oldest sustained one,
    /// else the one playing the nearest note. `None` only when no voices
    /// are active.
    pub fn allocate(&mut self, note: f32, rotate: bool) -> Option<Allocation> {
        if self.count == 0 {
            return None;
        }
        if let Some(id) = self.find_free_voice(rotate) {
            return Some(Allocation::Free(id));
        }
        let id = self
            .find_oldest_sustained()
            .unwrap_or_else(|| self.find_nearest(note));
        Some(Allocation::Stolen(id))
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        for voice in &mut self.voices {
            voice.set_sample_rate(sample_rate);
        }
    }
}
