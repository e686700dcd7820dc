//! Sample-accurate parameter automation.
//!
//! A `ChangeList` collects sparse `(value, offset)` changes during event
//! dispatch and renders them into a dense per-sample signal, gliding
//! linearly from the current value to each new target.

use arrayvec::ArrayVec;

/// Pending changes a list can hold per buffer.
pub const MAX_CHANGES: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Change {
    value: f32,
    offset: usize,
}

/// Sparse-to-dense renderer for one control parameter.
#[derive(Clone, Debug)]
pub struct ChangeList {
    changes: ArrayVec<Change, MAX_CHANGES>,
    sample_rate: f32,
    glide_seconds: f32,
    glide_samples: u32,
    /// Last rendered value.
    value: f32,
    /// Value the glide is heading to.
    target: f32,
    step: f32,
    remaining: u32,
}

impl ChangeList {
    /// Create a list at rest on 0.0 with no glide.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            changes: ArrayVec::new(),
            sample_rate,
            glide_seconds: 0.0,
            glide_samples: 0,
            value: 0.0,
            target: 0.0,
            step: 0.0,
            remaining: 0,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_glide_samples();
    }

    /// Set the time taken to reach each new target. Zero means a step.
    pub fn set_glide_time(&mut self, seconds: f32) {
        self.glide_seconds = seconds.max(0.0);
        self.update_glide_samples();
    }

    fn update_glide_samples(&mut self) {
        let samples = libm::roundf(self.glide_seconds * self.sample_rate);
        self.glide_samples = if samples.is_finite() && samples > 0.0 {
            samples as u32
        } else {
            0
        };
    }

    /// Glide time in samples.
    pub fn glide_samples(&self) -> u32 {
        self.glide_samples
    }

    /// Schedule `value` to become the target at `offset` samples into the
    /// next rendered buffer.
    ///
    /// Offsets must not decrease. A change at the same offset as the last
    /// pending one replaces it; an earlier offset is moved up to the last
    /// one. When the list is full the last entry is overwritten so the
    /// final value always lands.
    pub fn add_change(&mut self, value: f32, offset: usize) {
        if let Some(last) = self.changes.last_mut() {
            if offset <= last.offset {
                last.value = value;
                return;
            }
        }
        let change = Change { value, offset };
        if let Err(err) = self.changes.try_push(change) {
            if let Some(last) = self.changes.last_mut() {
                *last = err.element();
            }
        }
    }

    /// Render into `out`, overwriting it. Consumes all pending changes.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.changes.is_empty() && self.remaining == 0 {
            out.fill(self.value);
            return;
        }
        self.render_with(out, |sample, value| *sample = value);
    }

    /// Render into `out`, adding to what is already there. Consumes all
    /// pending changes.
    pub fn add_into(&mut self, out: &mut [f32]) {
        if self.changes.is_empty() && self.remaining == 0 {
            let v = self.value;
            if v != 0.0 {
                out.iter_mut().for_each(|s| *s += v);
            }
            return;
        }
        self.render_with(out, |sample, value| *sample += value);
    }

    #[inline]
    fn render_with(&mut self, out: &mut [f32], write: impl Fn(&mut f32, f32)) {
        let last_index = out.len().saturating_sub(1);
        let mut next = 0;
        for (i, sample) in out.iter_mut().enumerate() {
            while let Some(change) = self.changes.get(next) {
                if change.offset.min(last_index) > i {
                    break;
                }
                self.retarget(change.value);
                next += 1;
            }
            self.tick();
            write(sample, self.value);
        }
        self.changes.clear();
    }

    fn retarget(&mut self, target: f32) {
        self.target = target;
        if self.glide_samples == 0 {
            self.value = target;
            self.remaining = 0;
        } else {
            self.step = (target - self.value) / self.glide_samples as f32;
            self.remaining = self.glide_samples;
        }
    }

    #[inline]
    fn tick(&mut self) {
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.value = self.target;
            } else {
                self.value += self.step;
            }
        }
    }

    /// Drop pending changes, keeping the current value and any glide in
    /// progress.
    pub fn clear_changes(&mut self) {
        self.changes.clear();
    }

    /// Jump to zero with nothing pending.
    pub fn zero(&mut self) {
        self.reset_to(0.0);
    }

    /// Jump to `value` with nothing pending.
    pub fn reset_to(&mut self, value: f32) {
        self.changes.clear();
        self.value = value;
        self.target = value;
        self.step = 0.0;
        self.remaining = 0;
    }

    /// Last rendered value.
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Value the list is heading to, ignoring pending changes.
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Number of changes waiting for the next render.
    pub fn pending(&self) -> usize {
        self.changes.len()
    }
}
