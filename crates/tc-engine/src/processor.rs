//! SignalProcessor trait for nodes driven once per audio buffer.

use tc_ir::SignalBuffer;

use crate::config::EngineConfig;

/// Static metadata about a processor.
pub struct ProcessorInfo {
    pub name: &'static str,
    pub short_name: &'static str,
    /// Output planes written per voice.
    pub streams_per_voice: usize,
}

/// A node the host calls once per buffer.
pub trait SignalProcessor: Send {
    fn info(&self) -> &ProcessorInfo;
    /// Stage a configuration to take effect at the next buffer boundary.
    fn configure(&mut self, config: EngineConfig);
    /// Render `frames` samples into `out`.
    fn process(&mut self, frames: usize, out: &mut SignalBuffer);
    /// Drop queued input and return to silence.
    fn reset(&mut self);
}
