//! Silent sink for offline rendering and tests.

use crate::sink::{AudioSink, SinkError, SinkFactory};

/// A sink that accepts and counts writes, returning immediately.
#[derive(Debug, Default)]
pub struct NullSink {
    started: bool,
    bytes_written: u64,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes accepted so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// A [`SinkFactory`] producing null sinks, for driving players and
    /// mixers without an audio device.
    pub fn factory() -> SinkFactory {
        Box::new(|_format, _byte_buffer_size| Ok(Box::new(NullSink::new()) as Box<dyn AudioSink>))
    }
}

impl AudioSink for NullSink {
    fn start(&mut self) -> Result<(), SinkError> {
        self.started = true;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, SinkError> {
        if !self.started {
            return Err(SinkError::Playback("line not started".into()));
        }
        self.bytes_written += bytes.len() as u64;
        Ok(bytes.len())
    }

    fn drain(&mut self) {}

    fn close(&mut self) {
        self.started = false;
    }
}
