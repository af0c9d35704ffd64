//! Output sink trait and error types.

use crate::cpal_sink::CpalSink;

/// Stream format of an output line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SinkFormat {
    /// Frames per second.
    pub sample_rate: u32,
    /// Interleaved channels per frame.
    pub channels: u16,
    /// Bits per sample (signed, little-endian).
    pub bits_per_sample: u16,
}

impl SinkFormat {
    /// "CD quality": 44100 Hz, stereo, signed 16-bit little-endian.
    pub const CD_STEREO: SinkFormat = SinkFormat {
        sample_rate: 44100,
        channels: 2,
        bits_per_sample: 16,
    };

    /// Bytes per interleaved frame.
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }
}

/// Error type for sink operations.
#[derive(Debug)]
pub enum SinkError {
    /// No audio device available
    NoDevice,
    /// Failed to initialize audio device
    DeviceInit(String),
    /// Failed to create audio stream
    StreamCreate(String),
    /// Playback error
    Playback(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::NoDevice => write!(f, "No audio device available"),
            SinkError::DeviceInit(msg) => write!(f, "Device init error: {}", msg),
            SinkError::StreamCreate(msg) => write!(f, "Stream create error: {}", msg),
            SinkError::Playback(msg) => write!(f, "Playback error: {}", msg),
        }
    }
}

impl std::error::Error for SinkError {}

/// An output line accepting packed PCM bytes.
///
/// `write` blocks until all bytes are accepted, bounded by the sink's
/// internal buffer. Sinks are created and driven on a single thread and
/// need not be `Send`.
pub trait AudioSink {
    /// Start the line; `write` may be called afterwards.
    fn start(&mut self) -> Result<(), SinkError>;

    /// Write packed bytes, blocking until all are accepted.
    /// Returns the number of bytes written.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, SinkError>;

    /// Block until previously written data has been played out.
    fn drain(&mut self);

    /// Release the line. Further writes are discarded.
    fn close(&mut self);
}

/// Constructs a sink for a given format and byte buffer size.
///
/// Factories run on the audio thread itself, so the sink they build does
/// not have to be `Send` (cpal streams are not).
pub type SinkFactory =
    Box<dyn Fn(SinkFormat, usize) -> Result<Box<dyn AudioSink>, SinkError> + Send + Sync>;

/// Factory for the default system output line.
pub fn default_sink_factory() -> SinkFactory {
    Box::new(|format, byte_buffer_size| {
        CpalSink::open(format, byte_buffer_size).map(|s| Box::new(s) as Box<dyn AudioSink>)
    })
}
