//! WAV loading for cuebox.
//!
//! Loads "CD quality" WAV files (44100 Hz, 16-bit, stereo,
//! little-endian PCM) into the normalized interleaved float form the
//! engine consumes.

mod wav;

pub use wav::{load_wav, load_wav_file};

/// Error type for audio file loading.
#[derive(Debug)]
pub enum FormatError {
    /// Not a WAV file, or not 44100 Hz / 16-bit / stereo PCM
    Unsupported(String),
    /// Unexpected end of file
    UnexpectedEof,
    /// I/O error
    Io(String),
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatError::Unsupported(msg) => write!(f, "unsupported audio file: {}", msg),
            FormatError::UnexpectedEof => write!(f, "unexpected end of file"),
            FormatError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for FormatError {}

impl From<std::io::Error> for FormatError {
    fn from(e: std::io::Error) -> Self {
        FormatError::Io(e.to_string())
    }
}
