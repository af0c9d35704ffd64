//! Error type for cue and mixer operations.

/// Error type for cue and mixer operations.
#[derive(Debug)]
pub enum CueError {
    /// Control call targeted an instance sitting in the availability pool
    InactiveInstance { instance: usize },
    /// Position-mutating call on a playing instance
    InstancePlaying { instance: usize },
    /// `open` on an already-open cue
    AlreadyOpen,
    /// `close` on an already-closed cue
    AlreadyClosed,
    /// `start` on an already-running mixer
    AlreadyRunning,
    /// `stop` on an already-stopped mixer
    AlreadyStopped,
    /// Could not obtain the output line
    SinkUnavailable(String),
    /// PCM buffer does not describe whole stereo frames
    InvalidPcm(String),
    /// Out-of-range configuration value
    InvalidParameter(String),
    /// Byte buffer is not exactly twice the float buffer
    LengthMismatch { expected: usize, actual: usize },
}

impl std::fmt::Display for CueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CueError::InactiveInstance { instance } => {
                write!(f, "instance {} is not active", instance)
            }
            CueError::InstancePlaying { instance } => {
                write!(f, "instance {} is playing", instance)
            }
            CueError::AlreadyOpen => write!(f, "already open"),
            CueError::AlreadyClosed => write!(f, "already closed"),
            CueError::AlreadyRunning => write!(f, "mixer is already running"),
            CueError::AlreadyStopped => write!(f, "mixer is already stopped"),
            CueError::SinkUnavailable(msg) => write!(f, "audio line unavailable: {}", msg),
            CueError::InvalidPcm(msg) => write!(f, "invalid PCM data: {}", msg),
            CueError::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
            CueError::LengthMismatch { expected, actual } => write!(
                f,
                "destination must be exactly twice the source length ({} bytes, got {})",
                expected, actual
            ),
        }
    }
}

impl std::error::Error for CueError {}
