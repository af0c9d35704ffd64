//! cuebox: an in-memory, low-latency polyphonic audio cue engine for
//! stereo 16-bit / 44.1 kHz PCM.
//!
//! Load a clip once, trigger it many times concurrently: each triggered
//! playback is an independent *instance* with its own cursor, volume,
//! pan, speed, and loop state, all adjustable in real time with
//! click-free smoothing. Instances mix into a single stream; several
//! cues can share one output line through an [`AudioMixer`].
//!
//! ```no_run
//! use cuebox::AudioCue;
//!
//! let pcm = cuebox::load_wav_file("bell.wav")?;
//! let cue = AudioCue::make_stereo_cue(pcm, "bell", 4)?;
//! cue.open()?;
//! let _ = cue.play();
//! let _ = cue.play_with(0.5, -0.8, 1.5, 0); // quieter, left, faster
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use cb_audio::{
    default_sink_factory, AudioSink, CpalSink, NullSink, SinkError, SinkFactory, SinkFormat,
};
pub use cb_engine::{
    pcm_to_audio_bytes, AudioCue, AudioCueListener, AudioMixer, AudioMixerTrack, CueConfig,
    CueError, CueHandle, InstanceEvent, InstanceEventKind, MixerConfig, PanType, PlayerConfig,
    TrackError, VolType, DEFAULT_BUFFER_FRAMES, DEFAULT_MIXER_BUFFER_FRAMES, FRAME_RATE,
    MAX_THREAD_PRIORITY, MIN_THREAD_PRIORITY, PAN_STEPS, SPEED_MAX, SPEED_MIN, SPEED_STEPS,
    VOLUME_STEPS,
};
pub use cb_formats::{load_wav, load_wav_file, FormatError};
