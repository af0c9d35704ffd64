//! Polyphonic cue playback engine.
//!
//! An [`AudioCue`] holds a stereo asset in memory and mixes up to
//! `polyphony` concurrent instances of it, each with an independent
//! cursor and smoothed volume/pan/speed controls. Cues play on their
//! own audio thread or through an [`AudioMixer`] that sums several cues
//! onto one output line.

mod cue;
mod cursor;
mod error;
mod event;
mod functions;
mod mixer;
mod player;

pub use cue::{
    AudioCue, CueConfig, PlayerConfig, DEFAULT_BUFFER_FRAMES, FRAME_RATE, MAX_THREAD_PRIORITY,
    MIN_THREAD_PRIORITY, SPEED_MAX, SPEED_MIN,
};
pub use cursor::{PAN_STEPS, SPEED_STEPS, VOLUME_STEPS};
pub use error::CueError;
pub use event::{AudioCueListener, CueHandle, InstanceEvent, InstanceEventKind};
pub use functions::{pcm_to_audio_bytes, PanType, VolType};
pub use mixer::{
    AudioMixer, AudioMixerTrack, MixerConfig, TrackError, DEFAULT_MIXER_BUFFER_FRAMES,
};
