//! Mixer: sums multiple tracks onto one output line.
//!
//! Tracks are staged with `add_track`/`remove_track` and promoted to
//! the audio thread's working set by `update_tracks`, which swaps in a
//! fresh snapshot and raises a dirty flag. The audio thread adopts the
//! newest snapshot at the top of its next iteration; a late or
//! duplicate adoption is harmless, a missed one is not, so the flag is
//! cleared with a swap before the snapshot is read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use cb_audio::{default_sink_factory, AudioSink, SinkFactory, SinkFormat};

use crate::cue::{MAX_THREAD_PRIORITY, MIN_THREAD_PRIORITY};
use crate::error::CueError;
use crate::functions::pcm_to_audio_bytes;
use crate::player;

/// Frames per mixer iteration, unless overridden.
pub const DEFAULT_MIXER_BUFFER_FRAMES: usize = 8192;

/// Error type a track may report from `read_track`.
pub type TrackError = Box<dyn std::error::Error + Send + Sync>;

/// A source of interleaved stereo sample buffers that a mixer can pull
/// from. Cues implement this; so can anything else that renders audio.
pub trait AudioMixerTrack: Send + Sync {
    /// Whether the track currently contributes to the mix. Non-running
    /// tracks are skipped, a mute in effect.
    fn is_track_running(&self) -> bool;

    /// Fill `out` (interleaved stereo, `out.len() / 2` frames) with the
    /// track's next buffer. Implementations overwrite the whole slice.
    /// An error skips this track for the iteration; the mix continues.
    fn read_track(&self, out: &mut [f32]) -> Result<(), TrackError>;
}

/// Options for a mixer.
pub struct MixerConfig {
    /// Frames summed per iteration.
    pub buffer_frames: usize,
    /// Audio thread priority, in `[1, 10]`.
    pub thread_priority: u32,
    /// Sink constructor; `None` uses the system output line.
    pub sink_factory: Option<SinkFactory>,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            buffer_frames: DEFAULT_MIXER_BUFFER_FRAMES,
            thread_priority: MAX_THREAD_PRIORITY,
            sink_factory: None,
        }
    }
}

/// Handle to a mixer. Cheap to clone; all clones share the track list.
#[derive(Clone)]
pub struct AudioMixer {
    shared: Arc<MixerState>,
}

struct MixerState {
    buffer_frames: usize,
    thread_priority: u32,
    sink_factory: SinkFactory,
    staging: Mutex<Vec<Arc<dyn AudioMixerTrack>>>,
    snapshot: Mutex<Arc<[Arc<dyn AudioMixerTrack>]>>,
    snapshot_dirty: AtomicBool,
    running: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Compare two track handles by allocation identity.
fn same_track(a: &Arc<dyn AudioMixerTrack>, b: &Arc<dyn AudioMixerTrack>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl AudioMixer {
    /// A mixer with default buffer size and priority on the system
    /// output line.
    pub fn new() -> AudioMixer {
        Self::with_config(MixerConfig::default()).expect("default mixer configuration is valid")
    }

    /// A mixer with explicit options.
    pub fn with_config(config: MixerConfig) -> Result<AudioMixer, CueError> {
        if config.buffer_frames == 0 {
            return Err(CueError::InvalidParameter(
                "buffer_frames must be at least 1".into(),
            ));
        }
        if !(MIN_THREAD_PRIORITY..=MAX_THREAD_PRIORITY).contains(&config.thread_priority) {
            return Err(CueError::InvalidParameter(format!(
                "thread priority {} outside [{}, {}]",
                config.thread_priority, MIN_THREAD_PRIORITY, MAX_THREAD_PRIORITY
            )));
        }
        Ok(AudioMixer {
            shared: Arc::new(MixerState {
                buffer_frames: config.buffer_frames,
                thread_priority: config.thread_priority,
                sink_factory: config.sink_factory.unwrap_or_else(default_sink_factory),
                staging: Mutex::new(Vec::new()),
                snapshot: Mutex::new(Arc::from(Vec::new())),
                snapshot_dirty: AtomicBool::new(false),
                running: AtomicBool::new(false),
                thread: Mutex::new(None),
            }),
        })
    }

    pub fn buffer_frames(&self) -> usize {
        self.shared.buffer_frames
    }

    pub fn thread_priority(&self) -> u32 {
        self.shared.thread_priority
    }

    /// Number of staged tracks.
    pub fn track_count(&self) -> usize {
        self.shared.lock_staging().len()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
    }

    /// Stage a track for mixing. Takes effect at the next
    /// [`update_tracks`](Self::update_tracks) (or at `start`).
    pub fn add_track(&self, track: Arc<dyn AudioMixerTrack>) {
        self.shared.lock_staging().push(track);
    }

    /// Stage a track for removal. Takes effect at the next
    /// [`update_tracks`](Self::update_tracks).
    pub fn remove_track(&self, track: &Arc<dyn AudioMixerTrack>) {
        self.shared
            .lock_staging()
            .retain(|t| !same_track(t, track));
    }

    /// Publish the staged track list to the audio thread, which adopts
    /// it at its next iteration.
    pub fn update_tracks(&self) {
        let staged = self.shared.lock_staging().clone();
        *self.shared.lock_snapshot() = Arc::from(staged);
        self.shared.snapshot_dirty.store(true, Ordering::Relaxed);
    }

    /// Acquire the output line, seed the track snapshot, and start the
    /// mixing thread.
    pub fn start(&self) -> Result<(), CueError> {
        if self.shared.running.swap(true, Ordering::Relaxed) {
            return Err(CueError::AlreadyRunning);
        }
        self.update_tracks();

        let frames = self.shared.buffer_frames;
        let sink_shared = self.shared.clone();
        let make_sink = move || (sink_shared.sink_factory)(SinkFormat::CD_STEREO, frames * 4);

        let shared = self.shared.clone();
        let body = move |sink: &mut dyn AudioSink| -> bool {
            let mut tracks: Arc<[Arc<dyn AudioMixerTrack>]> = Arc::from(Vec::new());
            let mut mix_buffer = vec![0.0f32; frames * 2];
            let mut track_buffer = vec![0.0f32; frames * 2];
            let mut audio_bytes = vec![0u8; frames * 4];

            while shared.running.load(Ordering::Relaxed) {
                if shared.snapshot_dirty.swap(false, Ordering::Relaxed) {
                    tracks = shared.lock_snapshot().clone();
                }

                mix_tracks(&tracks, &mut mix_buffer, &mut track_buffer);

                pcm_to_audio_bytes(&mut audio_bytes, &mix_buffer)
                    .expect("byte buffer is sized to the mix buffer");
                if let Err(e) = sink.write(&audio_bytes) {
                    log::error!("audio line write failed: {}", e);
                    return false;
                }
            }
            true
        };

        match player::launch("cue-mixer".into(), make_sink, body) {
            Ok(handle) => {
                *self.shared.lock_thread() = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Stop the mixing thread after its current iteration, draining and
    /// releasing the output line.
    pub fn stop(&self) -> Result<(), CueError> {
        if !self.shared.running.swap(false, Ordering::Relaxed) {
            return Err(CueError::AlreadyStopped);
        }
        if let Some(handle) = self.shared.lock_thread().take() {
            // A track may stop the mixer from the audio thread itself;
            // joining there would deadlock.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        Ok(())
    }
}

impl Default for AudioMixer {
    fn default() -> Self {
        Self::new()
    }
}

impl MixerState {
    fn lock_staging(&self) -> MutexGuard<'_, Vec<Arc<dyn AudioMixerTrack>>> {
        self.staging.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_snapshot(&self) -> MutexGuard<'_, Arc<[Arc<dyn AudioMixerTrack>]>> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_thread(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.thread.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One mixer iteration's summing stage: zero `mix_buffer`, add every
/// running track's output, then clamp the sum to `[-1, 1]`. A track
/// error is logged and contributes silence for the iteration.
fn mix_tracks(
    tracks: &[Arc<dyn AudioMixerTrack>],
    mix_buffer: &mut [f32],
    track_buffer: &mut [f32],
) {
    mix_buffer.fill(0.0);
    for track in tracks {
        if !track.is_track_running() {
            continue;
        }
        match track.read_track(track_buffer) {
            Ok(()) => {
                for i in 0..mix_buffer.len() {
                    mix_buffer[i] += track_buffer[i];
                }
            }
            Err(e) => log::error!("mixer track read failed: {}", e),
        }
    }
    for v in mix_buffer.iter_mut() {
        *v = v.clamp(-1.0, 1.0);
    }
}
