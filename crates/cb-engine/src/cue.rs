//! The cue: an in-memory stereo audio asset with a fixed pool of
//! concurrently playing instances.
//!
//! A cue owns normalized interleaved stereo PCM and `polyphony` cursor
//! slots. Instances are claimed from an availability pool, controlled
//! through the slot index, and mixed into a single buffer per pass.
//! Output runs either on the cue's own player thread or through an
//! [`AudioMixer`](crate::mixer::AudioMixer).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};

use cb_audio::{default_sink_factory, AudioSink, SinkFactory, SinkFormat};

use crate::cursor::{CursorSlot, PAN_STEPS, SPEED_STEPS, VOLUME_STEPS};
use crate::error::CueError;
use crate::event::{wall_ms, AudioCueListener, CueHandle, InstanceEvent, InstanceEventKind, ListenerList};
use crate::functions::{pcm_to_audio_bytes, PanType, VolType};
use crate::mixer::{AudioMixer, AudioMixerTrack, TrackError};
use crate::player;

/// Frames per second of the sole supported format.
pub const FRAME_RATE: u32 = 44100;
/// Frames per standalone-player iteration, unless overridden.
pub const DEFAULT_BUFFER_FRAMES: usize = 1024;
/// Slowest supported playback speed (1/8th of recorded speed).
pub const SPEED_MIN: f32 = 0.125;
/// Fastest supported playback speed (8 times recorded speed).
pub const SPEED_MAX: f32 = 8.0;
/// Lowest accepted audio thread priority.
pub const MIN_THREAD_PRIORITY: u32 = 1;
/// Highest accepted audio thread priority.
pub const MAX_THREAD_PRIORITY: u32 = 10;

/// Per-cue curve selection, fixed at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CueConfig {
    pub pan_type: PanType,
    pub vol_type: VolType,
}

/// Options for a cue's own player thread.
pub struct PlayerConfig {
    /// Frames mixed per iteration.
    pub buffer_frames: usize,
    /// Audio thread priority, in `[1, 10]`. Recorded and reported in
    /// the opened event; the thread spends nearly all its time blocked
    /// on the sink.
    pub thread_priority: u32,
    /// Sink constructor; `None` uses the system output line.
    pub sink_factory: Option<SinkFactory>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            thread_priority: MAX_THREAD_PRIORITY,
            sink_factory: None,
        }
    }
}

/// Handle to a cue. Cheap to clone; all clones control the same pool.
#[derive(Clone)]
pub struct AudioCue {
    shared: Arc<CueState>,
}

pub(crate) struct CueState {
    pcm: Vec<f32>,
    frame_count: usize,
    polyphony: usize,
    name: String,
    pan_type: PanType,
    vol_type: VolType,
    cursors: Box<[CursorSlot]>,
    /// Available instance ids. Released ids go to the front; obtain
    /// pops from the back, so a fresh cue hands out 0, 1, 2, …
    pool: Mutex<VecDeque<usize>>,
    listeners: ListenerList,
    player_running: AtomicBool,
    player_thread: Mutex<Option<JoinHandle<()>>>,
    mixer: Mutex<Option<AudioMixer>>,
    weak_self: Weak<CueState>,
}

impl AudioCue {
    /// Build a cue from interleaved stereo PCM normalized to `[-1, 1]`,
    /// with default pan and volume curves.
    pub fn make_stereo_cue(
        pcm: Vec<f32>,
        name: impl Into<String>,
        polyphony: usize,
    ) -> Result<AudioCue, CueError> {
        Self::make_stereo_cue_with(pcm, name, polyphony, CueConfig::default())
    }

    /// Build a cue with explicit curve selection.
    pub fn make_stereo_cue_with(
        pcm: Vec<f32>,
        name: impl Into<String>,
        polyphony: usize,
        config: CueConfig,
    ) -> Result<AudioCue, CueError> {
        if pcm.is_empty() {
            return Err(CueError::InvalidPcm("PCM data is empty".into()));
        }
        if pcm.len() % 2 != 0 {
            return Err(CueError::InvalidPcm(format!(
                "length {} is not a whole number of stereo frames",
                pcm.len()
            )));
        }
        if polyphony < 1 {
            return Err(CueError::InvalidParameter(
                "polyphony must be at least 1".into(),
            ));
        }

        let frame_count = pcm.len() / 2;
        let cursors: Box<[CursorSlot]> = (0..polyphony).map(|_| CursorSlot::new()).collect();
        let mut pool = VecDeque::with_capacity(polyphony);
        for id in 0..polyphony {
            pool.push_front(id);
        }

        let shared = Arc::new_cyclic(|weak| CueState {
            pcm,
            frame_count,
            polyphony,
            name: name.into(),
            pan_type: config.pan_type,
            vol_type: config.vol_type,
            cursors,
            pool: Mutex::new(pool),
            listeners: ListenerList::new(),
            player_running: AtomicBool::new(false),
            player_thread: Mutex::new(None),
            mixer: Mutex::new(None),
            weak_self: weak.clone(),
        });

        Ok(AudioCue { shared })
    }

    pub(crate) fn from_shared(shared: Arc<CueState>) -> AudioCue {
        AudioCue { shared }
    }

    // === Accessors ===

    /// Display label given at construction.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Maximum number of simultaneously live instances.
    pub fn polyphony(&self) -> usize {
        self.shared.polyphony
    }

    /// Media length in stereo frames.
    pub fn frame_length(&self) -> usize {
        self.shared.frame_count
    }

    /// Media length in microseconds.
    pub fn microsecond_length(&self) -> u64 {
        (self.shared.frame_count as u64 * 1_000_000) / FRAME_RATE as u64
    }

    /// A fresh copy of the PCM data.
    pub fn pcm_copy(&self) -> Vec<f32> {
        self.shared.pcm.clone()
    }

    /// Whether playback resources are allocated (player or mixer).
    pub fn is_open(&self) -> bool {
        self.shared.player_running.load(Ordering::Relaxed)
    }

    /// Whether the instance is claimed from the pool. Out-of-range ids
    /// report `false`.
    pub fn is_active(&self, instance: usize) -> bool {
        self.shared
            .cursors
            .get(instance)
            .is_some_and(|s| s.active.load(Ordering::Relaxed))
    }

    /// Whether the instance is currently advancing.
    pub fn is_playing(&self, instance: usize) -> bool {
        self.shared
            .cursors
            .get(instance)
            .is_some_and(|s| s.playing.load(Ordering::Relaxed))
    }

    // === Listeners ===

    pub fn add_listener(&self, listener: Arc<dyn AudioCueListener>) {
        self.shared.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn AudioCueListener>) {
        self.shared.listeners.remove(listener);
    }

    // === Instance lifecycle ===

    /// Claim an instance from the availability pool, or `None` if all
    /// are in use. A claimed instance does not recycle on its own; pair
    /// with [`release_instance`](Self::release_instance), or set
    /// [`set_recycle_when_done`](Self::set_recycle_when_done).
    pub fn obtain_instance(&self) -> Option<usize> {
        let id = self.shared.lock_pool().pop_back()?;
        let slot = &self.shared.cursors[id];
        slot.active.store(true, Ordering::Relaxed);
        slot.recycle_when_done.store(false, Ordering::Relaxed);
        self.shared
            .broadcast_instance(InstanceEventKind::ObtainInstance, id, 0.0);
        Some(id)
    }

    /// Reset an instance to defaults and return it to the pool.
    pub fn release_instance(&self, instance: usize) -> Result<(), CueError> {
        let slot = self.slot(instance)?;
        slot.reset();
        self.shared.lock_pool().push_front(instance);
        self.shared
            .broadcast_instance(InstanceEventKind::ReleaseInstance, instance, 0.0);
        Ok(())
    }

    /// Fire-and-forget play at full volume, center pan, normal speed.
    /// The instance recycles into the pool when it finishes.
    pub fn play(&self) -> Option<usize> {
        self.play_with(1.0, 0.0, 1.0, 0)
    }

    /// Play with explicit volume, pan, speed, and loop count
    /// (`loops = -1` repeats indefinitely). Returns the instance id, or
    /// `None` if the pool is empty.
    pub fn play_with(&self, volume: f32, pan: f32, speed: f32, loops: i32) -> Option<usize> {
        let id = self.obtain_instance()?;
        let slot = &self.shared.cursors[id];
        slot.new_target_volume.store(volume.clamp(0.0, 1.0));
        slot.new_target_pan.store(pan.clamp(-1.0, 1.0));
        slot.new_target_speed.store(speed.clamp(SPEED_MIN, SPEED_MAX));
        slot.loop_remaining.store(loops.max(-1), Ordering::Relaxed);
        slot.recycle_when_done.store(true, Ordering::Relaxed);
        // start() latches the targets into the live registers.
        match self.start(id) {
            Ok(()) => Some(id),
            Err(_) => None,
        }
    }

    /// Start an instance from its current position. The requested
    /// volume, pan, and speed are committed with no ramp.
    pub fn start(&self, instance: usize) -> Result<(), CueError> {
        let slot = self.slot(instance)?;
        if slot.playing.load(Ordering::Relaxed) {
            return Err(CueError::InstancePlaying { instance });
        }
        let frame = {
            let mut st = slot.lock_state();
            st.volume.snap(slot.new_target_volume.load());
            st.pan.snap(slot.new_target_pan.load());
            st.speed.snap(slot.new_target_speed.load());
            st.cursor
        };
        slot.playing.store(true, Ordering::Relaxed);
        self.shared
            .broadcast_instance(InstanceEventKind::StartInstance, instance, frame);
        Ok(())
    }

    /// Pause an instance, leaving its cursor in place. The instance
    /// stays claimable until explicitly released.
    pub fn stop(&self, instance: usize) -> Result<(), CueError> {
        let slot = self.slot(instance)?;
        slot.playing.store(false, Ordering::Relaxed);
        let frame = slot.lock_state().cursor;
        self.shared
            .broadcast_instance(InstanceEventKind::StopInstance, instance, frame);
        slot.recycle_when_done.store(false, Ordering::Relaxed);
        Ok(())
    }

    // === Smoothed parameters ===

    /// Request a volume in `[0, 1]`. While playing, the audible value
    /// ramps over [`VOLUME_STEPS`] samples; stopped instances take the
    /// value immediately.
    pub fn set_volume(&self, instance: usize, volume: f32) -> Result<(), CueError> {
        let slot = self.slot(instance)?;
        let volume = volume.clamp(0.0, 1.0);
        slot.new_target_volume.store(volume);
        if !slot.playing.load(Ordering::Relaxed) {
            slot.lock_state().volume.snap(volume);
        }
        Ok(())
    }

    /// Request a pan in `[-1, 1]` (full left to full right); ramps over
    /// [`PAN_STEPS`] samples while playing.
    pub fn set_pan(&self, instance: usize, pan: f32) -> Result<(), CueError> {
        let slot = self.slot(instance)?;
        let pan = pan.clamp(-1.0, 1.0);
        slot.new_target_pan.store(pan);
        if !slot.playing.load(Ordering::Relaxed) {
            slot.lock_state().pan.snap(pan);
        }
        Ok(())
    }

    /// Request a playback speed in `[1/8, 8]`; ramps over
    /// [`SPEED_STEPS`] samples while playing.
    pub fn set_speed(&self, instance: usize, speed: f32) -> Result<(), CueError> {
        let slot = self.slot(instance)?;
        let speed = speed.clamp(SPEED_MIN, SPEED_MAX);
        slot.new_target_speed.store(speed);
        if !slot.playing.load(Ordering::Relaxed) {
            slot.lock_state().speed.snap(speed);
        }
        Ok(())
    }

    /// The most recently requested volume.
    pub fn get_volume(&self, instance: usize) -> Result<f32, CueError> {
        Ok(self.slot(instance)?.new_target_volume.load())
    }

    /// The most recently requested pan.
    pub fn get_pan(&self, instance: usize) -> Result<f32, CueError> {
        Ok(self.slot(instance)?.new_target_pan.load())
    }

    /// The most recently requested speed.
    pub fn get_speed(&self, instance: usize) -> Result<f32, CueError> {
        Ok(self.slot(instance)?.new_target_speed.load())
    }

    // === Position ===

    /// Move the play head of a stopped instance to a (possibly
    /// fractional) frame, clamped into the cue.
    pub fn set_frame_position(&self, instance: usize, frame: f64) -> Result<(), CueError> {
        let slot = self.stopped_slot(instance)?;
        slot.lock_state().cursor = frame.clamp(0.0, self.last_frame());
        Ok(())
    }

    /// Move the play head to the frame at `microseconds` into the cue.
    pub fn set_microsecond_position(
        &self,
        instance: usize,
        microseconds: u64,
    ) -> Result<(), CueError> {
        let slot = self.stopped_slot(instance)?;
        let frame = (FRAME_RATE as f64 * microseconds as f64) / 1_000_000.0;
        slot.lock_state().cursor = frame.clamp(0.0, self.last_frame());
        Ok(())
    }

    /// Move the play head to a fraction `[0, 1]` of the cue length.
    pub fn set_fractional_position(&self, instance: usize, normal: f64) -> Result<(), CueError> {
        let slot = self.stopped_slot(instance)?;
        let frame = normal.clamp(0.0, 1.0) * self.shared.frame_count as f64;
        slot.lock_state().cursor = frame.clamp(0.0, self.last_frame());
        Ok(())
    }

    /// Current play head position in frames (possibly fractional).
    pub fn get_frame_position(&self, instance: usize) -> Result<f64, CueError> {
        Ok(self.slot(instance)?.lock_state().cursor)
    }

    // === Looping / recycling ===

    /// Number of additional plays after the current one; `-1` loops
    /// indefinitely.
    pub fn set_looping(&self, instance: usize, loops: i32) -> Result<(), CueError> {
        let slot = self.slot(instance)?;
        slot.loop_remaining.store(loops.max(-1), Ordering::Relaxed);
        Ok(())
    }

    /// Whether the instance returns to the pool on natural end.
    pub fn set_recycle_when_done(&self, instance: usize, recycle: bool) -> Result<(), CueError> {
        let slot = self.slot(instance)?;
        slot.recycle_when_done.store(recycle, Ordering::Relaxed);
        Ok(())
    }

    // === Playback resources ===

    /// Spawn the cue's own player thread on the system output line with
    /// default buffer size and priority.
    pub fn open(&self) -> Result<(), CueError> {
        self.open_with(PlayerConfig::default())
    }

    /// Spawn the cue's own player thread with explicit options.
    pub fn open_with(&self, config: PlayerConfig) -> Result<(), CueError> {
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
        if self.shared.player_running.swap(true, Ordering::Relaxed) {
            return Err(CueError::AlreadyOpen);
        }

        let factory = config.sink_factory.unwrap_or_else(default_sink_factory);
        let frames = config.buffer_frames;
        let make_sink = move || factory(SinkFormat::CD_STEREO, frames * 4);

        let shared = self.shared.clone();
        let body = move |sink: &mut dyn AudioSink| -> bool {
            let mut read_buffer = vec![0.0f32; frames * 2];
            let mut audio_bytes = vec![0u8; frames * 4];
            while shared.player_running.load(Ordering::Relaxed) {
                shared.fill_buffer(&mut read_buffer);
                pcm_to_audio_bytes(&mut audio_bytes, &read_buffer)
                    .expect("byte buffer is sized to the read buffer");
                if let Err(e) = sink.write(&audio_bytes) {
                    log::error!("audio line write failed: {}", e);
                    return false;
                }
            }
            true
        };

        match player::launch(format!("cue-player-{}", self.shared.name), make_sink, body) {
            Ok(handle) => {
                *self.shared.lock_player_thread() = Some(handle);
                self.shared
                    .broadcast_opened(config.thread_priority, frames);
                Ok(())
            }
            Err(e) => {
                self.shared.player_running.store(false, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Register with a mixer instead of spawning a player thread. The
    /// mixer's buffer size and thread priority apply.
    pub fn open_mixer(&self, mixer: &AudioMixer) -> Result<(), CueError> {
        if self.shared.player_running.swap(true, Ordering::Relaxed) {
            return Err(CueError::AlreadyOpen);
        }
        *self.shared.lock_mixer() = Some(mixer.clone());
        mixer.add_track(self.as_track());
        mixer.update_tracks();
        self.shared
            .broadcast_opened(mixer.thread_priority(), mixer.buffer_frames());
        Ok(())
    }

    /// Release playback resources: stop the player thread at its next
    /// iteration (draining the line), or deregister from the mixer.
    pub fn close(&self) -> Result<(), CueError> {
        if !self.shared.player_running.swap(false, Ordering::Relaxed) {
            return Err(CueError::AlreadyClosed);
        }
        if let Some(mixer) = self.shared.lock_mixer().take() {
            mixer.remove_track(&self.as_track());
            mixer.update_tracks();
        }
        if let Some(handle) = self.shared.lock_player_thread().take() {
            // A listener may close the cue from the player thread
            // itself; joining there would deadlock.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        self.shared.broadcast_closed();
        Ok(())
    }

    /// Mix one buffer of all playing instances into `out` (interleaved
    /// stereo, `out.len() / 2` frames). The sum is not clamped.
    pub fn read_track(&self, out: &mut [f32]) {
        self.shared.fill_buffer(out);
    }

    /// This cue as a mixer track. Every call returns a handle to the
    /// same underlying track, so add/remove round-trips.
    pub fn as_track(&self) -> Arc<dyn AudioMixerTrack> {
        self.shared.clone()
    }

    // === Helpers ===

    fn last_frame(&self) -> f64 {
        (self.shared.frame_count - 1) as f64
    }

    fn slot(&self, instance: usize) -> Result<&CursorSlot, CueError> {
        let slot = self
            .shared
            .cursors
            .get(instance)
            .ok_or(CueError::InactiveInstance { instance })?;
        if !slot.active.load(Ordering::Relaxed) {
            return Err(CueError::InactiveInstance { instance });
        }
        Ok(slot)
    }

    fn stopped_slot(&self, instance: usize) -> Result<&CursorSlot, CueError> {
        let slot = self.slot(instance)?;
        if slot.playing.load(Ordering::Relaxed) {
            return Err(CueError::InstancePlaying { instance });
        }
        Ok(slot)
    }
}

impl CueState {
    fn lock_pool(&self) -> MutexGuard<'_, VecDeque<usize>> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_mixer(&self) -> MutexGuard<'_, Option<AudioMixer>> {
        self.mixer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_player_thread(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.player_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self) -> CueHandle {
        CueHandle {
            inner: self.weak_self.clone(),
        }
    }

    fn broadcast_instance(&self, kind: InstanceEventKind, instance_id: usize, frame: f64) {
        let listeners = self.listeners.snapshot();
        if listeners.is_empty() {
            return;
        }
        let event = InstanceEvent {
            kind,
            wall_ms: wall_ms(),
            cue: self.handle(),
            instance_id,
            frame,
        };
        for listener in listeners.iter() {
            listener.instance_event(&event);
        }
    }

    fn broadcast_opened(&self, thread_priority: u32, buffer_frames: usize) {
        let listeners = self.listeners.snapshot();
        let now = wall_ms();
        for listener in listeners.iter() {
            listener.cue_opened(now, thread_priority, buffer_frames, self.handle());
        }
    }

    fn broadcast_closed(&self) {
        let listeners = self.listeners.snapshot();
        let now = wall_ms();
        for listener in listeners.iter() {
            listener.cue_closed(now, self.handle());
        }
    }

    /// Stereo sample at a fractional frame position, linearly
    /// interpolated. Any cursor in `[0, frame_count]` reads safely; at
    /// the edges the last frame interpolates against itself.
    fn read_frame(&self, cursor: f64) -> (f32, f32) {
        let last = self.frame_count - 1;
        let base = (cursor as usize).min(last);
        let t = (cursor - base as f64) as f32;
        let i = base * 2;
        if t == 0.0 {
            return (self.pcm[i], self.pcm[i + 1]);
        }
        let j = (base + 1).min(last) * 2;
        (
            self.pcm[i] * (1.0 - t) + self.pcm[j] * t,
            self.pcm[i + 1] * (1.0 - t) + self.pcm[j + 1] * t,
        )
    }

    /// Zero `out`, then sum every playing instance into it.
    ///
    /// Runs on the audio thread. Each instance's cursor state is copied
    /// out for the pass and written back afterwards, so no lock is held
    /// while mixing or while listeners run; an instance released
    /// concurrently is detected at write-back and left alone.
    pub(crate) fn fill_buffer(&self, out: &mut [f32]) {
        out.fill(0.0);
        let frames = out.len() / 2;
        let end = (self.frame_count - 1) as f64;

        for (id, slot) in self.cursors.iter().enumerate() {
            if !slot.playing.load(Ordering::Relaxed) {
                continue;
            }

            let mut st = *slot.lock_state();

            let mut vol_gain = self.vol_type.apply(st.volume.current);
            let mut pan_left = self.pan_type.left(st.pan.current);
            let mut pan_right = self.pan_type.right(st.pan.current);

            let mut released = false;
            for k in 0..frames {
                if st.volume.update(slot.new_target_volume.load(), VOLUME_STEPS) {
                    vol_gain = self.vol_type.apply(st.volume.current);
                }
                if st.pan.update(slot.new_target_pan.load(), PAN_STEPS) {
                    pan_left = self.pan_type.left(st.pan.current);
                    pan_right = self.pan_type.right(st.pan.current);
                }
                st.speed.update(slot.new_target_speed.load(), SPEED_STEPS);

                let (left, right) = self.read_frame(st.cursor);
                out[k * 2] += left * vol_gain * pan_left;
                out[k * 2 + 1] += right * vol_gain * pan_right;

                st.cursor += st.speed.current as f64;

                if st.cursor > end {
                    let loops = slot.loop_remaining.load(Ordering::Relaxed);
                    if loops != 0 {
                        if loops > 0 {
                            slot.loop_remaining.store(loops - 1, Ordering::Relaxed);
                        }
                        st.cursor = 0.0;
                        self.broadcast_instance(InstanceEventKind::Loop, id, 0.0);
                    } else {
                        // Natural end: pin the cursor at the end of the
                        // cue. Remaining buffer positions keep their
                        // already-summed values.
                        st.cursor = self.frame_count as f64;
                        slot.playing.store(false, Ordering::Relaxed);
                        self.broadcast_instance(InstanceEventKind::StopInstance, id, st.cursor);
                        if slot.recycle_when_done.load(Ordering::Relaxed) {
                            slot.reset();
                            self.lock_pool().push_front(id);
                            self.broadcast_instance(InstanceEventKind::ReleaseInstance, id, 0.0);
                            released = true;
                        }
                        break;
                    }
                }
            }

            if !released && slot.active.load(Ordering::Relaxed) {
                *slot.lock_state() = st;
            }
        }
    }
}

impl AudioMixerTrack for CueState {
    fn is_track_running(&self) -> bool {
        self.player_running.load(Ordering::Relaxed)
    }

    fn read_track(&self, out: &mut [f32]) -> Result<(), TrackError> {
        self.fill_buffer(out);
        Ok(())
    }
}
