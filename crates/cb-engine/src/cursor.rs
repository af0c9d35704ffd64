//! Per-instance playback state: flags, fractional cursor, and the
//! smoothed-parameter registers that prevent zipper noise.
//!
//! Each instance slot splits its fields by owner. Single-word fields
//! written by the control thread and read by the audio thread are
//! atomics with relaxed ordering; the change protocol detects edges via
//! `new_target != target` inside the audio thread, so no ordering
//! between distinct fields is needed. The cursor and the smoothing
//! registers belong to the audio thread and sit behind a mutex that is
//! held only long enough to copy the state out or write it back.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Samples over which a volume change is spread.
pub const VOLUME_STEPS: u32 = 1024;
/// Samples over which a pan change is spread.
pub const PAN_STEPS: u32 = 1024;
/// Samples over which a speed change is spread.
pub const SPEED_STEPS: u32 = 4096;

/// An `f32` stored in an `AtomicU32` via its bit pattern.
pub(crate) struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Registers for one smoothed parameter.
///
/// The audible value is `current`; a requested change ramps it toward
/// `target` over a fixed number of per-sample steps, snapping exactly
/// onto the target at the end.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Smoothed {
    pub current: f32,
    pub target: f32,
    pub increment: f32,
    pub steps_remaining: u32,
}

impl Smoothed {
    /// A register set at rest on `value` (no ramp pending).
    pub fn at(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            increment: 0.0,
            steps_remaining: 0,
        }
    }

    /// Per-sample update: latch a newly requested target, then advance
    /// any pending ramp by one step. Returns whether `current` changed.
    ///
    /// Latching on `new_target != target` means the most recent request
    /// always wins; a burst of requests collapses into a single ramp
    /// from wherever `current` happens to be.
    pub fn update(&mut self, new_target: f32, steps: u32) -> bool {
        if new_target != self.target {
            self.target = new_target;
            self.steps_remaining = steps;
            self.increment = (new_target - self.current) / steps as f32;
        }
        if self.steps_remaining > 0 {
            self.steps_remaining -= 1;
            self.current += self.increment;
            if self.steps_remaining == 0 {
                self.current = self.target;
            }
            true
        } else {
            false
        }
    }

    /// Commit a value with no ramp: `current = target = value`.
    pub fn snap(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.increment = 0.0;
        self.steps_remaining = 0;
    }
}

/// Audio-thread-owned playback state of one instance.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CursorState {
    /// Fractional frame position, in `[0, frame_count]`.
    pub cursor: f64,
    pub volume: Smoothed,
    pub pan: Smoothed,
    pub speed: Smoothed,
}

impl CursorState {
    pub fn reset(&mut self) {
        self.cursor = 0.0;
        self.volume = Smoothed::at(0.0);
        self.pan = Smoothed::at(0.0);
        self.speed = Smoothed::at(1.0);
    }
}

impl Default for CursorState {
    fn default() -> Self {
        Self {
            cursor: 0.0,
            volume: Smoothed::at(0.0),
            pan: Smoothed::at(0.0),
            speed: Smoothed::at(1.0),
        }
    }
}

/// One instance slot. The slot index is the instance id.
pub(crate) struct CursorSlot {
    /// In use (claimed from the pool) vs. available.
    pub active: AtomicBool,
    /// Currently advancing through the cue.
    pub playing: AtomicBool,
    /// Return to the pool on natural end.
    pub recycle_when_done: AtomicBool,
    /// Additional plays remaining; -1 loops forever.
    pub loop_remaining: AtomicI32,
    pub new_target_volume: AtomicF32,
    pub new_target_pan: AtomicF32,
    pub new_target_speed: AtomicF32,
    pub state: Mutex<CursorState>,
}

impl CursorSlot {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            recycle_when_done: AtomicBool::new(false),
            loop_remaining: AtomicI32::new(0),
            new_target_volume: AtomicF32::new(0.0),
            new_target_pan: AtomicF32::new(0.0),
            new_target_speed: AtomicF32::new(1.0),
            state: Mutex::new(CursorState::default()),
        }
    }

    /// Lock the audio-owned state, recovering from poisoning.
    pub fn lock_state(&self) -> MutexGuard<'_, CursorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear settings from the previous play and restore defaults.
    pub fn reset(&self) {
        self.active.store(false, Ordering::Relaxed);
        self.playing.store(false, Ordering::Relaxed);
        self.recycle_when_done.store(false, Ordering::Relaxed);
        self.loop_remaining.store(0, Ordering::Relaxed);
        self.new_target_volume.store(0.0);
        self.new_target_pan.store(0.0);
        self.new_target_speed.store(1.0);
        self.lock_state().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_f32_round_trips() {
        let a = AtomicF32::new(0.125);
        assert_eq!(a.load(), 0.125);
        a.store(-1.5);
        assert_eq!(a.load(), -1.5);
    }

    #[test]
    fn smoothed_idle_without_new_target() {
        let mut s = Smoothed::at(0.75);
        for _ in 0..10 {
            assert!(!s.update(0.75, 16));
        }
        assert_eq!(s.current, 0.75);
    }

    #[test]
    fn smoothed_latches_and_ramps() {
        let mut s = Smoothed::at(0.0);
        assert!(s.update(1.0, 4));
        assert_eq!(s.steps_remaining, 3);
        assert!((s.current - 0.25).abs() < 1e-6);
    }

    #[test]
    fn smoothed_snaps_onto_target_at_end() {
        let mut s = Smoothed::at(0.0);
        for _ in 0..4 {
            s.update(1.0, 4);
        }
        assert_eq!(s.current, 1.0);
        assert_eq!(s.steps_remaining, 0);
        // Further updates are no-ops.
        assert!(!s.update(1.0, 4));
    }

    #[test]
    fn smoothed_retarget_mid_ramp_restarts_from_current() {
        let mut s = Smoothed::at(0.0);
        s.update(1.0, 4);
        s.update(1.0, 4);
        let mid = s.current;
        // New request interrupts the old ramp; increment derives from
        // the current value, not the abandoned target.
        s.update(0.0, 4);
        assert_eq!(s.steps_remaining, 3);
        assert!(s.current < mid);
        for _ in 0..3 {
            s.update(0.0, 4);
        }
        assert_eq!(s.current, 0.0);
    }

    #[test]
    fn smoothed_snap_clears_ramp() {
        let mut s = Smoothed::at(0.0);
        s.update(1.0, 1024);
        s.snap(0.5);
        assert_eq!(s.current, 0.5);
        assert_eq!(s.target, 0.5);
        assert_eq!(s.steps_remaining, 0);
        assert!(!s.update(0.5, 1024));
    }

    #[test]
    fn slot_reset_restores_defaults() {
        let slot = CursorSlot::new();
        slot.active.store(true, Ordering::Relaxed);
        slot.playing.store(true, Ordering::Relaxed);
        slot.loop_remaining.store(-1, Ordering::Relaxed);
        slot.new_target_speed.store(4.0);
        slot.lock_state().cursor = 123.5;

        slot.reset();

        assert!(!slot.active.load(Ordering::Relaxed));
        assert!(!slot.playing.load(Ordering::Relaxed));
        assert_eq!(slot.loop_remaining.load(Ordering::Relaxed), 0);
        assert_eq!(slot.new_target_speed.load(), 1.0);
        let st = slot.lock_state();
        assert_eq!(st.cursor, 0.0);
        assert_eq!(st.volume.current, 0.0);
        assert_eq!(st.speed.current, 1.0);
    }
}
