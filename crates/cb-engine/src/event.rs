//! Lifecycle notifications and listener fan-out.
//!
//! Events are delivered synchronously on the thread that caused them,
//! which for loop and natural-end events is the audio thread. The
//! listener list is copy-on-write: registration builds a fresh snapshot
//! under a briefly-held lock, and dispatch iterates its own snapshot
//! with no lock held, so adding or removing listeners never stalls the
//! audio thread. Listener implementations should stay brief.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cue::{AudioCue, CueState};

/// Kind of an instance lifecycle event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceEventKind {
    /// Claimed from the pool of available instances.
    ObtainInstance,
    /// Returned to the pool of available instances.
    ReleaseInstance,
    /// Started playing.
    StartInstance,
    /// Stopped playing (still claimable until released).
    StopInstance,
    /// Finished a pass and restarted from the beginning.
    Loop,
}

/// Non-owning back reference to the cue that originated an event.
///
/// Listeners holding events cannot keep a cue alive through this handle,
/// so cue → listener → event → cue never forms an ownership cycle.
#[derive(Clone, Debug)]
pub struct CueHandle {
    pub(crate) inner: Weak<CueState>,
}

impl CueHandle {
    /// Upgrade to a full handle, if the cue is still alive.
    pub fn upgrade(&self) -> Option<AudioCue> {
        self.inner.upgrade().map(AudioCue::from_shared)
    }
}

/// An event in the life cycle of a cue instance.
#[derive(Clone, Debug)]
pub struct InstanceEvent {
    pub kind: InstanceEventKind,
    /// Wall-clock time of the event, milliseconds since the Unix epoch.
    pub wall_ms: u64,
    /// The originating cue.
    pub cue: CueHandle,
    /// Slot index of the instance.
    pub instance_id: usize,
    /// Sample frame (possibly fractional) current at the event.
    pub frame: f64,
}

/// Receives cue and instance lifecycle notifications.
///
/// All methods default to no-ops; implement the ones of interest.
pub trait AudioCueListener: Send + Sync {
    /// A cue allocated playback resources.
    fn cue_opened(&self, wall_ms: u64, thread_priority: u32, buffer_frames: usize, cue: CueHandle) {
        let _ = (wall_ms, thread_priority, buffer_frames, cue);
    }

    /// A cue released playback resources.
    fn cue_closed(&self, wall_ms: u64, cue: CueHandle) {
        let _ = (wall_ms, cue);
    }

    /// An instance changed lifecycle state.
    fn instance_event(&self, event: &InstanceEvent) {
        let _ = event;
    }
}

/// Copy-on-write listener collection.
pub(crate) struct ListenerList {
    entries: Mutex<Arc<[Arc<dyn AudioCueListener>]>>,
}

/// Compare two listener handles by allocation identity.
fn same_listener(a: &Arc<dyn AudioCueListener>, b: &Arc<dyn AudioCueListener>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl ListenerList {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Arc::from(Vec::new())),
        }
    }

    pub fn add(&self, listener: Arc<dyn AudioCueListener>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next: Vec<Arc<dyn AudioCueListener>> = entries.iter().cloned().collect();
        next.push(listener);
        *entries = Arc::from(next);
    }

    pub fn remove(&self, listener: &Arc<dyn AudioCueListener>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let next: Vec<Arc<dyn AudioCueListener>> = entries
            .iter()
            .filter(|l| !same_listener(l, listener))
            .cloned()
            .collect();
        *entries = Arc::from(next);
    }

    /// A stable snapshot for lock-free iteration.
    pub fn snapshot(&self) -> Arc<[Arc<dyn AudioCueListener>]> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub(crate) fn wall_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tagged;
    impl AudioCueListener for Tagged {}

    #[test]
    fn add_and_remove_by_identity() {
        let list = ListenerList::new();
        let a: Arc<dyn AudioCueListener> = Arc::new(Tagged);
        let b: Arc<dyn AudioCueListener> = Arc::new(Tagged);
        list.add(a.clone());
        list.add(b.clone());
        assert_eq!(list.snapshot().len(), 2);

        list.remove(&a);
        assert_eq!(list.snapshot().len(), 1);
        // Removing an unregistered listener is a no-op.
        list.remove(&a);
        assert_eq!(list.snapshot().len(), 1);
    }

    #[test]
    fn snapshot_is_stable_across_mutation() {
        let list = ListenerList::new();
        let a: Arc<dyn AudioCueListener> = Arc::new(Tagged);
        list.add(a.clone());

        let snapshot = list.snapshot();
        list.remove(&a);
        // The held snapshot still sees the listener that was registered
        // when it was taken.
        assert_eq!(snapshot.len(), 1);
        assert_eq!(list.snapshot().len(), 0);
    }

    #[test]
    fn wall_ms_is_monotonic_enough() {
        let a = wall_ms();
        let b = wall_ms();
        assert!(b >= a);
    }
}
