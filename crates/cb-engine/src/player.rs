//! Audio-thread plumbing shared by the cue player and the mixer.
//!
//! Output streams are not `Send`, so the sink is constructed on the
//! audio thread itself; an mpsc handshake reports whether the line was
//! acquired so `open`/`start` can fail synchronously. A drop guard
//! closes the sink on every exit path; draining happens only on a clean
//! shutdown.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use cb_audio::{AudioSink, SinkError};

use crate::error::CueError;

/// Closes the held sink when the audio thread unwinds or returns.
struct SinkGuard {
    sink: Box<dyn AudioSink>,
}

impl SinkGuard {
    fn sink(&mut self) -> &mut dyn AudioSink {
        self.sink.as_mut()
    }
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        self.sink.close();
    }
}

/// Spawn a named audio thread around a sink.
///
/// `make_sink` runs on the new thread; its result (including the
/// `start` call) is reported back before this function returns, so a
/// missing output line surfaces as `SinkUnavailable` to the caller.
/// `body` runs the write loop and returns `true` for a clean exit, in
/// which case the sink is drained before it is closed.
pub(crate) fn launch<M, B>(
    thread_name: String,
    make_sink: M,
    body: B,
) -> Result<JoinHandle<()>, CueError>
where
    M: FnOnce() -> Result<Box<dyn AudioSink>, SinkError> + Send + 'static,
    B: FnOnce(&mut dyn AudioSink) -> bool + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Result<(), SinkError>>();

    let handle = thread::Builder::new()
        .name(thread_name)
        .spawn(move || {
            let sink = match make_sink() {
                Ok(mut sink) => match sink.start() {
                    Ok(()) => {
                        let _ = tx.send(Ok(()));
                        sink
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                },
                Err(e) => {
                    let _ = tx.send(Err(e));
                    return;
                }
            };

            let mut guard = SinkGuard { sink };
            if body(guard.sink()) {
                guard.sink().drain();
            }
        })
        .map_err(|e| CueError::SinkUnavailable(e.to_string()))?;

    match rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(CueError::SinkUnavailable(e.to_string()))
        }
        Err(_) => {
            let _ = handle.join();
            Err(CueError::SinkUnavailable(
                "audio thread exited before opening the line".into(),
            ))
        }
    }
}
