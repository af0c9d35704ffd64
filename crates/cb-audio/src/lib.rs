//! Audio output sinks for cuebox.
//!
//! The engine writes packed 16-bit PCM bytes to an [`AudioSink`] with a
//! blocking `write`. [`CpalSink`] bridges that contract onto a system
//! output stream; [`NullSink`] swallows bytes for offline use and tests.

mod cpal_sink;
mod null_sink;
mod sink;

pub use cpal_sink::CpalSink;
pub use null_sink::NullSink;
pub use sink::{default_sink_factory, AudioSink, SinkError, SinkFactory, SinkFormat};
