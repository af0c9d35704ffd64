//! CPAL-backed output sink.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};

use crate::sink::{AudioSink, SinkError, SinkFormat};

/// A blocking byte-write line over a cpal output stream.
///
/// Written bytes are decoded to `i16` samples and pushed through a ring
/// buffer sized to the requested byte buffer; the stream callback pops
/// samples and converts to `f32`, zero-filling on underrun. `write`
/// spins while the ring is full, which bounds the caller to the
/// hardware's consumption rate.
pub struct CpalSink {
    stream: Option<Stream>,
    producer: HeapProd<i16>,
    started: bool,
}

impl CpalSink {
    /// Acquire the default output device and build a stream for `format`.
    ///
    /// The stream is created paused; call [`AudioSink::start`] before
    /// writing.
    pub fn open(format: SinkFormat, byte_buffer_size: usize) -> Result<Self, SinkError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(SinkError::NoDevice)?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        // Two bytes per sample; keep at least one stereo frame of room.
        let capacity = (byte_buffer_size / 2).max(format.channels as usize);
        let rb = HeapRb::<i16>::new(capacity);
        let (producer, mut consumer) = rb.split();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        *sample = match consumer.try_pop() {
                            Some(s) => s as f32 / 32768.0,
                            None => 0.0,
                        };
                    }
                },
                |err| log::error!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| SinkError::StreamCreate(e.to_string()))?;

        Ok(Self {
            stream: Some(stream),
            producer,
            started: false,
        })
    }
}

impl AudioSink for CpalSink {
    fn start(&mut self) -> Result<(), SinkError> {
        if let Some(ref stream) = self.stream {
            stream
                .play()
                .map_err(|e| SinkError::Playback(e.to_string()))?;
            self.started = true;
        }
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, SinkError> {
        if !self.started {
            return Err(SinkError::Playback("line not started".into()));
        }
        for pair in bytes.chunks_exact(2) {
            let sample = i16::from_le_bytes([pair[0], pair[1]]);
            while self.producer.try_push(sample).is_err() {
                std::hint::spin_loop();
            }
        }
        Ok(bytes.len())
    }

    fn drain(&mut self) {
        // Without a running stream nothing will ever consume the ring.
        if !self.started || self.stream.is_none() {
            return;
        }
        while self.producer.occupied_len() > 0 {
            std::hint::spin_loop();
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
        }
        self.started = false;
    }
}
