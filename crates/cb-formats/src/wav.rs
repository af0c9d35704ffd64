//! WAV decoding for PCM audio.

use std::path::Path;

use crate::FormatError;

/// Longest clip that fits the engine's frame addressing; longer files
/// are truncated with a warning.
const MAX_FRAMES: usize = (i32::MAX >> 1) as usize;

struct WavHeader {
    num_channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    data_offset: usize,
    data_len: usize,
}

/// Load a WAV file from disk into normalized interleaved stereo floats.
pub fn load_wav_file(path: impl AsRef<Path>) -> Result<Vec<f32>, FormatError> {
    let data = std::fs::read(path)?;
    load_wav(&data)
}

/// Decode WAV bytes into normalized interleaved stereo floats.
///
/// Only 44100 Hz / 16-bit / 2-channel little-endian PCM is accepted.
pub fn load_wav(data: &[u8]) -> Result<Vec<f32>, FormatError> {
    let header = parse_header(data)?;

    if header.bits_per_sample != 16 || header.num_channels != 2 || header.sample_rate != 44100 {
        return Err(FormatError::Unsupported(format!(
            "{} Hz / {}-bit / {} channels (need 44100 Hz / 16-bit / stereo)",
            header.sample_rate, header.num_channels, header.bits_per_sample
        )));
    }

    read_pcm_data(data, &header)
}

fn parse_header(data: &[u8]) -> Result<WavHeader, FormatError> {
    if data.len() < 12 {
        return Err(FormatError::UnexpectedEof);
    }
    if &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(FormatError::Unsupported("not a RIFF/WAVE file".into()));
    }

    let mut num_channels = 0u16;
    let mut sample_rate = 0u32;
    let mut bits_per_sample = 0u16;
    let mut format_tag = 0u16;
    let mut seen_fmt = false;

    // Walk chunks; unknown ones (LIST, fact, ...) are skipped.
    let mut offset = 12;
    while offset + 8 <= data.len() {
        let id = &data[offset..offset + 4];
        let size = read_u32(data, offset + 4)? as usize;
        let body = offset + 8;

        match id {
            b"fmt " => {
                if body + 16 > data.len() {
                    return Err(FormatError::UnexpectedEof);
                }
                format_tag = read_u16(data, body)?;
                num_channels = read_u16(data, body + 2)?;
                sample_rate = read_u32(data, body + 4)?;
                bits_per_sample = read_u16(data, body + 14)?;
                seen_fmt = true;
            }
            b"data" => {
                if !seen_fmt {
                    return Err(FormatError::Unsupported("data chunk before fmt".into()));
                }
                if format_tag != 1 {
                    return Err(FormatError::Unsupported(format!(
                        "compressed format tag {}",
                        format_tag
                    )));
                }
                let data_len = size.min(data.len().saturating_sub(body));
                return Ok(WavHeader {
                    num_channels,
                    sample_rate,
                    bits_per_sample,
                    data_offset: body,
                    data_len,
                });
            }
            _ => {}
        }

        // Chunks are word-aligned.
        offset = body + size + (size & 1);
    }

    if seen_fmt {
        Err(FormatError::UnexpectedEof)
    } else {
        Err(FormatError::Unsupported("no fmt chunk".into()))
    }
}

fn read_pcm_data(data: &[u8], header: &WavHeader) -> Result<Vec<f32>, FormatError> {
    let bytes = &data[header.data_offset..header.data_offset + header.data_len];
    let mut frames = bytes.len() / 4; // two 16-bit channels per frame

    if frames > MAX_FRAMES {
        log::warn!(
            "clip is too large to fit ({} frames), truncating to {}",
            frames,
            MAX_FRAMES
        );
        frames = MAX_FRAMES;
    }

    let mut pcm = Vec::with_capacity(frames * 2);
    for pair in bytes[..frames * 4].chunks_exact(2) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        pcm.push(sample as f32 / 32767.0);
    }

    Ok(pcm)
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, FormatError> {
    let bytes = data
        .get(offset..offset + 2)
        .ok_or(FormatError::UnexpectedEof)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, FormatError> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or(FormatError::UnexpectedEof)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
