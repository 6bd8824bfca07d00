//! RIFF/WAVE decoding (and encoding, through `hound`).
//!
//! Decoding accepts PCM at 8/16/24/32 bits, IEEE float at 32 bits and
//! `WAVE_FORMAT_EXTENSIBLE` wrapping either of those, with 1 to 8 channels.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::buffer::{AudioBuffer, MAX_CHANNELS};
use crate::error::{DecodeError, Result};

const FORMAT_PCM: u16 = 0x0001;
const FORMAT_IEEE_FLOAT: u16 = 0x0003;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Sample encodings [`encode_wav`] can write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WavEncoding {
    Pcm16,
    Pcm24,
    Float32,
}

#[derive(Clone, Copy, Debug)]
struct Format {
    tag: u16,
    channels: u16,
    sample_rate: u32,
    bits: u16,
}

#[inline]
fn u16_le(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

#[inline]
fn u32_le(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn parse_format(body: &[u8]) -> core::result::Result<Format, DecodeError> {
    if body.len() < 16 {
        return Err(DecodeError::MalformedFormat(body.len() as u32));
    }

    let mut tag = u16_le(body, 0);
    // WAVE_FORMAT_EXTENSIBLE: cbSize(2) validBits(2) channelMask(4) then the
    // subformat GUID at offset 24, whose first two bytes carry the real tag.
    if tag == FORMAT_EXTENSIBLE {
        if body.len() < 26 {
            return Err(DecodeError::MalformedFormat(body.len() as u32));
        }
        tag = u16_le(body, 24);
    }

    Ok(Format {
        tag,
        channels: u16_le(body, 2),
        sample_rate: u32_le(body, 4),
        bits: u16_le(body, 14),
    })
}

/// Decode a RIFF/WAVE byte stream into an [`AudioBuffer`].
pub fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer> {
    let buffer = decode(bytes).map_err(|e| {
        tracing::debug!(error = %e, len = bytes.len(), "rejected wav data");
        e
    })?;
    tracing::debug!(
        channels = buffer.channels(),
        sample_rate = buffer.sample_rate(),
        frames = buffer.frames(),
        "decoded wav data"
    );
    Ok(buffer)
}

fn decode(bytes: &[u8]) -> Result<AudioBuffer> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" {
        return Err(DecodeError::NotRiff.into());
    }
    if &bytes[8..12] != b"WAVE" {
        return Err(DecodeError::NotWave.into());
    }

    let mut format = None;
    let mut data: Option<&[u8]> = None;

    let mut at = 12;
    while at + 8 <= bytes.len() {
        let id = &bytes[at..at + 4];
        let size = u32_le(bytes, at + 4);
        let body_start = at + 8;
        let available = bytes.len() - body_start;

        match id {
            b"fmt " => {
                if size as usize > available {
                    return Err(DecodeError::MalformedFormat(available as u32).into());
                }
                format = Some(parse_format(&bytes[body_start..body_start + size as usize])?);
            }
            b"data" => {
                if size as usize > available {
                    return Err(DecodeError::Truncated {
                        declared: size,
                        available,
                    }
                    .into());
                }
                data = Some(&bytes[body_start..body_start + size as usize]);
            }
            _ => {}
        }

        // Chunks are padded to an even length.
        let padded = size as usize + (size as usize & 1);
        at = match body_start.checked_add(padded) {
            Some(next) => next,
            None => break,
        };
    }

    let format = format.ok_or(DecodeError::MissingFormat)?;
    let data = data.ok_or(DecodeError::MissingData)?;

    let supported = match format.tag {
        FORMAT_PCM => matches!(format.bits, 8 | 16 | 24 | 32),
        FORMAT_IEEE_FLOAT => format.bits == 32,
        other => return Err(DecodeError::UnsupportedFormat(other).into()),
    };
    if !supported {
        return Err(DecodeError::UnsupportedBitDepth {
            format: format.tag,
            bits: format.bits,
        }
        .into());
    }

    let bytes_per_sample = (format.bits as usize + 7) / 8;
    let channels = format.channels as usize;
    let frame_bytes = channels * bytes_per_sample;
    let frames = if frame_bytes == 0 { 0 } else { data.len() / frame_bytes };

    if channels == 0 || channels > MAX_CHANNELS || format.sample_rate == 0 || frames == 0 {
        return Err(DecodeError::InvalidGeometry {
            channels: format.channels,
            sample_rate: format.sample_rate,
            frames,
        }
        .into());
    }

    let mut buffer = AudioBuffer::new(channels, format.sample_rate, frames)?;
    let out = buffer.interleaved_mut();
    let samples = data[..frames * frame_bytes].chunks_exact(bytes_per_sample);

    for (dst, raw) in out.iter_mut().zip(samples) {
        let v = match (format.tag, bytes_per_sample) {
            (FORMAT_IEEE_FLOAT, _) => f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            (_, 1) => (raw[0] as f32 - 128.0) / 128.0,
            (_, 2) => i16::from_le_bytes([raw[0], raw[1]]) as f32 / 32768.0,
            (_, 3) => {
                // Place the 24 bits in the top of an i32, then shift back to sign-extend.
                let s = i32::from_le_bytes([0, raw[0], raw[1], raw[2]]) >> 8;
                s as f32 / 8_388_608.0
            }
            _ => i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f32 / 2_147_483_648.0,
        };
        *dst = if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) };
    }

    Ok(buffer)
}

/// Encode a buffer as a RIFF/WAVE byte stream.
pub fn encode_wav(buffer: &AudioBuffer, encoding: WavEncoding) -> Result<Vec<u8>> {
    let (bits_per_sample, sample_format) = match encoding {
        WavEncoding::Pcm16 => (16, SampleFormat::Int),
        WavEncoding::Pcm24 => (24, SampleFormat::Int),
        WavEncoding::Float32 => (32, SampleFormat::Float),
    };
    let spec = WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample,
        sample_format,
    };

    let mut bytes = Vec::new();
    let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec)?;
    for &s in buffer.interleaved() {
        let s = s.clamp(-1.0, 1.0);
        match encoding {
            WavEncoding::Pcm16 => writer.write_sample((s * 32768.0).round().clamp(-32768.0, 32767.0) as i16)?,
            WavEncoding::Pcm24 => writer.write_sample(
                (s * 8_388_608.0).round().clamp(-8_388_608.0, 8_388_607.0) as i32,
            )?,
            WavEncoding::Float32 => writer.write_sample(s)?,
        }
    }
    writer.finalize()?;

    Ok(bytes)
}
