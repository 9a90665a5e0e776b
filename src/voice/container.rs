//! PCM16 audio container
//!
//! The canonical 44-byte RIFF/WAVE layout exchanged with the speech
//! endpoints. Fields are written and read one by one in little-endian
//! order:
//!
//! ```text
//! 0  "RIFF"   4  riff size   8  "WAVE"  12 "fmt "  16 fmt len (16)
//! 20 format   22 channels    24 rate    28 byte rate
//! 32 block align             34 bits (16)
//! 36 "data"   40 data len    44 PCM16 LE samples…
//! ```

use thiserror::Error;

/// Size of the fixed header
pub const HEADER_LEN: usize = 44;

/// Only 16-bit samples are carried
pub const BITS_PER_SAMPLE: u16 = 16;

const BYTES_PER_SAMPLE: u16 = BITS_PER_SAMPLE / 8;
const FORMAT_PCM: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

const RIFF_TAG: &[u8; 4] = b"RIFF";
const WAVE_TAG: &[u8; 4] = b"WAVE";
const FMT_TAG: &[u8; 4] = b"fmt ";
const DATA_TAG: &[u8; 4] = b"data";

/// Reasons a received container is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    #[error("container too short: {0} bytes, need at least {HEADER_LEN}")]
    TooShort(usize),

    #[error("bad {expected} tag at offset {offset}")]
    BadMagic {
        expected: &'static str,
        offset: usize,
    },

    #[error("unsupported sample width: {0} bits")]
    UnsupportedBitsPerSample(u16),
}

/// Wrap raw PCM16 bytes in a container
///
/// Payloads longer than `u32::MAX` bytes cannot be described by the header
/// and saturate the length fields.
#[must_use]
pub fn encode(pcm: &[u8], sample_rate: u32, channels: u16) -> Vec<u8> {
    let data_len = u32::try_from(pcm.len()).unwrap_or(u32::MAX);
    let block_align = channels.saturating_mul(BYTES_PER_SAMPLE);
    let byte_rate = sample_rate.saturating_mul(u32::from(block_align));

    let mut out = Vec::with_capacity(HEADER_LEN + pcm.len());
    out.extend_from_slice(RIFF_TAG);
    out.extend_from_slice(&data_len.saturating_add(36).to_le_bytes());
    out.extend_from_slice(WAVE_TAG);
    out.extend_from_slice(FMT_TAG);
    out.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    out.extend_from_slice(DATA_TAG);
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

/// Wrap PCM16 samples in a container
#[must_use]
pub fn encode_samples(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    encode(&pcm, sample_rate, channels)
}

/// A validated container borrowing its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedAudio<'a> {
    pub sample_rate: u32,
    pub channels: u16,
    /// Payload, clamped to the bytes actually present
    pub pcm: &'a [u8],
    /// Payload length claimed by the header
    pub declared_len: u32,
}

impl DecodedAudio<'_> {
    /// Whether the header claimed more payload than was received
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        usize::try_from(self.declared_len).map_or(true, |len| len > self.pcm.len())
    }

    /// Interleaved samples; a trailing odd byte is ignored
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.pcm
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
    }

    /// Samples averaged down to one channel
    #[must_use]
    pub fn to_mono(&self) -> Vec<i16> {
        let channels = self.channels.max(1);
        let samples: Vec<i16> = self.samples().collect();
        if channels == 1 {
            return samples;
        }

        let divisor = i32::from(channels);
        samples
            .chunks_exact(usize::from(channels))
            .map(|frame| {
                let sum: i32 = frame.iter().copied().map(i32::from).sum();
                // The mean of i16 values always fits
                i16::try_from(sum / divisor).unwrap_or_default()
            })
            .collect()
    }
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn expect_tag(
    bytes: &[u8],
    offset: usize,
    tag: &[u8; 4],
    expected: &'static str,
) -> Result<(), ContainerError> {
    if &bytes[offset..offset + 4] == tag {
        Ok(())
    } else {
        Err(ContainerError::BadMagic { expected, offset })
    }
}

/// Validate a container and borrow its payload
///
/// # Errors
///
/// Returns error if the buffer is shorter than the header, any of the
/// four chunk tags is wrong, or samples are not 16-bit
pub fn decode(bytes: &[u8]) -> Result<DecodedAudio<'_>, ContainerError> {
    if bytes.len() < HEADER_LEN {
        return Err(ContainerError::TooShort(bytes.len()));
    }

    expect_tag(bytes, 0, RIFF_TAG, "RIFF")?;
    expect_tag(bytes, 8, WAVE_TAG, "WAVE")?;
    expect_tag(bytes, 12, FMT_TAG, "fmt ")?;
    expect_tag(bytes, 36, DATA_TAG, "data")?;

    let bits = u16_at(bytes, 34);
    if bits != BITS_PER_SAMPLE {
        return Err(ContainerError::UnsupportedBitsPerSample(bits));
    }

    let channels = u16_at(bytes, 22);
    let sample_rate = u32_at(bytes, 24);
    let declared_len = u32_at(bytes, 40);

    let available = bytes.len() - HEADER_LEN;
    let len = usize::try_from(declared_len).map_or(available, |d| d.min(available));

    Ok(DecodedAudio {
        sample_rate,
        channels,
        pcm: &bytes[HEADER_LEN..HEADER_LEN + len],
        declared_len,
    })
}
