//! Linear-PCM WAV recombination
//!
//! Each synthesized sentence comes back as its own WAV container. To return
//! one clip, the `data` payload of every container is located with a plain
//! byte scan, the payloads are concatenated in order, and a fresh 44-byte
//! RIFF/WAVE header is written in front of them.

use crate::{Error, Result};

/// Size of the canonical linear-PCM header
pub const HEADER_LEN: usize = 44;

/// Tag of the payload-bearing sub-chunk
const DATA_MARKER: &[u8; 4] = b"data";

/// Bytes between the marker start and the first payload byte (tag + length)
const DATA_PREAMBLE: usize = 8;

/// PCM sample layout of a WAV container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// 24 kHz mono 16-bit, the format every synthesized clip uses
    pub const RELAY: Self = Self {
        sample_rate: 24_000,
        channels: 1,
        bits_per_sample: 16,
    };

    #[must_use]
    pub const fn block_align(self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    #[must_use]
    pub const fn byte_rate(self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::RELAY
    }
}

/// Locate the sample payload inside a WAV container
///
/// Scans for the first `data` tag, reads the little-endian length that
/// follows and returns that many bytes starting right after the length.
/// A missing tag or a zero length yields an empty slice. A declared length
/// running past the end of the buffer is clamped to what is present.
#[must_use]
pub fn extract_pcm_payload(container: &[u8]) -> &[u8] {
    let mut cursor = 0;
    while cursor + DATA_MARKER.len() <= container.len() {
        if &container[cursor..cursor + DATA_MARKER.len()] == DATA_MARKER {
            return payload_at(container, cursor);
        }
        cursor += 1;
    }
    &[]
}

fn payload_at(container: &[u8], marker: usize) -> &[u8] {
    let len_start = marker + DATA_MARKER.len();
    let Some(len_bytes) = container.get(len_start..len_start + 4) else {
        return &[];
    };
    let declared = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]);
    if declared == 0 {
        return &[];
    }

    let start = marker + DATA_PREAMBLE;
    let end = start
        .saturating_add(usize::try_from(declared).unwrap_or(usize::MAX))
        .min(container.len());
    &container[start..end]
}

/// Write a canonical 44-byte RIFF/WAVE header for `data_len` payload bytes
///
/// # Errors
///
/// Returns error if the payload is too large for a RIFF container
pub fn write_header(out: &mut Vec<u8>, format: PcmFormat, data_len: usize) -> Result<()> {
    let data_len = u32::try_from(data_len)
        .ok()
        .filter(|len| len.checked_add(36).is_some())
        .ok_or_else(|| Error::Audio(format!("payload of {data_len} bytes exceeds RIFF limit")))?;

    out.reserve(HEADER_LEN);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&format.channels.to_le_bytes());
    out.extend_from_slice(&format.sample_rate.to_le_bytes());
    out.extend_from_slice(&format.byte_rate().to_le_bytes());
    out.extend_from_slice(&format.block_align().to_le_bytes());
    out.extend_from_slice(&format.bits_per_sample.to_le_bytes());

    out.extend_from_slice(DATA_MARKER);
    out.extend_from_slice(&data_len.to_le_bytes());
    Ok(())
}

/// Rebuilds one WAV container out of many synthesized clips
#[derive(Debug, Default)]
pub struct WavRecombiner {
    format: PcmFormat,
    payload: Vec<u8>,
    segments: usize,
    skipped: usize,
}

impl WavRecombiner {
    #[must_use]
    pub fn new(format: PcmFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// Append the payload of one container; containers without one are skipped
    pub fn push(&mut self, container: &[u8]) {
        let payload = extract_pcm_payload(container);
        if payload.is_empty() {
            self.skipped += 1;
            tracing::debug!(bytes = container.len(), "no PCM payload in segment, skipping");
            return;
        }
        self.payload.extend_from_slice(payload);
        self.segments += 1;
    }

    /// Number of segments that contributed payload
    #[must_use]
    pub const fn segments(&self) -> usize {
        self.segments
    }

    /// Number of segments that were skipped
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Payload bytes gathered so far
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Emit the merged container
    ///
    /// # Errors
    ///
    /// Returns error if the merged payload does not fit a RIFF container
    pub fn finish(self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        write_header(&mut out, self.format, self.payload.len())?;
        out.extend_from_slice(&self.payload);

        tracing::debug!(
            segments = self.segments,
            skipped = self.skipped,
            payload_bytes = self.payload.len(),
            "merged WAV segments"
        );
        Ok(out)
    }
}

/// Merge WAV containers into one, in order
///
/// # Errors
///
/// Returns error if the merged payload does not fit a RIFF container
pub fn merge_wav<I, B>(containers: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut recombiner = WavRecombiner::new(PcmFormat::RELAY);
    for container in containers {
        recombiner.push(container.as_ref());
    }
    recombiner.finish()
}
