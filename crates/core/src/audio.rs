//! PCM16 transcoding for audio travelling from the device to the remote session.
//!
//! The device streams little-endian signed 16-bit mono PCM. The remote session
//! expects the same sample format at a different rate, carried as base64 text.
//! The pipeline is decode -> normalise to f32 -> linear resample -> requantise
//! -> base64.
//!
//! The resampler is plain linear interpolation without an anti-aliasing
//! filter. That is a known quality trade-off for voice-grade streams.

use crate::error::RelayError;
use base64::Engine;

/// Sample rate the hardware device captures at.
pub const DEVICE_PCM16_SAMPLE_RATE: u32 = 16000;
/// Sample rate the realtime session expects for `pcm16` input.
pub const REALTIME_PCM16_SAMPLE_RATE: u32 = 24000;

const PCM16_SCALE: f32 = 32768.0;

/// Converts a raw PCM16 payload into the base64 text the remote session takes.
///
/// Fails with [`RelayError::MalformedAudio`] when the payload length is odd or
/// either rate is zero. An empty payload encodes to an empty string.
pub fn transcode(raw: &[u8], source_rate: u32, target_rate: u32) -> Result<String, RelayError> {
    if source_rate == 0 || target_rate == 0 {
        return Err(RelayError::MalformedAudio(format!(
            "invalid sample rates {source_rate} -> {target_rate}"
        )));
    }
    let samples = pcm16_from_le_bytes(raw)?;
    let normalised = pcm16_to_f32(&samples);
    let resampled = resample_linear(&normalised, source_rate, target_rate);
    let bytes = f32_to_pcm16_le_bytes(&resampled);
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Interprets each consecutive byte pair as one little-endian `i16`.
pub fn pcm16_from_le_bytes(raw: &[u8]) -> Result<Vec<i16>, RelayError> {
    if raw.len() % 2 != 0 {
        return Err(RelayError::MalformedAudio(format!(
            "payload length {} is not a multiple of 2",
            raw.len()
        )));
    }
    Ok(raw
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Maps samples onto [-1.0, 1.0).
pub fn pcm16_to_f32(pcm16: &[i16]) -> Vec<f32> {
    pcm16.iter().map(|&s| s as f32 / PCM16_SCALE).collect()
}

/// Resamples by linear interpolation between the two bounding input samples.
///
/// The output holds `floor(len * target_rate / source_rate)` samples. Positions
/// past the last input sample clamp to it. Equal rates return the input
/// unchanged.
pub fn resample_linear(input: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if input.is_empty() || source_rate == 0 || target_rate == 0 {
        return Vec::new();
    }
    if source_rate == target_rate {
        return input.to_vec();
    }

    let out_len = (input.len() as u64 * target_rate as u64 / source_rate as u64) as usize;
    let step = source_rate as f64 / target_rate as f64;
    let last = input.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let lower = (pos.floor() as usize).min(last);
            let upper = (lower + 1).min(last);
            let frac = (pos - lower as f64) as f32;
            let a = input[lower];
            let b = input[upper];
            a + (b - a) * frac
        })
        .collect()
}

/// Requantises f32 samples to PCM16 with rounding and saturation.
pub fn f32_to_pcm16_le_bytes(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| {
            let v = (s * PCM16_SCALE)
                .round()
                .clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            v.to_le_bytes()
        })
        .collect()
}

/// Decodes base64 PCM16 text back into samples. Inverse of the last two
/// transcoding steps.
pub fn decode_base64_pcm16(encoded: &str) -> Result<Vec<i16>, RelayError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| RelayError::MalformedAudio(format!("invalid base64: {e}")))?;
    pcm16_from_le_bytes(&bytes)
}
