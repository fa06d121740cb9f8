//! Decoder for binary spectrum messages pushed by a radio server.
//!
//! Layout, little-endian:
//!
//! | offset | type  | field |
//! |--------|-------|-------|
//! | 0      | `u32` | message serial |
//! | 4      | `f64` | center frequency (Hz) |
//! | 12     | `f32` | sample rate (Hz) |
//! | 16     | `f32` | power offset (dB) |
//! | 20     | `i8`… | one byte per bin |
//!
//! Bins are sent as signed bytes; the power of a bin is `byte - offset`.

use thiserror::Error;

use crate::sink::SpectrumFrame;

/// Bytes before the first bin.
pub const HEADER_LEN: usize = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("spectrum message too short: {0} bytes, need at least {HEADER_LEN}")]
    Truncated(usize),
}

/// Split a message into its serial number and the decoded frame.
///
/// A message with a header but no bins decodes to an empty frame, which the
/// history buffer ignores.
pub fn decode_spectrum_message(bytes: &[u8]) -> Result<(u32, SpectrumFrame), DecodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::Truncated(bytes.len()));
    }
    let (header, body) = bytes.split_at(HEADER_LEN);
    let serial = u32::from_le_bytes(array_at(header, 0));
    let center_freq = f64::from_le_bytes(array_at(header, 4));
    let sample_rate = f32::from_le_bytes(array_at(header, 12));
    let offset = f32::from_le_bytes(array_at(header, 16));
    let bins = body.iter().map(|&b| b as i8 as f32 - offset).collect();
    Ok((serial, SpectrumFrame::new(center_freq, sample_rate as f64, bins)))
}

/// Inverse of [`decode_spectrum_message`]; powers are rounded and saturated
/// to the signed byte range after adding `offset`.
pub fn encode_spectrum_message(serial: u32, frame: &SpectrumFrame, offset: f32) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + frame.bins.len());
    out.extend_from_slice(&serial.to_le_bytes());
    out.extend_from_slice(&frame.center_freq.to_le_bytes());
    out.extend_from_slice(&(frame.sample_rate as f32).to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend(
        frame
            .bins
            .iter()
            .map(|&p| (p + offset).round().clamp(i8::MIN as f32, i8::MAX as f32) as i8 as u8),
    );
    out
}

fn array_at<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[at..at + N]);
    out
}
