//! Audio device collaborator interface.
//!
//! A backend owns the physical capture and playback streams and drives two
//! callbacks at its own cadence. Callbacks run on real-time-sensitive
//! contexts: they must not block and must not unwind across the device
//! boundary.

use std::sync::Arc;

use super::gate::GateDecision;
use crate::error::DeviceError;

/// Fixed stream format: 16-bit little-endian linear PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames delivered or requested per callback.
    pub chunk_frames: usize,
}

impl AudioFormat {
    pub const BYTES_PER_SAMPLE: usize = 2;

    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * Self::BYTES_PER_SAMPLE
    }

    pub fn chunk_bytes(&self) -> usize {
        self.chunk_frames * self.bytes_per_frame()
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 24000,
            channels: 1,
            chunk_frames: 1024,
        }
    }
}

/// Invoked with each captured block and its frame count.
pub type CaptureCallback = Box<dyn FnMut(&[u8], usize) -> GateDecision + Send>;

/// Invoked with a frame count; returns exactly `frames * bytes_per_frame` bytes.
pub type PlaybackCallback = Box<dyn FnMut(usize) -> Vec<u8> + Send>;

/// Reports an unrecoverable stream fault from a device context.
pub type FaultHook = Arc<dyn Fn(DeviceError) + Send + Sync>;

pub struct DeviceCallbacks {
    pub capture: CaptureCallback,
    pub playback: PlaybackCallback,
    pub on_fault: FaultHook,
}

/// Capture + playback stream pair.
pub trait AudioBackend: Send {
    fn format(&self) -> AudioFormat;

    /// Open and start both streams. Errors abort session startup.
    fn start(&mut self, callbacks: DeviceCallbacks) -> Result<(), DeviceError>;

    /// Stop and close both streams. Calling it on a stopped backend is a no-op.
    fn stop(&mut self) -> Result<(), DeviceError>;
}

/// Reinterpret interleaved samples as little-endian bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Inverse of [`samples_to_bytes`]. A trailing odd byte is dropped.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_bytes_for_mono_pcm16() {
        let format = AudioFormat::default();
        assert_eq!(format.bytes_per_frame(), 2);
        assert_eq!(format.chunk_bytes(), 2048);
    }

    #[test]
    fn sample_byte_conversion_is_little_endian() {
        let bytes = samples_to_bytes(&[1, -2]);
        assert_eq!(bytes, vec![0x01, 0x00, 0xFE, 0xFF]);
        assert_eq!(bytes_to_samples(&bytes), vec![1, -2]);
    }

    #[test]
    fn odd_trailing_byte_is_ignored() {
        assert_eq!(bytes_to_samples(&[0x10, 0x00, 0x7F]), vec![16]);
    }
}
