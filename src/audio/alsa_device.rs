//! ALSA PCM device wrappers for audio capture and playback.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};

use super::device::AudioFormat;
use crate::error::DeviceError;

/// Parameters negotiated with the ALSA hardware.
#[derive(Debug, Clone)]
pub struct AlsaParams {
    /// Actual sample rate after negotiation
    pub sample_rate: u32,
    /// Actual number of channels
    pub channels: u32,
    /// Period size in frames (one frame = channels × sample_width)
    pub period_size: usize,
}

/// Open a PCM device for capture (recording).
pub fn open_capture(device: &str, format: &AudioFormat) -> Result<(PCM, AlsaParams), DeviceError> {
    open_pcm(device, Direction::Capture, format, "capture")
}

/// Open a PCM device for playback.
pub fn open_playback(device: &str, format: &AudioFormat) -> Result<(PCM, AlsaParams), DeviceError> {
    open_pcm(device, Direction::Playback, format, "playback")
}

fn open_pcm(
    device: &str,
    direction: Direction,
    format: &AudioFormat,
    dir_name: &'static str,
) -> Result<(PCM, AlsaParams), DeviceError> {
    let fail = |reason: String| DeviceError::Open {
        device: device.to_string(),
        direction: dir_name,
        reason,
    };

    let pcm = PCM::new(device, direction, false).map_err(|e| fail(e.to_string()))?;

    // Configure hardware parameters
    {
        let hwp = HwParams::any(&pcm).map_err(|e| fail(format!("HwParams: {}", e)))?;
        hwp.set_access(Access::RWInterleaved)
            .and_then(|_| hwp.set_format(Format::S16LE))
            .and_then(|_| hwp.set_channels(format.channels as u32))
            .and_then(|_| hwp.set_rate_near(format.sample_rate, ValueOr::Nearest))
            .and_then(|_| {
                hwp.set_period_size_near(format.chunk_frames as alsa::pcm::Frames, ValueOr::Nearest)
            })
            .map_err(|e| fail(e.to_string()))?;
        pcm.hw_params(&hwp).map_err(|e| fail(e.to_string()))?;
    }

    // Read back actual negotiated parameters
    let params = {
        let hwp = pcm.hw_params_current().map_err(|e| fail(e.to_string()))?;
        AlsaParams {
            sample_rate: hwp.get_rate().map_err(|e| fail(e.to_string()))?,
            channels: hwp.get_channels().map_err(|e| fail(e.to_string()))?,
            period_size: hwp.get_period_size().map_err(|e| fail(e.to_string()))? as usize,
        }
    };

    // The remote endpoint expects exactly the configured format; no resampling here.
    if params.sample_rate != format.sample_rate || params.channels != format.channels as u32 {
        return Err(fail(format!(
            "negotiated {}Hz/{}ch, need {}Hz/{}ch (try a plughw device)",
            params.sample_rate, params.channels, format.sample_rate, format.channels
        )));
    }

    log::info!(
        "ALSA {}: device={}, rate={}, channels={}, period_size={}",
        dir_name,
        device,
        params.sample_rate,
        params.channels,
        params.period_size,
    );

    Ok((pcm, params))
}
