//! ALSA implementation of [`AudioBackend`].
//!
//! Uses std::thread (NOT tokio tasks) for real-time audio I/O to avoid
//! contention with async network tasks. Each thread turns blocking ALSA
//! reads/writes into the callback model the session expects.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use alsa::pcm::PCM;

use super::alsa_device;
use super::device::{
    AudioBackend, AudioFormat, CaptureCallback, DeviceCallbacks, PlaybackCallback,
    bytes_to_samples, samples_to_bytes,
};
use crate::error::DeviceError;

/// Consecutive failed write recoveries before a playback tick is dropped.
const MAX_WRITE_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct AlsaConfig {
    /// ALSA capture device name (e.g. "default", "plughw:0,0")
    pub capture_device: String,
    /// ALSA playback device name
    pub playback_device: String,
    pub format: AudioFormat,
}

impl From<&crate::config::Config> for AlsaConfig {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            capture_device: config.capture_device.clone(),
            playback_device: config.playback_device.clone(),
            format: config.audio_format(),
        }
    }
}

pub struct AlsaBackend {
    config: AlsaConfig,
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl AlsaBackend {
    pub fn new(config: AlsaConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        }
    }

    fn spawn(
        &mut self,
        name: &str,
        body: impl FnOnce(&AtomicBool) + Send + 'static,
    ) -> Result<(), DeviceError> {
        let running = self.running.clone();
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || body(running.as_ref()))
            .map_err(|e| DeviceError::Start(e.to_string()))?;
        self.handles.push(handle);
        Ok(())
    }
}

impl AudioBackend for AlsaBackend {
    fn format(&self) -> AudioFormat {
        self.config.format
    }

    fn start(&mut self, callbacks: DeviceCallbacks) -> Result<(), DeviceError> {
        if !self.handles.is_empty() {
            return Err(DeviceError::AlreadyStarted);
        }

        // 在调用线程上打开设备，这样打开失败可以直接返回给调用者
        let (capture_pcm, _) =
            alsa_device::open_capture(&self.config.capture_device, &self.config.format)?;
        let (playback_pcm, _) =
            alsa_device::open_playback(&self.config.playback_device, &self.config.format)?;

        let DeviceCallbacks {
            capture,
            playback,
            on_fault,
        } = callbacks;
        let format = self.config.format;

        self.running.store(true, Ordering::SeqCst);

        let fault = on_fault.clone();
        let started = self.spawn("audio-capture", move |running| {
            if let Err(e) = capture_thread(capture_pcm, format, capture, running) {
                log::error!("Capture thread error: {}", e);
                fault(e);
            }
        });
        if let Err(e) = started {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let fault = on_fault;
        let started = self.spawn("audio-playback", move |running| {
            if let Err(e) = playback_thread(playback_pcm, format, playback, running) {
                log::error!("Playback thread error: {}", e);
                fault(e);
            }
        });
        if let Err(e) = started {
            // Don't leave the capture thread orphaned.
            let _ = self.stop();
            return Err(e);
        }

        log::info!(
            "Audio streams started: \"{}\" -> \"{}\", {}Hz, {} frames per chunk",
            self.config.capture_device,
            self.config.playback_device,
            format.sample_rate,
            format.chunk_frames,
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.running.store(false, Ordering::SeqCst);
        let mut panicked = 0;
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                panicked += 1;
            }
        }
        if panicked > 0 {
            return Err(DeviceError::Stop(format!("{} audio thread(s) panicked", panicked)));
        }
        Ok(())
    }
}

impl Drop for AlsaBackend {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

// 回调不能把 panic 传播到设备线程之外
fn deliver_capture(
    capture: &mut CaptureCallback,
    block: &[u8],
    frames: usize,
) -> Result<(), DeviceError> {
    panic::catch_unwind(AssertUnwindSafe(|| capture(block, frames)))
        .map(|_| ())
        .map_err(|_| DeviceError::Stream("capture callback panicked".into()))
}

fn request_playback(
    playback: &mut PlaybackCallback,
    frames: usize,
) -> Result<Vec<u8>, DeviceError> {
    panic::catch_unwind(AssertUnwindSafe(|| playback(frames)))
        .map_err(|_| DeviceError::Stream("playback callback panicked".into()))
}

// ======================== Capture thread ========================

fn capture_thread(
    pcm: PCM,
    format: AudioFormat,
    mut capture: CaptureCallback,
    running: &AtomicBool,
) -> Result<(), DeviceError> {
    let channels = format.channels as usize;
    let io = pcm.io_i16().map_err(|e| DeviceError::Start(e.to_string()))?;
    let mut read_buf = vec![0i16; format.chunk_frames * channels];

    log::info!("Capture started: {} frames per block", format.chunk_frames);

    while running.load(Ordering::Relaxed) {
        match io.readi(&mut read_buf) {
            Ok(0) => continue,
            Ok(frames) => {
                let block = samples_to_bytes(&read_buf[..frames * channels]);
                deliver_capture(&mut capture, &block, frames)?;
            }
            Err(e) => {
                log::warn!("ALSA capture error: {}, recovering...", e);
                pcm.prepare()
                    .map_err(|e2| DeviceError::Stream(format!("capture recovery failed: {}", e2)))?;
            }
        }
    }

    log::info!("Capture stopped");
    Ok(())
}

// ======================== Playback thread ========================

fn playback_thread(
    pcm: PCM,
    format: AudioFormat,
    mut playback: PlaybackCallback,
    running: &AtomicBool,
) -> Result<(), DeviceError> {
    let channels = format.channels as usize;
    let io = pcm.io_i16().map_err(|e| DeviceError::Start(e.to_string()))?;

    log::info!("Playback started: {} frames per tick", format.chunk_frames);

    while running.load(Ordering::Relaxed) {
        let chunk = request_playback(&mut playback, format.chunk_frames)?;
        let samples = bytes_to_samples(&chunk);

        // Write with a retry loop to handle short writes and XRUN recovery.
        let total_frames = samples.len() / channels;
        let mut frames_written = 0;
        let mut retry_count = 0u32;
        while frames_written < total_frames && running.load(Ordering::Relaxed) {
            let offset = frames_written * channels;
            match io.writei(&samples[offset..]) {
                Ok(n) => {
                    frames_written += n;
                    retry_count = 0;
                }
                Err(e) => {
                    log::warn!("ALSA XRUN or error: {}, recovering...", e);
                    retry_count += 1;
                    pcm.prepare().map_err(|e2| {
                        DeviceError::Stream(format!("playback recovery failed: {}", e2))
                    })?;
                    if retry_count >= MAX_WRITE_RETRIES {
                        log::error!(
                            "Max recovery retries ({}) reached. Dropping {} unwritten frames.",
                            retry_count,
                            total_frames - frames_written
                        );
                        break;
                    }
                }
            }
        }
    }

    // Let already-queued frames finish instead of cutting them off.
    if let Err(e) = pcm.drain() {
        log::debug!("Playback drain on stop: {}", e);
    }
    log::info!("Playback stopped");
    Ok(())
}
