//! Session lifecycle: start devices and loops, and tear everything down once.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::callbacks::{CaptureHandler, PlaybackHandler};
use super::events::{EventSink, SessionEvent, SessionStats, StatsSnapshot};
use super::receiver::Receiver;
use super::sender::run_sender;
use super::state::{SessionState, StopCause, StopSignal};
use crate::audio::{
    AudioBackend, AudioFormat, DeviceCallbacks, GateController, InboundAudioBuffer, outbound_queue,
};
use crate::config::Config;
use crate::error::{DeviceError, SessionError};
use crate::transport::{EmptyReadPolicy, TransportSink, TransportSource};

/// Core tunables, separated from deployment settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub format: AudioFormat,
    pub reengage_delay: Duration,
    pub reengage_min_percent: u8,
    pub outbound_capacity: usize,
    pub empty_reads: EmptyReadPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            reengage_delay: Duration::from_millis(500),
            reengage_min_percent: 100,
            outbound_capacity: 256,
            empty_reads: EmptyReadPolicy::Continue,
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            format: config.audio_format(),
            reengage_delay: config.reengage_delay(),
            reengage_min_percent: config.reengage_min_percent,
            outbound_capacity: config.outbound_capacity,
            empty_reads: config.empty_read_policy,
        }
    }
}

/// Final status of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub cause: StopCause,
    pub stats: StatsSnapshot,
    /// Set when the audio devices failed to stop during teardown.
    pub device_error: Option<DeviceError>,
}

impl SessionReport {
    /// The report, or the device stop error it carries.
    pub fn into_result(self) -> Result<SessionReport, SessionError> {
        match &self.device_error {
            Some(e) => Err(SessionError::Device(e.clone())),
            None => Ok(self),
        }
    }
}

struct Running {
    backend: Box<dyn AudioBackend>,
    sender: JoinHandle<Box<dyn TransportSink>>,
    receiver: JoinHandle<()>,
}

pub struct SessionController {
    id: Uuid,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    stop: StopSignal,
    gate: Arc<GateController>,
    inbound: Arc<InboundAudioBuffer>,
    stats: Arc<SessionStats>,
    events: EventSink,
    running: Mutex<Option<Running>>,
    report: OnceLock<SessionReport>,
}

impl SessionController {
    pub fn new(config: SessionConfig, events: EventSink) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::Idle);
        Arc::new(Self {
            id: Uuid::new_v4(),
            gate: Arc::new(GateController::new(config.reengage_delay)),
            inbound: Arc::new(InboundAudioBuffer::new(config.reengage_min_percent)),
            config,
            state,
            stop: StopSignal::new(),
            stats: Arc::new(SessionStats::default()),
            events,
            running: Mutex::new(None),
            report: OnceLock::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn gate(&self) -> &Arc<GateController> {
        &self.gate
    }

    pub fn inbound(&self) -> &Arc<InboundAudioBuffer> {
        &self.inbound
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Available once the session reached `Stopped`.
    pub fn report(&self) -> Option<SessionReport> {
        self.report.get().cloned()
    }

    /// Start device streams and both transport loops. Must run inside a Tokio runtime.
    ///
    /// The transport must already be connected. On a device error the session
    /// stays `Idle` and the transport halves are dropped.
    pub fn start(
        self: &Arc<Self>,
        mut backend: Box<dyn AudioBackend>,
        sink: Box<dyn TransportSink>,
        source: Box<dyn TransportSource>,
    ) -> Result<(), SessionError> {
        let mut running = self.running.lock();
        if self.state() != SessionState::Idle || running.is_some() {
            return Err(SessionError::AlreadyStarted);
        }

        let format = self.config.format;
        if backend.format() != format {
            log::warn!(
                "Backend format {:?} differs from session format {:?}",
                backend.format(),
                format
            );
        }

        let (producer, consumer) = outbound_queue(self.config.outbound_capacity);

        let mut capture = CaptureHandler::new(
            self.gate.clone(),
            producer,
            self.stats.clone(),
            self.events.clone(),
        );
        let mut playback = PlaybackHandler::new(
            self.inbound.clone(),
            self.gate.clone(),
            self.stats.clone(),
            format,
        );
        let fault_signal = self.stop.clone();
        let callbacks = DeviceCallbacks {
            capture: Box::new(move |data: &[u8], _frames: usize| {
                capture.on_block(data, Instant::now())
            }),
            playback: Box::new(move |frames: usize| playback.on_tick(frames, Instant::now())),
            on_fault: Arc::new(move |e: DeviceError| {
                fault_signal.raise(StopCause::DeviceFailure(e.to_string()));
            }),
        };

        if let Err(e) = backend.start(callbacks) {
            log::error!("Failed to start audio devices: {}", e);
            return Err(e.into());
        }

        let sender = tokio::spawn(run_sender(
            consumer,
            sink,
            self.stop.clone(),
            self.stats.clone(),
        ));
        let receiver = Receiver {
            buffer: self.inbound.clone(),
            stop: self.stop.clone(),
            events: self.events.clone(),
            stats: self.stats.clone(),
            empty_reads: self.config.empty_reads,
        };
        let receiver = tokio::spawn(receiver.run(source));

        // Resources must be in place before anyone can observe Streaming.
        *running = Some(Running {
            backend,
            sender,
            receiver,
        });
        self.set_state(SessionState::Streaming);
        drop(running);
        log::info!("Session {} streaming", self.id);

        // Single shutdown path for loop and device failures.
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let cause = this.stop.raised().await;
            if cause.is_error() {
                log::error!("Session ending: {}", cause);
            }
            if let Err(e) = this.teardown().await {
                log::error!("Teardown error: {}", e);
            }
        });
        Ok(())
    }

    /// Request shutdown and wait until the session is `Stopped`.
    ///
    /// Safe to call any number of times from any task; only the first call
    /// tears down. A device stop error is returned to every caller, whichever
    /// path tore the session down.
    pub async fn stop(&self) -> Result<SessionReport, SessionError> {
        if self.state() == SessionState::Idle {
            return Err(SessionError::NotStarted);
        }
        if self.stop.raise(StopCause::UserRequested) {
            log::info!("Stop requested");
        }
        self.teardown().await
    }

    /// Wait for the session to reach `Stopped` without requesting it.
    pub async fn finished(&self) -> Option<SessionReport> {
        let mut rx = self.state.subscribe();
        if rx.wait_for(|s| s.is_terminal()).await.is_err() {
            return None;
        }
        self.report()
    }

    async fn teardown(&self) -> Result<SessionReport, SessionError> {
        let won = self.state.send_if_modified(|state| {
            if *state == SessionState::Streaming {
                *state = SessionState::Stopping;
                true
            } else {
                false
            }
        });

        if !won {
            // Someone else is tearing down; wait for them.
            let report = self.finished().await.ok_or(SessionError::NotStarted)?;
            return report.into_result();
        }
        self.events.emit(SessionEvent::StateChanged(SessionState::Stopping));
        log::info!("Session {} stopping", self.id);

        let running = self.running.lock().take();
        let Some(Running {
            mut backend,
            sender,
            receiver,
        }) = running
        else {
            // Unreachable: Streaming is only set with resources in place.
            return self.finish(None).into_result();
        };

        let sink = match sender.await {
            Ok(sink) => Some(sink),
            Err(e) => {
                log::error!("Sender task failed: {}", e);
                None
            }
        };
        if let Err(e) = receiver.await {
            log::error!("Receiver task failed: {}", e);
        }

        // Device stop joins threads; keep it off the async workers.
        let device_result = tokio::task::spawn_blocking(move || backend.stop())
            .await
            .unwrap_or_else(|e| Err(DeviceError::Stop(e.to_string())));
        if let Err(e) = &device_result {
            log::error!("Failed to stop audio devices: {}", e);
        }

        if let Some(mut sink) = sink {
            if let Err(e) = sink.close().await {
                log::warn!("Transport close: {}", e);
            }
        }

        self.finish(device_result.err()).into_result()
    }

    fn finish(&self, device_error: Option<DeviceError>) -> SessionReport {
        let report = SessionReport {
            session_id: self.id,
            cause: self.stop.cause().unwrap_or(StopCause::UserRequested),
            stats: self.stats.snapshot(),
            device_error,
        };
        let report = self.report.get_or_init(|| report).clone();
        self.set_state(SessionState::Stopped);
        log::info!("Session {} stopped: {}", self.id, report.cause);
        report
    }

    fn set_state(&self, next: SessionState) {
        self.state.send_replace(next);
        self.events.emit(SessionEvent::StateChanged(next));
    }
}
