use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use super::state::SessionState;
use crate::audio::GateDecision;

/// Observability events. Never required for correctness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    GateChanged(GateDecision),
    AudioDone,
    Text(String),
    ServerError(String),
}

/// Non-blocking event emitter; safe to use from device callbacks.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.tx {
            // 没有人监听时直接丢弃
            let _ = tx.send(event);
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionStats {
    pub blocks_captured: AtomicU64,
    pub blocks_suppressed: AtomicU64,
    pub blocks_dropped: AtomicU64,
    pub blocks_sent: AtomicU64,
    pub inbound_bytes: AtomicU64,
    pub underruns: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub blocks_captured: u64,
    pub blocks_suppressed: u64,
    pub blocks_dropped: u64,
    pub blocks_sent: u64,
    pub inbound_bytes: u64,
    pub underruns: u64,
}

impl SessionStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks_captured: self.blocks_captured.load(Ordering::Relaxed),
            blocks_suppressed: self.blocks_suppressed.load(Ordering::Relaxed),
            blocks_dropped: self.blocks_dropped.load(Ordering::Relaxed),
            blocks_sent: self.blocks_sent.load(Ordering::Relaxed),
            inbound_bytes: self.inbound_bytes.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
        }
    }
}
