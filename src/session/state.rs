use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Session lifecycle. Transitions only move forward, one step at a time:
///
/// ```text
/// Idle → Streaming → Stopping → Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
    Stopping,
    Stopped,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Streaming => "streaming",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Why a session stopped. Only the first cause raised is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopCause {
    UserRequested,
    TransportClosed,
    TransportFailure(String),
    DeviceFailure(String),
}

impl StopCause {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::TransportFailure(_) | Self::DeviceFailure(_))
    }
}

impl fmt::Display for StopCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserRequested => f.write_str("stopped by user"),
            Self::TransportClosed => f.write_str("remote closed the stream"),
            Self::TransportFailure(e) => write!(f, "transport failure: {}", e),
            Self::DeviceFailure(e) => write!(f, "device failure: {}", e),
        }
    }
}

/// Shared, set-once stop signal.
///
/// Raising is atomic: exactly one caller wins and records its cause, and
/// every waiter (current or future) observes the raised value.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<Option<StopCause>>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Returns `true` if this call raised the signal.
    pub fn raise(&self, cause: StopCause) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(cause);
            true
        })
    }

    pub fn is_raised(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn cause(&self) -> Option<StopCause> {
        self.tx.borrow().clone()
    }

    /// Resolve once the signal is raised (immediately if it already is).
    pub async fn raised(&self) -> StopCause {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(cause) => cause.clone().unwrap_or(StopCause::UserRequested),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => StopCause::UserRequested,
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
