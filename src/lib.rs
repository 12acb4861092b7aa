//! Real-time duplex voice client.
//!
//! Captures microphone audio, gates it against the system's own playback,
//! streams live blocks to a realtime conversational endpoint, and plays the
//! endpoint's synthesized speech back without gaps.

pub mod audio;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::Config;
pub use error::{ConfigError, DeviceError, ProtocolError, SessionError, TransportError};
pub use session::{SessionController, SessionEvent, SessionReport, SessionState, StopCause};
