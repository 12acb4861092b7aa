use thiserror::Error;

/// Invalid build-time or runtime configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("missing required setting {0}")]
    Missing(&'static str),
}

/// Errors raised by the audio device layer.
///
/// Every variant is fatal to the session that owns the device.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("failed to open {direction} device '{device}': {reason}")]
    Open {
        device: String,
        direction: &'static str,
        reason: String,
    },

    #[error("device stream already started")]
    AlreadyStarted,

    #[error("failed to start device stream: {0}")]
    Start(String),

    #[error("failed to stop device stream: {0}")]
    Stop(String),

    #[error("device stream fault: {0}")]
    Stream(String),
}

/// Errors raised by the duplex message transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("read failed: {0}")]
    Read(String),

    #[error("transport closed")]
    Closed,
}

/// A single inbound envelope that could not be decoded.
///
/// Always transient: the receiver logs it and keeps reading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Json(String),

    #[error("envelope has no 'type'")]
    MissingType,

    #[error("envelope of kind {kind} is missing field '{field}'")]
    MissingField { kind: String, field: &'static str },

    #[error("invalid base64 payload: {0}")]
    Base64(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Json(e.to_string())
    }
}

impl From<base64::DecodeError> for ProtocolError {
    fn from(e: base64::DecodeError) -> Self {
        ProtocolError::Base64(e.to_string())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session already started")]
    AlreadyStarted,

    #[error("session was never started")]
    NotStarted,

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
