//! Duplex message transport seen by the session loops.
//!
//! The stream is split into a write half owned by the sender loop and a read
//! half owned by the receiver loop, so neither direction waits on the other.

use std::str::FromStr;

use async_trait::async_trait;

use crate::error::TransportError;

pub mod channel;
pub mod websocket;

pub use channel::{ChannelPeer, ChannelSink, ChannelSource, channel_transport};

/// Result of one read on the inbound half.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Message(String),
    /// A read that carried no envelope (control frame, empty payload).
    Empty,
    /// The peer ended the stream.
    Closed,
}

/// What the receiver does with [`ReadOutcome::Empty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyReadPolicy {
    #[default]
    Continue,
    EndStream,
}

impl FromStr for EmptyReadPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(EmptyReadPolicy::Continue),
            "end" | "end_stream" => Ok(EmptyReadPolicy::EndStream),
            other => Err(format!("unknown empty read policy: {}", other)),
        }
    }
}

#[async_trait]
pub trait TransportSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the outbound half. Called once, at session teardown.
    async fn close(&mut self) -> Result<(), TransportError>;
}

#[async_trait]
pub trait TransportSource: Send {
    async fn recv(&mut self) -> Result<ReadOutcome, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policies() {
        assert_eq!("continue".parse(), Ok(EmptyReadPolicy::Continue));
        assert_eq!(" End ".parse(), Ok(EmptyReadPolicy::EndStream));
        assert!("sometimes".parse::<EmptyReadPolicy>().is_err());
    }
}
