//! In-process transport backed by tokio channels.
//!
//! The [`ChannelPeer`] plays the remote endpoint: it sees every outbound
//! envelope and injects inbound reads, so a session can be driven without
//! a network connection. The crate's tests run sessions over it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ReadOutcome, TransportSink, TransportSource};
use crate::error::TransportError;

pub struct ChannelSink {
    tx: Option<mpsc::UnboundedSender<String>>,
    closes: Arc<AtomicUsize>,
}

pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<ReadOutcome>,
}

pub struct ChannelPeer {
    /// Envelopes written by the session.
    pub outbound: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<ReadOutcome>,
    closes: Arc<AtomicUsize>,
}

pub fn channel_transport() -> (ChannelSink, ChannelSource, ChannelPeer) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let closes = Arc::new(AtomicUsize::new(0));
    (
        ChannelSink {
            tx: Some(out_tx),
            closes: closes.clone(),
        },
        ChannelSource { rx: in_rx },
        ChannelPeer {
            outbound: out_rx,
            inbound: in_tx,
            closes,
        },
    )
}

impl ChannelPeer {
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.inbound.send(ReadOutcome::Message(text.into()));
    }

    pub fn push_empty(&self) {
        let _ = self.inbound.send(ReadOutcome::Empty);
    }

    pub fn push_close(&self) {
        let _ = self.inbound.send(ReadOutcome::Closed);
    }

    /// Make every further write from the session fail.
    pub fn break_outbound(&mut self) {
        self.outbound.close();
    }

    /// How many times the session closed its write half.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportSink for ChannelSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(text)
            .map_err(|_| TransportError::Write("peer stopped reading".into()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.tx.take();
        Ok(())
    }
}

#[async_trait]
impl TransportSource for ChannelSource {
    async fn recv(&mut self) -> Result<ReadOutcome, TransportError> {
        Ok(self.rx.recv().await.unwrap_or(ReadOutcome::Closed))
    }
}
