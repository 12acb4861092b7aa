use std::sync::Arc;

use super::events::{EventSink, SessionEvent, SessionStats};
use super::state::{StopCause, StopSignal};
use crate::audio::InboundAudioBuffer;
use crate::protocol::ServerEvent;
use crate::transport::{EmptyReadPolicy, ReadOutcome, TransportSource};

pub struct Receiver {
    pub buffer: Arc<InboundAudioBuffer>,
    pub stop: StopSignal,
    pub events: EventSink,
    pub stats: Arc<SessionStats>,
    pub empty_reads: EmptyReadPolicy,
}

impl Receiver {
    /// Read envelopes until stopped or the stream ends.
    pub async fn run(self, mut source: Box<dyn TransportSource>) {
        loop {
            let read = tokio::select! {
                biased;
                _ = self.stop.raised() => break,
                read = source.recv() => read,
            };

            match read {
                Ok(ReadOutcome::Message(text)) => self.dispatch(&text),
                Ok(ReadOutcome::Empty) => match self.empty_reads {
                    EmptyReadPolicy::Continue => log::debug!("Received empty message"),
                    EmptyReadPolicy::EndStream => {
                        log::info!("Empty read, treating as end of stream");
                        self.stop.raise(StopCause::TransportClosed);
                        break;
                    }
                },
                Ok(ReadOutcome::Closed) => {
                    log::info!("Transport closed by peer");
                    self.stop.raise(StopCause::TransportClosed);
                    break;
                }
                Err(e) => {
                    log::error!("Transport read failed: {}", e);
                    self.stop.raise(StopCause::TransportFailure(e.to_string()));
                    break;
                }
            }
        }
        log::info!("Exiting receiver loop");
    }

    /// Handle one envelope. Malformed input is logged and skipped.
    pub fn dispatch(&self, text: &str) {
        let event = match ServerEvent::parse(text) {
            Ok(event) => event,
            Err(e) => {
                log::warn!("Skipping malformed message: {}", e);
                return;
            }
        };

        match event {
            ServerEvent::AudioDelta(pcm) => {
                self.buffer.append(&pcm);
                SessionStats::add(&self.stats.inbound_bytes, pcm.len());
                log::debug!("Received {} bytes, buffer: {}", pcm.len(), self.buffer.len());
            }
            ServerEvent::AudioDone => {
                log::info!("AI finished speaking");
                self.events.emit(SessionEvent::AudioDone);
            }
            ServerEvent::Text(text) => {
                log::debug!("Received text: {}", text);
                self.events.emit(SessionEvent::Text(text));
            }
            ServerEvent::Error(message) => {
                log::warn!("Server reported error: {}", message);
                self.events.emit(SessionEvent::ServerError(message));
            }
            ServerEvent::Other(kind) => log::debug!("Ignoring event: {}", kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::channel_transport;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn receiver(policy: EmptyReadPolicy) -> (Receiver, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Receiver {
                buffer: Arc::new(InboundAudioBuffer::new(100)),
                stop: StopSignal::new(),
                events: EventSink::new(tx),
                stats: Arc::new(SessionStats::default()),
                empty_reads: policy,
            },
            rx,
        )
    }

    #[test]
    fn audio_delta_appends_to_buffer() {
        let (rx, _events) = receiver(EmptyReadPolicy::Continue);
        rx.dispatch(r#"{"type":"response.audio.delta","delta":"AQIDBA=="}"#);
        assert_eq!(rx.buffer.drain(4).bytes, vec![1, 2, 3, 4]);
        assert_eq!(rx.stats.snapshot().inbound_bytes, 4);
    }

    #[test]
    fn done_and_errors_become_events() {
        let (rx, mut events) = receiver(EmptyReadPolicy::Continue);
        rx.dispatch(r#"{"type":"response.audio.done"}"#);
        rx.dispatch(r#"{"type":"error","error":{"message":"slow down"}}"#);
        rx.dispatch(r#"{"type":"rate_limits.updated"}"#);

        assert_eq!(events.try_recv().unwrap(), SessionEvent::AudioDone);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::ServerError("slow down".into())
        );
        assert!(events.try_recv().is_err());
        assert!(rx.buffer.is_empty());
    }

    #[tokio::test]
    async fn corrupt_message_does_not_end_loop() {
        let (rx, _events) = receiver(EmptyReadPolicy::Continue);
        let buffer = rx.buffer.clone();
        let stop = rx.stop.clone();
        let (_sink, source, peer) = channel_transport();

        peer.push_text("{{{ not json");
        peer.push_empty();
        peer.push_text(r#"{"type":"response.audio.delta","delta":"AAE="}"#);
        peer.push_close();

        tokio::time::timeout(Duration::from_secs(1), rx.run(Box::new(source)))
            .await
            .unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(stop.cause(), Some(StopCause::TransportClosed));
    }

    #[tokio::test]
    async fn empty_read_can_end_stream() {
        let (rx, _events) = receiver(EmptyReadPolicy::EndStream);
        let stop = rx.stop.clone();
        let (_sink, source, peer) = channel_transport();
        peer.push_empty();

        tokio::time::timeout(Duration::from_secs(1), rx.run(Box::new(source)))
            .await
            .unwrap();
        assert_eq!(stop.cause(), Some(StopCause::TransportClosed));
    }

    #[tokio::test]
    async fn exits_on_stop_while_blocked_on_read() {
        let (rx, _events) = receiver(EmptyReadPolicy::Continue);
        let stop = rx.stop.clone();
        let (_sink, source, _peer) = channel_transport();

        let task = tokio::spawn(rx.run(Box::new(source)));
        tokio::time::sleep(Duration::from_millis(10)).await;
        stop.raise(StopCause::UserRequested);
        tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    }
}
