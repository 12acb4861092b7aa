//! Bodies of the capture and playback callbacks.
//!
//! Both take the current instant explicitly so gating is deterministic for a
//! given timeline. Neither waits on anything but the short gate/buffer locks.

use std::sync::Arc;
use std::time::Instant;

use super::events::{EventSink, SessionEvent, SessionStats};
use crate::audio::{
    AudioFormat, GateController, GateDecision, InboundAudioBuffer, Offer, OutboundProducer,
    SampleBlock,
};

pub struct CaptureHandler {
    gate: Arc<GateController>,
    queue: OutboundProducer,
    stats: Arc<SessionStats>,
    events: EventSink,
    /// Currently dropping at the high watermark; logged once per episode.
    overflowing: bool,
}

impl CaptureHandler {
    pub fn new(
        gate: Arc<GateController>,
        queue: OutboundProducer,
        stats: Arc<SessionStats>,
        events: EventSink,
    ) -> Self {
        Self {
            gate,
            queue,
            stats,
            events,
            overflowing: false,
        }
    }

    pub fn on_block(&mut self, data: &[u8], now: Instant) -> GateDecision {
        SessionStats::bump(&self.stats.blocks_captured);

        let verdict = self.gate.on_capture_block(now);
        if verdict.transitioned {
            match verdict.decision {
                GateDecision::Live => log::info!("Mic active"),
                GateDecision::Suppressed => log::info!("Mic suppressed"),
            }
            self.events.emit(SessionEvent::GateChanged(verdict.decision));
        }

        match verdict.decision {
            GateDecision::Live => match self.queue.offer(SampleBlock::new(data, now)) {
                Offer::Queued => self.overflowing = false,
                Offer::Full => {
                    SessionStats::bump(&self.stats.blocks_dropped);
                    if !self.overflowing {
                        log::warn!("Outbound queue full, dropping captured audio");
                        self.overflowing = true;
                    }
                }
                // Sender already gone; the session is shutting down.
                Offer::Closed => {}
            },
            GateDecision::Suppressed => SessionStats::bump(&self.stats.blocks_suppressed),
        }
        verdict.decision
    }
}

pub struct PlaybackHandler {
    buffer: Arc<InboundAudioBuffer>,
    gate: Arc<GateController>,
    stats: Arc<SessionStats>,
    format: AudioFormat,
    /// Last tick was an underrun; logged once per gap.
    starved: bool,
}

impl PlaybackHandler {
    pub fn new(
        buffer: Arc<InboundAudioBuffer>,
        gate: Arc<GateController>,
        stats: Arc<SessionStats>,
        format: AudioFormat,
    ) -> Self {
        Self {
            buffer,
            gate,
            stats,
            format,
            starved: true,
        }
    }

    /// Produce exactly `frames` frames of output.
    pub fn on_tick(&mut self, frames: usize, now: Instant) -> Vec<u8> {
        let needed = frames * self.format.bytes_per_frame();
        let drained = self.buffer.drain_for_playback(needed, &self.gate, now);

        if drained.is_underrun() {
            SessionStats::bump(&self.stats.underruns);
            if !self.starved {
                log::debug!("Playback buffer ran dry, padded {} bytes", drained.padding());
            }
            self.starved = true;
        } else {
            self.starved = false;
        }
        drained.bytes
    }
}
