//! Playback-side byte FIFO.
//!
//! Written by the transport receiver, drained by the playback callback one
//! device frame at a time. Draining never blocks on I/O and costs one copy of
//! the requested length.

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::Mutex;

use super::gate::GateController;

/// Value used to pad underruns. Zero is silence for signed 16-bit PCM.
pub const SILENCE: u8 = 0;

/// Bytes handed to the device for one playback tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drained {
    pub bytes: Vec<u8>,
    /// How many leading bytes came from the buffer; the rest is padding.
    pub filled: usize,
}

impl Drained {
    pub fn is_underrun(&self) -> bool {
        self.filled < self.bytes.len()
    }

    pub fn padding(&self) -> usize {
        self.bytes.len() - self.filled
    }
}

#[derive(Debug)]
pub struct InboundAudioBuffer {
    bytes: Mutex<VecDeque<u8>>,
    /// Minimum share of a tick (in percent) that must be real audio to
    /// re-arm the gate.
    reengage_min_percent: u8,
}

impl InboundAudioBuffer {
    pub fn new(reengage_min_percent: u8) -> Self {
        Self {
            bytes: Mutex::new(VecDeque::new()),
            reengage_min_percent: reengage_min_percent.min(100),
        }
    }

    pub fn append(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.bytes.lock().extend(data.iter().copied());
    }

    /// Take exactly `n` bytes from the front, padding with silence on underrun.
    pub fn drain(&self, n: usize) -> Drained {
        let mut out = Vec::with_capacity(n);
        let filled = {
            let mut buf = self.bytes.lock();
            let take = n.min(buf.len());
            out.extend(buf.drain(..take));
            take
        };
        out.resize(n, SILENCE);
        Drained { bytes: out, filled }
    }

    /// Drain one playback tick and re-arm `gate` if the tick carried real audio.
    ///
    /// The buffer lock is released before the gate lock is taken.
    pub fn drain_for_playback(&self, n: usize, gate: &GateController, now: Instant) -> Drained {
        let drained = self.drain(n);
        if self.counts_as_real(&drained) {
            gate.on_playback_delivered(now);
        }
        drained
    }

    /// Whether a tick is real audio rather than silence padding.
    pub fn counts_as_real(&self, drained: &Drained) -> bool {
        if drained.filled == 0 {
            return false;
        }
        drained.filled * 100 >= drained.bytes.len() * self.reengage_min_percent as usize
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn drains_in_fifo_order_across_appends() {
        let buf = InboundAudioBuffer::new(100);
        buf.append(&[1, 2, 3]);
        buf.append(&[4, 5]);

        let mut out = Vec::new();
        out.extend(buf.drain(2).bytes);
        out.extend(buf.drain(2).bytes);
        let last = buf.drain(2);
        out.extend(&last.bytes);

        assert_eq!(out, vec![1, 2, 3, 4, 5, SILENCE]);
        assert!(last.is_underrun());
        assert!(buf.is_empty());
    }

    #[test]
    fn underrun_pads_to_exact_length() {
        let buf = InboundAudioBuffer::new(100);
        buf.append(&[9, 9, 9]);

        let drained = buf.drain(8);
        assert_eq!(drained.bytes.len(), 8);
        assert_eq!(drained.filled, 3);
        assert_eq!(drained.padding(), 5);
        assert!(drained.bytes[3..].iter().all(|&b| b == SILENCE));
    }

    #[test]
    fn full_drain_is_not_underrun() {
        let buf = InboundAudioBuffer::new(100);
        buf.append(&[1, 2, 3, 4]);
        let drained = buf.drain(4);
        assert!(!drained.is_underrun());
        assert_eq!(drained.bytes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn empty_buffer_yields_pure_silence() {
        let buf = InboundAudioBuffer::new(100);
        let drained = buf.drain(4);
        assert_eq!(drained.bytes, vec![SILENCE; 4]);
        assert_eq!(drained.filled, 0);
    }

    #[test]
    fn padding_never_rearms_gate() {
        let t0 = Instant::now();
        let gate = GateController::new(Duration::from_millis(500));
        let buf = InboundAudioBuffer::new(0);

        buf.drain_for_playback(4, &gate, t0);
        assert!(gate.cooldown_until().is_none());
    }

    #[test]
    fn real_audio_rearms_gate() {
        let t0 = Instant::now();
        let gate = GateController::new(Duration::from_millis(500));
        let buf = InboundAudioBuffer::new(100);
        buf.append(&[1, 2, 3, 4]);

        buf.drain_for_playback(4, &gate, t0);
        assert_eq!(gate.cooldown_until(), Some(t0 + Duration::from_millis(500)));
    }

    #[test]
    fn partial_tick_respects_threshold() {
        let t0 = Instant::now();

        let strict_gate = GateController::new(Duration::from_millis(500));
        let strict = InboundAudioBuffer::new(100);
        strict.append(&[1, 2]);
        strict.drain_for_playback(4, &strict_gate, t0);
        assert!(strict_gate.cooldown_until().is_none());

        let lenient_gate = GateController::new(Duration::from_millis(500));
        let lenient = InboundAudioBuffer::new(50);
        lenient.append(&[1, 2]);
        lenient.drain_for_playback(4, &lenient_gate, t0);
        assert!(lenient_gate.cooldown_until().is_some());
    }
}
