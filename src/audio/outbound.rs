//! Capture → sender handoff.
//!
//! The producer side never waits: a full queue drops the newest block.

use std::time::Instant;

use bytes::Bytes;
use tokio::sync::mpsc;

/// One captured frame, immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBlock {
    data: Bytes,
    captured_at: Instant,
}

impl SampleBlock {
    pub fn new(data: &[u8], captured_at: Instant) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
            captured_at,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    /// High watermark reached; the block was dropped.
    Full,
    /// The consumer is gone; the block was dropped.
    Closed,
}

/// Create a FIFO bounded at `capacity` blocks.
///
/// # Panics
/// Panics if `capacity` is zero; `Config::validate` rejects that value.
/// Largest queue the session will allocate, about 45 minutes of 24 kHz audio
/// in 1024-frame blocks.
pub const MAX_OUTBOUND_CAPACITY: usize = 65_536;

/// Capacity is clamped to `1..=MAX_OUTBOUND_CAPACITY`.
pub fn outbound_queue(capacity: usize) -> (OutboundProducer, OutboundConsumer) {
    let (tx, rx) = mpsc::channel(capacity.clamp(1, MAX_OUTBOUND_CAPACITY));
    (OutboundProducer { tx }, OutboundConsumer { rx })
}

#[derive(Debug, Clone)]
pub struct OutboundProducer {
    tx: mpsc::Sender<SampleBlock>,
}

impl OutboundProducer {
    /// Non-blocking enqueue, safe to call from a device callback.
    pub fn offer(&self, block: SampleBlock) -> Offer {
        match self.tx.try_send(block) {
            Ok(()) => Offer::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Offer::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Offer::Closed,
        }
    }
}

#[derive(Debug)]
pub struct OutboundConsumer {
    rx: mpsc::Receiver<SampleBlock>,
}

impl OutboundConsumer {
    /// Wait for the next block. `None` once every producer is dropped and
    /// the queue is empty.
    pub async fn next(&mut self) -> Option<SampleBlock> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<SampleBlock> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_capture_order() {
        let (producer, mut consumer) = outbound_queue(8);
        let t0 = Instant::now();
        for i in 0..5u8 {
            assert_eq!(producer.offer(SampleBlock::new(&[i], t0)), Offer::Queued);
        }
        let drained: Vec<u8> = std::iter::from_fn(|| consumer.try_next())
            .map(|b| b.data()[0])
            .collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let (producer, mut consumer) = outbound_queue(2);
        let t0 = Instant::now();
        assert_eq!(producer.offer(SampleBlock::new(&[1], t0)), Offer::Queued);
        assert_eq!(producer.offer(SampleBlock::new(&[2], t0)), Offer::Queued);
        assert_eq!(producer.offer(SampleBlock::new(&[3], t0)), Offer::Full);

        assert_eq!(consumer.len(), 2);
        assert_eq!(consumer.try_next().unwrap().data(), &[1]);
        assert_eq!(consumer.try_next().unwrap().data(), &[2]);
        assert!(consumer.try_next().is_none());
    }

    #[test]
    fn dropped_consumer_reports_closed() {
        let (producer, consumer) = outbound_queue(2);
        drop(consumer);
        assert_eq!(
            producer.offer(SampleBlock::new(&[1], Instant::now())),
            Offer::Closed
        );
    }

    #[test]
    fn capacity_is_clamped() {
        let (producer, _consumer) = outbound_queue(0);
        let t0 = Instant::now();
        assert_eq!(producer.offer(SampleBlock::new(&[1], t0)), Offer::Queued);
        assert_eq!(producer.offer(SampleBlock::new(&[2], t0)), Offer::Full);

        let (producer, _consumer) = outbound_queue(usize::MAX);
        assert_eq!(producer.offer(SampleBlock::new(&[1], t0)), Offer::Queued);
    }

    #[tokio::test]
    async fn next_ends_when_producers_drop() {
        let (producer, mut consumer) = outbound_queue(2);
        let t0 = Instant::now();
        producer.offer(SampleBlock::new(&[7, 7], t0));
        drop(producer);
        let block = consumer.next().await.unwrap();
        assert_eq!(block.len(), 2);
        assert_eq!(block.captured_at(), t0);
        assert!(consumer.next().await.is_none());
    }
}
