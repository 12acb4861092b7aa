use std::sync::Arc;

use super::events::SessionStats;
use super::state::{StopCause, StopSignal};
use crate::audio::OutboundConsumer;
use crate::protocol::ClientEvent;
use crate::transport::TransportSink;

/// Drain the outbound queue into the transport until stopped.
///
/// Returns the sink so the controller can close it exactly once. Blocks still
/// queued when the stop signal fires are discarded.
pub async fn run_sender(
    mut queue: OutboundConsumer,
    mut sink: Box<dyn TransportSink>,
    stop: StopSignal,
    stats: Arc<SessionStats>,
) -> Box<dyn TransportSink> {
    loop {
        let block = tokio::select! {
            biased;
            _ = stop.raised() => break,
            block = queue.next() => match block {
                Some(block) => block,
                None => {
                    log::debug!("Outbound queue closed");
                    break;
                }
            },
        };

        let envelope = match ClientEvent::audio_append(block.data()).to_json() {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to encode audio block: {}", e);
                continue;
            }
        };

        log::debug!(
            "Sending {} bytes of audio, captured {:?} ago",
            block.len(),
            block.captured_at().elapsed()
        );
        let sent = tokio::select! {
            biased;
            _ = stop.raised() => break,
            sent = sink.send_text(envelope) => sent,
        };

        match sent {
            Ok(()) => SessionStats::bump(&stats.blocks_sent),
            Err(e) => {
                // 写失败无法恢复，只能结束会话
                log::error!("Transport write failed: {}", e);
                stop.raise(StopCause::TransportFailure(e.to_string()));
                break;
            }
        }
    }

    if !queue.is_empty() {
        log::info!("Discarding {} unsent audio blocks", queue.len());
    }
    log::info!("Exiting sender loop");
    sink
}
