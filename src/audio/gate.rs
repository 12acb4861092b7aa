//! Open-loop echo gate.
//!
//! Any audio leaving the speaker is assumed to be recaptured by the
//! microphone, so capture is suppressed for a fixed window after each real
//! playback delivery.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Live,
    Suppressed,
}

/// Result of gating one capture block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateVerdict {
    pub decision: GateDecision,
    /// The decision differs from the previous block's (or this is the first block).
    pub transitioned: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct GateState {
    /// `None` until the first real playback delivery.
    cooldown_until: Option<Instant>,
    last: Option<GateDecision>,
}

#[derive(Debug)]
pub struct GateController {
    reengage_delay: Duration,
    state: Mutex<GateState>,
}

impl GateController {
    pub fn new(reengage_delay: Duration) -> Self {
        Self {
            reengage_delay,
            state: Mutex::new(GateState::default()),
        }
    }

    /// Gate one capture block produced at `now`. Live iff `now > cooldown_until`.
    pub fn on_capture_block(&self, now: Instant) -> GateVerdict {
        let mut state = self.state.lock();
        let decision = match state.cooldown_until {
            Some(until) if now <= until => GateDecision::Suppressed,
            _ => GateDecision::Live,
        };
        let transitioned = state.last != Some(decision);
        state.last = Some(decision);
        GateVerdict {
            decision,
            transitioned,
        }
    }

    /// Re-arm the cooldown after a playback tick that delivered real audio.
    ///
    /// Must not be called for padding-only ticks.
    pub fn on_playback_delivered(&self, now: Instant) {
        self.state.lock().cooldown_until = Some(now + self.reengage_delay);
    }

    pub fn cooldown_until(&self) -> Option<Instant> {
        self.state.lock().cooldown_until
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn live_before_any_playback() {
        let gate = GateController::new(ms(500));
        let verdict = gate.on_capture_block(Instant::now());
        assert_eq!(verdict.decision, GateDecision::Live);
        assert!(verdict.transitioned);
        assert!(gate.cooldown_until().is_none());
    }

    #[test]
    fn cooldown_window_suppresses_then_releases() {
        let t0 = Instant::now();
        let gate = GateController::new(ms(500));
        gate.on_playback_delivered(t0);

        assert_eq!(gate.on_capture_block(t0 + ms(100)).decision, GateDecision::Suppressed);
        assert_eq!(gate.on_capture_block(t0 + ms(600)).decision, GateDecision::Live);
    }

    #[test]
    fn boundary_instant_is_still_suppressed() {
        let t0 = Instant::now();
        let gate = GateController::new(ms(500));
        gate.on_playback_delivered(t0);

        assert_eq!(gate.on_capture_block(t0 + ms(500)).decision, GateDecision::Suppressed);
        assert_eq!(
            gate.on_capture_block(t0 + ms(500) + Duration::from_nanos(1)).decision,
            GateDecision::Live
        );
    }

    #[test]
    fn rearm_sets_cooldown_from_latest_delivery() {
        let t0 = Instant::now();
        let gate = GateController::new(ms(500));
        gate.on_playback_delivered(t0);
        gate.on_playback_delivered(t0 + ms(300));
        assert_eq!(gate.cooldown_until(), Some(t0 + ms(800)));
        assert_eq!(gate.on_capture_block(t0 + ms(700)).decision, GateDecision::Suppressed);
    }

    #[test]
    fn capture_does_not_move_cooldown() {
        let t0 = Instant::now();
        let gate = GateController::new(ms(500));
        gate.on_playback_delivered(t0);
        let before = gate.cooldown_until();
        gate.on_capture_block(t0 + ms(100));
        gate.on_capture_block(t0 + ms(900));
        assert_eq!(gate.cooldown_until(), before);
    }

    #[test]
    fn transitions_reported_only_on_change() {
        let t0 = Instant::now();
        let gate = GateController::new(ms(500));

        assert!(gate.on_capture_block(t0).transitioned);
        assert!(!gate.on_capture_block(t0 + ms(10)).transitioned);

        gate.on_playback_delivered(t0 + ms(20));
        let v = gate.on_capture_block(t0 + ms(30));
        assert_eq!(v.decision, GateDecision::Suppressed);
        assert!(v.transitioned);
        assert!(!gate.on_capture_block(t0 + ms(40)).transitioned);

        let v = gate.on_capture_block(t0 + ms(600));
        assert_eq!(v.decision, GateDecision::Live);
        assert!(v.transitioned);
    }
}
