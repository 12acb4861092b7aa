//! audio - capture/playback plumbing and the echo-gating discipline
//!
//! Device callbacks run on dedicated OS threads and only touch the gate, the
//! outbound queue and the inbound buffer, each behind its own short lock.
//! Everything that can block lives in the session loops.

mod alsa_device;
pub mod alsa_backend;
pub mod device;
pub mod gate;
pub mod inbound;
pub mod outbound;

pub use alsa_backend::{AlsaBackend, AlsaConfig};
pub use device::{AudioBackend, AudioFormat, DeviceCallbacks};
pub use gate::{GateController, GateDecision, GateVerdict};
pub use inbound::{Drained, InboundAudioBuffer};
pub use outbound::{
    MAX_OUTBOUND_CAPACITY, Offer, OutboundConsumer, OutboundProducer, SampleBlock, outbound_queue,
};
