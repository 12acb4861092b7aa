//! Session orchestration: the capture/playback callbacks, the two transport
//! loops, and the lifecycle that ties them to a single shutdown path.

mod callbacks;
mod controller;
mod events;
mod receiver;
mod sender;
mod state;

pub use callbacks::{CaptureHandler, PlaybackHandler};
pub use controller::{SessionConfig, SessionController, SessionReport};
pub use events::{EventSink, SessionEvent, SessionStats, StatsSnapshot};
pub use receiver::Receiver;
pub use sender::run_sender;
pub use state::{SessionState, StopCause, StopSignal};
