// Media playback: engine abstraction, authenticated streaming and the
// per-window session with its refresh tick

pub mod engine;
#[cfg(unix)]
pub mod mpv;
pub mod proxy;
pub mod session;
pub mod source;
pub mod ticker;

pub use engine::{AudioTrack, MediaEngine, MediaHandle};
#[cfg(unix)]
pub use mpv::MpvEngine;
pub use proxy::MediaProxy;
pub use session::{format_time, PlaybackSession, PlaybackState, PlaybackStatus};
pub use source::{AuthenticatedSource, MediaSource};
pub use ticker::{Ticker, TICK_INTERVAL};
