//! Shared audio buffers, the playback clock and the playlist sequencer.

mod buffer;
mod clock;
pub mod playlist;
mod transport;

pub use buffer::{MAX_CHANNELS, SampleBuffer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use playlist::{LoadRequest, LoopMode, Sequencer, TrackEndAction};
pub use transport::{ClockAnchor, PlaybackState, SourceControl, TickOutcome, Transport};
