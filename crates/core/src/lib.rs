pub mod config;
mod error;
pub mod export;
pub mod media;
pub mod session;
mod ticker;

pub use config::{AmbienceAssets, EditorConfig};
pub use error::SessionError;
pub use media::{DefaultProvider, FetchError, FileProvider, HttpProvider, MediaProvider};
pub use session::{EditorSession, SessionEvent, load_asset};
pub use ticker::Ticker;

pub use echo_encode::{Download, ExportFormat};
pub use echo_engine::{AmbienceKind, EffectParameters, GraphConfig, OutputDevice, ParameterPolicy};
pub use echo_project::{Playlist, TrackDescriptor, load_playlist};
pub use echo_render::RenderJob;
pub use echo_transport::{LoopMode, PlaybackState, SystemClock};
