use std::fmt;
use std::str::FromStr;

use echo_transport::SampleBuffer;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::handle::EffectGraph;

pub const LAYER_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbienceKind {
    Rain,
    Wind,
    Forest,
    Fire,
}

impl AmbienceKind {
    pub const ALL: [AmbienceKind; LAYER_COUNT] = [
        AmbienceKind::Rain,
        AmbienceKind::Wind,
        AmbienceKind::Forest,
        AmbienceKind::Fire,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            AmbienceKind::Rain => "rain",
            AmbienceKind::Wind => "wind",
            AmbienceKind::Forest => "forest",
            AmbienceKind::Fire => "fire",
        }
    }

    /// Bundled asset path for this layer.
    pub fn default_asset(self) -> &'static str {
        match self {
            AmbienceKind::Rain => "audio/rain.mp3",
            AmbienceKind::Wind => "audio/wind.mp3",
            AmbienceKind::Forest => "audio/green.mp3",
            AmbienceKind::Fire => "audio/fire.mp3",
        }
    }
}

impl fmt::Display for AmbienceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ambience layer '{0}'")]
pub struct UnknownAmbience(pub String);

impl FromStr for AmbienceKind {
    type Err = UnknownAmbience;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rain" => Ok(AmbienceKind::Rain),
            "wind" => Ok(AmbienceKind::Wind),
            "forest" | "green" => Ok(AmbienceKind::Forest),
            "fire" => Ok(AmbienceKind::Fire),
            _ => Err(UnknownAmbience(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Enabled for the first time; the caller must fetch and decode the asset
    /// and hand it to [`AmbienceManager::on_loaded`].
    NeedsLoad,
    /// Enabled while an earlier load is still pending.
    Loading,
    Started,
    Stopped,
}

#[derive(Debug, Default)]
struct AmbienceLayer {
    enabled: bool,
    /// 0-100.
    volume: f64,
    buffer: Option<SampleBuffer>,
    loading: bool,
    playing: bool,
}

/// A layer's state captured for an offline render.
#[derive(Debug, Clone)]
pub struct AmbienceSnapshot {
    pub kind: AmbienceKind,
    pub gain: f32,
    pub buffer: SampleBuffer,
}

/// Four looping background layers, each wired straight to the output
/// through its own gain.
#[derive(Debug, Default)]
pub struct AmbienceManager {
    layers: [AmbienceLayer; LAYER_COUNT],
}

impl AmbienceManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn start(layer: &mut AmbienceLayer, index: usize, graph: &mut EffectGraph) {
        graph.set_layer_gain(index, (layer.volume / 100.0) as f32);
        graph.start_layer(index);
        layer.playing = true;
    }

    pub fn toggle(&mut self, kind: AmbienceKind, graph: &mut EffectGraph) -> ToggleOutcome {
        let index = kind.index();
        let layer = &mut self.layers[index];
        layer.enabled = !layer.enabled;

        if !layer.enabled {
            if layer.playing {
                graph.stop_layer(index);
                layer.playing = false;
            }
            debug!(%kind, "ambience stopped");
            return ToggleOutcome::Stopped;
        }

        if layer.buffer.is_some() {
            Self::start(layer, index, graph);
            debug!(%kind, "ambience started");
            ToggleOutcome::Started
        } else if layer.loading {
            ToggleOutcome::Loading
        } else {
            layer.loading = true;
            ToggleOutcome::NeedsLoad
        }
    }

    /// Deliver a decoded asset. Starts the layer only if it is still enabled.
    pub fn on_loaded(&mut self, kind: AmbienceKind, buffer: SampleBuffer, graph: &mut EffectGraph) -> bool {
        let index = kind.index();
        let layer = &mut self.layers[index];
        layer.loading = false;
        graph.set_layer_buffer(index, buffer.clone());
        layer.buffer = Some(buffer);

        if layer.enabled {
            Self::start(layer, index, graph);
            info!(%kind, "ambience loaded and started");
            true
        } else {
            info!(%kind, "ambience loaded after being disabled");
            false
        }
    }

    pub fn on_load_failed(&mut self, kind: AmbienceKind, reason: &str) {
        let layer = &mut self.layers[kind.index()];
        layer.loading = false;
        layer.enabled = false;
        warn!(%kind, reason, "ambience failed to load");
    }

    /// Only the gain changes; playback state is untouched.
    pub fn set_volume(&mut self, kind: AmbienceKind, percent: f64, graph: &mut EffectGraph) {
        let index = kind.index();
        self.layers[index].volume = percent;
        graph.set_layer_gain(index, (percent / 100.0) as f32);
    }

    /// The graph has released its layer voices; nothing is playing any more.
    pub fn detach(&mut self) {
        for layer in self.layers.iter_mut() {
            layer.playing = false;
        }
    }

    /// Hand every cached asset to a rebuilt graph and restart the enabled
    /// layers.
    pub fn reattach(&mut self, graph: &mut EffectGraph) {
        for (index, layer) in self.layers.iter_mut().enumerate() {
            let Some(buffer) = layer.buffer.as_ref() else {
                continue;
            };
            graph.set_layer_buffer(index, buffer.clone());
            graph.set_layer_gain(index, (layer.volume / 100.0) as f32);
            if layer.enabled {
                Self::start(layer, index, graph);
            }
        }
    }

    pub fn is_enabled(&self, kind: AmbienceKind) -> bool {
        self.layers[kind.index()].enabled
    }

    pub fn is_playing(&self, kind: AmbienceKind) -> bool {
        self.layers[kind.index()].playing
    }

    pub fn is_loaded(&self, kind: AmbienceKind) -> bool {
        self.layers[kind.index()].buffer.is_some()
    }

    pub fn volume(&self, kind: AmbienceKind) -> f64 {
        self.layers[kind.index()].volume
    }

    /// Enabled layers that have a decoded buffer.
    pub fn snapshot(&self) -> Vec<AmbienceSnapshot> {
        AmbienceKind::ALL
            .iter()
            .filter_map(|&kind| {
                let layer = &self.layers[kind.index()];
                let buffer = layer.buffer.as_ref().filter(|_| layer.enabled)?;
                Some(AmbienceSnapshot {
                    kind,
                    gain: (layer.volume / 100.0) as f32,
                    buffer: buffer.clone(),
                })
            })
            .collect()
    }
}
