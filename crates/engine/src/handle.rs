use basedrop::{Collector, Owned, Shared};
use echo_transport::{SampleBuffer, SourceControl};
use tracing::{debug, info, warn};

use crate::GraphError;
use crate::graph::{GraphCommand, GraphConfig, GraphProcessor, Status};
use crate::params::EffectParameters;
use crate::reverb::ReverbUnit;

const COMMAND_CAPACITY: usize = 256;
const STATUS_CAPACITY: usize = 64;

/// Control-side handle to a live effect graph.
///
/// Every mutation is queued to the paired [`GraphProcessor`] and applied on
/// its next callback. Buffers and retired reverb units are released through
/// the handle's collector, never on the audio thread.
pub struct EffectGraph {
    config: GraphConfig,
    params: EffectParameters,
    commands: rtrb::Producer<GraphCommand>,
    status: rtrb::Consumer<Status>,
    collector: Collector,
    has_source: bool,
    last_position: Option<f64>,
    source_ended: bool,
    disposed: bool,
}

impl EffectGraph {
    /// Build the handle and its processor with an initial reverb already in
    /// place.
    pub fn new(config: GraphConfig, params: EffectParameters) -> (Self, GraphProcessor) {
        let collector = Collector::new();
        let (command_tx, command_rx) = rtrb::RingBuffer::<GraphCommand>::new(COMMAND_CAPACITY);
        let (status_tx, status_rx) = rtrb::RingBuffer::<Status>::new(STATUS_CAPACITY);

        let mut processor = GraphProcessor::new(config, &params).with_rings(command_rx, status_tx);
        processor.apply(GraphCommand::SpliceReverb(fresh_reverb(
            &collector, config, &params,
        )));

        let graph = Self {
            config,
            params,
            commands: command_tx,
            status: status_rx,
            collector,
            has_source: false,
            last_position: None,
            source_ended: false,
            disposed: false,
        };
        (graph, processor)
    }

    fn send(&mut self, command: GraphCommand) {
        if self.disposed {
            return;
        }
        if self.commands.push(command).is_err() {
            warn!("graph command queue full, dropping command");
        }
    }

    pub fn config(&self) -> GraphConfig {
        self.config
    }

    /// Parameters as last set, for snapshots.
    pub fn params(&self) -> EffectParameters {
        self.params
    }

    pub fn has_source(&self) -> bool {
        self.has_source
    }

    /// Replace the source and start it immediately at `start_offset`
    /// (0 when `None`).
    ///
    /// After [`EffectGraph::dispose`] this also rebuilds the reverb and
    /// re-sends every recorded parameter. Ambience layers must be re-sent by
    /// the caller.
    pub fn attach_source(&mut self, buffer: SampleBuffer, start_offset: Option<f64>) {
        let revived = std::mem::take(&mut self.disposed);
        info!(
            duration = buffer.duration_secs(),
            channels = buffer.num_channels(),
            sample_rate = buffer.sample_rate(),
            "attaching source"
        );
        let buffer = Shared::new(&self.collector.handle(), buffer);
        self.send(GraphCommand::AttachSource {
            buffer,
            start_offset: start_offset.unwrap_or(0.0),
        });
        self.has_source = true;
        self.source_ended = false;
        self.last_position = None;

        if revived {
            self.restore_nodes();
        }
    }

    fn restore_nodes(&mut self) {
        let reverb = fresh_reverb(&self.collector, self.config, &self.params);
        self.send(GraphCommand::SpliceReverb(reverb));
        self.send(GraphCommand::SetMasterGain(self.params.master_gain()));
        self.send(GraphCommand::SetBassGain(self.params.bass_boost));
        self.send(GraphCommand::SetPlaybackRate(self.params.playback_rate));
        self.send(GraphCommand::SetDryWet {
            dry: self.params.dry_level as f32,
            wet: self.params.wet_level as f32,
        });
        debug!("effect graph rebuilt after dispose");
    }

    pub fn set_volume(&mut self, percent: f64) {
        self.params.volume = percent;
        self.send(GraphCommand::SetMasterGain(self.params.master_gain()));
    }

    pub fn set_bass_boost(&mut self, db: f64) {
        self.params.bass_boost = db;
        self.send(GraphCommand::SetBassGain(db));
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        self.params.playback_rate = rate;
        self.send(GraphCommand::SetPlaybackRate(rate));
    }

    pub fn set_dry_wet(&mut self, dry: f64, wet: f64) {
        self.params.dry_level = dry;
        self.params.wet_level = wet;
        self.send(GraphCommand::SetDryWet {
            dry: dry as f32,
            wet: wet as f32,
        });
    }

    /// Generate a reverb for `seconds` of decay and splice it in once ready.
    /// The old unit keeps playing until the new one replaces it.
    pub async fn set_reverb_decay(&mut self, seconds: f64) -> Result<(), GraphError> {
        let unit = ReverbUnit::generate_async(
            seconds,
            self.params.reverb_pre_delay,
            self.config.sample_rate,
            self.config.channels as usize,
            rand::random(),
        )
        .await?;
        let unit = Owned::new(&self.collector.handle(), unit);
        self.send(GraphCommand::SpliceReverb(unit));
        self.params.reverb_decay = seconds;
        info!(decay = seconds, "reverb spliced");
        Ok(())
    }

    pub fn set_layer_buffer(&mut self, layer: usize, buffer: SampleBuffer) {
        let buffer = Shared::new(&self.collector.handle(), buffer);
        self.send(GraphCommand::SetLayerBuffer { layer, buffer });
    }

    pub fn set_layer_gain(&mut self, layer: usize, gain: f32) {
        self.send(GraphCommand::SetLayerGain { layer, gain });
    }

    pub fn start_layer(&mut self, layer: usize) {
        self.send(GraphCommand::StartLayer(layer));
    }

    pub fn stop_layer(&mut self, layer: usize) {
        self.send(GraphCommand::StopLayer(layer));
    }

    /// Drain the status ring; returns the latest reported source position.
    pub fn poll_status(&mut self) -> Option<f64> {
        while let Ok(status) = self.status.pop() {
            match status {
                Status::Position(position) => self.last_position = Some(position),
                Status::SourceEnded => self.source_ended = true,
            }
        }
        self.last_position
    }

    pub fn source_ended(&self) -> bool {
        self.source_ended
    }

    /// Free anything the audio side has let go of.
    pub fn collect(&mut self) {
        self.collector.collect();
    }

    /// Release every node. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.send(GraphCommand::Dispose);
        self.disposed = true;
        self.has_source = false;
        self.collector.collect();
        debug!("effect graph disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

fn fresh_reverb(
    collector: &Collector,
    config: GraphConfig,
    params: &EffectParameters,
) -> Owned<ReverbUnit> {
    let reverb = ReverbUnit::generate(
        params.reverb_decay,
        params.reverb_pre_delay,
        config.sample_rate,
        config.channels as usize,
        rand::random(),
    );
    Owned::new(&collector.handle(), reverb)
}

impl SourceControl for EffectGraph {
    fn start_at(&mut self, offset: f64) {
        if self.has_source {
            self.source_ended = false;
            self.send(GraphCommand::StartSource { offset });
        }
    }

    fn stop(&mut self) {
        if self.has_source {
            self.send(GraphCommand::StopSource);
        }
    }

    fn set_rate(&mut self, rate: f64) {
        self.set_playback_rate(rate);
    }
}

impl Drop for EffectGraph {
    fn drop(&mut self) {
        self.dispose();
    }
}
