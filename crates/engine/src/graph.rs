use basedrop::{Owned, Shared};
use echo_transport::{MAX_CHANNELS, SampleBuffer};

use crate::ambience::LAYER_COUNT;
use crate::dsp::{PeakingFilter, SmoothedValue};
use crate::params::{BASS_FREQUENCY_HZ, BASS_Q, EffectParameters};
use crate::reverb::ReverbUnit;
use crate::voice::SourceVoice;

/// Frames between position reports on the status ring.
const STATUS_INTERVAL_FRAMES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphConfig {
    pub sample_rate: u32,
    /// 1 or 2.
    pub channels: u16,
}

impl GraphConfig {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.clamp(1, MAX_CHANNELS as u16),
        }
    }
}

/// Mutations sent from the control side to the processor.
pub enum GraphCommand {
    /// Replace the current source and start it at `start_offset` seconds.
    AttachSource {
        buffer: Shared<SampleBuffer>,
        start_offset: f64,
    },
    StartSource {
        offset: f64,
    },
    StopSource,
    SetPlaybackRate(f64),
    SetMasterGain(f32),
    SetBassGain(f64),
    /// Swap in a freshly generated reverb. The old unit is dropped through
    /// the collector.
    SpliceReverb(Owned<ReverbUnit>),
    SetDryWet {
        dry: f32,
        wet: f32,
    },
    SetLayerBuffer {
        layer: usize,
        buffer: Shared<SampleBuffer>,
    },
    SetLayerGain {
        layer: usize,
        gain: f32,
    },
    StartLayer(usize),
    StopLayer(usize),
    /// Release every node. Later commands other than a new source are ignored.
    Dispose,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Status {
    /// Source read position in seconds.
    Position(f64),
    SourceEnded,
}

struct Layer {
    voice: Option<SourceVoice>,
    gain: SmoothedValue,
}

/// The audio-side half of the effect graph.
///
/// ```text
/// source ─┬─ bass ── dry ─┐
///         └─ reverb ─ wet ─┴─ master ─┬─ out
/// layers ── layer gain ────────────────┘
/// ```
///
/// Owned either by the audio callback (commands arrive on a ring) or by an
/// offline renderer (commands applied directly).
pub struct GraphProcessor {
    config: GraphConfig,
    channels: usize,
    source: Option<SourceVoice>,
    rate: f64,
    master: SmoothedValue,
    dry: SmoothedValue,
    wet: SmoothedValue,
    bass: Option<PeakingFilter>,
    reverb: Option<Owned<ReverbUnit>>,
    layers: [Layer; LAYER_COUNT],
    commands: Option<rtrb::Consumer<GraphCommand>>,
    status: Option<rtrb::Producer<Status>>,
    frames_since_status: usize,
    source_ended: bool,
    disposed: bool,
}

impl GraphProcessor {
    pub fn new(config: GraphConfig, params: &EffectParameters) -> Self {
        let sr = config.sample_rate;
        Self {
            config,
            channels: config.channels as usize,
            source: None,
            rate: params.playback_rate,
            master: SmoothedValue::for_gain(params.master_gain(), sr),
            dry: SmoothedValue::for_gain(params.dry_level as f32, sr),
            wet: SmoothedValue::for_gain(params.wet_level as f32, sr),
            bass: Some(PeakingFilter::new(
                sr,
                BASS_FREQUENCY_HZ,
                BASS_Q,
                params.bass_boost,
            )),
            reverb: None,
            layers: std::array::from_fn(|_| Layer {
                voice: None,
                gain: SmoothedValue::for_gain(0.0, sr),
            }),
            commands: None,
            status: None,
            frames_since_status: 0,
            source_ended: false,
            disposed: false,
        }
    }

    /// Receive commands from and report status to a control handle.
    pub fn with_rings(
        mut self,
        commands: rtrb::Consumer<GraphCommand>,
        status: rtrb::Producer<Status>,
    ) -> Self {
        self.commands = Some(commands);
        self.status = Some(status);
        self
    }

    /// Remove the bass stage entirely.
    pub fn without_bass(mut self) -> Self {
        self.bass = None;
        self
    }

    pub fn config(&self) -> GraphConfig {
        self.config
    }

    pub fn apply(&mut self, command: GraphCommand) {
        match command {
            GraphCommand::AttachSource {
                buffer,
                start_offset,
            } => {
                let mut voice = SourceVoice::new(buffer, self.config.sample_rate, false);
                voice.set_rate(self.rate);
                voice.start_at(start_offset);
                // previous voice (if any) drops through the collector
                self.source = Some(voice);
                self.source_ended = false;
                self.disposed = false;
            }
            _ if self.disposed => {}
            GraphCommand::StartSource { offset } => {
                if let Some(voice) = self.source.as_mut() {
                    voice.start_at(offset);
                    self.source_ended = false;
                }
            }
            GraphCommand::StopSource => {
                if let Some(voice) = self.source.as_mut() {
                    voice.stop();
                }
            }
            GraphCommand::SetPlaybackRate(rate) => {
                self.rate = rate;
                if let Some(voice) = self.source.as_mut() {
                    voice.set_rate(rate);
                }
            }
            GraphCommand::SetMasterGain(gain) => self.master.set_target(gain),
            GraphCommand::SetBassGain(db) => {
                if let Some(bass) = self.bass.as_mut() {
                    bass.set_gain_db(db);
                }
            }
            GraphCommand::SpliceReverb(unit) => self.reverb = Some(unit),
            GraphCommand::SetDryWet { dry, wet } => {
                self.dry.set_target(dry);
                self.wet.set_target(wet);
            }
            GraphCommand::SetLayerBuffer { layer, buffer } => {
                if let Some(slot) = self.layers.get_mut(layer) {
                    slot.voice = Some(SourceVoice::new(buffer, self.config.sample_rate, true));
                }
            }
            GraphCommand::SetLayerGain { layer, gain } => {
                if let Some(slot) = self.layers.get_mut(layer) {
                    slot.gain.set_target(gain);
                }
            }
            GraphCommand::StartLayer(layer) => {
                if let Some(voice) = self.layers.get_mut(layer).and_then(|l| l.voice.as_mut()) {
                    voice.start_at(0.0);
                }
            }
            GraphCommand::StopLayer(layer) => {
                if let Some(voice) = self.layers.get_mut(layer).and_then(|l| l.voice.as_mut()) {
                    voice.stop();
                }
            }
            GraphCommand::Dispose => {
                self.source = None;
                self.reverb = None;
                for layer in self.layers.iter_mut() {
                    layer.voice = None;
                }
                self.disposed = true;
            }
        }
    }

    /// Set the initial gain of a layer without ramping.
    pub fn set_layer_gain_immediate(&mut self, layer: usize, gain: f32) {
        if let Some(slot) = self.layers.get_mut(layer) {
            slot.gain.set_immediate(gain);
        }
    }

    pub fn source_position(&self) -> Option<f64> {
        self.source.as_ref().map(SourceVoice::position_secs)
    }

    pub fn is_source_playing(&self) -> bool {
        self.source.as_ref().is_some_and(SourceVoice::is_playing)
    }

    fn drain_commands(&mut self) {
        while let Some(command) = self.commands.as_mut().and_then(|rx| rx.pop().ok()) {
            self.apply(command);
        }
    }

    fn report(&mut self, status: Status) {
        if let Some(tx) = self.status.as_mut() {
            let _ = tx.push(status);
        }
    }

    /// Fill an interleaved buffer of `config.channels` channels.
    pub fn process(&mut self, data: &mut [f32]) {
        self.drain_commands();

        let channels = self.channels;
        let mut source = [0.0f32; MAX_CHANNELS];
        let mut wet = [0.0f32; MAX_CHANNELS];
        let mut layer_frame = [0.0f32; MAX_CHANNELS];

        for frame in data.chunks_mut(channels) {
            let source = &mut source[..channels];
            let wet = &mut wet[..channels];
            let layer_frame = &mut layer_frame[..channels];

            let was_playing = self.is_source_playing();
            let active = match self.source.as_mut() {
                Some(voice) => voice.next_frame(source),
                None => {
                    source.fill(0.0);
                    false
                }
            };
            if was_playing && !active && !self.source_ended {
                self.source_ended = true;
                self.report(Status::SourceEnded);
            }

            match self.reverb.as_mut() {
                Some(reverb) => reverb.process_frame(source, wet),
                None => wet.fill(0.0),
            }

            let master = self.master.next();
            let dry_level = self.dry.next();
            let wet_level = self.wet.next();

            for (ch, out) in frame.iter_mut().enumerate() {
                let dry = match self.bass.as_mut() {
                    Some(bass) => bass.process_sample(ch, source[ch]),
                    None => source[ch],
                };
                *out = master * (dry_level * dry + wet_level * wet[ch]);
            }

            for layer in self.layers.iter_mut() {
                let gain = layer.gain.next();
                if let Some(voice) = layer.voice.as_mut() {
                    if voice.next_frame(layer_frame) {
                        for (out, s) in frame.iter_mut().zip(layer_frame.iter()) {
                            *out += gain * s;
                        }
                    }
                }
            }
        }

        self.frames_since_status += data.len() / channels;
        if self.frames_since_status >= STATUS_INTERVAL_FRAMES {
            self.frames_since_status = 0;
            if let Some(position) = self.source_position() {
                if self.is_source_playing() {
                    self.report(Status::Position(position));
                }
            }
        }
    }
}
