use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::Arc;

use echo_decode::decode_bytes;
use echo_encode::{Download, ExportFormat};
use echo_engine::params::{
    AMBIENCE_VOLUME_RANGE, BASS_BOOST_RANGE, MIX_LEVEL_RANGE, PLAYBACK_RATE_RANGE, REVERB_DECAY_RANGE,
    VOLUME_RANGE,
};
use echo_engine::{
    AmbienceKind, AmbienceManager, EffectGraph, EffectParameters, GraphConfig, GraphProcessor,
    ToggleOutcome,
};
use echo_project::{Playlist, TrackDescriptor};
use echo_render::RenderJob;
use echo_transport::{
    Clock, LoadRequest, LoopMode, PlaybackState, SampleBuffer, Sequencer, SystemClock,
    TickOutcome, TrackEndAction, Transport,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::EditorConfig;
use crate::error::SessionError;
use crate::export;
use crate::media::{FetchError, MediaProvider};
use crate::ticker::Ticker;

const UNTITLED: &str = "untitled";

/// Something the session reacted to while waiting in
/// [`EditorSession::next_event`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    Tick(TickOutcome),
    /// `started` is false when the layer was switched off before its asset
    /// arrived.
    AmbienceReady { kind: AmbienceKind, started: bool },
    AmbienceFailed(AmbienceKind),
}

struct AmbienceLoad {
    kind: AmbienceKind,
    result: Result<SampleBuffer, SessionError>,
}

struct LoadedTrack {
    buffer: SampleBuffer,
    file_name: String,
}

enum Wake {
    Tick,
    Ambience(AmbienceLoad),
}

/// One editor: a live effect graph, the transport driving it, the playlist
/// and the ambience layers.
pub struct EditorSession<M: MediaProvider, C: Clock = SystemClock> {
    config: EditorConfig,
    provider: Arc<M>,
    graph: EffectGraph,
    transport: Transport<C>,
    playlist: Sequencer<TrackDescriptor>,
    ambience: AmbienceManager,
    track: Option<LoadedTrack>,
    ticker: Ticker,
    loads_tx: mpsc::UnboundedSender<AmbienceLoad>,
    loads_rx: mpsc::UnboundedReceiver<AmbienceLoad>,
}

impl<M: MediaProvider, C: Clock> EditorSession<M, C> {
    /// Build the session and the processor to hand to an output stream (or
    /// drive by hand).
    pub fn new(
        config: EditorConfig,
        provider: M,
        clock: C,
        graph_config: GraphConfig,
    ) -> (Self, GraphProcessor) {
        let params = config.initial_parameters();
        let (graph, processor) = EffectGraph::new(graph_config, params);
        let (loads_tx, loads_rx) = mpsc::unbounded_channel();

        let session = Self {
            config,
            provider: Arc::new(provider),
            graph,
            transport: Transport::new(clock, params.playback_rate),
            playlist: Sequencer::new(),
            ambience: AmbienceManager::new(),
            track: None,
            ticker: Ticker::new(),
            loads_tx,
            loads_rx,
        };
        (session, processor)
    }

    /// Reproducible shuffles.
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.playlist = Sequencer::with_seed(seed);
        self
    }

    fn sanitize(&self, name: &'static str, value: f64, range: RangeInclusive<f64>) -> f64 {
        self.config.parameter_policy.apply(name, value, range)
    }

    // loading

    /// Decode `bytes` and make them the current track, playing from 0.
    /// On failure the session is left as it was.
    pub async fn load_bytes(&mut self, bytes: Vec<u8>, file_name: &str) -> Result<(), SessionError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_owned);
        let decoded =
            tokio::task::spawn_blocking(move || decode_bytes(bytes, extension.as_deref())).await?;

        match decoded {
            Ok(buffer) => {
                self.attach(buffer, file_name);
                Ok(())
            }
            Err(e) => {
                warn!(file = file_name, "failed to decode: {e}");
                Err(e.into())
            }
        }
    }

    pub async fn load_file(&mut self, path: &Path) -> Result<(), SessionError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| FetchError::Io {
            locator: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| UNTITLED.to_string());
        self.load_bytes(bytes, &file_name).await
    }

    fn attach(&mut self, buffer: SampleBuffer, file_name: &str) {
        let duration = buffer.duration_secs();
        let revived = self.graph.is_disposed();
        self.graph.attach_source(buffer.clone(), None);
        if revived {
            self.ambience.reattach(&mut self.graph);
        }
        self.transport.load(duration);
        self.track = Some(LoadedTrack {
            buffer,
            file_name: file_name.to_string(),
        });
        self.ticker.start(self.config.tick_interval());
        info!(file = file_name, duration, "track loaded");
    }

    // playlist

    /// Replace the playlist; nothing is loaded until a track is selected.
    pub fn set_playlist(&mut self, playlist: Playlist) {
        info!(name = %playlist.name, tracks = playlist.len(), "playlist set");
        self.playlist.set_playlist(playlist.ordered_tracks());
    }

    /// Fetch and play the track at `index`.
    pub async fn select(&mut self, index: usize) -> Result<(), SessionError> {
        if self.playlist.is_in_flight() {
            return Err(SessionError::ChangeInFlight);
        }
        let request = self
            .playlist
            .select(index)
            .ok_or(SessionError::NoSuchTrack(index))?;
        self.fetch_and_load(request).await
    }

    /// Returns false when there was nothing to advance to.
    pub async fn next(&mut self) -> Result<bool, SessionError> {
        match self.playlist.next() {
            Some(request) => self.fetch_and_load(request).await.map(|_| true),
            None => Ok(false),
        }
    }

    pub async fn previous(&mut self) -> Result<bool, SessionError> {
        match self.playlist.previous() {
            Some(request) => self.fetch_and_load(request).await.map(|_| true),
            None => Ok(false),
        }
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.playlist.toggle_shuffle()
    }

    pub fn toggle_loop(&mut self) -> LoopMode {
        self.playlist.toggle_loop()
    }

    async fn fetch_and_load(
        &mut self,
        request: LoadRequest<TrackDescriptor>,
    ) -> Result<(), SessionError> {
        let result = self.load_descriptor(&request.track).await;
        match &result {
            Ok(()) => self.playlist.finish_change(),
            Err(e) => {
                warn!(index = request.index, "track change failed: {e}");
                self.playlist.abandon_change();
            }
        }
        result
    }

    async fn load_descriptor(&mut self, track: &TrackDescriptor) -> Result<(), SessionError> {
        let bytes = self.provider.fetch(&track.source_locator).await?;
        let file_name = Path::new(&track.source_locator)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| track.title.clone());
        self.load_bytes(bytes, &file_name).await
    }

    // transport

    pub fn play(&mut self) {
        self.transport.play(&mut self.graph);
        if self.transport.is_playing() && !self.ticker.is_running() {
            self.ticker.start(self.config.tick_interval());
        }
    }

    pub fn pause(&mut self) {
        self.transport.pause(&mut self.graph);
    }

    pub fn toggle_playback(&mut self) {
        if self.transport.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn stop(&mut self) {
        self.transport.stop(&mut self.graph);
        self.ticker.stop();
    }

    pub fn seek(&mut self, seconds: f64) {
        self.transport.seek(seconds, &mut self.graph);
    }

    // parameters

    pub fn set_playback_rate(&mut self, rate: f64) {
        let rate = self.sanitize("playback_rate", rate, PLAYBACK_RATE_RANGE);
        self.transport.set_playback_rate(rate, &mut self.graph);
    }

    pub fn set_volume(&mut self, percent: f64) {
        let percent = self.sanitize("volume", percent, VOLUME_RANGE);
        self.graph.set_volume(percent);
    }

    pub fn set_bass_boost(&mut self, db: f64) {
        let db = self.sanitize("bass_boost", db, BASS_BOOST_RANGE);
        self.graph.set_bass_boost(db);
    }

    pub fn set_dry_wet(&mut self, dry: f64, wet: f64) {
        let dry = self.sanitize("dry_level", dry, MIX_LEVEL_RANGE);
        let wet = self.sanitize("wet_level", wet, MIX_LEVEL_RANGE);
        self.graph.set_dry_wet(dry, wet);
    }

    /// Resolves once the new reverb is spliced in.
    pub async fn set_reverb_decay(&mut self, seconds: f64) -> Result<(), SessionError> {
        let seconds = self.sanitize("reverb_decay", seconds, REVERB_DECAY_RANGE);
        self.graph.set_reverb_decay(seconds).await?;
        Ok(())
    }

    // ambience

    pub fn toggle_ambience(&mut self, kind: AmbienceKind) -> ToggleOutcome {
        let outcome = self.ambience.toggle(kind, &mut self.graph);
        if outcome == ToggleOutcome::NeedsLoad {
            self.spawn_ambience_load(kind);
        }
        outcome
    }

    pub fn set_ambience_volume(&mut self, kind: AmbienceKind, percent: f64) {
        let percent = self.sanitize("ambience_volume", percent, AMBIENCE_VOLUME_RANGE);
        self.ambience.set_volume(kind, percent, &mut self.graph);
    }

    fn spawn_ambience_load(&self, kind: AmbienceKind) {
        let provider = Arc::clone(&self.provider);
        let locator = self.config.ambience.locator(kind).to_string();
        let tx = self.loads_tx.clone();
        debug!(%kind, %locator, "loading ambience");

        tokio::spawn(async move {
            let result = load_asset(provider.as_ref(), &locator).await;
            // receiver only goes away with the session
            let _ = tx.send(AmbienceLoad { kind, result });
        });
    }

    fn deliver(&mut self, load: AmbienceLoad) -> SessionEvent {
        match load.result {
            Ok(buffer) => {
                let started = self.ambience.on_loaded(load.kind, buffer, &mut self.graph);
                SessionEvent::AmbienceReady {
                    kind: load.kind,
                    started,
                }
            }
            Err(e) => {
                self.ambience.on_load_failed(load.kind, &e.to_string());
                SessionEvent::AmbienceFailed(load.kind)
            }
        }
    }

    // ticking

    /// Advance the transport and act on end of track.
    pub async fn on_tick(&mut self) -> TickOutcome {
        self.graph.collect();
        let outcome = self.transport.tick();
        match outcome {
            TickOutcome::Position(position) => {
                if let Some(reported) = self.graph.poll_status() {
                    debug!(position, reported, drift = position - reported, "transport drift");
                }
            }
            TickOutcome::EndOfTrack => self.on_track_end().await,
            TickOutcome::Idle => {}
        }
        outcome
    }

    async fn on_track_end(&mut self) {
        match self.playlist.on_track_end() {
            TrackEndAction::Stop => self.stop(),
            TrackEndAction::RestartCurrent => self.transport.restart(&mut self.graph),
            TrackEndAction::Load(request) => {
                if self.fetch_and_load(request).await.is_err() {
                    self.stop();
                }
            }
        }
    }

    /// Wait for the next tick or ambience delivery and handle it.
    pub async fn next_event(&mut self) -> SessionEvent {
        let wake = tokio::select! {
            _ = self.ticker.tick() => Wake::Tick,
            Some(load) = self.loads_rx.recv() => Wake::Ambience(load),
        };
        match wake {
            Wake::Tick => SessionEvent::Tick(self.on_tick().await),
            Wake::Ambience(load) => self.deliver(load),
        }
    }

    // rendering

    pub fn render_job(&self) -> RenderJob {
        RenderJob::new(
            self.track.as_ref().map(|t| t.buffer.clone()),
            self.graph.params(),
            self.ambience.snapshot(),
        )
    }

    /// Bounce the current track with the current settings.
    pub async fn export(&self, format: ExportFormat) -> Result<Download, SessionError> {
        let name = self
            .track
            .as_ref()
            .map_or(UNTITLED, |t| t.file_name.as_str());
        export::export(self.render_job(), format, name, &self.config).await
    }

    /// Release the graph. The session stays usable for a new track.
    pub fn dispose(&mut self) {
        self.ticker.stop();
        self.graph.dispose();
        self.ambience.detach();
        self.track = None;
        self.transport.unload();
    }

    // state

    pub fn position(&self) -> f64 {
        self.transport.position()
    }

    pub fn duration(&self) -> f64 {
        self.transport.duration()
    }

    pub fn state(&self) -> PlaybackState {
        self.transport.state()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn is_loaded(&self) -> bool {
        self.transport.is_loaded()
    }

    pub fn params(&self) -> EffectParameters {
        self.graph.params()
    }

    pub fn playlist(&self) -> &Sequencer<TrackDescriptor> {
        &self.playlist
    }

    pub fn ambience(&self) -> &AmbienceManager {
        &self.ambience
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn file_name(&self) -> Option<&str> {
        self.track.as_ref().map(|t| t.file_name.as_str())
    }
}

/// Fetch and decode one asset.
pub async fn load_asset<M: MediaProvider>(
    provider: &M,
    locator: &str,
) -> Result<SampleBuffer, SessionError> {
    let bytes = provider.fetch(locator).await?;
    let extension = Path::new(locator)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_owned);
    let buffer =
        tokio::task::spawn_blocking(move || decode_bytes(bytes, extension.as_deref())).await??;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_encode::{WavFormat, encode_wav};
    use echo_transport::ManualClock;
    use std::collections::HashMap;

    const SR: u32 = 8000;

    fn wav(seconds: f64) -> Vec<u8> {
        wav_at(seconds, SR)
    }

    fn wav_at(seconds: f64, sample_rate: u32) -> Vec<u8> {
        let frames = (seconds * sample_rate as f64) as usize;
        let wave: Vec<f32> = (0..frames).map(|i| (i as f32 * 0.1).sin() * 0.3).collect();
        encode_wav(&SampleBuffer::new(vec![wave.clone(), wave], sample_rate), WavFormat::Pcm16).unwrap()
    }

    #[derive(Default)]
    struct MockProvider {
        files: HashMap<String, Vec<u8>>,
    }

    impl MockProvider {
        fn with(mut self, locator: &str, bytes: Vec<u8>) -> Self {
            self.files.insert(locator.to_string(), bytes);
            self
        }
    }

    impl MediaProvider for MockProvider {
        async fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
            self.files
                .get(locator)
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    status: 404,
                    message: format!("no such track {locator}"),
                })
        }
    }

    fn session(provider: MockProvider) -> (EditorSession<MockProvider, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let mut config = EditorConfig::default();
        config.effects.playback_rate = 1.0;
        let (session, _processor) =
            EditorSession::new(config, provider, clock.clone(), GraphConfig::new(SR, 2));
        (session.with_shuffle_seed(3), clock)
    }

    fn three_tracks() -> MockProvider {
        MockProvider::default()
            .with("a.wav", wav(1.0))
            .with("b.wav", wav(2.0))
            .with("c.wav", wav(3.0))
    }

    #[tokio::test]
    async fn load_bytes_autoplays_from_zero() {
        let (mut session, clock) = session(MockProvider::default());
        session.load_bytes(wav(2.0), "song.wav").await.unwrap();

        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(session.position(), 0.0);
        assert!((session.duration() - 2.0).abs() < 1e-9);
        assert_eq!(session.file_name(), Some("song.wav"));

        clock.advance(0.5);
        assert!((session.position() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn decode_failure_keeps_previous_state() {
        let (mut session, _clock) = session(MockProvider::default());
        let err = session.load_bytes(vec![0u8; 64], "junk.mp3").await.unwrap_err();

        assert!(matches!(err, SessionError::Decode(_)));
        assert!(!session.is_loaded());
        assert_eq!(session.state(), PlaybackState::Stopped);
    }

    #[tokio::test]
    async fn pause_freezes_and_play_resumes() {
        let (mut session, clock) = session(MockProvider::default());
        session.load_bytes(wav(5.0), "song.wav").await.unwrap();

        clock.advance(1.0);
        session.pause();
        clock.advance(10.0);
        assert!((session.position() - 1.0).abs() < 1e-9);

        session.toggle_playback();
        clock.advance(0.5);
        assert!((session.position() - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn rate_change_does_not_jump() {
        let (mut session, clock) = session(MockProvider::default());
        session.load_bytes(wav(10.0), "song.wav").await.unwrap();

        clock.advance(2.0);
        session.set_playback_rate(1.5);
        assert!((session.position() - 2.0).abs() < 1e-9);
        clock.advance(2.0);
        assert!((session.position() - 5.0).abs() < 1e-9);
        assert_eq!(session.params().playback_rate, 1.5);
    }

    #[tokio::test]
    async fn out_of_range_parameters_are_clamped() {
        let (mut session, _clock) = session(MockProvider::default());
        session.set_volume(500.0);
        session.set_bass_boost(-60.0);
        session.set_playback_rate(3.0);

        let params = session.params();
        assert_eq!(params.volume, 150.0);
        assert_eq!(params.bass_boost, -24.0);
        assert_eq!(params.playback_rate, 1.5);
    }

    #[tokio::test]
    async fn end_of_track_without_loop_stops() {
        let (mut session, clock) = session(MockProvider::default());
        session.load_bytes(wav(1.0), "song.wav").await.unwrap();

        clock.advance(1.2);
        assert_eq!(session.on_tick().await, TickOutcome::EndOfTrack);
        assert_eq!(session.state(), PlaybackState::Stopped);
        assert_eq!(session.position(), 0.0);
    }

    #[tokio::test]
    async fn repeat_all_wraps_to_first_track() {
        let (mut session, clock) = session(three_tracks());
        session.set_playlist(Playlist::from_locators("mix", ["a.wav", "b.wav", "c.wav"]));
        session.toggle_loop();
        session.select(2).await.unwrap();
        assert!((session.duration() - 3.0).abs() < 1e-9);

        clock.advance(3.5);
        session.on_tick().await;

        assert_eq!(session.playlist().current_index(), Some(0));
        assert!(!session.playlist().is_in_flight());
        assert_eq!(session.file_name(), Some("a.wav"));
        assert!(session.is_playing());
        assert!((session.duration() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn repeat_one_restarts_same_track() {
        let (mut session, clock) = session(three_tracks());
        session.set_playlist(Playlist::from_locators("mix", ["a.wav", "b.wav", "c.wav"]));
        session.toggle_loop();
        session.toggle_loop();
        session.select(1).await.unwrap();

        clock.advance(2.5);
        session.on_tick().await;

        assert_eq!(session.playlist().current_index(), Some(1));
        assert!(session.is_playing());
        assert_eq!(session.position(), 0.0);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_track() {
        let provider = MockProvider::default().with("a.wav", wav(1.0));
        let (mut session, _clock) = session(provider);
        session.set_playlist(Playlist::from_locators("mix", ["a.wav", "missing.wav"]));
        session.select(0).await.unwrap();

        let err = session.next().await.unwrap_err();
        assert!(matches!(err, SessionError::Fetch(FetchError::Status { status: 404, .. })));
        assert_eq!(session.file_name(), Some("a.wav"));
        assert_eq!(session.playlist().current_index(), Some(0));
        assert!(!session.playlist().is_in_flight());
        assert!(session.is_playing());
    }

    #[tokio::test]
    async fn next_without_selection_is_noop() {
        let (mut session, _clock) = session(three_tracks());
        session.set_playlist(Playlist::from_locators("mix", ["a.wav", "b.wav"]));
        assert!(!session.next().await.unwrap());
        assert!(!session.is_loaded());
    }

    #[tokio::test]
    async fn select_out_of_range() {
        let (mut session, _clock) = session(three_tracks());
        session.set_playlist(Playlist::from_locators("mix", ["a.wav"]));
        assert!(matches!(
            session.select(4).await,
            Err(SessionError::NoSuchTrack(4))
        ));
    }

    #[tokio::test]
    async fn ambience_loads_in_background() {
        let provider = MockProvider::default().with("audio/rain.mp3", wav(0.5));
        let (mut session, _clock) = session(provider);

        assert_eq!(session.toggle_ambience(AmbienceKind::Rain), ToggleOutcome::NeedsLoad);
        assert_eq!(session.toggle_ambience(AmbienceKind::Rain), ToggleOutcome::Stopped);
        assert_eq!(session.toggle_ambience(AmbienceKind::Rain), ToggleOutcome::Loading);

        let event = session.next_event().await;
        assert_eq!(
            event,
            SessionEvent::AmbienceReady {
                kind: AmbienceKind::Rain,
                started: true
            }
        );
        assert!(session.ambience().is_playing(AmbienceKind::Rain));
    }

    #[tokio::test]
    async fn ambience_disabled_before_load_stays_off() {
        let provider = MockProvider::default().with("audio/fire.mp3", wav(0.5));
        let (mut session, _clock) = session(provider);

        session.toggle_ambience(AmbienceKind::Fire);
        session.toggle_ambience(AmbienceKind::Fire);

        let event = session.next_event().await;
        assert_eq!(
            event,
            SessionEvent::AmbienceReady {
                kind: AmbienceKind::Fire,
                started: false
            }
        );
        assert!(session.ambience().is_loaded(AmbienceKind::Fire));
        assert!(!session.ambience().is_playing(AmbienceKind::Fire));
    }

    #[tokio::test]
    async fn missing_ambience_asset_fails() {
        let (mut session, _clock) = session(MockProvider::default());
        session.toggle_ambience(AmbienceKind::Wind);

        assert_eq!(
            session.next_event().await,
            SessionEvent::AmbienceFailed(AmbienceKind::Wind)
        );
        assert!(!session.ambience().is_enabled(AmbienceKind::Wind));
    }

    #[tokio::test]
    async fn render_job_snapshots_state() {
        let (mut session, _clock) = session(MockProvider::default());
        assert!(session.render_job().source.is_none());

        session.load_bytes(wav(1.0), "song.wav").await.unwrap();
        session.set_bass_boost(6.0);
        let job = session.render_job();

        assert_eq!(job.params.bass_boost, 6.0);
        assert_eq!(job.source.as_ref().map(|b| b.frames()), Some(SR as usize));
        assert!(job.ambience.is_empty());
    }

    #[tokio::test]
    async fn export_uses_track_name() {
        let (mut session, _clock) = session(MockProvider::default());
        session.load_bytes(wav(0.5), "night drive.wav").await.unwrap();

        let download = session.export(ExportFormat::Wav).await.unwrap();
        assert_eq!(download.file_name, "night drive-EchoStudio.wav");
        assert_eq!(&download.bytes[0..4], b"RIFF");
    }

    #[tokio::test]
    async fn export_mp3_of_loaded_track() {
        let (mut session, _clock) = session(MockProvider::default());
        session.load_bytes(wav_at(0.5, 44100), "night drive.wav").await.unwrap();

        let download = session.export(ExportFormat::Mp3).await.unwrap();
        assert_eq!(download.file_name, "night drive-EchoStudio.mp3");
        assert_eq!(download.mime_type, "audio/mp3");
        let sync = download
            .bytes
            .windows(2)
            .position(|w| w[0] == 0xff && w[1] & 0xe0 == 0xe0);
        assert!(sync.is_some());
    }

    #[tokio::test]
    async fn dry_wet_levels_are_clamped() {
        let (mut session, _clock) = session(MockProvider::default());
        session.set_dry_wet(0.25, 3.0);
        assert_eq!(session.params().dry_level, 0.25);
        assert_eq!(session.params().wet_level, 1.0);
    }

    fn energy(samples: &[f32]) -> f32 {
        samples.iter().map(|s| s * s).sum()
    }

    #[tokio::test]
    async fn reload_after_dispose_restores_reverb_and_ambience() {
        let provider = MockProvider::default().with("audio/rain.mp3", wav(0.5));
        let mut config = EditorConfig::default();
        config.effects.playback_rate = 1.0;
        config.effects.dry_level = 0.0;
        config.effects.reverb_decay = 0.2;
        let (mut session, mut processor) =
            EditorSession::new(config, provider, ManualClock::new(), GraphConfig::new(SR, 2));

        session.set_ambience_volume(AmbienceKind::Rain, 50.0);
        session.toggle_ambience(AmbienceKind::Rain);
        session.next_event().await;
        assert_eq!(session.toggle_ambience(AmbienceKind::Rain), ToggleOutcome::Stopped);

        session.load_bytes(wav(0.5), "a.wav").await.unwrap();
        session.dispose();
        session.load_bytes(wav(0.5), "b.wav").await.unwrap();
        assert!(session.is_playing());

        // dry is off, so everything here came through the reverb
        let mut data = vec![0.0; 2 * 12000];
        processor.process(&mut data);
        assert!(energy(&data) > 1.0, "wet path silent");

        assert_eq!(session.toggle_ambience(AmbienceKind::Rain), ToggleOutcome::Started);
        let mut data = vec![0.0; 2 * 800];
        processor.process(&mut data);
        assert!(energy(&data) > 1.0, "ambience silent");
    }

    #[tokio::test]
    async fn dispose_unloads() {
        let (mut session, _clock) = session(MockProvider::default());
        session.load_bytes(wav(0.5), "song.wav").await.unwrap();
        session.dispose();
        session.dispose();

        assert!(!session.is_loaded());
        assert!(session.render_job().source.is_none());
    }
}
