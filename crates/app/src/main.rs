mod cli;

use std::path::{Path, PathBuf};

use anyhow::Context;
use echo_core::{
    DefaultProvider, EditorConfig, EditorSession, ExportFormat, OutputDevice, PlaybackState,
    RenderJob, SessionEvent, SystemClock, load_asset, load_playlist,
};
use echo_engine::AmbienceSnapshot;
use echo_transport::TickOutcome;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, EffectArgs, Source, USAGE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EditorConfig::load();
    match cli::parse(std::env::args().skip(1))? {
        Command::Render {
            input,
            mp3,
            out,
            effects,
        } => render(config, &input, mp3, &out, &effects).await,
        Command::Play { source, effects } => play(config, source, &effects).await,
        Command::Config { out } => write_config(&config, out),
        Command::Help => {
            println!("{USAGE}");
            Ok(())
        }
    }
}

fn file_name(locator: &str) -> String {
    Path::new(locator)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string())
}

fn write_config(config: &EditorConfig, out: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match out {
        Some(path) => path,
        None => EditorConfig::config_path().context("no config directory on this system")?,
    };
    config
        .save_to(&path)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    println!("{}", path.display());
    Ok(())
}

async fn render(
    config: EditorConfig,
    input: &str,
    mp3: bool,
    out: &Path,
    effects: &EffectArgs,
) -> anyhow::Result<()> {
    let provider = DefaultProvider::new(config.media_endpoint.clone());
    let source = load_asset(&provider, input)
        .await
        .with_context(|| format!("failed to load '{input}'"))?;

    let mut ambience = Vec::new();
    for &(kind, percent) in &effects.ambience {
        let locator = config.ambience.locator(kind);
        let buffer = load_asset(&provider, locator)
            .await
            .with_context(|| format!("failed to load {kind} ambience from '{locator}'"))?;
        let percent = config.parameter_policy.apply(
            "ambience_volume",
            percent,
            echo_engine::params::AMBIENCE_VOLUME_RANGE,
        );
        ambience.push(AmbienceSnapshot {
            kind,
            gain: (percent / 100.0) as f32,
            buffer,
        });
    }

    let params = effects
        .apply(config.initial_parameters())
        .sanitized(config.parameter_policy);
    let job = RenderJob::new(Some(source), params, ambience);
    let format = if mp3 { ExportFormat::Mp3 } else { ExportFormat::Wav };

    let download = echo_core::export::export(job, format, &file_name(input), &config).await?;
    let path = out.join(&download.file_name);
    tokio::fs::write(&path, &download.bytes)
        .await
        .with_context(|| format!("failed to write '{}'", path.display()))?;

    println!("{}", path.display());
    Ok(())
}

async fn play(config: EditorConfig, source: Source, effects: &EffectArgs) -> anyhow::Result<()> {
    let device = OutputDevice::open_default()?;
    let provider = DefaultProvider::new(config.media_endpoint.clone());
    let (mut session, processor) =
        EditorSession::new(config, provider, SystemClock::new(), device.graph_config());
    let _output = device.start(processor)?;

    let params = effects.apply(session.params());
    session.set_volume(params.volume);
    session.set_playback_rate(params.playback_rate);
    session.set_bass_boost(params.bass_boost);
    if effects.dry.is_some() || effects.wet.is_some() {
        session.set_dry_wet(params.dry_level, params.wet_level);
    }
    if effects.decay.is_some() {
        session.set_reverb_decay(params.reverb_decay).await?;
    }
    for &(kind, percent) in &effects.ambience {
        session.set_ambience_volume(kind, percent);
        session.toggle_ambience(kind);
    }

    match source {
        Source::File(locator) => {
            let bytes = tokio::fs::read(&locator)
                .await
                .with_context(|| format!("failed to read '{locator}'"))?;
            session.load_bytes(bytes, &file_name(&locator)).await?;
        }
        Source::Playlist(path) => {
            let playlist = load_playlist(&path)?;
            session.set_playlist(playlist);
            session.select(0).await?;
        }
    }

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => None,
            event = session.next_event() => Some(event),
        };
        match event {
            None => {
                info!("interrupted");
                break;
            }
            Some(SessionEvent::Tick(TickOutcome::EndOfTrack))
                if session.state() == PlaybackState::Stopped =>
            {
                info!("playback finished");
                break;
            }
            Some(_) => {}
        }
    }

    session.dispose();
    Ok(())
}
