use std::path::PathBuf;

use anyhow::{Context, bail};
use echo_core::{AmbienceKind, EffectParameters};

pub const USAGE: &str = "\
usage:
  echo render <input> [--mp3] [--out DIR] [effects]
  echo play (<input> | --playlist FILE) [effects]
  echo config [--out FILE]   write the current settings

effects:
  --volume PERCENT   0-150
  --rate RATE        0.5-1.5
  --decay SECONDS    0.01-10
  --bass DB          -24..24
  --dry LEVEL        0-1
  --wet LEVEL        0-1
  --ambience KIND=PERCENT   rain, wind, forest or fire (repeatable)";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectArgs {
    pub volume: Option<f64>,
    pub rate: Option<f64>,
    pub decay: Option<f64>,
    pub bass: Option<f64>,
    pub dry: Option<f64>,
    pub wet: Option<f64>,
    pub ambience: Vec<(AmbienceKind, f64)>,
}

impl EffectArgs {
    /// Override the given fields of `params`.
    pub fn apply(&self, params: EffectParameters) -> EffectParameters {
        EffectParameters {
            volume: self.volume.unwrap_or(params.volume),
            playback_rate: self.rate.unwrap_or(params.playback_rate),
            reverb_decay: self.decay.unwrap_or(params.reverb_decay),
            bass_boost: self.bass.unwrap_or(params.bass_boost),
            dry_level: self.dry.unwrap_or(params.dry_level),
            wet_level: self.wet.unwrap_or(params.wet_level),
            ..params
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    File(String),
    Playlist(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Render {
        input: String,
        mp3: bool,
        out: PathBuf,
        effects: EffectArgs,
    },
    Play {
        source: Source,
        effects: EffectArgs,
    },
    Config {
        out: Option<PathBuf>,
    },
    Help,
}

fn number(flag: &str, value: Option<String>) -> anyhow::Result<f64> {
    let value = value.with_context(|| format!("{flag} needs a value"))?;
    value
        .parse()
        .with_context(|| format!("{flag}: '{value}' is not a number"))
}

fn ambience(value: Option<String>) -> anyhow::Result<(AmbienceKind, f64)> {
    let value = value.context("--ambience needs KIND=PERCENT")?;
    let (kind, percent) = value
        .split_once('=')
        .with_context(|| format!("--ambience: expected KIND=PERCENT, got '{value}'"))?;
    let kind: AmbienceKind = kind.parse()?;
    Ok((kind, number("--ambience", Some(percent.to_string()))?))
}

pub fn parse<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Command> {
    let mut args = args.into_iter();
    let Some(subcommand) = args.next() else {
        return Ok(Command::Help);
    };

    let mut positional = None;
    let mut playlist = None;
    let mut mp3 = false;
    let mut out = None;
    let mut effects = EffectArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mp3" => mp3 = true,
            "--out" => out = Some(PathBuf::from(args.next().context("--out needs a directory")?)),
            "--playlist" => {
                playlist = Some(PathBuf::from(args.next().context("--playlist needs a file")?))
            }
            "--volume" => effects.volume = Some(number("--volume", args.next())?),
            "--rate" => effects.rate = Some(number("--rate", args.next())?),
            "--decay" => effects.decay = Some(number("--decay", args.next())?),
            "--bass" => effects.bass = Some(number("--bass", args.next())?),
            "--dry" => effects.dry = Some(number("--dry", args.next())?),
            "--wet" => effects.wet = Some(number("--wet", args.next())?),
            "--ambience" => effects.ambience.push(ambience(args.next())?),
            "-h" | "--help" => return Ok(Command::Help),
            flag if flag.starts_with("--") => bail!("unknown option '{flag}'"),
            _ if positional.is_some() => bail!("unexpected argument '{arg}'"),
            _ => positional = Some(arg),
        }
    }

    match subcommand.as_str() {
        "render" => Ok(Command::Render {
            input: positional.context("render needs an input file")?,
            mp3,
            out: out.unwrap_or_else(|| PathBuf::from(".")),
            effects,
        }),
        "play" => {
            let source = match (positional, playlist) {
                (Some(input), None) => Source::File(input),
                (None, Some(list)) => Source::Playlist(list),
                (Some(_), Some(_)) => bail!("give either an input or --playlist, not both"),
                (None, None) => bail!("play needs an input or --playlist"),
            };
            Ok(Command::Play { source, effects })
        }
        "config" => {
            if let Some(arg) = positional {
                bail!("unexpected argument '{arg}'");
            }
            Ok(Command::Config { out })
        }
        "help" | "-h" | "--help" => Ok(Command::Help),
        other => bail!("unknown command '{other}'"),
    }
}
