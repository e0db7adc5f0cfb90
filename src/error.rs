//! Error types
//!
//! Generation failures are recoverable and retried by the environment;
//! configuration errors are fatal for the environment instance.

use std::path::PathBuf;

use thiserror::Error;

/// Track generation could not produce a usable closed loop.
///
/// Callers retry with a fresh checkpoint sample.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    /// Fewer than two crossings of the start angle were found
    #[error("no closed loop: start angle crossed fewer than twice")]
    LoopNotClosed,
    /// Head and tail of the extracted lap do not meet
    #[error("track ends not glued: gap {gap:.3} exceeds {tolerance:.3}")]
    EndsNotGlued { gap: f64, tolerance: f64 },
    /// The extracted lap has too few points to form tiles
    #[error("extracted lap is empty")]
    Empty,
}

/// Fatal configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown scenario {0}")]
    UnknownScenario(u32),
    #[error("scenario {id}: {reason}")]
    InvalidEntry { id: u32, reason: String },
    #[error("cannot read checkpoint file {path}: {source}")]
    CheckpointIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("checkpoint file {path} has {lines} lines, expected at least {expected}")]
    MalformedCheckpointFile {
        path: PathBuf,
        lines: usize,
        expected: usize,
    },
    #[error("checkpoint file {path} line {line}: {value:?} is not a number")]
    CheckpointValue {
        path: PathBuf,
        line: usize,
        value: String,
    },
    #[error("scenario {id} range {start}..{end} exceeds {track_len}-point track")]
    ScenarioRange {
        id: u32,
        start: usize,
        end: usize,
        track_len: usize,
    },
    #[error("track generation failed {attempts} times in a row")]
    GenerationExhausted { attempts: u32 },
    #[error("settings file {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file {path}: {source}")]
    SettingsFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced by the environment API.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("environment has not been reset")]
    NotReset,
    #[error("episode is over; reset before stepping again")]
    EpisodeTerminated,
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("trajectory output: {0}")]
    Output(#[from] std::io::Error),
    #[error("trajectory encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}
