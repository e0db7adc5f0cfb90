//! Environment settings
//!
//! Persisted as JSON next to the trajectory data.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scenario::ScenarioId;

/// How an episode decides it has finished the track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum TerminationPolicy {
    /// Done on the step every tile is visited, or when tile 0 is contacted
    /// again after more than `lap_complete_percent` of the tiles were visited
    #[default]
    LapCompletion,
    /// Done on the step after the one in which every tile became visited
    DeferredLastTile,
}

impl TerminationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationPolicy::LapCompletion => "lap-completion",
            TerminationPolicy::DeferredLastTile => "deferred-last-tile",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "lap-completion" | "lap" => Some(TerminationPolicy::LapCompletion),
            "deferred-last-tile" | "last-tile" => Some(TerminationPolicy::DeferredLastTile),
            _ => None,
        }
    }
}

/// Environment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvSettings {
    /// Log track generation details at info level
    pub verbose: bool,
    /// Visited fraction needed before re-touching tile 0 completes a lap
    pub lap_complete_percent: f64,
    /// Sample road/background colours on every reset
    pub domain_randomize: bool,
    /// Episode completion rule
    pub termination: TerminationPolicy,
    /// Consecutive failed generations tolerated before giving up
    pub max_generation_attempts: u32,
    /// Seed for checkpoint sampling and colour randomization
    pub seed: u64,
    /// Corner scenario to restrict the track to
    pub scenario: Option<ScenarioId>,
    /// Checkpoint parameter file; overrides the scenario's file
    pub checkpoint_file: Option<PathBuf>,
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self {
            verbose: true,
            lap_complete_percent: 0.95,
            domain_randomize: false,
            termination: TerminationPolicy::LapCompletion,
            max_generation_attempts: 64,
            seed: 0,
            scenario: None,
            checkpoint_file: None,
        }
    }
}

impl EnvSettings {
    /// Settings for a corner scenario, everything else default
    pub fn for_scenario(id: ScenarioId) -> Self {
        Self {
            scenario: Some(id),
            ..Self::default()
        }
    }

    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Settings {
            path: path.to_path_buf(),
            source,
        })?;
        let settings =
            serde_json::from_str(&json).map_err(|source| ConfigError::SettingsFormat {
                path: path.to_path_buf(),
                source,
            })?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json =
            serde_json::to_string_pretty(self).map_err(|source| ConfigError::SettingsFormat {
                path: path.to_path_buf(),
                source,
            })?;
        fs::write(path, json).map_err(|source| ConfigError::Settings {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: EnvSettings =
            serde_json::from_str(r#"{ "seed": 7, "termination": "DeferredLastTile" }"#).unwrap();
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.termination, TerminationPolicy::DeferredLastTile);
        assert!((settings.lap_complete_percent - 0.95).abs() < 1e-12);
        assert!(settings.scenario.is_none());
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("corner_racer_settings_{}.json", std::process::id()));
        let mut settings = EnvSettings::for_scenario(ScenarioId(85));
        settings.verbose = false;
        settings.save(&path).unwrap();
        let loaded = EnvSettings::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.scenario, Some(ScenarioId(85)));
        assert!(!loaded.verbose);
    }

    #[test]
    fn test_policy_names() {
        for policy in [TerminationPolicy::LapCompletion, TerminationPolicy::DeferredLastTile] {
            assert_eq!(TerminationPolicy::from_str(policy.as_str()), Some(policy));
        }
        assert_eq!(TerminationPolicy::from_str("never"), None);
    }
}
