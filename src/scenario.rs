//! Corner scenarios
//!
//! A scenario pins a checkpoint file and restricts the exposed track to the
//! tile range around one corner, so demonstrations can focus on it. Ids are
//! the corner angle in degrees; ids 1..=5 are the full tracks of each
//! parameter file.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::consts::BASE_SCALE;
use crate::error::ConfigError;

/// Scenario identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScenarioId(pub u32);

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static configuration of one scenario
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioEntry {
    /// Original track indices exposed to the episode; `None` keeps the full loop
    pub tile_range: Option<Range<usize>>,
    /// Velocity the runner imposes during the first steps
    pub initial_velocity: DVec2,
    /// Added to the first track point's heading when placing the car
    pub heading_offset: f64,
    /// Gain applied to the steering projection while building the track
    pub scale: f64,
    /// Checkpoint parameter file
    pub checkpoint_file: PathBuf,
}

impl ScenarioEntry {
    /// Entry restricted to `start..end` of the full loop
    pub fn corner(
        start: usize,
        end: usize,
        velocity: (f64, f64),
        heading_offset: f64,
        scale: f64,
        file: PathBuf,
    ) -> Self {
        Self {
            tile_range: Some(start..end),
            initial_velocity: DVec2::new(velocity.0, velocity.1),
            heading_offset,
            scale,
            checkpoint_file: file,
        }
    }

    /// Entry exposing the whole loop of `file`
    pub fn full_track(file: PathBuf) -> Self {
        Self {
            tile_range: None,
            initial_velocity: DVec2::ZERO,
            heading_offset: 0.0,
            scale: BASE_SCALE,
            checkpoint_file: file,
        }
    }

    fn validate(&self, id: ScenarioId) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidEntry {
            id: id.0,
            reason: reason.to_string(),
        };
        if let Some(range) = &self.tile_range {
            if range.start >= range.end {
                return Err(invalid("empty tile range"));
            }
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(invalid("scale must be positive"));
        }
        if !self.initial_velocity.is_finite() || !self.heading_offset.is_finite() {
            return Err(invalid("non-finite initial pose"));
        }
        if self.checkpoint_file.as_os_str().is_empty() {
            return Err(invalid("missing checkpoint file"));
        }
        Ok(())
    }
}

/// Read-only table of scenarios, validated on construction
#[derive(Debug, Clone, Default)]
pub struct ScenarioRegistry {
    entries: BTreeMap<ScenarioId, ScenarioEntry>,
}

impl ScenarioRegistry {
    /// Build a registry from explicit entries
    pub fn from_entries(
        entries: impl IntoIterator<Item = (ScenarioId, ScenarioEntry)>,
    ) -> Result<Self, ConfigError> {
        let mut map = BTreeMap::new();
        for (id, entry) in entries {
            entry.validate(id)?;
            if map.insert(id, entry).is_some() {
                return Err(ConfigError::InvalidEntry {
                    id: id.0,
                    reason: "duplicate id".to_string(),
                });
            }
        }
        Ok(Self { entries: map })
    }

    /// The recorded corner table, with parameter files under `parameter_dir`
    pub fn builtin(parameter_dir: &Path) -> Result<Self, ConfigError> {
        let v = |n: u32| parameter_dir.join(format!("track_v{n}.txt"));
        let c = ScenarioEntry::corner;
        Self::from_entries([
            (ScenarioId(30), c(310, 348, (36.4, 38.9), 0.0, 10.0, v(1))),
            (ScenarioId(40), c(0, 35, (11.1, 46.2), 0.0, 10.0, v(1))),
            (ScenarioId(50), c(228, 275, (46.966, 24.39), 0.0, 10.0, v(3))),
            (ScenarioId(60), c(282, 333, (49.3, -11.1), -0.06, 10.0, v(1))),
            (ScenarioId(80), c(116, 169, (0.0, 0.0), 0.1, 10.0, v(3))),
            (ScenarioId(85), c(58, 125, (-36.3, 37.5), 0.0, 10.0, v(1))),
            (ScenarioId(90), c(50, 111, (-44.5, 34.5), 0.0, 10.0, v(2))),
            (ScenarioId(100), c(281, 345, (7.2, -52.5), 0.0, 14.0, v(1))),
            (ScenarioId(110), c(250, 297, (52.1, -23.9), -0.045, 10.0, v(2))),
            (ScenarioId(130), c(128, 181, (-35.5, 7.7), -0.045, 10.0, v(2))),
            (ScenarioId(135), c(145, 210, (0.0, 0.0), -0.19, 10.0, v(3))),
            (ScenarioId(140), c(118, 181, (0.0, 0.0), 0.02, 10.0, v(4))),
            (ScenarioId(145), c(83, 142, (0.0, 0.0), -0.22, 10.0, v(3))),
            (ScenarioId(147), c(252, 310, (0.0, 0.0), -0.185, 10.0, v(4))),
            (ScenarioId(150), c(185, 250, (0.0, 0.0), -0.085, 10.0, v(4))),
            (ScenarioId(160), c(0, 110, (0.0, 0.0), -0.04, 10.0, v(4))),
            (ScenarioId(1), ScenarioEntry::full_track(v(1))),
            (ScenarioId(2), ScenarioEntry::full_track(v(2))),
            (ScenarioId(3), ScenarioEntry::full_track(v(3))),
            (ScenarioId(4), ScenarioEntry::full_track(v(4))),
            (ScenarioId(5), ScenarioEntry::full_track(v(5))),
        ])
    }

    /// Look up a scenario; unknown ids are an error, never a fallback
    pub fn get(&self, id: ScenarioId) -> Result<&ScenarioEntry, ConfigError> {
        self.entries
            .get(&id)
            .ok_or(ConfigError::UnknownScenario(id.0))
    }

    /// Scenario ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = ScenarioId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ScenarioRegistry {
        ScenarioRegistry::builtin(Path::new("simulation_parameters")).unwrap()
    }

    #[test]
    fn test_builtin_table_is_valid() {
        let reg = registry();
        assert_eq!(reg.len(), 21);
        let corner = reg.get(ScenarioId(85)).unwrap();
        assert_eq!(corner.tile_range, Some(58..125));
        assert_eq!(corner.tile_range.as_ref().map(|r| r.len()), Some(67));
        assert_eq!(
            corner.checkpoint_file,
            Path::new("simulation_parameters").join("track_v1.txt")
        );
        assert!((reg.get(ScenarioId(100)).unwrap().scale - 14.0).abs() < 1e-12);
    }

    #[test]
    fn test_full_track_entries_expose_everything() {
        let reg = registry();
        let full = reg.get(ScenarioId(3)).unwrap();
        assert!(full.tile_range.is_none());
    }

    #[test]
    fn test_unknown_scenario_is_an_error() {
        let err = registry().get(ScenarioId(77)).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownScenario(77)));
    }

    #[test]
    fn test_invalid_entries_rejected() {
        let mut entry = ScenarioEntry::full_track(PathBuf::from("x.txt"));
        entry.tile_range = Some(10..10);
        let err = ScenarioRegistry::from_entries([(ScenarioId(9), entry)]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEntry { id: 9, .. }));

        let dup = ScenarioEntry::full_track(PathBuf::from("x.txt"));
        let err = ScenarioRegistry::from_entries([
            (ScenarioId(1), dup.clone()),
            (ScenarioId(1), dup),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEntry { id: 1, .. }));
    }

    #[test]
    fn test_ids_sorted() {
        let ids: Vec<u32> = registry().ids().map(|id| id.0).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }
}
