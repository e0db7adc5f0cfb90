//! Demonstration trajectories
//!
//! One row per step: the [`StateRecord`] the step started from and the
//! [`Action`] chosen in it, written as a single JSON document. A saved log can be replayed through [`Replay`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EnvError;
use crate::normalize_angle;
use crate::sim::{Action, CarState, EpisodeState};

/// Car and episode readout
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub x: f64,
    pub vx: f64,
    pub y: f64,
    pub vy: f64,
    pub forward_force: f64,
    pub lateral_force: f64,
    pub angular_velocity: f64,
    /// Hull angle in [-π, π)
    pub heading: f64,
    /// Cumulative episode reward
    pub reward: f64,
    /// Simulated seconds since reset
    pub time: f64,
}

impl StateRecord {
    pub fn capture(car: &CarState, episode: &EpisodeState) -> Self {
        Self {
            x: car.pos.x,
            vx: car.vel.x,
            y: car.pos.y,
            vy: car.vel.y,
            forward_force: car.forward_force,
            lateral_force: car.lateral_force,
            angular_velocity: car.angular_vel,
            heading: normalize_angle(car.angle),
            reward: episode.reward,
            time: episode.elapsed,
        }
    }
}

/// States and the actions taken from them, row for row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryLog {
    pub states: Vec<StateRecord>,
    pub actions: Vec<Action>,
}

impl TrajectoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, state: StateRecord, action: Action) {
        self.states.push(state);
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn write(&self, path: &Path) -> Result<(), EnvError> {
        let mut file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut file, self)?;
        file.flush()?;
        log::info!("Wrote {} trajectory rows to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, EnvError> {
        let file = BufReader::new(File::open(path)?);
        let log: Self = serde_json::from_reader(file)?;
        log::debug!("Loaded {} trajectory rows from {}", log.len(), path.display());
        Ok(log)
    }
}

/// Replays recorded actions; past the end, the last row repeats
#[derive(Debug, Clone)]
pub struct Replay {
    actions: Vec<Action>,
}

impl Replay {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn from_file(path: &Path) -> Result<Self, EnvError> {
        Ok(Self::new(TrajectoryLog::load(path)?.actions))
    }

    /// Action for step `step` (0-based); an empty log coasts
    pub fn action(&self, step: usize) -> Action {
        self.actions
            .get(step)
            .or_else(|| self.actions.last())
            .copied()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    #[test]
    fn test_capture_maps_fields() {
        let car = CarState {
            pos: DVec2::new(1.0, 2.0),
            vel: DVec2::new(3.0, 4.0),
            angle: 0.5,
            angular_vel: -0.2,
            forward_force: 10.0,
            lateral_force: -5.0,
        };
        let episode = EpisodeState {
            reward: 12.5,
            elapsed: 0.4,
            ..EpisodeState::default()
        };
        let rec = StateRecord::capture(&car, &episode);
        assert_eq!((rec.x, rec.vx, rec.y, rec.vy), (1.0, 3.0, 2.0, 4.0));
        assert_eq!(rec.heading, 0.5);
        assert_eq!(rec.angular_velocity, -0.2);
        assert_eq!(rec.reward, 12.5);
        assert_eq!(rec.time, 0.4);
    }

    #[test]
    fn test_replay_clamps_to_last_row() {
        let replay = Replay::new(vec![Action::new(0.1, 1.0, 0.0), Action::new(-0.5, 0.0, 0.3)]);
        assert_eq!(replay.action(0), Action::new(0.1, 1.0, 0.0));
        assert_eq!(replay.action(1), Action::new(-0.5, 0.0, 0.3));
        assert_eq!(replay.action(40), Action::new(-0.5, 0.0, 0.3));
        assert_eq!(Replay::new(Vec::new()).action(3), Action::default());
    }

    #[test]
    fn test_write_then_replay_file() {
        let mut log = TrajectoryLog::new();
        let state = StateRecord::capture(&CarState::default(), &EpisodeState::new(10));
        log.push(state, Action::new(0.0, 1.0, 0.0));
        log.push(state, Action::new(0.3, 0.5, 0.0));

        let path = std::env::temp_dir().join(format!("corner-racer-log-{}.json", std::process::id()));
        log.write(&path).unwrap();
        let replay = Replay::from_file(&path).unwrap();
        assert_eq!(replay.len(), 2);
        assert_eq!(replay.action(5), Action::new(0.3, 0.5, 0.0));
        assert_eq!(TrajectoryLog::load(&path).unwrap(), log);
    }
}
