//! Episode bookkeeping
//!
//! Everything that is reset at the start of an episode lives here.

use serde::{Deserialize, Serialize};

use crate::consts::TILE_REWARD_BUDGET;

/// Lifecycle of an environment instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EpisodePhase {
    /// Never reset
    #[default]
    Uninitialized,
    /// Reset done, no action applied yet
    Ready,
    /// At least one action applied
    Running,
    /// Episode over; only a reset leaves this phase
    Terminated,
}

/// Why an episode ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    AllTilesVisited,
    LapCompleted,
    OutOfBounds,
}

/// Counters for the current episode
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeState {
    pub phase: EpisodePhase,
    /// Cumulative reward
    pub reward: f64,
    /// Cumulative reward at the end of the previous step
    pub prev_reward: f64,
    /// Distinct tiles visited
    pub tiles_visited: usize,
    /// Tiles that can be visited (exposed track length)
    pub tile_count: usize,
    /// Simulated seconds since reset
    pub elapsed: f64,
    /// Actuated steps since reset
    pub steps: u64,
    /// Tile 0 was re-contacted past the lap threshold
    pub new_lap: bool,
    /// All tiles became visited on the previous step (deferred policy)
    pub last_tile_pending: bool,
    pub termination: Option<Termination>,
}

impl EpisodeState {
    pub fn new(tile_count: usize) -> Self {
        Self {
            phase: EpisodePhase::Ready,
            tile_count,
            ..Self::default()
        }
    }

    /// Reward credited for the first visit of one tile
    pub fn tile_reward(&self) -> f64 {
        if self.tile_count == 0 {
            0.0
        } else {
            TILE_REWARD_BUDGET / self.tile_count as f64
        }
    }

    /// Credit a first visit
    pub fn credit_tile(&mut self) {
        self.reward += self.tile_reward();
        self.tiles_visited += 1;
    }

    /// Fraction of tiles visited so far
    pub fn visited_fraction(&self) -> f64 {
        if self.tile_count == 0 {
            0.0
        } else {
            self.tiles_visited as f64 / self.tile_count as f64
        }
    }

    pub fn all_tiles_visited(&self) -> bool {
        self.tiles_visited == self.tile_count
    }

    /// Reward gained since the previous snapshot; advances the snapshot
    pub fn take_step_reward(&mut self) -> f64 {
        let step_reward = self.reward - self.prev_reward;
        self.prev_reward = self.reward;
        step_reward
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == EpisodePhase::Terminated
    }
}
