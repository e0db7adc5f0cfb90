//! Corner Racer - procedural top-down racing environment
//!
//! Core modules:
//! - `track`: Checkpoint ring, centerline synthesis, tile/border geometry
//! - `sim`: Deterministic episode state machine and the physics backend seam
//! - `scenario`: Named corner sub-ranges of a generated track
//! - `render`: Observation buffers (state-sized top-down frames)
//! - `trajectory`: Per-step state/action records for demonstrations
//! - `settings`: Environment configuration

pub mod error;
pub mod render;
pub mod scenario;
pub mod settings;
pub mod sim;
pub mod track;
pub mod trajectory;

pub use error::{ConfigError, EnvError, GenerationError};
pub use scenario::{ScenarioEntry, ScenarioId, ScenarioRegistry};
pub use settings::{EnvSettings, TerminationPolicy};

use glam::DVec2;

/// World configuration constants
pub mod consts {
    /// Simulation frequency
    pub const FPS: f64 = 50.0;
    /// Fixed simulation timestep
    pub const SIM_DT: f64 = 1.0 / FPS;

    /// Observation buffer size (agent-facing)
    pub const STATE_W: usize = 96;
    pub const STATE_H: usize = 96;

    /// Base track scale; all world lengths below are expressed in it
    pub const BASE_SCALE: f64 = 10.0;
    /// Track is a heavily morphed circle with this radius
    pub const TRACK_RAD: f64 = 900.0 / BASE_SCALE;
    /// Game over boundary (on either axis)
    pub const PLAYFIELD: f64 = 2000.0 / BASE_SCALE;

    /// Distance between consecutive centerline samples
    pub const TRACK_DETAIL_STEP: f64 = 21.0 / BASE_SCALE;
    /// Maximum heading change per centerline sample (radians)
    pub const TRACK_TURN_RATE: f64 = 0.31;
    /// Half-width of the drivable road
    pub const TRACK_WIDTH: f64 = (40.0 / BASE_SCALE) * 1.25;
    /// Kerb width on hard turns
    pub const BORDER: f64 = 8.0 / BASE_SCALE;
    /// Consecutive same-sign sharp deltas needed for a kerb
    pub const BORDER_MIN_COUNT: usize = 4;

    /// Checkpoints per generation ring
    pub const CHECKPOINTS: usize = 12;
    /// Stall guard for the centerline walk
    pub const MAX_TRACK_ITERATIONS: usize = 2500;
    /// Laps walked before the centerline walk stops
    pub const MAX_TRACK_LAPS: u32 = 4;

    /// Reward budget split across all tiles of the exposed track
    pub const TILE_REWARD_BUDGET: f64 = 1000.0;
    /// Penalty applied every actuated frame
    pub const STEP_PENALTY: f64 = 0.1;
    /// Step reward when the car leaves the playfield
    pub const OUT_OF_BOUNDS_REWARD: f64 = -100.0;

    /// Steps during which the runner re-applies the scenario's initial speed
    pub const INITIAL_SPEED_STEPS: u64 = 25;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f64) -> f64 {
    use std::f64::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Shift `angle` by whole turns until it lies within 1.5π of `reference`
///
/// Keeps headings continuous with the polar angle while walking the ring.
#[inline]
pub fn wrap_near(mut angle: f64, reference: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    while angle - reference > 1.5 * PI {
        angle -= TAU;
    }
    while angle - reference < -1.5 * PI {
        angle += TAU;
    }
    angle
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f64, theta: f64) -> DVec2 {
    DVec2::new(r * theta.cos(), r * theta.sin())
}

/// Convert cartesian (x, y) to polar (r, theta)
#[inline]
pub fn cartesian_to_polar(pos: DVec2) -> (f64, f64) {
    (pos.length(), pos.y.atan2(pos.x))
}

/// Direction perpendicular to a heading; the track advances along it
#[inline]
pub fn heading_forward(beta: f64) -> DVec2 {
    DVec2::new(-beta.sin(), beta.cos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::PI;

    #[test]
    fn test_polar_roundtrip_quadrant() {
        let p = polar_to_cartesian(2.0, PI / 2.0);
        assert!(p.x.abs() < 1e-12);
        assert!((p.y - 2.0).abs() < 1e-12);
        let (r, theta) = cartesian_to_polar(DVec2::new(-1.0, 0.0));
        assert!((r - 1.0).abs() < 1e-12);
        assert!((theta - PI).abs() < 1e-12);
    }

    #[test]
    fn test_heading_forward_at_zero_points_up() {
        let f = heading_forward(0.0);
        assert!(f.x.abs() < 1e-12);
        assert!((f.y - 1.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn normalize_angle_in_range(a in -100.0f64..100.0) {
            let n = normalize_angle(a);
            prop_assert!((-PI..PI).contains(&n));
            prop_assert!((n.sin() - a.sin()).abs() < 1e-9);
        }

        #[test]
        fn wrap_near_stays_within_band(a in -50.0f64..50.0, r in -10.0f64..10.0) {
            let w = wrap_near(a, r);
            prop_assert!((w - r).abs() <= 1.5 * PI + 1e-9);
            prop_assert!((w.sin() - a.sin()).abs() < 1e-9);
        }
    }
}
