//! Procedural track generation
//!
//! Pipeline: checkpoint ring -> centerline walk -> closed lap -> tiles and
//! kerbs. Generation is pure: the same ring and parameters always give the
//! same track.

pub mod builder;
pub mod checkpoints;
pub mod geometry;

pub use builder::{Centerline, TrackPoint, extract_lap, find_closed_loop, glue_gap, walk_centerline};
pub use checkpoints::{Checkpoint, CheckpointRing};
pub use geometry::{
    BorderSegment, Color, Palette, Quad, Restriction, RoadTile, TrackLayout, border_flags,
    hard_turns, quad_contains,
};

use std::ops::Range;

use crate::consts::*;
use crate::error::GenerationError;

/// Generation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TrackParams {
    /// Mean checkpoint radius
    pub radius: f64,
    /// Gain on the projection toward the next checkpoint
    pub steer_gain: f64,
    /// Distance between centerline samples
    pub step: f64,
    /// Heading change cap per sample
    pub turn_rate: f64,
    /// Road half-width
    pub half_width: f64,
    /// Kerb width
    pub border: f64,
    /// Run length for kerb detection
    pub border_min_count: usize,
    /// Walk stops after this many laps
    pub max_laps: u32,
    /// Stall guard
    pub max_iterations: usize,
}

impl Default for TrackParams {
    fn default() -> Self {
        Self {
            radius: TRACK_RAD,
            steer_gain: BASE_SCALE,
            step: TRACK_DETAIL_STEP,
            turn_rate: TRACK_TURN_RATE,
            half_width: TRACK_WIDTH,
            border: BORDER,
            border_min_count: BORDER_MIN_COUNT,
            max_laps: MAX_TRACK_LAPS,
            max_iterations: MAX_TRACK_ITERATIONS,
        }
    }
}

impl TrackParams {
    /// Default geometry with a scenario's steering gain
    pub fn with_scale(scale: f64) -> Self {
        Self {
            steer_gain: scale,
            ..Self::default()
        }
    }
}

/// One closed lap of centerline
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub points: Vec<TrackPoint>,
    /// Where the lap sits inside the raw walk
    pub walk_range: Range<usize>,
    pub start_alpha: f64,
}

impl Track {
    /// Run the centerline walk and cut a closed lap out of it
    pub fn generate(ring: &CheckpointRing, params: &TrackParams) -> Result<Self, GenerationError> {
        let walk = walk_centerline(ring, params);
        if walk.stalled {
            log::debug!("Centerline walk stalled after {} samples", walk.points.len());
        }
        let (walk_range, points) = extract_lap(&walk, ring.start_alpha, params)?;
        Ok(Self {
            points,
            walk_range,
            start_alpha: ring.start_alpha,
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Headings along the lap, in order
    pub fn betas(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.beta).collect()
    }
}
