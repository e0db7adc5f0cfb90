//! Centerline synthesis
//!
//! Walks from checkpoint to checkpoint with a bounded turn rate, sampling a
//! point every `step` units, then cuts one clean lap out of the walk.

use std::f64::consts::TAU;
use std::ops::Range;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::TrackParams;
use super::checkpoints::CheckpointRing;
use crate::error::GenerationError;
use crate::{cartesian_to_polar, heading_forward, wrap_near};

/// A sampled centerline pose
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Polar angle of the point about the origin
    pub alpha: f64,
    /// Smoothed heading of the track at this point
    pub beta: f64,
    pub pos: DVec2,
}

/// Raw output of the centerline walk (several laps)
#[derive(Debug, Clone)]
pub struct Centerline {
    pub points: Vec<TrackPoint>,
    /// Completed laps when the walk stopped
    pub laps: u32,
    /// The walk hit the iteration budget before finishing its laps
    pub stalled: bool,
}

/// Walk the checkpoint ring and record the centerline
pub fn walk_centerline(ring: &CheckpointRing, params: &TrackParams) -> Centerline {
    let checkpoints = &ring.checkpoints;
    let n = checkpoints.len();

    let mut pos = DVec2::new(1.5 * params.radius, 0.0);
    let mut beta = 0.0_f64;
    let mut dest_i = 0usize;
    let mut laps = 0u32;
    let mut visited_other_side = false;
    let mut points = Vec::with_capacity(params.max_iterations);
    let mut stalled = false;

    if n == 0 {
        return Centerline {
            points,
            laps,
            stalled: true,
        };
    }

    let mut budget = params.max_iterations;
    loop {
        let (_, mut alpha) = cartesian_to_polar(pos);
        if visited_other_side && alpha > 0.0 {
            laps += 1;
            visited_other_side = false;
        }
        if alpha < 0.0 {
            visited_other_side = true;
            alpha += TAU;
        }

        // Next checkpoint ahead of us; past the last one, aim at the first
        // one of the next lap
        let dest = loop {
            let mut found = None;
            loop {
                let cp = checkpoints[dest_i % n];
                if alpha <= cp.alpha {
                    found = Some(cp);
                    break;
                }
                dest_i += 1;
                if dest_i % n == 0 {
                    break;
                }
            }
            match found {
                Some(cp) => break cp,
                None => alpha -= TAU,
            }
        };

        let radial = DVec2::new(beta.cos(), beta.sin());
        let forward = heading_forward(beta);
        let mut proj = radial.dot(dest.pos - pos);

        beta = wrap_near(beta, alpha);
        let prev_beta = beta;
        proj *= params.steer_gain;
        if proj > 0.3 {
            beta -= params.turn_rate.min((0.001 * proj).abs());
        }
        if proj < -0.3 {
            beta += params.turn_rate.min((0.001 * proj).abs());
        }

        pos += forward * params.step;
        points.push(TrackPoint {
            alpha,
            beta: prev_beta * 0.5 + beta * 0.5,
            pos,
        });

        if laps > params.max_laps {
            break;
        }
        budget -= 1;
        if budget == 0 {
            stalled = true;
            break;
        }
    }

    Centerline {
        points,
        laps,
        stalled,
    }
}

/// Locate the last full lap of a walk.
///
/// Scanning backward, the first start-angle crossing ends the lap and the
/// second one begins it. Returns the index range of the lap in `points`.
pub fn find_closed_loop(
    points: &[TrackPoint],
    start_alpha: f64,
) -> Result<Range<usize>, GenerationError> {
    let mut i2 = None;
    let mut i = points.len();
    loop {
        if i <= 1 {
            return Err(GenerationError::LoopNotClosed);
        }
        i -= 1;
        let crosses = points[i].alpha > start_alpha && points[i - 1].alpha <= start_alpha;
        if !crosses {
            continue;
        }
        match i2 {
            None => i2 = Some(i),
            Some(end) => {
                if end - 1 <= i {
                    return Err(GenerationError::Empty);
                }
                return Ok(i..end - 1);
            }
        }
    }
}

/// Gap between the head and tail of a lap across the head's heading
pub fn glue_gap(lap: &[TrackPoint]) -> f64 {
    let (Some(first), Some(last)) = (lap.first(), lap.last()) else {
        return f64::INFINITY;
    };
    let perp = DVec2::new(first.beta.cos(), first.beta.sin());
    let d = first.pos - last.pos;
    ((perp.x * d.x).powi(2) + (perp.y * d.y).powi(2)).sqrt()
}

/// Cut one lap out of the walk and check that it closes
pub fn extract_lap(
    centerline: &Centerline,
    start_alpha: f64,
    params: &TrackParams,
) -> Result<(Range<usize>, Vec<TrackPoint>), GenerationError> {
    let range = find_closed_loop(&centerline.points, start_alpha)?;
    let lap = centerline.points[range.clone()].to_vec();

    let gap = glue_gap(&lap);
    if gap > params.step {
        return Err(GenerationError::EndsNotGlued {
            gap,
            tolerance: params.step,
        });
    }
    Ok((range, lap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::CHECKPOINTS;

    fn point(alpha: f64) -> TrackPoint {
        TrackPoint {
            alpha,
            beta: 0.0,
            pos: DVec2::ZERO,
        }
    }

    /// Every checkpoint at the mean radius with no jitter
    fn round_ring() -> CheckpointRing {
        let jitter = vec![0.0; CHECKPOINTS];
        let radii = vec![crate::consts::TRACK_RAD; CHECKPOINTS];
        CheckpointRing::from_parameters(&jitter, &radii)
    }

    #[test]
    fn test_find_closed_loop_takes_second_to_last_lap_boundary() {
        let start = -0.1;
        // crossings at 3, 7 and 11 (value goes from <= start to > start)
        let alphas = [
            0.5, 1.0, -0.5, 0.2, 1.0, 2.0, -0.3, 0.1, 1.0, 2.0, -0.2, 0.3, 0.5,
        ];
        let points: Vec<_> = alphas.iter().map(|&a| point(a)).collect();
        let range = find_closed_loop(&points, start).unwrap();
        assert_eq!(range, 7..10);
    }

    #[test]
    fn test_single_crossing_is_not_a_loop() {
        let points: Vec<_> = [-0.5, 0.5, 1.0].iter().map(|&a| point(a)).collect();
        assert_eq!(
            find_closed_loop(&points, -0.1),
            Err(GenerationError::LoopNotClosed)
        );
        assert_eq!(find_closed_loop(&[], -0.1), Err(GenerationError::LoopNotClosed));
    }

    #[test]
    fn test_walk_spacing_is_fixed_step() {
        let params = TrackParams::default();
        let walk = walk_centerline(&round_ring(), &params);
        assert!(!walk.points.is_empty());
        for pair in walk.points.windows(2) {
            let d = (pair[1].pos - pair[0].pos).length();
            assert!((d - params.step).abs() < 1e-9);
        }
    }

    #[test]
    fn test_round_ring_closes() {
        let params = TrackParams::default();
        let ring = round_ring();
        let walk = walk_centerline(&ring, &params);
        assert!(!walk.stalled);
        assert!(walk.laps > params.max_laps);

        let (range, lap) = extract_lap(&walk, ring.start_alpha, &params).unwrap();
        assert_eq!(range.len(), lap.len());
        assert!(glue_gap(&lap) <= params.step);
        // Roughly a circle between 1.0R and 1.5R: a few hundred samples
        assert!(lap.len() > 150 && lap.len() < 600, "lap of {}", lap.len());
    }

    #[test]
    fn test_stall_guard_stops_walk() {
        let params = TrackParams {
            max_iterations: 10,
            ..TrackParams::default()
        };
        let walk = walk_centerline(&round_ring(), &params);
        assert!(walk.stalled);
        assert_eq!(walk.points.len(), 10);
        assert!(extract_lap(&walk, round_ring().start_alpha, &params).is_err());
    }

    #[test]
    fn test_glue_gap_of_coincident_ends_is_zero() {
        let lap = [point(0.0), point(1.0), point(0.0)];
        assert_eq!(glue_gap(&lap), 0.0);
        assert!(glue_gap(&[]).is_infinite());
    }
}
