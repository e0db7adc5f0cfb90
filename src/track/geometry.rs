//! Road tiles and kerbs
//!
//! Every pair of consecutive lap points becomes a trapezoidal road tile
//! spanning the road width. Runs of sharp same-direction heading changes get
//! an extra red/white kerb quad on the outside of the turn.

use std::ops::Range;

use glam::DVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Track, TrackParams, TrackPoint};
use crate::error::ConfigError;
use crate::scenario::ScenarioId;

/// RGB with channels in 0..=255
pub type Color = [f32; 3];

/// Four corners of a convex quad
pub type Quad = [DVec2; 4];

pub const KERB_WHITE: Color = [255.0, 255.0, 255.0];
pub const KERB_RED: Color = [255.0, 0.0, 0.0];

/// Scene colours for one episode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub road: Color,
    pub background: Color,
    pub grass: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            road: [102.0, 102.0, 102.0],
            background: [102.0, 204.0, 102.0],
            grass: [102.0, 230.0, 102.0],
        }
    }
}

impl Palette {
    /// Domain-randomized colours: road and background uniform in [0, 210),
    /// grass is the background brightened on one channel
    pub fn randomized<R: Rng>(rng: &mut R) -> Self {
        let mut sample = || -> Color {
            [
                rng.random_range(0.0..210.0),
                rng.random_range(0.0..210.0),
                rng.random_range(0.0..210.0),
            ]
        };
        let road = sample();
        let background = sample();
        let mut grass = background;
        grass[rng.random_range(0..3)] += 20.0;
        Self {
            road,
            background,
            grass,
        }
    }

    /// Road colour with the per-tile tint
    pub fn tile_color(&self, index: usize) -> Color {
        let tint = 0.01 * (index % 3) as f32 * 255.0;
        self.road.map(|c| c + tint)
    }
}

/// A drivable quad between two consecutive lap points
#[derive(Debug, Clone, PartialEq)]
pub struct RoadTile {
    /// Index of the tile's leading point in the full lap
    pub index: usize,
    pub quad: Quad,
    pub friction: f64,
    pub visited: bool,
    pub color: Color,
}

/// Decorative kerb beside a road tile
#[derive(Debug, Clone, PartialEq)]
pub struct BorderSegment {
    pub index: usize,
    pub quad: Quad,
    pub color: Color,
}

/// Scenario slice of the full lap
#[derive(Debug, Clone, PartialEq)]
pub struct Restriction {
    pub id: ScenarioId,
    pub range: Range<usize>,
}

#[inline]
fn wrap(i: isize, n: usize) -> usize {
    i.rem_euclid(n as isize) as usize
}

#[inline]
fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Points ending a run of `min_count` sharp heading deltas of the same sign.
///
/// A delta is sharp when it exceeds 20% of the turn rate. Indices wrap, the
/// lap being cyclic.
pub fn hard_turns(betas: &[f64], turn_rate: f64, min_count: usize) -> Vec<bool> {
    let n = betas.len();
    (0..n)
        .map(|i| {
            let mut good = true;
            let mut oneside = 0.0;
            for neg in 0..min_count {
                let b1 = betas[wrap(i as isize - neg as isize, n)];
                let b2 = betas[wrap(i as isize - neg as isize - 1, n)];
                good &= (b1 - b2).abs() > turn_rate * 0.2;
                oneside += sign(b1 - b2);
            }
            good && oneside.abs() as usize == min_count
        })
        .collect()
}

/// Kerb flags: each hard turn also marks the `min_count - 1` points before it
pub fn border_flags(betas: &[f64], turn_rate: f64, min_count: usize) -> Vec<bool> {
    let n = betas.len();
    let hard = hard_turns(betas, turn_rate, min_count);
    let mut border = vec![false; n];
    for (i, _) in hard.iter().enumerate().filter(|(_, h)| **h) {
        for neg in 0..min_count {
            border[wrap(i as isize - neg as isize, n)] = true;
        }
    }
    border
}

/// Whether `p` lies inside (or on) a convex quad of either winding
pub fn quad_contains(quad: &Quad, p: DVec2) -> bool {
    let mut pos = false;
    let mut neg = false;
    for k in 0..4 {
        let a = quad[k];
        let b = quad[(k + 1) % 4];
        let cross = (b - a).perp_dot(p - a);
        if cross > 0.0 {
            pos = true;
        } else if cross < 0.0 {
            neg = true;
        }
        if pos && neg {
            return false;
        }
    }
    true
}

fn side_offset(point: &TrackPoint, distance: f64) -> DVec2 {
    point.pos + DVec2::new(point.beta.cos(), point.beta.sin()) * distance
}

/// Tiles and kerbs of a (possibly restricted) lap
#[derive(Debug, Clone, PartialEq)]
pub struct TrackLayout {
    pub tiles: Vec<RoadTile>,
    pub borders: Vec<BorderSegment>,
    /// Lap indices exposed to the episode
    pub exposed: Range<usize>,
}

impl TrackLayout {
    /// Build geometry for the lap, keeping only tiles inside the restriction.
    ///
    /// Kerb detection always runs over the whole lap and tiles keep their
    /// full-lap index.
    pub fn build(
        track: &Track,
        restriction: Option<&Restriction>,
        params: &TrackParams,
        palette: &Palette,
    ) -> Result<Self, ConfigError> {
        let n = track.len();
        let exposed = match restriction {
            Some(r) => {
                if r.range.end > n || r.range.start >= r.range.end {
                    return Err(ConfigError::ScenarioRange {
                        id: r.id.0,
                        start: r.range.start,
                        end: r.range.end,
                        track_len: n,
                    });
                }
                r.range.clone()
            }
            None => 0..n,
        };

        let border = border_flags(&track.betas(), params.turn_rate, params.border_min_count);
        let hw = params.half_width;
        let mut tiles = Vec::with_capacity(exposed.len());
        let mut borders = Vec::new();

        for i in exposed.clone() {
            let p1 = &track.points[i];
            let p2 = &track.points[wrap(i as isize - 1, n)];

            let quad = [
                side_offset(p1, -hw),
                side_offset(p1, hw),
                side_offset(p2, hw),
                side_offset(p2, -hw),
            ];
            tiles.push(RoadTile {
                index: i,
                quad,
                friction: 1.0,
                visited: false,
                color: palette.tile_color(i),
            });

            if border[i] {
                let side = sign(p2.beta - p1.beta);
                borders.push(BorderSegment {
                    index: i,
                    quad: [
                        side_offset(p1, side * hw),
                        side_offset(p1, side * (hw + params.border)),
                        side_offset(p2, side * (hw + params.border)),
                        side_offset(p2, side * hw),
                    ],
                    color: if i % 2 == 0 { KERB_WHITE } else { KERB_RED },
                });
            }
        }

        Ok(Self {
            tiles,
            borders,
            exposed,
        })
    }

    /// Lap points exposed to the episode
    pub fn exposed_points<'a>(&self, track: &'a Track) -> &'a [TrackPoint] {
        &track.points[self.exposed.clone()]
    }
}
