//! Observation frames
//!
//! The episode asks a [`FrameSource`] for one state-sized frame per step.
//! [`TopDownRasterizer`] is a small software renderer: car-centred, rotated
//! so the car faces up, with the zoom-in animation over the first second.

use glam::DVec2;

use crate::consts::{BASE_SCALE, PLAYFIELD, STATE_H, STATE_W};
use crate::heading_forward;
use crate::sim::physics::CarState;
use crate::track::{BorderSegment, Color, Palette, Quad, RoadTile, quad_contains};

/// Camera zoom once the intro animation is over
pub const ZOOM: f64 = 1.7;
/// Width of the reference window the zoom is expressed in
pub const WINDOW_W: f64 = 1000.0;
/// Car hull footprint (half extents, world units)
pub const CAR_HALF_WIDTH: f64 = 0.8;
pub const CAR_HALF_LENGTH: f64 = 2.0;
pub const CAR_COLOR: Color = [204.0, 0.0, 0.0];

/// Row-major RGB pixel buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl Observation {
    pub fn blank(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height * 3],
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }

    fn put(&mut self, x: usize, y: usize, color: Color) {
        let i = (y * self.width + x) * 3;
        for (k, c) in color.iter().enumerate() {
            self.pixels[i + k] = c.clamp(0.0, 255.0) as u8;
        }
    }
}

/// What a frame shows
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub tiles: &'a [RoadTile],
    pub borders: &'a [BorderSegment],
    pub palette: &'a Palette,
    pub car: CarState,
    /// Simulated seconds since reset
    pub elapsed: f64,
}

/// Produces the per-step observation
pub trait FrameSource {
    fn render(&mut self, scene: &Scene<'_>) -> Observation;
}

/// Car-centred view mapping pixels to world points
struct Camera {
    center: DVec2,
    forward: DVec2,
    right: DVec2,
    zoom: f64,
    origin: DVec2,
}

impl Camera {
    fn new(car: &CarState, zoom: f64, width: usize, height: usize) -> Self {
        Self {
            center: car.pos,
            forward: heading_forward(car.angle),
            right: DVec2::new(car.angle.cos(), car.angle.sin()),
            zoom,
            origin: DVec2::new(width as f64 / 2.0, height as f64 * 0.75),
        }
    }

    fn to_world(&self, px: usize, py: usize) -> DVec2 {
        let sx = (px as f64 + 0.5 - self.origin.x) / self.zoom;
        let sy = (self.origin.y - (py as f64 + 0.5)) / self.zoom;
        self.center + self.right * sx + self.forward * sy
    }

    fn to_screen(&self, p: DVec2) -> DVec2 {
        let d = p - self.center;
        DVec2::new(
            self.origin.x + d.dot(self.right) * self.zoom,
            self.origin.y - d.dot(self.forward) * self.zoom,
        )
    }
}

/// Software renderer for state-sized frames
#[derive(Debug, Clone)]
pub struct TopDownRasterizer {
    pub width: usize,
    pub height: usize,
}

impl Default for TopDownRasterizer {
    fn default() -> Self {
        Self {
            width: STATE_W,
            height: STATE_H,
        }
    }
}

impl TopDownRasterizer {
    /// Pixels per world unit at `elapsed` seconds
    pub fn zoom_at(&self, elapsed: f64) -> f64 {
        let window_zoom =
            0.1 * BASE_SCALE * (1.0 - elapsed).max(0.0) + ZOOM * BASE_SCALE * elapsed.min(1.0);
        window_zoom * self.width as f64 / WINDOW_W
    }

    fn ground(&self, p: DVec2, palette: &Palette) -> Color {
        if p.x.abs() > PLAYFIELD || p.y.abs() > PLAYFIELD {
            return [0.0; 3];
        }
        let k = PLAYFIELD / 20.0;
        let gx = (p.x / k).floor() as i64;
        let gy = (p.y / k).floor() as i64;
        let patch = (-20..20).contains(&gx)
            && (-20..20).contains(&gy)
            && gx.rem_euclid(2) == 0
            && gy.rem_euclid(2) == 0;
        if patch { palette.grass } else { palette.background }
    }

    fn fill_quad(&self, frame: &mut Observation, camera: &Camera, quad: &Quad, color: Color) {
        let screen = quad.map(|p| camera.to_screen(p));
        let min = screen.iter().fold(DVec2::INFINITY, |m, p| m.min(*p));
        let max = screen.iter().fold(DVec2::NEG_INFINITY, |m, p| m.max(*p));
        if max.x < 0.0 || max.y < 0.0 || min.x >= self.width as f64 || min.y >= self.height as f64 {
            return;
        }
        let x0 = min.x.max(0.0) as usize;
        let y0 = min.y.max(0.0) as usize;
        let x1 = (max.x.ceil() as usize).min(self.width);
        let y1 = (max.y.ceil() as usize).min(self.height);
        for py in y0..y1 {
            for px in x0..x1 {
                if quad_contains(quad, camera.to_world(px, py)) {
                    frame.put(px, py, color);
                }
            }
        }
    }
}

impl FrameSource for TopDownRasterizer {
    fn render(&mut self, scene: &Scene<'_>) -> Observation {
        let mut frame = Observation::blank(self.width, self.height);
        let camera = Camera::new(&scene.car, self.zoom_at(scene.elapsed), self.width, self.height);

        for py in 0..self.height {
            for px in 0..self.width {
                let color = self.ground(camera.to_world(px, py), scene.palette);
                frame.put(px, py, color);
            }
        }
        for tile in scene.tiles {
            self.fill_quad(&mut frame, &camera, &tile.quad, tile.color);
        }
        for kerb in scene.borders {
            self.fill_quad(&mut frame, &camera, &kerb.quad, kerb.color);
        }

        let c = scene.car.pos;
        let f = camera.forward * CAR_HALF_LENGTH;
        let r = camera.right * CAR_HALF_WIDTH;
        let hull = [c - r - f, c + r - f, c + r + f, c - r + f];
        self.fill_quad(&mut frame, &camera, &hull, CAR_COLOR);

        frame
    }
}
