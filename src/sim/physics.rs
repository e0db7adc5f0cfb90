//! Physics backend seam
//!
//! The episode core never touches a rigid-body engine directly. It creates
//! sensor bodies for road tiles, spawns one car, steps the world and reads
//! back contact events and the car's state through [`PhysicsBackend`].

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::track::Quad;

/// Opaque handle to a body owned by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyHandle(pub u32);

/// What a sensor body represents; backends use this instead of inspecting
/// user data. The car is created through [`PhysicsBackend::create_car`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyKind {
    /// Static sensor covering one road tile
    RoadTile { index: usize, friction: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactPhase {
    Begin,
    End,
}

/// Two bodies started or stopped touching during a world step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEvent {
    pub phase: ContactPhase,
    pub a: BodyHandle,
    pub b: BodyHandle,
}

/// Steering, throttle and brake for one step
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Action {
    /// -1 is full left, +1 full right
    pub steer: f64,
    /// 0..=1
    pub gas: f64,
    /// 0..=1
    pub brake: f64,
}

impl Action {
    pub const fn new(steer: f64, gas: f64, brake: f64) -> Self {
        Self { steer, gas, brake }
    }

    /// Reject non-finite input and clamp each channel into its range
    pub fn sanitized(self) -> Option<Self> {
        if !(self.steer.is_finite() && self.gas.is_finite() && self.brake.is_finite()) {
            return None;
        }
        Some(Self {
            steer: self.steer.clamp(-1.0, 1.0),
            gas: self.gas.clamp(0.0, 1.0),
            brake: self.brake.clamp(0.0, 1.0),
        })
    }
}

/// Initial placement of the car
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarPose {
    pub pos: DVec2,
    /// Hull angle; the car faces `heading_forward(angle)`
    pub angle: f64,
}

/// Car readout after a step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CarState {
    pub pos: DVec2,
    pub vel: DVec2,
    pub angle: f64,
    pub angular_vel: f64,
    /// Longitudinal tyre force
    pub forward_force: f64,
    /// Lateral tyre force
    pub lateral_force: f64,
}

/// Minimal contract of a 2D physics engine hosting one car
pub trait PhysicsBackend {
    /// Create a static sensor body with a convex quad fixture
    fn create_sensor(&mut self, quad: Quad, kind: BodyKind) -> BodyHandle;

    /// Destroy any body created by this backend
    fn destroy_body(&mut self, handle: BodyHandle);

    /// Spawn the car
    fn create_car(&mut self, pose: CarPose) -> BodyHandle;

    /// Apply steering/gas/brake to the car until changed
    fn control_car(&mut self, action: &Action);

    /// Override the car's linear velocity
    fn set_car_velocity(&mut self, vel: DVec2);

    /// Advance the world by `dt`
    fn step(&mut self, dt: f64);

    /// Contact events produced since the last drain, in occurrence order
    fn drain_contacts(&mut self) -> Vec<ContactEvent>;

    /// Current car state, if a car exists
    fn car_state(&self) -> Option<CarState>;
}
