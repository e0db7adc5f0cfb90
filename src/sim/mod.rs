//! Episode simulation
//!
//! This module must stay deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by body handle)
//! - Rendering only through the `FrameSource` seam

pub mod env;
pub mod kinematic;
pub mod physics;
pub mod state;

pub use env::{CarRacing, StepResult};
pub use kinematic::KinematicWorld;
pub use physics::{
    Action, BodyHandle, BodyKind, CarPose, CarState, ContactEvent, ContactPhase, PhysicsBackend,
};
pub use state::{EpisodePhase, EpisodeState, Termination};
