//! Reference physics backend
//!
//! A single-track car model with rate-limited throttle and steering, drag,
//! and grip that drops off the road. Contacts are detected by testing the
//! car centre against sensor quads, which is all the episode core needs.

use std::collections::{BTreeMap, BTreeSet};

use glam::DVec2;

use super::physics::{
    Action, BodyHandle, BodyKind, CarPose, CarState, ContactEvent, ContactPhase, PhysicsBackend,
};
use crate::heading_forward;
use crate::track::{Quad, quad_contains};

/// Full-throttle acceleration (world units/s²)
pub const ENGINE_ACCEL: f64 = 40.0;
/// Quadratic drag coefficient
pub const DRAG: f64 = 0.006;
/// Full-brake deceleration
pub const BRAKE_DECEL: f64 = 60.0;
/// Lateral grip on a friction-1.0 surface
pub const GRIP: f64 = 60.0;
/// Friction multiplier when no road tile is under the car
pub const OFF_ROAD_FRICTION: f64 = 0.6;
/// Maximum throttle increase per step
pub const GAS_RATE: f64 = 0.1;
/// Maximum front wheel angle (radians)
pub const MAX_STEER: f64 = 0.4;
/// Wheel turn rate (radians/s)
pub const STEER_RATE: f64 = 3.0;
pub const WHEELBASE: f64 = 3.0;
pub const CAR_MASS: f64 = 10.0;

#[derive(Debug, Clone)]
struct Sensor {
    quad: Quad,
    kind: BodyKind,
}

#[derive(Debug, Clone)]
struct KinematicCar {
    handle: BodyHandle,
    pos: DVec2,
    vel: DVec2,
    angle: f64,
    angular_vel: f64,
    steer_angle: f64,
    gas: f64,
    control: Action,
    forward_force: f64,
    lateral_force: f64,
}

impl KinematicCar {
    fn new(handle: BodyHandle, pose: CarPose) -> Self {
        Self {
            handle,
            pos: pose.pos,
            vel: DVec2::ZERO,
            angle: pose.angle,
            angular_vel: 0.0,
            steer_angle: 0.0,
            gas: 0.0,
            control: Action::default(),
            forward_force: 0.0,
            lateral_force: 0.0,
        }
    }

    fn integrate(&mut self, dt: f64, friction: f64) {
        // Throttle spools up, releases instantly
        if self.control.gas > self.gas {
            self.gas = (self.gas + GAS_RATE).min(self.control.gas);
        } else {
            self.gas = self.control.gas;
        }

        let target_steer = self.control.steer * MAX_STEER;
        let max_delta = STEER_RATE * dt;
        self.steer_angle += (target_steer - self.steer_angle).clamp(-max_delta, max_delta);

        let forward = heading_forward(self.angle);
        let right = DVec2::new(self.angle.cos(), self.angle.sin());
        let v_f = self.vel.dot(forward);
        let v_l = self.vel.dot(right);

        let mut a_f = self.gas * ENGINE_ACCEL - DRAG * v_f * v_f.abs();
        if self.control.brake > 0.0 {
            let decel = self.control.brake * BRAKE_DECEL;
            if v_f.abs() <= decel * dt {
                a_f = -v_f / dt;
            } else {
                a_f -= decel * v_f.signum();
            }
        }

        let grip = GRIP * friction;
        let a_l = (-v_l / dt).clamp(-grip, grip);

        self.vel += (forward * a_f + right * a_l) * dt;

        // Steering right turns clockwise
        let v_f = self.vel.dot(forward);
        self.angular_vel = -v_f * self.steer_angle.tan() / WHEELBASE;
        self.angle += self.angular_vel * dt;
        self.pos += self.vel * dt;

        self.forward_force = a_f * CAR_MASS;
        self.lateral_force = a_l * CAR_MASS;
    }
}

/// Headless world holding road sensors and one car
#[derive(Debug, Clone, Default)]
pub struct KinematicWorld {
    sensors: BTreeMap<BodyHandle, Sensor>,
    car: Option<KinematicCar>,
    touching: BTreeSet<BodyHandle>,
    events: Vec<ContactEvent>,
    next_id: u32,
}

impl KinematicWorld {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_handle(&mut self) -> BodyHandle {
        let handle = BodyHandle(self.next_id);
        self.next_id += 1;
        handle
    }

    /// Number of live bodies, car included
    pub fn body_count(&self) -> usize {
        self.sensors.len() + usize::from(self.car.is_some())
    }

    /// Road sensors currently under the car
    pub fn touching(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.touching.iter().copied()
    }

    fn surface_friction(&self) -> f64 {
        self.touching
            .iter()
            .filter_map(|h| self.sensors.get(h))
            .map(|s| match s.kind {
                BodyKind::RoadTile { friction, .. } => friction,
            })
            .fold(None, |acc: Option<f64>, f| Some(acc.map_or(f, |a| a.max(f))))
            .unwrap_or(OFF_ROAD_FRICTION)
    }

    fn update_contacts(&mut self) {
        let Some(car) = &self.car else {
            return;
        };
        let car_handle = car.handle;
        let now: BTreeSet<BodyHandle> = self
            .sensors
            .iter()
            .filter(|(_, s)| quad_contains(&s.quad, car.pos))
            .map(|(h, _)| *h)
            .collect();

        for &gone in self.touching.difference(&now) {
            self.events.push(ContactEvent {
                phase: ContactPhase::End,
                a: gone,
                b: car_handle,
            });
        }
        for &new in now.difference(&self.touching) {
            self.events.push(ContactEvent {
                phase: ContactPhase::Begin,
                a: new,
                b: car_handle,
            });
        }
        self.touching = now;
    }
}

impl PhysicsBackend for KinematicWorld {
    fn create_sensor(&mut self, quad: Quad, kind: BodyKind) -> BodyHandle {
        let handle = self.next_handle();
        self.sensors.insert(handle, Sensor { quad, kind });
        handle
    }

    fn destroy_body(&mut self, handle: BodyHandle) {
        if self.car.as_ref().is_some_and(|c| c.handle == handle) {
            self.car = None;
            self.touching.clear();
            return;
        }
        self.sensors.remove(&handle);
        self.touching.remove(&handle);
    }

    fn create_car(&mut self, pose: CarPose) -> BodyHandle {
        let handle = self.next_handle();
        self.car = Some(KinematicCar::new(handle, pose));
        self.touching.clear();
        handle
    }

    fn control_car(&mut self, action: &Action) {
        if let Some(car) = &mut self.car {
            car.control = *action;
        }
    }

    fn set_car_velocity(&mut self, vel: DVec2) {
        if let Some(car) = &mut self.car {
            car.vel = vel;
        }
    }

    fn step(&mut self, dt: f64) {
        let friction = self.surface_friction();
        if let Some(car) = &mut self.car {
            car.integrate(dt, friction);
        }
        self.update_contacts();
    }

    fn drain_contacts(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.events)
    }

    fn car_state(&self) -> Option<CarState> {
        self.car.as_ref().map(|car| CarState {
            pos: car.pos,
            vel: car.vel,
            angle: car.angle,
            angular_vel: car.angular_vel,
            forward_force: car.forward_force,
            lateral_force: car.lateral_force,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;

    fn square(center: DVec2, half: f64) -> Quad {
        [
            center + DVec2::new(-half, -half),
            center + DVec2::new(half, -half),
            center + DVec2::new(half, half),
            center + DVec2::new(-half, half),
        ]
    }

    fn world_with_car() -> (KinematicWorld, BodyHandle) {
        let mut world = KinematicWorld::new();
        let car = world.create_car(CarPose {
            pos: DVec2::ZERO,
            angle: 0.0,
        });
        (world, car)
    }

    #[test]
    fn test_gas_moves_car_forward() {
        let (mut world, _) = world_with_car();
        world.control_car(&Action::new(0.0, 1.0, 0.0));
        for _ in 0..50 {
            world.step(SIM_DT);
        }
        let state = world.car_state().unwrap();
        assert!(state.pos.y > 1.0);
        assert!(state.pos.x.abs() < 1e-9);
        assert!(state.forward_force > 0.0);
    }

    #[test]
    fn test_steer_right_turns_clockwise() {
        let (mut world, _) = world_with_car();
        world.set_car_velocity(DVec2::new(0.0, 20.0));
        world.control_car(&Action::new(1.0, 0.3, 0.0));
        for _ in 0..25 {
            world.step(SIM_DT);
        }
        let state = world.car_state().unwrap();
        assert!(state.angle < 0.0);
        assert!(state.pos.x > 0.0);
    }

    #[test]
    fn test_brake_stops_without_reversing() {
        let (mut world, _) = world_with_car();
        world.set_car_velocity(DVec2::new(0.0, 10.0));
        world.control_car(&Action::new(0.0, 0.0, 1.0));
        for _ in 0..100 {
            world.step(SIM_DT);
        }
        let state = world.car_state().unwrap();
        assert!(state.vel.length() < 1e-9);
    }

    #[test]
    fn test_contact_events_on_enter_and_leave() {
        let (mut world, car) = world_with_car();
        let tile = world.create_sensor(
            square(DVec2::new(0.0, 3.0), 1.0),
            BodyKind::RoadTile {
                index: 0,
                friction: 1.0,
            },
        );
        world.set_car_velocity(DVec2::new(0.0, 10.0));

        let mut events = Vec::new();
        for _ in 0..40 {
            world.step(SIM_DT);
            events.extend(world.drain_contacts());
        }
        assert_eq!(
            events,
            vec![
                ContactEvent {
                    phase: ContactPhase::Begin,
                    a: tile,
                    b: car
                },
                ContactEvent {
                    phase: ContactPhase::End,
                    a: tile,
                    b: car
                },
            ]
        );
        assert!(world.drain_contacts().is_empty());
    }

    #[test]
    fn test_grip_follows_best_tile_under_car() {
        let (mut world, _) = world_with_car();
        world.step(SIM_DT);
        assert_eq!(world.surface_friction(), OFF_ROAD_FRICTION);

        for (index, friction) in [(0, 0.8), (1, 1.0)] {
            world.create_sensor(
                square(DVec2::ZERO, 2.0),
                BodyKind::RoadTile { index, friction },
            );
        }
        world.step(SIM_DT);
        assert_eq!(world.touching().count(), 2);
        assert_eq!(world.surface_friction(), 1.0);
    }

    #[test]
    fn test_destroy_bodies() {
        let (mut world, car) = world_with_car();
        let tile = world.create_sensor(
            square(DVec2::ZERO, 1.0),
            BodyKind::RoadTile {
                index: 3,
                friction: 1.0,
            },
        );
        world.step(SIM_DT);
        assert_eq!(world.touching().collect::<Vec<_>>(), vec![tile]);
        assert_eq!(world.body_count(), 2);

        world.destroy_body(tile);
        world.destroy_body(car);
        assert_eq!(world.body_count(), 0);
        assert!(world.car_state().is_none());
    }
}
