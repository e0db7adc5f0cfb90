//! Episode state machine
//!
//! `CarRacing` owns the generated track, the tile bodies it registered with
//! the physics backend, and the episode counters. One call to [`CarRacing::step`]
//! is one fixed-timestep frame.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::physics::{
    Action, BodyHandle, BodyKind, CarPose, CarState, ContactEvent, ContactPhase, PhysicsBackend,
};
use super::state::{EpisodePhase, EpisodeState, Termination};
use crate::consts::*;
use crate::error::{ConfigError, EnvError};
use crate::render::{FrameSource, Observation, Scene};
use crate::scenario::{ScenarioEntry, ScenarioId, ScenarioRegistry};
use crate::settings::{EnvSettings, TerminationPolicy};
use crate::track::{
    CheckpointRing, Palette, Restriction, Track, TrackLayout, TrackParams, TrackPoint,
};

/// Outcome of one step
#[derive(Debug, Clone)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    /// Auxiliary values; currently always empty
    pub info: BTreeMap<String, f64>,
}

/// A racing environment over one physics backend and one frame source
pub struct CarRacing<B: PhysicsBackend, R: FrameSource> {
    settings: EnvSettings,
    scenario: Option<(ScenarioId, ScenarioEntry)>,
    params: TrackParams,
    backend: B,
    frames: R,
    rng: Pcg32,
    /// Parameter file contents, read on first reset
    fixed_ring: Option<CheckpointRing>,
    ring: Option<CheckpointRing>,
    palette: Palette,
    track: Option<Track>,
    layout: Option<TrackLayout>,
    /// Tile body -> slot in `layout.tiles`
    tile_bodies: BTreeMap<BodyHandle, usize>,
    car: Option<BodyHandle>,
    /// Tile indices currently under the car
    car_tiles: BTreeSet<usize>,
    episode: EpisodeState,
}

impl<B: PhysicsBackend, R: FrameSource> CarRacing<B, R> {
    /// Create an environment. An unknown scenario id is rejected here.
    pub fn new(
        settings: EnvSettings,
        registry: &ScenarioRegistry,
        backend: B,
        frames: R,
    ) -> Result<Self, ConfigError> {
        let scenario = match settings.scenario {
            Some(id) => {
                let entry = registry.get(id)?.clone();
                log::info!(
                    "Scenario {id}: tiles {:?}, file {}",
                    entry.tile_range,
                    entry.checkpoint_file.display()
                );
                Some((id, entry))
            }
            None => None,
        };
        let params = scenario
            .as_ref()
            .map_or_else(TrackParams::default, |(_, e)| TrackParams::with_scale(e.scale));

        Ok(Self {
            rng: Pcg32::seed_from_u64(settings.seed),
            settings,
            scenario,
            params,
            backend,
            frames,
            fixed_ring: None,
            ring: None,
            palette: Palette::default(),
            track: None,
            layout: None,
            tile_bodies: BTreeMap::new(),
            car: None,
            car_tiles: BTreeSet::new(),
            episode: EpisodeState::default(),
        })
    }

    /// Parameter file in effect: the settings override, else the scenario's
    fn checkpoint_path(&self) -> Option<PathBuf> {
        self.settings
            .checkpoint_file
            .clone()
            .or_else(|| self.scenario.as_ref().map(|(_, e)| e.checkpoint_file.clone()))
    }

    fn destroy(&mut self) {
        for handle in std::mem::take(&mut self.tile_bodies).into_keys() {
            self.backend.destroy_body(handle);
        }
        if let Some(car) = self.car.take() {
            self.backend.destroy_body(car);
        }
        self.car_tiles.clear();
        self.layout = None;
        self.track = None;
    }

    /// Generate a closed track, retrying failed random samples
    fn generate(&mut self) -> Result<(CheckpointRing, Track), ConfigError> {
        if self.fixed_ring.is_none() {
            if let Some(path) = self.checkpoint_path() {
                self.fixed_ring = Some(CheckpointRing::load(&path, CHECKPOINTS)?);
            }
        }

        let attempts = self.settings.max_generation_attempts.max(1);
        for attempt in 1..=attempts {
            let ring = match &self.fixed_ring {
                Some(ring) => ring.clone(),
                None => CheckpointRing::random(&mut self.rng, CHECKPOINTS),
            };
            match Track::generate(&ring, &self.params) {
                Ok(track) => {
                    if self.settings.verbose {
                        log::info!(
                            "Track generation: {}..{} -> {}-tiles track",
                            track.walk_range.start,
                            track.walk_range.end,
                            track.len()
                        );
                    }
                    return Ok((ring, track));
                }
                Err(err) => {
                    log::warn!("Track generation attempt {attempt} failed: {err}");
                    // A fixed ring gives the same walk every time
                    if self.fixed_ring.is_some() {
                        return Err(ConfigError::GenerationExhausted { attempts: attempt });
                    }
                }
            }
        }
        Err(ConfigError::GenerationExhausted { attempts })
    }

    /// Start a new episode and return its first observation
    pub fn reset(&mut self) -> Result<Observation, EnvError> {
        self.destroy();
        self.episode = EpisodeState::default();

        self.palette = if self.settings.domain_randomize {
            Palette::randomized(&mut self.rng)
        } else {
            Palette::default()
        };

        let (ring, track) = self.generate()?;
        let restriction = self.scenario.as_ref().and_then(|(id, entry)| {
            entry.tile_range.clone().map(|range| Restriction { id: *id, range })
        });
        let layout = TrackLayout::build(&track, restriction.as_ref(), &self.params, &self.palette)?;

        for (slot, tile) in layout.tiles.iter().enumerate() {
            let handle = self.backend.create_sensor(
                tile.quad,
                BodyKind::RoadTile {
                    index: tile.index,
                    friction: tile.friction,
                },
            );
            self.tile_bodies.insert(handle, slot);
        }

        let start = track.points[layout.exposed.start];
        let heading_offset = self.scenario.as_ref().map_or(0.0, |(_, e)| e.heading_offset);
        self.car = Some(self.backend.create_car(CarPose {
            pos: start.pos,
            angle: start.beta + heading_offset,
        }));

        self.episode = EpisodeState::new(layout.tiles.len());
        log::debug!(
            "Reset: {} tiles, {} kerbs, car at ({:.2}, {:.2})",
            layout.tiles.len(),
            layout.borders.len(),
            start.pos.x,
            start.pos.y
        );
        self.ring = Some(ring);
        self.track = Some(track);
        self.layout = Some(layout);

        Ok(self.advance(None))
    }

    /// Apply one action for one frame
    pub fn step(&mut self, action: Action) -> Result<StepResult, EnvError> {
        if self.episode.phase == EpisodePhase::Uninitialized {
            return Err(EnvError::NotReset);
        }
        if self.episode.is_terminated() {
            return Err(EnvError::EpisodeTerminated);
        }
        let action = action
            .sanitized()
            .ok_or_else(|| EnvError::InvalidAction(format!("{action:?}")))?;

        let observation = self.advance(Some(&action));
        self.episode.steps += 1;

        self.episode.reward -= STEP_PENALTY;
        let mut reward = self.episode.take_step_reward();
        let mut termination = self.completion();

        if let Some(car) = self.backend.car_state() {
            if car.pos.x.abs() > PLAYFIELD || car.pos.y.abs() > PLAYFIELD {
                log::info!("Car left the playfield at ({:.1}, {:.1})", car.pos.x, car.pos.y);
                termination = Some(Termination::OutOfBounds);
                reward = OUT_OF_BOUNDS_REWARD;
            }
        }

        let done = termination.is_some();
        if let Some(cause) = termination {
            self.episode.termination = Some(cause);
            self.episode.phase = EpisodePhase::Terminated;
            log::info!(
                "Episode over after {} steps: {:?}, reward {:.1}",
                self.episode.steps,
                cause,
                self.episode.reward
            );
        } else {
            self.episode.phase = EpisodePhase::Running;
        }

        Ok(StepResult {
            observation,
            reward,
            done,
            info: BTreeMap::new(),
        })
    }

    /// Whether the episode ends on this step under the configured policy
    fn completion(&mut self) -> Option<Termination> {
        match self.settings.termination {
            TerminationPolicy::LapCompletion => {
                if self.episode.all_tiles_visited() {
                    Some(Termination::AllTilesVisited)
                } else if self.episode.new_lap {
                    Some(Termination::LapCompleted)
                } else {
                    None
                }
            }
            TerminationPolicy::DeferredLastTile => {
                if self.episode.last_tile_pending {
                    return Some(Termination::AllTilesVisited);
                }
                self.episode.last_tile_pending = self.episode.all_tiles_visited();
                None
            }
        }
    }

    /// Advance physics one frame, process contacts and render
    fn advance(&mut self, action: Option<&Action>) -> Observation {
        if let Some(action) = action {
            self.backend.control_car(action);
        }
        self.backend.step(SIM_DT);
        for event in self.backend.drain_contacts() {
            self.handle_contact(event);
        }
        self.episode.elapsed += SIM_DT;
        self.render()
    }

    fn handle_contact(&mut self, event: ContactEvent) {
        let (slot, other) = match (self.tile_bodies.get(&event.a), self.tile_bodies.get(&event.b)) {
            (Some(&slot), None) => (slot, event.b),
            (None, Some(&slot)) => (slot, event.a),
            _ => return,
        };
        let Some(layout) = &mut self.layout else {
            return;
        };
        let tile = &mut layout.tiles[slot];
        tile.color = self.palette.road;
        if self.car != Some(other) {
            return;
        }

        match event.phase {
            ContactPhase::Begin => {
                self.car_tiles.insert(tile.index);
                if !tile.visited {
                    tile.visited = true;
                    self.episode.credit_tile();
                }
                if self.settings.termination == TerminationPolicy::LapCompletion
                    && tile.index == 0
                    && self.episode.visited_fraction() > self.settings.lap_complete_percent
                {
                    self.episode.new_lap = true;
                }
            }
            ContactPhase::End => {
                self.car_tiles.remove(&tile.index);
            }
        }
    }

    fn render(&mut self) -> Observation {
        let (tiles, borders) = match &self.layout {
            Some(layout) => (&layout.tiles[..], &layout.borders[..]),
            None => (&[][..], &[][..]),
        };
        let scene = Scene {
            tiles,
            borders,
            palette: &self.palette,
            car: self.backend.car_state().unwrap_or_default(),
            elapsed: self.episode.elapsed,
        };
        self.frames.render(&scene)
    }

    /// Impose the scenario's entry velocity on the car.
    ///
    /// Returns false when no scenario is active or the car does not exist.
    pub fn apply_initial_velocity(&mut self) -> bool {
        let Some((_, entry)) = &self.scenario else {
            return false;
        };
        if self.car.is_none() {
            return false;
        }
        self.backend.set_car_velocity(entry.initial_velocity);
        true
    }

    pub fn settings(&self) -> &EnvSettings {
        &self.settings
    }

    pub fn scenario(&self) -> Option<&(ScenarioId, ScenarioEntry)> {
        self.scenario.as_ref()
    }

    pub fn episode(&self) -> &EpisodeState {
        &self.episode
    }

    /// Full lap of the current episode
    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn layout(&self) -> Option<&TrackLayout> {
        self.layout.as_ref()
    }

    /// Lap points exposed to the episode (the scenario slice, or the whole lap)
    pub fn exposed_points(&self) -> &[TrackPoint] {
        match (&self.layout, &self.track) {
            (Some(layout), Some(track)) => layout.exposed_points(track),
            _ => &[],
        }
    }

    /// Checkpoints the current track was built from
    pub fn checkpoints(&self) -> Option<&CheckpointRing> {
        self.ring.as_ref()
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn car_state(&self) -> Option<CarState> {
        self.car.and_then(|_| self.backend.car_state())
    }

    /// Indices of the tiles the car currently touches
    pub fn car_tiles(&self) -> impl Iterator<Item = usize> + '_ {
        self.car_tiles.iter().copied()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
