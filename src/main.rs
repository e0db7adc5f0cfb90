//! Corner Racer entry point
//!
//! Headless episode runner: builds the environment on the kinematic backend,
//! drives it with the autopilot or a recorded action log, and writes the
//! resulting trajectories.

use std::path::{Path, PathBuf};

use clap::Parser;

use corner_racer::consts::INITIAL_SPEED_STEPS;
use corner_racer::render::{FrameSource, TopDownRasterizer};
use corner_racer::sim::{Action, CarRacing, CarState, KinematicWorld, PhysicsBackend};
use corner_racer::track::TrackPoint;
use corner_racer::trajectory::{Replay, StateRecord, TrajectoryLog};
use corner_racer::{
    ConfigError, EnvError, EnvSettings, ScenarioId, ScenarioRegistry, TerminationPolicy,
};

/// Command-line arguments for the episode runner.
#[derive(Parser, Debug)]
#[command(name = "corner-racer", about = "Run racing episodes and record trajectories")]
struct Cli {
    /// Corner scenario id (degrees), or 1..=5 for a full recorded track.
    #[arg(long)]
    scenario: Option<u32>,

    /// JSON settings file.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory holding the scenario parameter files.
    #[arg(long, default_value = "simulation_parameters")]
    params_dir: PathBuf,

    /// Checkpoint parameter file (overrides the scenario's).
    #[arg(long)]
    checkpoints: Option<PathBuf>,

    /// Write the checkpoint parameters of each generated track here.
    #[arg(long)]
    save_checkpoints: Option<PathBuf>,

    /// Replay the actions of a recorded trajectory instead of the autopilot.
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Trajectory output file (suffixed with the episode number when
    /// running several episodes).
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long, default_value_t = 1)]
    episodes: u32,

    #[arg(long, default_value_t = 1000)]
    max_steps: u64,

    /// RNG seed for checkpoint sampling and colours.
    #[arg(long)]
    seed: Option<u64>,

    /// Termination rule: `lap-completion` or `deferred-last-tile`.
    #[arg(long, value_parser = parse_policy)]
    termination: Option<TerminationPolicy>,
}

fn parse_policy(s: &str) -> Result<TerminationPolicy, String> {
    TerminationPolicy::from_str(s).ok_or_else(|| format!("unknown termination policy {s:?}"))
}

/// Steering gain on the heading error (radians)
const STEER_GAIN: f64 = 2.0;
/// Track points to look ahead of the nearest one
const LOOKAHEAD: usize = 4;
/// Cruise speed on straights (world units/s)
const CRUISE_SPEED: f64 = 25.0;

/// Track-following driver used when no replay is given
#[derive(Debug, Clone, Copy)]
struct Autopilot {
    lookahead: usize,
    cruise_speed: f64,
}

impl Default for Autopilot {
    fn default() -> Self {
        Self {
            lookahead: LOOKAHEAD,
            cruise_speed: CRUISE_SPEED,
        }
    }
}

impl Autopilot {
    fn action(&self, car: &CarState, points: &[TrackPoint]) -> Action {
        let Some(nearest) = points
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.pos
                    .distance_squared(car.pos)
                    .total_cmp(&b.pos.distance_squared(car.pos))
            })
            .map(|(i, _)| i)
        else {
            return Action::default();
        };
        let target = points[(nearest + self.lookahead) % points.len()].pos;

        let forward = corner_racer::heading_forward(car.angle);
        let to_target = target - car.pos;
        // Counter-clockwise positive; steering right turns clockwise
        let error = forward.perp_dot(to_target).atan2(forward.dot(to_target));
        let steer = (-error * STEER_GAIN).clamp(-1.0, 1.0);

        let speed = car.vel.length();
        let target_speed = self.cruise_speed * error.cos().max(0.3);
        let (gas, brake) = if speed < target_speed {
            (0.6, 0.0)
        } else if speed > target_speed * 1.3 {
            (0.0, 0.3)
        } else {
            (0.0, 0.0)
        };
        Action::new(steer, gas, brake)
    }
}

/// Build settings from the optional file, then apply CLI overrides.
fn build_settings(cli: &Cli) -> Result<EnvSettings, ConfigError> {
    let mut settings = match &cli.settings {
        Some(path) => EnvSettings::load(path)?,
        None => EnvSettings::default(),
    };
    if let Some(id) = cli.scenario {
        settings.scenario = Some(ScenarioId(id));
    }
    if let Some(path) = &cli.checkpoints {
        settings.checkpoint_file = Some(path.clone());
    }
    if let Some(seed) = cli.seed {
        settings.seed = seed;
    }
    if let Some(policy) = cli.termination {
        settings.termination = policy;
    }
    log::info!("Termination policy: {}", settings.termination.as_str());
    Ok(settings)
}

/// `out` unchanged for a single episode, else `stem_N.ext`
fn episode_path(out: &Path, episode: u32, episodes: u32) -> PathBuf {
    if episodes <= 1 {
        return out.to_path_buf();
    }
    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match out.extension() {
        Some(ext) => format!("{stem}_{episode}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{episode}"),
    };
    out.with_file_name(name)
}

type Env = CarRacing<KinematicWorld, TopDownRasterizer>;

/// Drive one episode; each row pairs the state a step starts from with the
/// driver's action for it
fn run_episode<B: PhysicsBackend, R: FrameSource>(
    env: &mut CarRacing<B, R>,
    replay: Option<&Replay>,
    max_steps: u64,
) -> Result<TrajectoryLog, EnvError> {
    let autopilot = Autopilot::default();
    let mut log = TrajectoryLog::new();
    let mut total = 0.0;

    for step in 0..max_steps {
        let launched = step < INITIAL_SPEED_STEPS && env.apply_initial_velocity();
        let car = env.car_state().unwrap_or_default();
        let action = match replay {
            Some(replay) => replay.action(step as usize),
            None => autopilot.action(&car, env.exposed_points()),
        };
        log.push(StateRecord::capture(&car, env.episode()), action);

        // Full throttle during the launch; the log keeps the driver's action
        let applied = if launched {
            Action { gas: 1.0, ..action }
        } else {
            action
        };
        let result = env.step(applied)?;
        total += result.reward;
        if result.done {
            break;
        }
    }

    let episode = env.episode();
    log::info!(
        "Episode finished: {} steps, {}/{} tiles, reward {:.1}, {:?}",
        episode.steps,
        episode.tiles_visited,
        episode.tile_count,
        total,
        episode.termination
    );
    Ok(log)
}

fn run(cli: &Cli) -> Result<(), EnvError> {
    let settings = build_settings(cli)?;
    let registry = ScenarioRegistry::builtin(&cli.params_dir)?;
    log::debug!(
        "{} scenarios registered: {:?}",
        registry.len(),
        registry.ids().map(|id| id.0).collect::<Vec<_>>()
    );
    let replay = cli.replay.as_deref().map(Replay::from_file).transpose()?;
    if let Some(replay) = &replay {
        log::info!("Replaying {} recorded actions", replay.len());
    }

    let mut env = CarRacing::new(
        settings,
        &registry,
        KinematicWorld::new(),
        TopDownRasterizer::default(),
    )?;

    for episode in 0..cli.episodes {
        env.reset()?;
        if let (Some(path), Some(ring)) = (&cli.save_checkpoints, env.checkpoints()) {
            ring.save(&episode_path(path, episode, cli.episodes))?;
        }

        let log = run_episode(&mut env, replay.as_ref(), cli.max_steps)?;
        if let Some(out) = &cli.out {
            log.write(&episode_path(out, episode, cli.episodes))?;
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    log::info!("Corner Racer starting...");

    if let Err(err) = run(&cli) {
        log::error!("{err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corner_racer::ScenarioEntry;
    use corner_racer::consts::{BASE_SCALE, CHECKPOINTS, SIM_DT, TRACK_RAD};
    use corner_racer::track::CheckpointRing;
    use glam::DVec2;

    fn straight_north(n: usize) -> Vec<TrackPoint> {
        (0..n)
            .map(|i| TrackPoint {
                alpha: 0.0,
                beta: 0.0,
                pos: DVec2::new(0.0, i as f64 * 2.0),
            })
            .collect()
    }

    #[test]
    fn test_autopilot_holds_straight_line() {
        let car = CarState::default();
        let action = Autopilot::default().action(&car, &straight_north(20));
        assert!(action.steer.abs() < 1e-9);
        assert!(action.gas > 0.0);
    }

    #[test]
    fn test_autopilot_steers_toward_target() {
        // Road runs to the right of a north-facing car
        let points: Vec<TrackPoint> = (0..20)
            .map(|i| TrackPoint {
                alpha: 0.0,
                beta: 0.0,
                pos: DVec2::new(i as f64 * 2.0, 1.0),
            })
            .collect();
        let action = Autopilot::default().action(&CarState::default(), &points);
        assert!(action.steer > 0.0);
        assert!(Autopilot::default().action(&CarState::default(), &[]) == Action::default());
    }

    #[test]
    fn test_first_row_is_reset_pose() {
        let path = std::env::temp_dir().join(format!("corner-racer-runner-{}.txt", std::process::id()));
        CheckpointRing::from_parameters(&[0.0; CHECKPOINTS], &[TRACK_RAD; CHECKPOINTS])
            .save(&path)
            .unwrap();
        let registry = ScenarioRegistry::from_entries([(
            ScenarioId(85),
            ScenarioEntry::corner(58, 125, (-36.3, 37.5), 0.2, BASE_SCALE, path),
        )])
        .unwrap();
        let settings = EnvSettings {
            verbose: false,
            ..EnvSettings::for_scenario(ScenarioId(85))
        };
        let mut env: Env = CarRacing::new(
            settings,
            &registry,
            KinematicWorld::new(),
            TopDownRasterizer::default(),
        )
        .unwrap();
        env.reset().unwrap();
        let start = env.car_state().unwrap();
        let (elapsed, reward) = (env.episode().elapsed, env.episode().reward);

        let coast = Action::new(0.2, 0.0, 0.5);
        let log = run_episode(&mut env, Some(&Replay::new(vec![coast])), 3).unwrap();

        assert_eq!(log.len(), 3);
        let first = log.states[0];
        assert_eq!((first.x, first.y), (start.pos.x, start.pos.y));
        assert_eq!((first.vx, first.vy), (-36.3, 37.5));
        assert_eq!(first.time, elapsed);
        assert_eq!(first.reward, reward);
        assert!((log.states[1].time - elapsed - SIM_DT).abs() < 1e-12);
        // Launch throttle is applied but not logged
        assert!(log.actions.iter().all(|a| *a == coast));
        assert_eq!(env.episode().steps, 3);
    }

    #[test]
    fn test_episode_paths() {
        let out = Path::new("runs/traj.json");
        assert_eq!(episode_path(out, 0, 1), PathBuf::from("runs/traj.json"));
        assert_eq!(episode_path(out, 2, 3), PathBuf::from("runs/traj_2.json"));
    }

    #[test]
    fn test_cli_overrides_settings() {
        let cli = Cli::parse_from([
            "corner-racer",
            "--scenario",
            "85",
            "--seed",
            "9",
            "--termination",
            "last-tile",
        ]);
        let settings = build_settings(&cli).unwrap();
        assert_eq!(settings.scenario, Some(ScenarioId(85)));
        assert_eq!(settings.seed, 9);
        assert_eq!(settings.termination, TerminationPolicy::DeferredLastTile);
        assert_eq!(cli.max_steps, 1000);
        assert!(Cli::try_parse_from(["corner-racer", "--termination", "never"]).is_err());
    }
}
