//! Checkpoint ring generation
//!
//! The track is shaped by a ring of waypoints ordered by polar angle. Each
//! checkpoint sits at `2π·c/N + jitter` with its own radius; the first and
//! last are pinned so the centerline walk closes on itself.

use std::f64::consts::TAU;
use std::fs;
use std::io;
use std::path::Path;

use glam::DVec2;
use rand::Rng;

use crate::consts::TRACK_RAD;
use crate::error::ConfigError;
use crate::polar_to_cartesian;

/// A generation-time waypoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Checkpoint {
    /// Polar angle of the waypoint
    pub alpha: f64,
    pub pos: DVec2,
}

/// Checkpoints plus the raw parameters they were built from
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointRing {
    pub checkpoints: Vec<Checkpoint>,
    /// Angle whose crossing marks the start/finish line
    pub start_alpha: f64,
    jitter: Vec<f64>,
    radii: Vec<f64>,
}

impl CheckpointRing {
    /// Build the ring from per-checkpoint angular jitter and radius
    pub fn from_parameters(jitter: &[f64], radii: &[f64]) -> Self {
        let n = jitter.len().min(radii.len());
        let mut radii = radii[..n].to_vec();
        let mut checkpoints = Vec::with_capacity(n);

        for c in 0..n {
            let mut alpha = TAU * c as f64 / n as f64 + jitter[c];
            if c == 0 {
                alpha = 0.0;
                radii[c] = 1.5 * TRACK_RAD;
            }
            if c == n - 1 {
                alpha = TAU * c as f64 / n as f64;
                radii[c] = 1.5 * TRACK_RAD;
            }
            checkpoints.push(Checkpoint {
                alpha,
                pos: polar_to_cartesian(radii[c], alpha),
            });
        }

        Self {
            checkpoints,
            start_alpha: TAU * -0.5 / n as f64,
            jitter: jitter[..n].to_vec(),
            radii,
        }
    }

    /// Sample jitter in [0, 2π/N) and radius in [R/3, R]
    pub fn random<R: Rng>(rng: &mut R, n: usize) -> Self {
        let mut jitter = Vec::with_capacity(n);
        let mut radii = Vec::with_capacity(n);
        for _ in 0..n {
            jitter.push(rng.random_range(0.0..TAU / n as f64));
            radii.push(rng.random_range(TRACK_RAD / 3.0..=TRACK_RAD));
        }
        Self::from_parameters(&jitter, &radii)
    }

    /// Parse a parameter file: the first N lines are jitter, the last N radii
    pub fn parse(text: &str, n: usize, path: &Path) -> Result<Self, ConfigError> {
        let lines: Vec<&str> = text.lines().collect();
        if lines.len() < 2 * n {
            return Err(ConfigError::MalformedCheckpointFile {
                path: path.to_path_buf(),
                lines: lines.len(),
                expected: 2 * n,
            });
        }

        let parse_block = |offset: usize| -> Result<Vec<f64>, ConfigError> {
            lines[offset..offset + n]
                .iter()
                .enumerate()
                .map(|(i, raw)| {
                    raw.trim()
                        .parse::<f64>()
                        .map_err(|_| ConfigError::CheckpointValue {
                            path: path.to_path_buf(),
                            line: offset + i + 1,
                            value: raw.to_string(),
                        })
                })
                .collect()
        };

        let jitter = parse_block(0)?;
        let radii = parse_block(lines.len() - n)?;
        Ok(Self::from_parameters(&jitter, &radii))
    }

    /// Load a parameter file from disk
    pub fn load(path: &Path, n: usize) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::CheckpointIo {
            path: path.to_path_buf(),
            source,
        })?;
        let ring = Self::parse(&text, n, path)?;
        log::debug!("Loaded {} checkpoints from {}", n, path.display());
        Ok(ring)
    }

    /// Render the parameters as a file: jitter block, blank line, radius block
    pub fn to_parameter_text(&self) -> String {
        let mut out = String::new();
        for j in &self.jitter {
            out.push_str(&format!("{j}\n"));
        }
        out.push('\n');
        for r in &self.radii {
            out.push_str(&format!("{r}\n"));
        }
        out
    }

    /// Persist the parameters so the ring can be reproduced
    pub fn save(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_parameter_text())?;
        log::info!("Checkpoint parameters written to {}", path.display());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::CHECKPOINTS;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_first_and_last_are_pinned() {
        let mut rng = Pcg32::seed_from_u64(3);
        let ring = CheckpointRing::random(&mut rng, CHECKPOINTS);
        assert_eq!(ring.len(), CHECKPOINTS);

        let first = ring.checkpoints[0];
        assert_eq!(first.alpha, 0.0);
        assert!((first.pos - DVec2::new(1.5 * TRACK_RAD, 0.0)).length() < 1e-9);

        let last = ring.checkpoints[CHECKPOINTS - 1];
        assert!((last.alpha - TAU * 11.0 / 12.0).abs() < 1e-12);
        assert!((last.pos.length() - 1.5 * TRACK_RAD).abs() < 1e-9);
        assert!((ring.start_alpha + TAU / 24.0).abs() < 1e-12);
    }

    #[test]
    fn test_random_ring_is_angularly_ordered() {
        let mut rng = Pcg32::seed_from_u64(11);
        for _ in 0..20 {
            let ring = CheckpointRing::random(&mut rng, CHECKPOINTS);
            for pair in ring.checkpoints.windows(2) {
                assert!(pair[0].alpha <= pair[1].alpha);
            }
            for cp in &ring.checkpoints[1..CHECKPOINTS - 1] {
                let r = cp.pos.length();
                assert!(r >= TRACK_RAD / 3.0 - 1e-9 && r <= TRACK_RAD + 1e-9);
            }
        }
    }

    #[test]
    fn test_parse_uses_first_and_last_blocks() {
        let mut text = String::new();
        for _ in 0..4 {
            text.push_str("0.1\n");
        }
        text.push('\n');
        for r in [50.0, 60.0, 70.0, 80.0] {
            text.push_str(&format!("{r}\n"));
        }
        let ring = CheckpointRing::parse(&text, 4, Path::new("mem")).unwrap();
        assert!((ring.checkpoints[1].alpha - (TAU / 4.0 + 0.1)).abs() < 1e-12);
        assert!((ring.checkpoints[1].pos.length() - 60.0).abs() < 1e-9);
        assert!((ring.checkpoints[2].pos.length() - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_file_is_rejected() {
        let err = CheckpointRing::parse("0.1\n0.2\n30\n", 2, Path::new("short")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MalformedCheckpointFile { lines: 3, expected: 4, .. }
        ));
    }

    #[test]
    fn test_bad_number_reports_line() {
        let err = CheckpointRing::parse("0.1\nabc\n30\n40\n", 2, Path::new("bad")).unwrap_err();
        assert!(matches!(err, ConfigError::CheckpointValue { line: 2, .. }));
    }

    #[test]
    fn test_saved_text_parses_to_same_ring() {
        let mut rng = Pcg32::seed_from_u64(99);
        let ring = CheckpointRing::random(&mut rng, CHECKPOINTS);
        let text = ring.to_parameter_text();
        assert_eq!(text.lines().count(), 2 * CHECKPOINTS + 1);
        let parsed = CheckpointRing::parse(&text, CHECKPOINTS, Path::new("saved")).unwrap();
        assert_eq!(parsed.checkpoints, ring.checkpoints);
    }
}
