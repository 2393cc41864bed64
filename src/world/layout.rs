use log::{debug, info, warn};
use noise::{NoiseFn, Perlin};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::grid::{GridWorld, Position};

/// Sampling scale for the Perlin layout. Integer lattice points are always
/// zero in Perlin noise, so coordinates are divided down first.
const PERLIN_SCALE: f64 = 4.0;
/// Give up on random placement after this many draws per requested obstacle.
const RANDOM_ATTEMPTS_PER_OBSTACLE: usize = 64;

/// How a fresh world gets its obstacles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObstacleLayout {
    Empty,
    Explicit(Vec<Position>),
    /// Uniformly scattered obstacles; no row or column gets more than `size - 2`.
    Random { count: usize, seed: Option<u64> },
    /// Clustered obstacles where the noise field exceeds `threshold`.
    Perlin { seed: u32, threshold: f64 },
}

impl ObstacleLayout {
    /// Builds the world for one run: robot placed at `start`, then obstacles
    /// around it.
    pub fn build_world(&self, size: usize, start: Position) -> GridWorld {
        let mut world = GridWorld::new(size);
        world.place_robot(start);
        let positions = self.positions(world.size(), world.robot_position());
        let placed = world.place_obstacles(positions);
        info!(
            "World {}x{} ready, robot at {}, {} obstacles ({})",
            world.size(),
            world.size(),
            world.robot_position(),
            placed,
            self.name()
        );
        world
    }

    pub fn name(&self) -> &'static str {
        match self {
            ObstacleLayout::Empty => "empty",
            ObstacleLayout::Explicit(_) => "explicit",
            ObstacleLayout::Random { .. } => "random",
            ObstacleLayout::Perlin { .. } => "perlin",
        }
    }

    /// Obstacle positions for a `size` grid, never including `keep_clear`.
    pub fn positions(&self, size: usize, keep_clear: Position) -> Vec<Position> {
        match self {
            ObstacleLayout::Empty => Vec::new(),
            ObstacleLayout::Explicit(list) => {
                list.iter().copied().filter(|&p| p != keep_clear).collect()
            }
            ObstacleLayout::Random { count, seed } => {
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(*seed),
                    None => StdRng::from_os_rng(),
                };
                random_positions(size, *count, keep_clear, &mut rng)
            }
            ObstacleLayout::Perlin { seed, threshold } => {
                perlin_positions(size, *seed, *threshold, keep_clear)
            }
        }
    }
}

fn random_positions<R: Rng>(
    size: usize,
    count: usize,
    keep_clear: Position,
    rng: &mut R,
) -> Vec<Position> {
    let count = count.min(size.saturating_mul(size));
    let cap = size.saturating_sub(2);
    let mut row_counts = vec![0usize; size];
    let mut col_counts = vec![0usize; size];
    let mut chosen: Vec<Position> = Vec::with_capacity(count);

    let mut attempts = 0;
    while chosen.len() < count && attempts < count * RANDOM_ATTEMPTS_PER_OBSTACLE {
        attempts += 1;
        let (x, y) = (rng.random_range(0..size), rng.random_range(0..size));
        let pos = Position::new(x as i32, y as i32);
        if pos == keep_clear || chosen.contains(&pos) {
            continue;
        }
        if row_counts[y] >= cap || col_counts[x] >= cap {
            continue;
        }
        row_counts[y] += 1;
        col_counts[x] += 1;
        chosen.push(pos);
    }

    if chosen.len() < count {
        warn!(
            "Only placed {} of {} random obstacles after {} draws",
            chosen.len(),
            count,
            attempts
        );
    }
    chosen
}

fn perlin_positions(size: usize, seed: u32, threshold: f64, keep_clear: Position) -> Vec<Position> {
    let perlin = Perlin::new(seed);
    let mut chosen = Vec::new();
    for y in 0..size {
        for x in 0..size {
            let value = perlin.get([x as f64 / PERLIN_SCALE, y as f64 / PERLIN_SCALE]);
            let pos = Position::new(x as i32, y as i32);
            if value > threshold && pos != keep_clear {
                chosen.push(pos);
            }
        }
    }
    debug!("Perlin layout (seed {}) produced {} obstacles", seed, chosen.len());
    chosen
}
