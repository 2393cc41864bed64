use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::world::{ObstacleLayout, Position};

/// Side length of the square grid
pub const DEFAULT_GRID_SIZE: usize = 10;
/// Battery units; one unit per step
pub const DEFAULT_BATTERY_CAPACITY: u32 = 100;
/// At or below this charge the planner heads home before doing anything else
pub const DEFAULT_LOW_BATTERY_THRESHOLD: u32 = 10;
/// Simulated drive time for a single cell (milliseconds)
pub const STEP_DELAY_MS: u64 = 500;
/// Simulated sensor sweep after each move (milliseconds)
pub const SENSE_DELAY_MS: u64 = 500;
/// Time spent on the dock for a full recharge
pub const CHARGE_DURATION: Duration = Duration::from_secs(3);
/// Pause between two runs in continuous mode
pub const RESTART_DELAY: Duration = Duration::from_secs(2);
/// Longest uninterrupted sleep; stop requests are checked in between
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Obstacles scattered on a fresh grid by default
pub const DEFAULT_RANDOM_OBSTACLES: usize = 13;

/// Hand-placed layout for the default 10x10 room.
pub const DEMO_OBSTACLES: [(i32, i32); 12] = [
    (7, 0),
    (7, 1),
    (8, 1),
    (1, 1),
    (9, 1),
    (0, 2),
    (0, 3),
    (4, 4),
    (8, 7),
    (9, 7),
    (4, 8),
    (4, 9),
];

pub fn demo_layout() -> ObstacleLayout {
    ObstacleLayout::Explicit(DEMO_OBSTACLES.iter().map(|&p| Position::from(p)).collect())
}

/// Everything one cleaning run needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub grid_size: usize,
    pub start: Position,
    pub battery_capacity: u32,
    pub low_battery_threshold: u32,
    pub step_delay: Duration,
    pub sense_delay: Duration,
    pub charge_duration: Duration,
    pub obstacles: ObstacleLayout,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            start: Position::new(0, 0),
            battery_capacity: DEFAULT_BATTERY_CAPACITY,
            low_battery_threshold: DEFAULT_LOW_BATTERY_THRESHOLD,
            step_delay: Duration::from_millis(STEP_DELAY_MS),
            sense_delay: Duration::from_millis(SENSE_DELAY_MS),
            charge_duration: CHARGE_DURATION,
            obstacles: ObstacleLayout::Random {
                count: DEFAULT_RANDOM_OBSTACLES,
                seed: None,
            },
        }
    }
}

impl RunConfig {
    /// Same run with every simulated delay removed.
    pub fn instant(mut self) -> Self {
        self.step_delay = Duration::ZERO;
        self.sense_delay = Duration::ZERO;
        self.charge_duration = Duration::ZERO;
        self
    }

    /// Scales every simulated delay; `0.0` behaves like [`RunConfig::instant`].
    pub fn with_speed(mut self, factor: f64) -> Self {
        if factor <= 0.0 {
            return self.instant();
        }
        self.step_delay = self.step_delay.div_f64(factor);
        self.sense_delay = self.sense_delay.div_f64(factor);
        self.charge_duration = self.charge_duration.div_f64(factor);
        self
    }
}

/// Controller settings wrapped around the per-run config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub run: RunConfig,
    /// Keep starting fresh runs until stopped.
    pub continuous: bool,
    pub restart_delay: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            continuous: true,
            restart_delay: RESTART_DELAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_clears_delays() {
        let config = RunConfig::default().instant();
        assert_eq!(config.step_delay, Duration::ZERO);
        assert_eq!(config.charge_duration, Duration::ZERO);
        assert_eq!(config.battery_capacity, DEFAULT_BATTERY_CAPACITY);
    }

    #[test]
    fn test_with_speed_scales_delays() {
        let config = RunConfig::default().with_speed(10.0);
        assert!(config.step_delay > Duration::from_millis(49));
        assert!(config.step_delay <= Duration::from_millis(50));
        assert!(config.charge_duration > Duration::from_millis(299));
        assert_eq!(RunConfig::default().with_speed(0.0), RunConfig::default().instant());
    }

    #[test]
    fn test_demo_layout_fits_default_grid() {
        let layout = demo_layout();
        let positions = layout.positions(DEFAULT_GRID_SIZE, Position::new(0, 0));
        assert_eq!(positions.len(), DEMO_OBSTACLES.len());
        assert!(positions
            .iter()
            .all(|p| p.x < DEFAULT_GRID_SIZE as i32 && p.y < DEFAULT_GRID_SIZE as i32));
    }
}
