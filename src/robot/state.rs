use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::world::Position;

/// Where a cleaning run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskState {
    #[default]
    Idle,
    Sweeping,
    Recharging,
    Returning,
    Stopped,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskState::Idle => "idle",
            TaskState::Sweeping => "sweeping",
            TaskState::Recharging => "recharging",
            TaskState::Returning => "returning",
            TaskState::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battery {
    charge: u32,
    capacity: u32,
}

impl Battery {
    pub fn new(capacity: u32) -> Self {
        Self {
            charge: capacity,
            capacity,
        }
    }

    pub fn charge(&self) -> u32 {
        self.charge
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.charge == 0
    }

    pub fn is_full(&self) -> bool {
        self.charge == self.capacity
    }

    /// Takes one unit for a completed step. False if there was nothing left.
    pub fn drain(&mut self) -> bool {
        if self.charge > 0 {
            self.charge -= 1;
            true
        } else {
            false
        }
    }

    pub fn refill(&mut self) {
        self.charge = self.capacity;
    }
}

/// Mutable robot bookkeeping for one run, owned by the motion executor.
#[derive(Debug, Clone)]
pub struct RobotState {
    pub battery: Battery,
    pub moves_since_charge: u32,
    pub task: TaskState,
    cleaned: HashSet<Position>,
}

impl RobotState {
    pub fn new(capacity: u32, start: Position) -> Self {
        let mut cleaned = HashSet::new();
        cleaned.insert(start);
        Self {
            battery: Battery::new(capacity),
            moves_since_charge: 0,
            task: TaskState::Idle,
            cleaned,
        }
    }

    /// Books a completed move onto `pos`.
    pub fn record_move(&mut self, pos: Position) {
        self.battery.drain();
        self.moves_since_charge += 1;
        self.cleaned.insert(pos);
    }

    pub fn record_charge(&mut self) {
        self.battery.refill();
        self.moves_since_charge = 0;
    }

    /// Distinct cells the robot has been on during this run.
    pub fn cleaned_count(&self) -> usize {
        self.cleaned.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_drain_stops_at_zero() {
        let mut battery = Battery::new(2);
        assert!(battery.drain());
        assert!(battery.drain());
        assert!(!battery.drain());
        assert!(battery.is_empty());
        battery.refill();
        assert!(battery.is_full());
        assert_eq!(battery.charge(), 2);
    }

    #[test]
    fn test_record_move_counts_distinct_cells() {
        let mut state = RobotState::new(10, Position::new(0, 0));
        state.record_move(Position::new(1, 0));
        state.record_move(Position::new(0, 0));
        state.record_move(Position::new(1, 0));
        assert_eq!(state.cleaned_count(), 2);
        assert_eq!(state.moves_since_charge, 3);
        assert_eq!(state.battery.charge(), 7);

        state.record_charge();
        assert_eq!(state.moves_since_charge, 0);
        assert!(state.battery.is_full());
    }
}
