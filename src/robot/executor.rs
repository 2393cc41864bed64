use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};

use super::config::RunConfig;
use super::pathfinding;
use super::sensor;
use super::state::{Battery, RobotState, TaskState};
use crate::communication::{StatusHub, StatusSnapshot, StopSignal};
use crate::world::{GridWorld, Position, Tile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Moved,
    /// The cell turned out to be solid; nothing was spent.
    Refused,
    /// The battery was flat, so the robot went to charge instead.
    Recharged,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOutcome {
    Charged,
    Interrupted,
}

/// Moves the robot, drains and refills its battery and reports every change.
///
/// Owns the world for the duration of a run. The planner reads through the
/// accessors here and never hands the executor a reference back to itself.
pub struct MotionExecutor {
    world: GridWorld,
    state: RobotState,
    step_delay: Duration,
    sense_delay: Duration,
    charge_duration: Duration,
    hub: Arc<StatusHub>,
    stop: StopSignal,
    sequence: u64,
}

impl MotionExecutor {
    pub fn new(world: GridWorld, config: &RunConfig, hub: Arc<StatusHub>, stop: StopSignal) -> Self {
        let state = RobotState::new(config.battery_capacity, world.robot_position());
        Self {
            world,
            state,
            step_delay: config.step_delay,
            sense_delay: config.sense_delay,
            charge_duration: config.charge_duration,
            hub,
            stop,
            sequence: 0,
        }
    }

    pub fn world(&self) -> &GridWorld {
        &self.world
    }

    pub fn battery(&self) -> Battery {
        self.state.battery
    }

    pub fn task(&self) -> TaskState {
        self.state.task
    }

    pub fn position(&self) -> Position {
        self.world.robot_position()
    }

    pub fn cleaned_count(&self) -> usize {
        self.state.cleaned_count()
    }

    pub fn moves_since_charge(&self) -> u32 {
        self.state.moves_since_charge
    }

    pub fn into_world(self) -> GridWorld {
        self.world
    }

    pub fn transition(&mut self, task: TaskState, message: &str) {
        if self.state.task != task {
            info!("Robot: {} -> {} ({})", self.state.task, task, message);
        }
        self.state.task = task;
        self.emit(message);
    }

    /// Publishes a snapshot without changing anything else.
    pub fn announce(&mut self, message: &str) {
        self.emit(message);
    }

    /// Looks around without moving.
    pub fn survey(&mut self) {
        sensor::survey(&mut self.world);
        self.emit("Sensing surroundings");
    }

    pub fn mark_unreachable(&mut self) -> usize {
        let marked = self.world.mark_unreachable();
        if marked > 0 {
            warn!("Robot: {} cells marked unreachable", marked);
        }
        marked
    }

    /// One hop onto `target`. A flat battery sends the robot to charge first.
    pub fn step(&mut self, target: Position) -> StepOutcome {
        if self.state.battery.is_empty() {
            warn!("Robot: Battery empty at {}, recharging before moving", self.position());
            return match self.recharge() {
                ChargeOutcome::Charged => StepOutcome::Recharged,
                ChargeOutcome::Interrupted => StepOutcome::Interrupted,
            };
        }
        if self.advance(target) {
            StepOutcome::Moved
        } else {
            StepOutcome::Refused
        }
    }

    /// Drives back to the dock and charges to full. Sweeping picks up again
    /// afterwards if that is what the robot was doing.
    pub fn recharge(&mut self) -> ChargeOutcome {
        let resume = self.state.task;
        self.transition(TaskState::Recharging, "Battery low, returning to charging station");
        if !self.walk_home() || !self.dock() {
            return ChargeOutcome::Interrupted;
        }
        if resume == TaskState::Sweeping {
            self.transition(TaskState::Sweeping, "Resuming sweep");
        }
        ChargeOutcome::Charged
    }

    /// End-of-run trip to the dock, with a final top-up.
    pub fn return_to_origin(&mut self) -> ChargeOutcome {
        if !self.walk_home() || !self.dock() {
            return ChargeOutcome::Interrupted;
        }
        self.announce("Cleaning task completed. Ready for the next run.");
        ChargeOutcome::Charged
    }

    fn walk_home(&mut self) -> bool {
        let origin = self.world.origin();
        while self.position() != origin {
            if self.stop.is_stopped() {
                return false;
            }
            let Some(path) = pathfinding::find_path(self.world.perceived(), self.position(), origin)
            else {
                error!("Robot: No known way from {} back to {}", self.position(), origin);
                return true;
            };
            if self.state.battery.is_empty() {
                warn!("Robot: Battery depleted at {} on the way home", self.position());
                self.announce("Battery depleted, charging in place");
                if !self.charge_for(self.charge_duration) {
                    return false;
                }
                continue;
            }
            self.advance(path[1]);
        }
        true
    }

    fn dock(&mut self) -> bool {
        self.announce("charging...");
        if !self.charge_for(self.charge_duration) {
            return false;
        }
        self.announce("charging complete.");
        true
    }

    fn charge_for(&mut self, duration: Duration) -> bool {
        if !self.stop.sleep(duration) {
            debug!("Robot: Charging interrupted at {}", self.position());
            return false;
        }
        self.state.record_charge();
        info!("Robot: Battery at {}", self.state.battery.charge());
        true
    }

    /// Sense-then-move. The actuation delay may be cut short by a stop, but a
    /// move that has started is always completed.
    fn advance(&mut self, target: Position) -> bool {
        let from = self.position();
        self.stop.sleep(self.step_delay);
        if !self.world.move_robot(target) {
            warn!("Robot: Move {} -> {} blocked", from, target);
            if self.world.in_bounds(target) {
                self.world.update_perceived([(target, Tile::Obstacle)]);
                self.emit(&format!("Obstacle detected at {}, move blocked", target));
            }
            return false;
        }
        self.stop.sleep(self.sense_delay);
        sensor::survey(&mut self.world);
        self.state.record_move(target);
        debug!(
            "Robot: {} -> {}, battery {}",
            from,
            target,
            self.state.battery.charge()
        );
        self.emit(&format!("Current position: {}, moved from {}", target, from));
        true
    }

    fn emit(&mut self, message: &str) {
        let snapshot = StatusSnapshot {
            sequence: self.sequence,
            timestamp: Utc::now(),
            task: self.state.task,
            position: self.world.robot_position(),
            perceived: self.world.perceived().clone(),
            cleaned: self.state.cleaned_count(),
            battery: self.state.battery.charge(),
            moves_since_charge: self.state.moves_since_charge,
            message: message.to_string(),
        };
        self.sequence += 1;
        self.hub.publish(snapshot);
    }
}
