use std::sync::Arc;

use log::{debug, info, warn};

use super::config::RunConfig;
use super::executor::{ChargeOutcome, MotionExecutor, StepOutcome};
use super::pathfinding::{self, Direction};
use super::state::TaskState;
use crate::communication::{StatusHub, StopSignal};
use crate::world::{GridWorld, Position, Tile};

const DEAD_END_MESSAGE: &str = "Remaining area cannot be cleaned, returning to charging station.";

/// How a call to [`CoveragePlanner::run`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub final_state: TaskState,
    pub steps: u32,
    pub recharges: u32,
    pub unreachable: usize,
    pub cleaned: usize,
}

/// Result of walking a planned path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    Arrived,
    /// A cell on the path turned out to be blocked; plan again.
    Blocked,
    NeedsCharge,
    Interrupted,
}

/// Why the sweep loop handed control back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Finished,
    DeadEnd,
    Stopped,
}

/// Boustrophedon bookkeeping: which way the current row is being swept.
#[derive(Debug, Clone, Copy)]
struct Sweep {
    heading: Direction,
}

impl Sweep {
    fn new() -> Self {
        Self {
            heading: Direction::Right,
        }
    }

    /// Next cell along the row, or one row down (reversing) at either edge.
    fn advance(&mut self, pos: Position, size: usize) -> Position {
        let last = size as i32 - 1;
        match self.heading {
            Direction::Right if pos.x >= last => {
                self.heading = Direction::Left;
                pathfinding::next_position(pos, Direction::Down)
            }
            Direction::Left if pos.x <= 0 => {
                self.heading = Direction::Right;
                pathfinding::next_position(pos, Direction::Down)
            }
            heading => pathfinding::next_position(pos, heading),
        }
    }
}

/// Decides where the robot goes next and owns the task state machine.
///
/// `Idle -> Sweeping <-> Recharging -> Returning -> Idle`, with `Stopped`
/// reachable from anywhere when the stop signal is raised.
pub struct CoveragePlanner {
    executor: MotionExecutor,
    stop: StopSignal,
    low_battery_threshold: u32,
    sweep: Sweep,
    steps: u32,
    recharges: u32,
    unreachable: usize,
    /// (cleaned, unknown) when the last recharge finished.
    last_charge_progress: (usize, usize),
}

impl CoveragePlanner {
    pub fn new(world: GridWorld, config: &RunConfig, hub: Arc<StatusHub>, stop: StopSignal) -> Self {
        let executor = MotionExecutor::new(world, config, hub, stop.clone());
        Self {
            executor,
            stop,
            low_battery_threshold: config.low_battery_threshold,
            sweep: Sweep::new(),
            steps: 0,
            recharges: 0,
            unreachable: 0,
            last_charge_progress: (0, 0),
        }
    }

    /// Builds the world described by `config` and plans over it.
    pub fn from_config(config: &RunConfig, hub: Arc<StatusHub>, stop: StopSignal) -> Self {
        let world = config.obstacles.build_world(config.grid_size, config.start);
        Self::new(world, config, hub, stop)
    }

    pub fn world(&self) -> &GridWorld {
        self.executor.world()
    }

    pub fn executor(&self) -> &MotionExecutor {
        &self.executor
    }

    /// Cleans until nothing reachable is left, then docks.
    pub fn run(&mut self) -> RunReport {
        info!(
            "Planner: Starting run at {} with battery {}",
            self.executor.position(),
            self.executor.battery().charge()
        );
        self.executor.transition(TaskState::Sweeping, "Cleaning started");
        self.executor.survey();
        self.last_charge_progress = self.progress();

        let exit = self.sweep_loop();
        match exit {
            Exit::Stopped => self.halt(),
            Exit::DeadEnd | Exit::Finished => {
                if exit == Exit::Finished {
                    self.executor
                        .transition(TaskState::Returning, "Cleaning finished, returning to charging station.");
                }
                match self.executor.return_to_origin() {
                    ChargeOutcome::Charged => {
                        self.executor.transition(TaskState::Idle, "Ready for the next run.");
                    }
                    ChargeOutcome::Interrupted => self.halt(),
                }
            }
        }

        let report = RunReport {
            final_state: self.executor.task(),
            steps: self.steps,
            recharges: self.recharges,
            unreachable: self.unreachable,
            cleaned: self.executor.cleaned_count(),
        };
        info!("Planner: Run finished {:?}", report);
        report
    }

    pub fn into_world(self) -> GridWorld {
        self.executor.into_world()
    }

    fn sweep_loop(&mut self) -> Exit {
        loop {
            if self.stop.is_stopped() {
                return Exit::Stopped;
            }
            let world = self.executor.world();
            if !world.has_unknown() && world.is_fully_clean() {
                return Exit::Finished;
            }

            let battery = self.executor.battery().charge();
            if battery <= self.low_battery_threshold || !self.can_return_from(self.executor.position()) {
                debug!("Planner: Battery guard tripped with {} left", battery);
                match self.recharge() {
                    Some(exit) => return exit,
                    None => continue,
                }
            }

            if let Some(target) = self.select_target() {
                if let Some(path) = self.path_to(target) {
                    debug!("Planner: Heading for {} over {} cells", target, path.len());
                    match self.walk(&path) {
                        Walk::Interrupted => return Exit::Stopped,
                        Walk::NeedsCharge => {
                            match self.recharge() {
                                Some(exit) => return exit,
                                None => continue,
                            }
                        }
                        Walk::Arrived | Walk::Blocked => {}
                    }
                }
            }

            if let Some(exit) = self.advance_sweep() {
                return exit;
            }
        }
    }

    /// First perceived dirty cell in row-major order, else the first unknown one.
    fn select_target(&self) -> Option<Position> {
        let perceived = self.executor.world().perceived();
        perceived
            .first(Tile::Dirty)
            .or_else(|| perceived.first(Tile::Unknown))
    }

    /// One boustrophedon cell, or a detour to the nearest outstanding cell
    /// when the way ahead is blocked or past the last row.
    fn advance_sweep(&mut self) -> Option<Exit> {
        if self.stop.is_stopped() {
            return Some(Exit::Stopped);
        }
        let world = self.executor.world();
        if !world.has_pending() {
            return None;
        }
        let here = self.executor.position();
        let next = self.sweep.advance(here, world.size());
        let open = world.tile(next).is_some_and(Tile::is_passable);

        if open {
            return match self.walk(&[here, next]) {
                Walk::Interrupted => Some(Exit::Stopped),
                Walk::NeedsCharge => self.recharge(),
                Walk::Arrived | Walk::Blocked => None,
            };
        }

        let nearest = pathfinding::find_nearest(world.perceived(), here, Tile::is_pending);
        let Some(path) = nearest.and_then(|target| self.path_to(target)) else {
            warn!("Planner: Nothing reachable left from {}", here);
            return Some(self.dead_end());
        };
        debug!("Planner: Sweep blocked at {}, detouring to {:?}", next, path.last());
        match self.walk(&path) {
            Walk::Interrupted => Some(Exit::Stopped),
            Walk::NeedsCharge => self.recharge(),
            Walk::Arrived | Walk::Blocked => None,
        }
    }

    /// Follows `path` (which starts at the robot) hop by hop, checking before
    /// every hop that the dock stays within reach.
    fn walk(&mut self, path: &[Position]) -> Walk {
        for &hop in path.iter().skip(1) {
            if self.stop.is_stopped() {
                return Walk::Interrupted;
            }
            if !self.executor.world().tile(hop).is_some_and(Tile::is_passable) {
                debug!("Planner: {} is blocked, replanning", hop);
                return Walk::Blocked;
            }
            if !self.can_return_from(hop) {
                return Walk::NeedsCharge;
            }
            match self.executor.step(hop) {
                StepOutcome::Moved => self.steps += 1,
                StepOutcome::Refused => return Walk::Blocked,
                StepOutcome::Recharged => {
                    self.recharges += 1;
                    return Walk::Blocked;
                }
                StepOutcome::Interrupted => return Walk::Interrupted,
            }
        }
        Walk::Arrived
    }

    /// Whether the dock is still reachable from `pos` on the current charge.
    fn can_return_from(&self, pos: Position) -> bool {
        let world = self.executor.world();
        let battery = self.executor.battery().charge() as usize;
        pathfinding::required_steps(world.perceived(), pos, world.origin())
            .is_some_and(|steps| steps < battery)
    }

    fn path_to(&self, target: Position) -> Option<Vec<Position>> {
        pathfinding::find_path(self.executor.world().perceived(), self.executor.position(), target)
    }

    /// `None` means carry on sweeping.
    fn recharge(&mut self) -> Option<Exit> {
        match self.executor.recharge() {
            ChargeOutcome::Interrupted => return Some(Exit::Stopped),
            ChargeOutcome::Charged => self.recharges += 1,
        }

        let progress = self.progress();
        if progress == self.last_charge_progress {
            warn!(
                "Planner: No progress since the last charge ({} cleaned, {} unknown)",
                progress.0, progress.1
            );
            return Some(self.dead_end());
        }
        self.last_charge_progress = progress;
        None
    }

    fn dead_end(&mut self) -> Exit {
        self.unreachable = self.executor.mark_unreachable();
        self.executor.transition(TaskState::Returning, DEAD_END_MESSAGE);
        Exit::DeadEnd
    }

    fn halt(&mut self) {
        self.executor
            .transition(TaskState::Stopped, "Cleaning stopped by operator.");
    }

    fn progress(&self) -> (usize, usize) {
        let unknown = self.executor.world().perceived().count(Tile::Unknown);
        (self.executor.cleaned_count(), unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::StatusStream;
    use crate::world::{Cell, ObstacleLayout};

    fn planner(config: RunConfig) -> (CoveragePlanner, StatusStream) {
        let hub = Arc::new(StatusHub::new());
        let stream = hub.subscribe();
        let planner = CoveragePlanner::from_config(&config.instant(), hub, StopSignal::new());
        (planner, stream)
    }

    fn config(size: usize, capacity: u32, obstacles: Vec<(i32, i32)>) -> RunConfig {
        RunConfig {
            grid_size: size,
            battery_capacity: capacity,
            low_battery_threshold: 0,
            obstacles: ObstacleLayout::Explicit(obstacles.into_iter().map(Position::from).collect()),
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_sweep_turns_at_row_edges() {
        let mut sweep = Sweep::new();
        assert_eq!(sweep.advance(Position::new(1, 0), 3), Position::new(2, 0));
        assert_eq!(sweep.advance(Position::new(2, 0), 3), Position::new(2, 1));
        assert_eq!(sweep.heading, Direction::Left);
        assert_eq!(sweep.advance(Position::new(2, 1), 3), Position::new(1, 1));
        assert_eq!(sweep.advance(Position::new(0, 1), 3), Position::new(0, 2));
        assert_eq!(sweep.heading, Direction::Right);
        assert_eq!(sweep.advance(Position::new(2, 2), 3), Position::new(2, 3));
    }

    #[test]
    fn test_small_open_room_is_cleaned() {
        let (mut planner, _stream) = planner(config(4, 50, vec![]));
        let report = planner.run();
        assert_eq!(report.final_state, TaskState::Idle);
        assert_eq!(report.unreachable, 0);
        assert_eq!(report.cleaned, 16);
        let world = planner.into_world();
        assert!(world.is_fully_clean());
        assert!(!world.has_unknown());
        assert_eq!(world.robot_position(), world.origin());
    }

    #[test]
    fn test_target_selection_prefers_dirty_over_unknown() {
        let (mut planner, _stream) = planner(config(4, 50, vec![]));
        assert_eq!(planner.select_target(), Some(Position::new(1, 0)));
        planner.executor.survey();
        assert_eq!(planner.select_target(), Some(Position::new(1, 0)));
        planner.executor.step(Position::new(1, 0));
        assert_eq!(planner.select_target(), Some(Position::new(2, 0)));
    }

    #[test]
    fn test_walled_off_cell_is_given_up() {
        let (mut planner, stream) = planner(config(4, 60, vec![(3, 2), (2, 3)]));
        let report = planner.run();
        assert_eq!(report.final_state, TaskState::Idle);
        assert_eq!(report.unreachable, 1);
        assert_eq!(planner.world().tile(Position::new(3, 3)), Some(Tile::Unreachable));
        assert!(stream.drain().iter().all(|s| s.position != Position::new(3, 3)));
    }

    #[test]
    fn test_walk_stops_before_dock_goes_out_of_reach() {
        let (mut planner, _stream) = planner(config(6, 4, vec![]));
        let path: Vec<Position> = (0..6).map(|x| Position::new(x, 0)).collect();
        assert_eq!(planner.walk(&path), Walk::NeedsCharge);
        assert_eq!(planner.executor.position(), Position::new(1, 0));
        assert_eq!(planner.executor.battery().charge(), 3);
    }

    #[test]
    fn test_guard_recharges_when_dock_out_of_reach() {
        // Watermark is zero, so only the distance home can trip the guard.
        let (mut planner, stream) = planner(config(10, 10, vec![]));
        for x in 1..=5 {
            planner.executor.step(Position::new(x, 0));
        }
        assert_eq!(planner.executor.battery().charge(), 5);
        assert!(!planner.can_return_from(Position::new(5, 0)));
        stream.drain();

        let report = planner.run();
        let snapshots = stream.drain();
        let first_recharge = snapshots
            .iter()
            .position(|s| s.task == TaskState::Recharging)
            .unwrap();
        assert!(snapshots[..=first_recharge]
            .iter()
            .all(|s| s.position == Position::new(5, 0) && s.battery == 5));
        assert_eq!(snapshots[first_recharge - 1].task, TaskState::Sweeping);
        assert!(report.recharges > 0);
        assert_eq!(report.final_state, TaskState::Idle);
    }

    #[test]
    fn test_walk_reports_blocked_hop() {
        let (mut planner, _stream) = planner(config(4, 20, vec![(2, 0)]));
        let path: Vec<Position> = (0..4).map(|x| Position::new(x, 0)).collect();
        assert_eq!(planner.walk(&path), Walk::Blocked);
        assert_eq!(planner.executor.position(), Position::new(1, 0));
        assert_eq!(planner.world().tile(Position::new(2, 0)), Some(Tile::Obstacle));
        assert_eq!(planner.world().cell(Position::new(2, 0)), Some(Cell::Obstacle));
    }

    #[test]
    fn test_stop_before_run_ends_stopped_without_moving() {
        let (mut planner, stream) = planner(config(4, 20, vec![]));
        planner.stop.request_stop();
        let report = planner.run();
        assert_eq!(report.final_state, TaskState::Stopped);
        assert_eq!(report.steps, 0);
        let last = stream.drain().pop().unwrap();
        assert_eq!(last.task, TaskState::Stopped);
    }

    #[test]
    fn test_tiny_battery_ends_in_dead_end() {
        let (mut planner, _stream) = planner(config(6, 2, vec![]));
        let report = planner.run();
        assert_eq!(report.final_state, TaskState::Idle);
        assert_eq!(report.steps, 0);
        assert!(report.unreachable > 0);
        assert_eq!(planner.executor.position(), Position::new(0, 0));
    }
}
