use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::communication::{StatusHub, StatusStream, StopSignal};
use crate::error::{Result, ServiceError};
use crate::robot::config::{RunConfig, ServiceConfig};
use crate::robot::{CoveragePlanner, TaskState};
use crate::world::{GridWorld, PerceivedGrid, Position};

/// Point-in-time view of the robot for poll-based readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentState {
    pub is_on: bool,
    pub task: TaskState,
    pub position: Position,
    pub cleaned: usize,
    pub battery: u32,
    pub perceived: PerceivedGrid,
    pub moves_since_charge: u32,
}

/// Starts and stops cleaning runs on a background worker thread.
///
/// At most one worker exists at a time. Every run gets a fresh world, planner
/// and executor; only the stop flag is reused (and reset) between runs.
pub struct CleaningService {
    config: ServiceConfig,
    stop: StopSignal,
    hub: Arc<StatusHub>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CleaningService {
    pub fn new(config: ServiceConfig) -> Self {
        info!(
            "Initializing cleaning service for a {}x{} grid",
            config.run.grid_size, config.run.grid_size
        );
        Self {
            config,
            stop: StopSignal::new(),
            hub: Arc::new(StatusHub::new()),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Begins a run unless one is already going. Returns whether a new
    /// worker was spawned.
    pub fn start(&self) -> Result<bool> {
        let mut worker = self.lock_worker()?;
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Service: Start ignored, a run is already active");
            return Ok(false);
        }
        if let Some(finished) = worker.take() {
            join_worker(finished)?;
        }

        self.stop.reset();
        let config = self.config.clone();
        let hub = Arc::clone(&self.hub);
        let stop = self.stop.clone();
        let handle = thread::Builder::new()
            .name("cleaning-run".to_string())
            .spawn(move || run_worker(config, hub, stop))?;
        *worker = Some(handle);
        info!("Service: Robot cleaning task started.");
        Ok(true)
    }

    /// Asks the active run to stop and waits for its worker to exit. Open
    /// status streams end once they have been drained.
    pub fn stop(&self) -> Result<()> {
        self.stop.request_stop();
        let handle = self.lock_worker()?.take();
        let joined = match handle {
            Some(handle) => join_worker(handle),
            None => Ok(()),
        };
        self.hub.close();
        info!("Service: Robot cleaning task stopped.");
        joined
    }

    pub fn is_running(&self) -> Result<bool> {
        Ok(self
            .lock_worker()?
            .as_ref()
            .is_some_and(|handle| !handle.is_finished()))
    }

    pub fn status_stream(&self) -> StatusStream {
        self.hub.subscribe()
    }

    pub fn current_state(&self) -> Result<CurrentState> {
        let is_on = self.is_running()?;
        let state = match self.hub.latest() {
            Some(snapshot) => CurrentState {
                is_on,
                task: snapshot.task,
                position: snapshot.position,
                cleaned: snapshot.cleaned,
                battery: snapshot.battery,
                perceived: snapshot.perceived,
                moves_since_charge: snapshot.moves_since_charge,
            },
            None => idle_state(&self.config.run, is_on),
        };
        Ok(state)
    }

    fn lock_worker(&self) -> Result<MutexGuard<'_, Option<JoinHandle<()>>>> {
        self.worker
            .lock()
            .map_err(|e| ServiceError::LockPoisoned(e.to_string()))
    }
}

impl Drop for CleaningService {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Service: Failed to stop cleanly: {}", e);
        }
    }
}

/// State before the first snapshot. Placement goes through the grid so an
/// off-grid start reports where the robot really ends up.
fn idle_state(config: &RunConfig, is_on: bool) -> CurrentState {
    let mut world = GridWorld::new(config.grid_size);
    world.place_robot(config.start);
    CurrentState {
        is_on,
        task: TaskState::Idle,
        position: world.robot_position(),
        cleaned: 0,
        battery: config.battery_capacity,
        perceived: world.perceived().clone(),
        moves_since_charge: 0,
    }
}

fn run_worker(config: ServiceConfig, hub: Arc<StatusHub>, stop: StopSignal) {
    let mut run = 0u32;
    while !stop.is_stopped() {
        run += 1;
        info!("Service: Starting run {}", run);
        let mut planner = CoveragePlanner::from_config(&config.run, Arc::clone(&hub), stop.clone());
        let report = planner.run();

        if report.final_state == TaskState::Stopped || !config.continuous {
            break;
        }
        info!("Service: Run {} complete, next one in {:?}", run, config.restart_delay);
        if !stop.sleep(config.restart_delay) {
            break;
        }
    }
    info!("Service: Worker shutting down after {} run(s).", run);
}

fn join_worker(handle: JoinHandle<()>) -> Result<()> {
    handle
        .join()
        .map_err(|payload| ServiceError::WorkerPanicked(panic_message(payload)))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
