pub mod config;
pub mod executor;
pub mod pathfinding;
pub mod planner;
pub mod sensor;
pub mod state;

pub use executor::MotionExecutor;
pub use planner::{CoveragePlanner, RunReport};
pub use state::{Battery, RobotState, TaskState};
