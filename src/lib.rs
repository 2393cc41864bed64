//! Battery-aware coverage cleaning on a partially observed grid.
//!
//! A [`station::CleaningService`] runs one [`robot::CoveragePlanner`] at a
//! time on a worker thread and fans its status snapshots out to subscribers.

pub mod app;
pub mod communication;
pub mod error;
pub mod logging;
pub mod robot;
pub mod station;
pub mod terminal;
pub mod ui;
pub mod world;

pub use error::{Result, ServiceError};
