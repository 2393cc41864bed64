pub mod service;

pub use service::{CleaningService, CurrentState};
