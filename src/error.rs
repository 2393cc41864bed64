use thiserror::Error;

/// Faults in the control layer around a run. The simulation itself has none.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Failed to spawn cleaning worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Cleaning worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("Shared state lock poisoned: {0}")]
    LockPoisoned(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
