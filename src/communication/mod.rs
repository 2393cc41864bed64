pub mod channels;
pub mod signal;

pub use channels::{StatusHub, StatusSnapshot, StatusStream};
pub use signal::StopSignal;
