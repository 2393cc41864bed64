use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::robot::config::STOP_POLL_INTERVAL;

/// Cooperative stop flag shared between the controller and a running worker.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Sleeps for `duration` in short slices. Returns false if a stop was
    /// requested before the time was up.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_stopped() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(STOP_POLL_INTERVAL));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let signal = StopSignal::new();
        let worker_side = signal.clone();
        assert!(!worker_side.is_stopped());
        signal.request_stop();
        assert!(worker_side.is_stopped());
        signal.reset();
        assert!(!worker_side.is_stopped());
    }

    #[test]
    fn test_sleep_is_cut_short_by_stop() {
        let signal = StopSignal::new();
        let remote = signal.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.request_stop();
        });
        let started = Instant::now();
        assert!(!signal.sleep(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_zero_sleep_completes() {
        assert!(StopSignal::new().sleep(Duration::ZERO));
    }
}
