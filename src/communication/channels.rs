use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::robot::state::TaskState;
use crate::world::{PerceivedGrid, Position};

/// What the robot looked like right after a state-changing action.
///
/// The perceived grid is a deep copy; later changes to the world never show up
/// in a snapshot that has already been emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub task: TaskState,
    pub position: Position,
    pub perceived: PerceivedGrid,
    pub cleaned: usize,
    pub battery: u32,
    pub moves_since_charge: u32,
    pub message: String,
}

/// Fan-out of status snapshots to every subscriber.
///
/// Each subscriber gets its own unbounded channel, so a slow reader only grows
/// its own backlog and never holds up the robot. Subscribers whose receiving
/// end is gone are dropped on the next publish.
#[derive(Debug, Default)]
pub struct StatusHub {
    subscribers: Mutex<Vec<Sender<StatusSnapshot>>>,
    latest: Mutex<Option<StatusSnapshot>>,
}

impl StatusHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> StatusStream {
        let (tx, rx) = channel();
        lock(&self.subscribers).push(tx);
        StatusStream { receiver: rx }
    }

    /// Delivers `snapshot` to all live subscribers, in emission order.
    /// Returns how many received it.
    pub fn publish(&self, snapshot: StatusSnapshot) -> usize {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
        let delivered = subscribers.len();
        drop(subscribers);

        *lock(&self.latest) = Some(snapshot);
        delivered
    }

    /// Last snapshot published, for poll-based readers.
    pub fn latest(&self) -> Option<StatusSnapshot> {
        lock(&self.latest).clone()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Ends every open stream once its backlog is drained.
    pub fn close(&self) {
        let mut subscribers = lock(&self.subscribers);
        debug!("Closing {} status subscriptions", subscribers.len());
        subscribers.clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Snapshots are plain data; a panic elsewhere cannot leave them half-written.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read side of a status subscription.
#[derive(Debug)]
pub struct StatusStream {
    receiver: Receiver<StatusSnapshot>,
}

impl StatusStream {
    /// Next snapshot if one is already waiting.
    pub fn try_next(&self) -> Option<StatusSnapshot> {
        match self.receiver.try_recv() {
            Ok(snapshot) => Some(snapshot),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<StatusSnapshot> {
        match self.receiver.recv_timeout(timeout) {
            Ok(snapshot) => Some(snapshot),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything currently buffered, without blocking.
    pub fn drain(&self) -> Vec<StatusSnapshot> {
        self.receiver.try_iter().collect()
    }
}

impl Iterator for StatusStream {
    type Item = StatusSnapshot;

    /// Blocks until a snapshot arrives; `None` once the stream is closed.
    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{GridWorld, Tile};

    fn snapshot(sequence: u64, perceived: PerceivedGrid) -> StatusSnapshot {
        StatusSnapshot {
            sequence,
            timestamp: Utc::now(),
            task: TaskState::Sweeping,
            position: Position::new(0, 0),
            perceived,
            cleaned: 1,
            battery: 100,
            moves_since_charge: 0,
            message: format!("snapshot {}", sequence),
        }
    }

    #[test]
    fn test_every_subscriber_sees_emission_order() {
        let hub = StatusHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();
        for seq in 0..5 {
            assert_eq!(hub.publish(snapshot(seq, PerceivedGrid::new(2))), 2);
        }
        let seen_a: Vec<u64> = a.drain().iter().map(|s| s.sequence).collect();
        let seen_b: Vec<u64> = b.drain().iter().map(|s| s.sequence).collect();
        assert_eq!(seen_a, vec![0, 1, 2, 3, 4]);
        assert_eq!(seen_a, seen_b);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let hub = StatusHub::new();
        let keep = hub.subscribe();
        drop(hub.subscribe());
        assert_eq!(hub.subscriber_count(), 2);
        assert_eq!(hub.publish(snapshot(0, PerceivedGrid::new(2))), 1);
        assert_eq!(hub.subscriber_count(), 1);
        assert!(keep.try_next().is_some());
    }

    #[test]
    fn test_close_ends_stream_after_backlog() {
        let hub = StatusHub::new();
        let stream = hub.subscribe();
        hub.publish(snapshot(0, PerceivedGrid::new(2)));
        hub.publish(snapshot(1, PerceivedGrid::new(2)));
        hub.close();
        let collected: Vec<u64> = stream.map(|s| s.sequence).collect();
        assert_eq!(collected, vec![0, 1]);
        assert_eq!(hub.latest().map(|s| s.sequence), Some(1));
    }

    #[test]
    fn test_snapshot_survives_world_mutation_and_serde() {
        let mut world = GridWorld::new(3);
        let emitted = snapshot(9, world.perceived().clone());
        world.move_robot(Position::new(1, 0));
        world.update_perceived([(Position::new(2, 2), Tile::Obstacle)]);
        assert_eq!(emitted.perceived.tile(Position::new(0, 0)), Some(Tile::Robot));
        assert_eq!(emitted.perceived.tile(Position::new(2, 2)), Some(Tile::Unknown));

        let json = serde_json::to_string(&emitted).unwrap();
        let restored: StatusSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.perceived, emitted.perceived);
        assert_eq!(restored, emitted);
    }
}
