//! Fixed-cadence telemetry scheduling
//!
//! The scheduler decides *when* to publish; *what* to publish comes
//! from a [`PayloadSource`] owned by the sensor layer. A cycle blocked
//! by connectivity is not consumed: the due time only advances when a
//! task is actually handed out, so publishing resumes promptly after a
//! reconnect instead of waiting out a full interval.

pub mod sensor;

pub use sensor::SimulatedSensor;

use crate::supervisor::ConnectionState;
use std::time::{Duration, Instant};

/// One telemetry cycle handed to the loop for publishing.
///
/// `sequence_number` is a traceability identifier, not a delivery
/// guarantee: it advances on every attempted publish whether or not
/// the transport call succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishTask {
    pub sequence_number: u64,
    pub due_at: Instant,
}

/// Serializes one telemetry cycle. Implemented by the sensor layer;
/// the core transports the bytes unmodified apart from the length
/// ceiling check.
pub trait PayloadSource: Send {
    fn payload(&mut self, task: &PublishTask) -> Vec<u8>;
}

impl<F> PayloadSource for F
where
    F: FnMut(&PublishTask) -> Vec<u8> + Send,
{
    fn payload(&mut self, task: &PublishTask) -> Vec<u8> {
        self(task)
    }
}

/// Fires a publish task on a fixed cadence, gated by the connection
/// state.
#[derive(Debug)]
pub struct TelemetryScheduler {
    interval: Duration,
    last_publish: Option<Instant>,
    sequence: u64,
}

impl TelemetryScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_publish: None,
            sequence: 0,
        }
    }

    /// Return a due task, or `None`.
    ///
    /// A task is due on the very first call and whenever a full
    /// interval has elapsed since the last handed-out task, but only
    /// while `Connected`. "Not due yet" and "due but connection not
    /// ready" are distinct: the latter leaves the due time untouched so
    /// the cycle is re-attempted next iteration.
    pub fn tick(&mut self, now: Instant, state: &ConnectionState) -> Option<PublishTask> {
        if !state.is_connected() {
            return None;
        }
        let due = match self.last_publish {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };
        if !due {
            return None;
        }
        self.last_publish = Some(now);
        let task = PublishTask {
            sequence_number: self.sequence,
            due_at: now,
        };
        self.sequence += 1;
        Some(task)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Next sequence number to be assigned.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> ConnectionState {
        ConnectionState {
            link_up: true,
            broker_up: true,
            last_error: None,
        }
    }

    fn link_only() -> ConnectionState {
        ConnectionState {
            link_up: true,
            broker_up: false,
            last_error: None,
        }
    }

    #[test]
    fn test_first_tick_fires_immediately() {
        let mut scheduler = TelemetryScheduler::new(Duration::from_millis(5_000));
        let task = scheduler.tick(Instant::now(), &connected());
        assert_eq!(task.unwrap().sequence_number, 0);
    }

    #[test]
    fn test_single_task_per_interval() {
        let mut scheduler = TelemetryScheduler::new(Duration::from_millis(5_000));
        let base = Instant::now();

        let first = scheduler.tick(base, &connected());
        assert!(first.is_some());
        // Second call inside the same interval stays quiet
        let second = scheduler.tick(base + Duration::from_millis(4_999), &connected());
        assert!(second.is_none());
        let third = scheduler.tick(base + Duration::from_millis(5_000), &connected());
        assert_eq!(third.unwrap().sequence_number, 1);
    }

    #[test]
    fn test_blocked_cycle_is_not_consumed() {
        let mut scheduler = TelemetryScheduler::new(Duration::from_millis(5_000));
        let base = Instant::now();

        assert!(scheduler.tick(base, &link_only()).is_none());
        assert_eq!(scheduler.sequence(), 0);
        // Connection came up: the held-back cycle fires promptly
        let task = scheduler.tick(base + Duration::from_millis(1), &connected());
        assert_eq!(task.unwrap().sequence_number, 0);
    }

    #[test]
    fn test_sequence_advances_only_on_handed_out_tasks() {
        let mut scheduler = TelemetryScheduler::new(Duration::from_millis(5_000));
        let base = Instant::now();

        scheduler.tick(base, &connected()).unwrap();
        scheduler.tick(base + Duration::from_millis(100), &connected());
        scheduler.tick(base + Duration::from_millis(200), &link_only());
        assert_eq!(scheduler.sequence(), 1);

        let task = scheduler
            .tick(base + Duration::from_millis(5_000), &connected())
            .unwrap();
        assert_eq!(task.sequence_number, 1);
        assert_eq!(scheduler.sequence(), 2);
    }

    #[test]
    fn test_outage_does_not_reset_sequence() {
        let mut scheduler = TelemetryScheduler::new(Duration::from_millis(5_000));
        let base = Instant::now();

        scheduler.tick(base, &connected()).unwrap();
        // Outage spanning several intervals
        for i in 1..4 {
            let now = base + Duration::from_millis(5_000 * i);
            assert!(scheduler.tick(now, &link_only()).is_none());
        }
        let task = scheduler
            .tick(base + Duration::from_millis(20_000), &connected())
            .unwrap();
        assert_eq!(task.sequence_number, 1);
    }
}
