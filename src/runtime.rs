//! Cooperative device loop
//!
//! One task drives everything, once per slice and in a fixed order:
//! poll the link, advance the connection, service the session, tick
//! the scheduler. State updates from the poll are fully applied before
//! the scheduler reads the state, so a publish can never ride a
//! session that was torn down earlier in the same iteration.

use crate::config::{DeviceConfig, TransportProfile};
use crate::error::{TelemetryError, TelemetryResult};
use crate::link::LinkClient;
use crate::status::StatusReporter;
use crate::supervisor::{CompositeState, ConnectionState, ConnectionSupervisor, RetryDecision, RetryPolicy};
use crate::telemetry::{PayloadSource, PublishTask, TelemetryScheduler};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Pacing of the cooperative loop itself; all real cadences (link
/// poll, publish interval, retry delay) are multiples measured against
/// wall time, not slice counts.
const LOOP_SLICE: Duration = Duration::from_millis(100);

/// Loop tunables lifted out of the device configuration.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
    pub publish_interval: Duration,
    pub topic: String,
    pub max_payload_bytes: usize,
}

impl RuntimeSettings {
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.supervisor.poll_interval_ms),
            connect_timeout: Duration::from_millis(config.supervisor.connect_timeout_ms),
            retry: config.supervisor.retry,
            publish_interval: Duration::from_millis(config.telemetry.interval_ms),
            topic: config.telemetry.topic.clone(),
            max_payload_bytes: config.telemetry.max_payload_bytes,
        }
    }
}

/// Publish/receive counters, logged at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub published: u64,
    pub publish_failures: u64,
    pub received: u64,
}

/// Owns the supervisor, the scheduler, and the retry bookkeeping the
/// supervisor deliberately does not carry.
pub struct DeviceRuntime<L: LinkClient> {
    supervisor: ConnectionSupervisor<L>,
    scheduler: TelemetryScheduler,
    payloads: Box<dyn PayloadSource>,
    profile: TransportProfile,
    settings: RuntimeSettings,
    last_poll: Option<Instant>,
    attempts: u32,
    last_attempt: Option<Instant>,
    stats: RuntimeStats,
}

impl<L: LinkClient> DeviceRuntime<L> {
    pub fn new(
        link: L,
        profile: TransportProfile,
        settings: RuntimeSettings,
        payloads: Box<dyn PayloadSource>,
        reporter: Box<dyn StatusReporter>,
    ) -> Self {
        let scheduler = TelemetryScheduler::new(settings.publish_interval);
        Self {
            supervisor: ConnectionSupervisor::new(link, reporter),
            scheduler,
            payloads,
            profile,
            settings,
            last_poll: None,
            attempts: 0,
            last_attempt: None,
            stats: RuntimeStats::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.supervisor.current_state()
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats
    }

    /// Drive the loop until shutdown is signalled or the retry budget
    /// is exhausted.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> TelemetryResult<()> {
        info!(
            mode = self.profile.mode_name(),
            host = %self.profile.host,
            port = self.profile.port,
            device_id = %self.profile.device_id(),
            "device runtime starting"
        );

        let mut pacing = tokio::time::interval(LOOP_SLICE);
        pacing.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let result = loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("shutdown requested");
                        break Ok(());
                    }
                }
                _ = pacing.tick() => {
                    if let Err(error) = self.iterate(Instant::now()).await {
                        break Err(error);
                    }
                }
            }
        };

        self.supervisor.shutdown().await;
        info!(
            published = self.stats.published,
            publish_failures = self.stats.publish_failures,
            received = self.stats.received,
            "device runtime stopped"
        );
        result
    }

    /// One loop iteration: poll, advance, service, tick.
    ///
    /// Public so embedding code and tests can drive the loop with
    /// their own clock.
    pub async fn iterate(&mut self, now: Instant) -> TelemetryResult<()> {
        let poll_due = self
            .last_poll
            .map_or(true, |last| now.duration_since(last) >= self.settings.poll_interval);
        if poll_due {
            self.last_poll = Some(now);
            self.supervisor.poll_link().await;
        }

        match self.supervisor.current_state().composite() {
            CompositeState::LinkOnly => self.advance_connection(now).await?,
            CompositeState::Connected => {
                for message in self.supervisor.service().await {
                    self.stats.received += 1;
                    info!(
                        topic = %message.topic,
                        len = message.payload.len(),
                        "message received"
                    );
                }
            }
            _ => {}
        }

        let state = self.supervisor.current_state();
        if let Some(task) = self.scheduler.tick(now, &state) {
            self.publish(task).await;
        }
        Ok(())
    }

    async fn advance_connection(&mut self, now: Instant) -> TelemetryResult<()> {
        let since_last = self.last_attempt.map(|last| now.duration_since(last));
        match self.settings.retry.decide(self.attempts, since_last) {
            RetryDecision::Attempt => {
                self.last_attempt = Some(now);
                self.attempts += 1;
                let outcome = self
                    .supervisor
                    .attempt_connect(&self.profile, self.settings.connect_timeout)
                    .await;
                match outcome {
                    Ok(()) => {
                        self.attempts = 0;
                    }
                    Err(code) => {
                        warn!(
                            code = code.code(),
                            attempt = self.attempts,
                            "broker connect failed"
                        );
                    }
                }
                Ok(())
            }
            RetryDecision::Wait { remaining } => {
                debug!(remaining_ms = remaining.as_millis() as u64, "retry delay pending");
                Ok(())
            }
            RetryDecision::GiveUp => {
                let attempts = self.attempts;
                error!(attempts, "connect retry budget exhausted");
                Err(TelemetryError::RetriesExhausted { attempts })
            }
        }
    }

    async fn publish(&mut self, task: PublishTask) {
        let payload = self.payloads.payload(&task);
        if payload.len() > self.settings.max_payload_bytes {
            self.stats.publish_failures += 1;
            let error = TelemetryError::PayloadTooLarge {
                len: payload.len(),
                max: self.settings.max_payload_bytes,
            };
            warn!(sequence = task.sequence_number, %error, "publish skipped");
            return;
        }
        match self.supervisor.publish(&self.settings.topic, payload).await {
            Ok(()) => {
                self.stats.published += 1;
                debug!(sequence = task.sequence_number, "telemetry published");
            }
            Err(code) => {
                self.stats.publish_failures += 1;
                let error = TelemetryError::PublishFailure(code);
                warn!(sequence = task.sequence_number, %error, "publish failed");
            }
        }
    }
}
