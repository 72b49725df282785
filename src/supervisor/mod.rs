//! Connection-lifecycle supervisor
//!
//! Layered state manager over a [`LinkClient`]: the network
//! association ("link") and the broker session are tracked separately,
//! and `broker_up` can never outlive `link_up`. The supervisor is a
//! state-transition function over (current state, poll result); it
//! never sleeps and never retries on its own; retry timing belongs to
//! the loop that drives it.

mod policy;

pub use policy::{RetryDecision, RetryPolicy};

use crate::config::TransportProfile;
use crate::error::{BrokerCode, LastError};
use crate::link::{Inbound, LinkClient, LinkStatus};
use crate::status::StatusReporter;
use std::time::Duration;
use tracing::debug;

/// Layered connection state, owned by the supervisor.
///
/// Invariant: `broker_up` implies `link_up`. Losing the link forces
/// `broker_up = false` within the same update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub link_up: bool,
    pub broker_up: bool,
    /// Most recent failure, retained until the next successful
    /// transition past the layer that produced it.
    pub last_error: Option<LastError>,
}

impl ConnectionState {
    /// Derive the composite state from the two layer flags.
    pub fn composite(&self) -> CompositeState {
        match (self.link_up, self.broker_up) {
            (true, true) => CompositeState::Connected,
            (true, false) => CompositeState::LinkOnly,
            // (false, true) is unrepresentable by the update rules
            (false, _) => CompositeState::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.composite() == CompositeState::Connected
    }
}

/// Composite state the supervisor reports to observers.
///
/// `Connecting` brackets one in-flight connect attempt and is never
/// persisted between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeState {
    Disconnected,
    LinkOnly,
    Connecting,
    Connected,
}

/// Drives connect/reconnect attempts against a [`LinkClient`] and owns
/// the layered [`ConnectionState`].
pub struct ConnectionSupervisor<L: LinkClient> {
    link: L,
    state: ConnectionState,
    reporter: Box<dyn StatusReporter>,
}

impl<L: LinkClient> ConnectionSupervisor<L> {
    pub fn new(link: L, reporter: Box<dyn StatusReporter>) -> Self {
        Self {
            link,
            state: ConnectionState::default(),
            reporter,
        }
    }

    /// Read-only snapshot of the layered state.
    pub fn current_state(&self) -> ConnectionState {
        self.state
    }

    /// Query the link and fold the result into the state.
    ///
    /// An up-to-down transition forces `broker_up = false` in the same
    /// update and records `LinkLost`; a down-to-up transition clears a
    /// retained `LinkLost`.
    pub async fn poll_link(&mut self) -> LinkStatus {
        let status = self.link.link_status().await;
        let from = self.state.composite();
        let was_up = self.state.link_up;
        self.state.link_up = status == LinkStatus::Up;

        if was_up && !self.state.link_up {
            // Broker state is meaningless without a link
            self.state.broker_up = false;
            self.state.last_error = Some(LastError::LinkLost);
            self.link.disconnect().await;
        } else if !was_up && self.state.link_up && self.state.last_error == Some(LastError::LinkLost)
        {
            self.state.last_error = None;
        }

        self.emit(from);
        status
    }

    /// Run one CONNACK-gated connect attempt with the given profile.
    ///
    /// Only meaningful from `LinkOnly`; any other state is a no-op.
    /// Failure records the broker's status code and returns without
    /// retrying; the caller schedules the next attempt.
    pub async fn attempt_connect(
        &mut self,
        profile: &TransportProfile,
        timeout: Duration,
    ) -> Result<(), BrokerCode> {
        let from = self.state.composite();
        if from != CompositeState::LinkOnly {
            debug!(state = ?from, "connect attempt skipped");
            return Ok(());
        }

        self.reporter
            .transition(from, CompositeState::Connecting, &self.state);

        match self.link.connect(profile, timeout).await {
            Ok(()) => {
                self.state.broker_up = true;
                self.state.last_error = None;
                self.reporter.transition(
                    CompositeState::Connecting,
                    self.state.composite(),
                    &self.state,
                );
                Ok(())
            }
            Err(code) => {
                self.state.broker_up = false;
                self.state.last_error = Some(LastError::Broker(code));
                self.reporter.transition(
                    CompositeState::Connecting,
                    self.state.composite(),
                    &self.state,
                );
                Err(code)
            }
        }
    }

    /// Let the client deliver inbound messages and keepalive for the
    /// current loop slice. A no-op unless `Connected`; a session the
    /// supervisor does not believe exists is never serviced.
    pub async fn service(&mut self) -> Vec<Inbound> {
        if self.state.composite() != CompositeState::Connected {
            return Vec::new();
        }
        match self.link.service().await {
            Ok(messages) => messages,
            Err(code) => {
                let from = self.state.composite();
                self.state.broker_up = false;
                self.state.last_error = Some(LastError::Broker(code));
                self.emit(from);
                Vec::new()
            }
        }
    }

    /// Publish one message on the session. Valid only when `Connected`.
    pub async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerCode> {
        if self.state.composite() != CompositeState::Connected {
            return Err(BrokerCode::Disconnected);
        }
        self.link.publish(topic, payload).await
    }

    /// Tear down the session and report the final state.
    pub async fn shutdown(&mut self) {
        let from = self.state.composite();
        self.link.disconnect().await;
        self.state.broker_up = false;
        self.emit(from);
    }

    fn emit(&mut self, from: CompositeState) {
        let to = self.state.composite();
        if from != to {
            self.reporter.transition(from, to, &self.state);
        }
    }
}
