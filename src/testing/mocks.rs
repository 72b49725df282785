//! Mock implementations for testing
//!
//! `ScriptedLink` plays back a scripted sequence of link statuses and
//! connect/service outcomes; `RecordingReporter` captures the
//! composite-state transitions the supervisor emits.

use crate::config::{AuthMode, TransportProfile};
use crate::error::BrokerCode;
use crate::link::{Inbound, LinkClient, LinkStatus};
use crate::status::StatusReporter;
use crate::supervisor::{CompositeState, ConnectionState};
use crate::telemetry::{PayloadSource, PublishTask};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Plain-credentials profile for tests.
pub fn credentials_profile(device_id: &str) -> TransportProfile {
    TransportProfile {
        host: "broker.test".to_string(),
        port: 1883,
        auth: AuthMode::Credentials {
            device_id: device_id.to_string(),
            password: "secret".to_string(),
        },
    }
}

/// TLS-with-password profile for tests.
pub fn tls_profile(device_id: &str) -> TransportProfile {
    TransportProfile {
        host: "broker.test".to_string(),
        port: 8883,
        auth: AuthMode::CredentialsOverTls {
            device_id: device_id.to_string(),
            password: "secret".to_string(),
            ca: b"-----BEGIN CERTIFICATE-----\ntest\n-----END CERTIFICATE-----\n".to_vec(),
        },
    }
}

/// Scripted [`LinkClient`]
///
/// Each queue is consumed one entry per call; an exhausted status
/// queue repeats the last status, an exhausted connect queue keeps
/// succeeding, an exhausted service queue stays quiet.
pub struct ScriptedLink {
    statuses: VecDeque<LinkStatus>,
    last_status: LinkStatus,
    connect_results: VecDeque<Result<(), BrokerCode>>,
    service_results: VecDeque<Result<Vec<Inbound>, BrokerCode>>,
    publish_error: Option<BrokerCode>,
    published: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    pub connect_calls: u32,
    pub service_calls: u32,
    pub disconnects: u32,
}

impl Default for ScriptedLink {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self {
            statuses: VecDeque::new(),
            last_status: LinkStatus::Down,
            connect_results: VecDeque::new(),
            service_results: VecDeque::new(),
            publish_error: None,
            published: Arc::new(Mutex::new(Vec::new())),
            connect_calls: 0,
            service_calls: 0,
            disconnects: 0,
        }
    }

    /// Keep the link up for the whole test.
    pub fn link_up(mut self) -> Self {
        self.last_status = LinkStatus::Up;
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = LinkStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_connect_results(
        mut self,
        results: impl IntoIterator<Item = Result<(), BrokerCode>>,
    ) -> Self {
        self.connect_results = results.into_iter().collect();
        self
    }

    pub fn with_service_results(
        mut self,
        results: impl IntoIterator<Item = Result<Vec<Inbound>, BrokerCode>>,
    ) -> Self {
        self.service_results = results.into_iter().collect();
        self
    }

    pub fn with_publish_error(mut self, code: BrokerCode) -> Self {
        self.publish_error = Some(code);
        self
    }

    /// Handle onto the publish log, valid after the link is moved into
    /// a supervisor.
    pub fn published_log(&self) -> Arc<Mutex<Vec<(String, Vec<u8>)>>> {
        Arc::clone(&self.published)
    }
}

#[async_trait]
impl LinkClient for ScriptedLink {
    async fn link_status(&mut self) -> LinkStatus {
        if let Some(status) = self.statuses.pop_front() {
            self.last_status = status;
        }
        self.last_status
    }

    async fn connect(
        &mut self,
        _profile: &TransportProfile,
        _timeout: Duration,
    ) -> Result<(), BrokerCode> {
        self.connect_calls += 1;
        self.connect_results.pop_front().unwrap_or(Ok(()))
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerCode> {
        if let Some(code) = self.publish_error {
            return Err(code);
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
        Ok(())
    }

    async fn service(&mut self) -> Result<Vec<Inbound>, BrokerCode> {
        self.service_calls += 1;
        self.service_results.pop_front().unwrap_or(Ok(Vec::new()))
    }

    async fn disconnect(&mut self) {
        self.disconnects += 1;
    }
}

/// One transition captured by [`RecordingReporter`].
pub type Transition = (CompositeState, CompositeState, ConnectionState);

/// Reporter that records every transition for later assertions.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    transitions: Arc<Mutex<Vec<Transition>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Vec<Transition> {
        self.transitions.lock().unwrap().clone()
    }
}

impl StatusReporter for RecordingReporter {
    fn transition(&mut self, from: CompositeState, to: CompositeState, state: &ConnectionState) {
        self.transitions.lock().unwrap().push((from, to, *state));
    }
}

/// Payload source returning a fixed byte string.
pub struct StaticPayload(pub Vec<u8>);

impl PayloadSource for StaticPayload {
    fn payload(&mut self, _task: &PublishTask) -> Vec<u8> {
        self.0.clone()
    }
}
