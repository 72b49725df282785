//! Link layer abstraction
//!
//! The supervisor never talks to rumqttc directly; it drives a
//! [`LinkClient`], which models the devkit's network + MQTT client as
//! two layers: the network association ("link") and the broker
//! session. The real implementation lives in [`mqtt`]; tests use the
//! scripted client from [`crate::testing`].

use crate::config::TransportProfile;
use crate::error::BrokerCode;
use async_trait::async_trait;
use std::time::Duration;

pub mod mqtt;

/// Result of a link-layer status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Up,
    Down,
}

/// One message received from the broker, drained during `service`.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Network + TLS + MQTT client seam
///
/// Implementations report state; they never retry on their own. Retry
/// timing belongs to the supervisor's caller.
#[async_trait]
pub trait LinkClient: Send {
    /// Query the underlying network association. No side effects.
    async fn link_status(&mut self) -> LinkStatus;

    /// Perform the broker connect handshake for the given profile.
    ///
    /// Must only resolve successfully once the broker has acknowledged
    /// the session (CONNACK), and must give up after `timeout`.
    async fn connect(
        &mut self,
        profile: &TransportProfile,
        timeout: Duration,
    ) -> Result<(), BrokerCode>;

    /// Publish one message on the established session.
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerCode>;

    /// Drain inbound messages and keepalive bookkeeping for one loop
    /// slice. `Err` reports that the session died since the last call.
    async fn service(&mut self) -> Result<Vec<Inbound>, BrokerCode>;

    /// Tear down the session, if any. Idempotent.
    async fn disconnect(&mut self);
}
