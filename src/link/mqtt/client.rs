//! Impure I/O around the rumqttc event loop
//!
//! One background task owns the event loop per session and reports
//! back through a watch channel plus a bounded inbound queue. The task
//! stops on the first event-loop error instead of letting rumqttc
//! re-dial on its own: reconnect timing belongs to the supervisor's
//! caller, and a half-open session must surface as a status code, not
//! heal silently.

use super::options::{code_from_connack, code_from_connection_error, configure_link_options};
use crate::config::TransportProfile;
use crate::error::BrokerCode;
use crate::link::{Inbound, LinkClient, LinkStatus};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, Packet, QoS};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const EVENT_CHANNEL_CAPACITY: usize = 10;
const LINK_PROBE_TIMEOUT: Duration = Duration::from_millis(1_500);

/// Tunables for the rumqttc link, taken from the telemetry config.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub keep_alive: Duration,
    /// Capacity of the inbound queue drained by `service`. Messages
    /// beyond this are dropped with a warning.
    pub inbound_queue: usize,
    pub subscribe_topic: Option<String>,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(60),
            inbound_queue: 16,
            subscribe_topic: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionHealth {
    Connecting,
    Up,
    Down(BrokerCode),
}

struct Session {
    client: AsyncClient,
    inbound_rx: mpsc::Receiver<Inbound>,
    health_rx: watch::Receiver<SessionHealth>,
    event_loop: JoinHandle<()>,
}

/// rumqttc-backed [`LinkClient`]
///
/// The link-status query is a hostname resolution probe against the
/// broker endpoint: the hosted stand-in for the devkit's WiFi
/// association check. While a session is alive the session itself is
/// proof of the link.
pub struct RumqttcLink {
    host: String,
    port: u16,
    settings: LinkSettings,
    session: Option<Session>,
}

impl RumqttcLink {
    pub fn new(host: impl Into<String>, port: u16, settings: LinkSettings) -> Self {
        Self {
            host: host.into(),
            port,
            settings,
            session: None,
        }
    }

    fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            session.event_loop.abort();
        }
    }

    fn session_health(&self) -> Option<SessionHealth> {
        self.session.as_ref().map(|s| *s.health_rx.borrow())
    }

    async fn probe_link(&self) -> LinkStatus {
        let endpoint = (self.host.as_str(), self.port);
        let probe = tokio::net::lookup_host(endpoint);
        match tokio::time::timeout(LINK_PROBE_TIMEOUT, probe).await {
            Ok(Ok(mut addrs)) => {
                if addrs.next().is_some() {
                    LinkStatus::Up
                } else {
                    LinkStatus::Down
                }
            }
            Ok(_) | Err(_) => LinkStatus::Down,
        }
    }

    /// Wait for the event-loop task to report the handshake outcome.
    async fn wait_for_session(
        mut health_rx: watch::Receiver<SessionHealth>,
        timeout: Duration,
    ) -> Result<(), BrokerCode> {
        let wait = async {
            loop {
                match *health_rx.borrow() {
                    SessionHealth::Up => return Ok(()),
                    SessionHealth::Down(code) => return Err(code),
                    SessionHealth::Connecting => {}
                }
                if health_rx.changed().await.is_err() {
                    return Err(BrokerCode::ConnectFailed);
                }
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(BrokerCode::Timeout),
        }
    }
}

#[async_trait]
impl LinkClient for RumqttcLink {
    async fn link_status(&mut self) -> LinkStatus {
        match self.session_health() {
            // A live session is proof of the link; a dead one says
            // nothing about it, so fall through to the probe.
            Some(SessionHealth::Up) | Some(SessionHealth::Connecting) => LinkStatus::Up,
            _ => self.probe_link().await,
        }
    }

    async fn connect(
        &mut self,
        profile: &TransportProfile,
        timeout: Duration,
    ) -> Result<(), BrokerCode> {
        // A previous session may still hold a task; replace it.
        self.teardown();

        let options = configure_link_options(profile, self.settings.keep_alive);
        let (client, mut event_loop) = AsyncClient::new(options, EVENT_CHANNEL_CAPACITY);

        let (health_tx, health_rx) = watch::channel(SessionHealth::Connecting);
        let (inbound_tx, inbound_rx) = mpsc::channel(self.settings.inbound_queue);

        let device_id = profile.device_id().to_string();
        let handle = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        let code = code_from_connack(ack.code);
                        if code == BrokerCode::Accepted {
                            let _ = health_tx.send(SessionHealth::Up);
                        } else {
                            let _ = health_tx.send(SessionHealth::Down(code));
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message = Inbound {
                            topic: publish.topic.clone(),
                            payload: publish.payload.to_vec(),
                        };
                        if inbound_tx.try_send(message).is_err() {
                            warn!(
                                device_id = %device_id,
                                topic = %publish.topic,
                                "inbound queue full, dropping message"
                            );
                        }
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        let _ = health_tx.send(SessionHealth::Down(BrokerCode::Disconnected));
                        break;
                    }
                    Ok(_) => {}
                    Err(error) => {
                        let code = code_from_connection_error(&error);
                        debug!(
                            device_id = %device_id,
                            code = code.code(),
                            error = %error,
                            "event loop stopped"
                        );
                        let _ = health_tx.send(SessionHealth::Down(code));
                        break;
                    }
                }
            }
        });

        match Self::wait_for_session(health_rx.clone(), timeout).await {
            Ok(()) => {
                if let Some(topic) = &self.settings.subscribe_topic {
                    // Subscription failure is not a session failure;
                    // the devkit keeps publishing either way.
                    if let Err(error) = client.subscribe(topic, QoS::AtLeastOnce).await {
                        warn!(topic = %topic, error = %error, "subscribe failed");
                    }
                }
                self.session = Some(Session {
                    client,
                    inbound_rx,
                    health_rx,
                    event_loop: handle,
                });
                Ok(())
            }
            Err(code) => {
                handle.abort();
                Err(code)
            }
        }
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerCode> {
        let session = match &self.session {
            Some(session) => session,
            None => return Err(BrokerCode::Disconnected),
        };
        match *session.health_rx.borrow() {
            SessionHealth::Up => {}
            SessionHealth::Down(code) => return Err(code),
            SessionHealth::Connecting => return Err(BrokerCode::Disconnected),
        }
        session
            .client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|_| BrokerCode::Disconnected)
    }

    async fn service(&mut self) -> Result<Vec<Inbound>, BrokerCode> {
        match self.session_health() {
            None => return Err(BrokerCode::Disconnected),
            Some(SessionHealth::Down(code)) => {
                self.teardown();
                return Err(code);
            }
            Some(_) => {}
        }
        let capacity = self.settings.inbound_queue;
        let Some(session) = self.session.as_mut() else {
            return Err(BrokerCode::Disconnected);
        };
        let mut drained = Vec::new();
        while drained.len() < capacity {
            match session.inbound_rx.try_recv() {
                Ok(message) => drained.push(message),
                Err(_) => break,
            }
        }
        Ok(drained)
    }

    async fn disconnect(&mut self) {
        if let Some(session) = &self.session {
            let _ = session.client.disconnect().await;
        }
        self.teardown();
    }
}

impl Drop for RumqttcLink {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthMode;

    fn local_profile(port: u16) -> TransportProfile {
        TransportProfile {
            host: "127.0.0.1".to_string(),
            port,
            auth: AuthMode::Credentials {
                device_id: "devkit-test".to_string(),
                password: "secret".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_connect_against_closed_port_reports_transport_code() {
        let mut link = RumqttcLink::new("127.0.0.1", 1, LinkSettings::default());
        let result = link
            .connect(&local_profile(1), Duration::from_secs(5))
            .await;
        let code = result.unwrap_err();
        // Refused TCP connect surfaces as a negative transport code
        assert!(code.code() < 0, "expected transport failure, got {code}");
    }

    #[tokio::test]
    async fn test_publish_without_session_is_disconnected() {
        let mut link = RumqttcLink::new("127.0.0.1", 1883, LinkSettings::default());
        let result = link.publish("telemetry/data", b"{}".to_vec()).await;
        assert_eq!(result.unwrap_err(), BrokerCode::Disconnected);
    }

    #[tokio::test]
    async fn test_service_without_session_is_disconnected() {
        let mut link = RumqttcLink::new("127.0.0.1", 1883, LinkSettings::default());
        assert_eq!(link.service().await.unwrap_err(), BrokerCode::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_without_session_is_a_no_op() {
        let mut link = RumqttcLink::new("127.0.0.1", 1883, LinkSettings::default());
        link.disconnect().await;
        link.disconnect().await;
    }
}
