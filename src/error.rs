//! Error types for the telemetry supervisor
//!
//! Broker status codes are kept bit-exact with the embedded client
//! convention so device-side diagnostic logs stay comparable across
//! firmware and host builds.

use thiserror::Error;

/// Broker status codes surfaced through the supervisor's `last_error`.
///
/// Negative codes are transport-level failures, `0` is success, and
/// `1..=5` are the protocol-level CONNACK rejection reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerCode {
    /// `-4`: connect handshake timed out
    Timeout,
    /// `-3`: network connection lost mid-session
    ConnectionLost,
    /// `-2`: connect failed before the handshake completed (TLS included)
    ConnectFailed,
    /// `-1`: client is disconnected
    Disconnected,
    /// `0`: connected
    Accepted,
    /// `1`: unacceptable protocol version
    BadProtocolVersion,
    /// `2`: identifier rejected
    IdentifierRejected,
    /// `3`: server unavailable
    ServerUnavailable,
    /// `4`: bad username or password
    BadCredentials,
    /// `5`: not authorized
    NotAuthorized,
}

impl BrokerCode {
    /// Numeric code matching the embedded client convention.
    pub fn code(self) -> i8 {
        match self {
            BrokerCode::Timeout => -4,
            BrokerCode::ConnectionLost => -3,
            BrokerCode::ConnectFailed => -2,
            BrokerCode::Disconnected => -1,
            BrokerCode::Accepted => 0,
            BrokerCode::BadProtocolVersion => 1,
            BrokerCode::IdentifierRejected => 2,
            BrokerCode::ServerUnavailable => 3,
            BrokerCode::BadCredentials => 4,
            BrokerCode::NotAuthorized => 5,
        }
    }

    /// Reverse mapping from the numeric convention.
    pub fn from_code(code: i8) -> Option<Self> {
        let mapped = match code {
            -4 => BrokerCode::Timeout,
            -3 => BrokerCode::ConnectionLost,
            -2 => BrokerCode::ConnectFailed,
            -1 => BrokerCode::Disconnected,
            0 => BrokerCode::Accepted,
            1 => BrokerCode::BadProtocolVersion,
            2 => BrokerCode::IdentifierRejected,
            3 => BrokerCode::ServerUnavailable,
            4 => BrokerCode::BadCredentials,
            5 => BrokerCode::NotAuthorized,
            _ => return None,
        };
        Some(mapped)
    }

    /// True for the CONNACK-level rejection reasons (`1..=5`).
    pub fn is_rejection(self) -> bool {
        self.code() > 0
    }
}

impl std::fmt::Display for BrokerCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BrokerCode::Timeout => "timeout",
            BrokerCode::ConnectionLost => "connection lost",
            BrokerCode::ConnectFailed => "connect failed",
            BrokerCode::Disconnected => "disconnected",
            BrokerCode::Accepted => "connected",
            BrokerCode::BadProtocolVersion => "bad protocol version",
            BrokerCode::IdentifierRejected => "identifier rejected",
            BrokerCode::ServerUnavailable => "server unavailable",
            BrokerCode::BadCredentials => "bad credentials",
            BrokerCode::NotAuthorized => "not authorized",
        };
        write!(f, "{} ({})", self.code(), name)
    }
}

/// Most recent failure retained in [`ConnectionState`], cleared by the
/// next successful transition past the layer that produced it.
///
/// [`ConnectionState`]: crate::supervisor::ConnectionState
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastError {
    /// Network association dropped.
    LinkLost,
    /// Broker reported a status code during connect or while servicing.
    Broker(BrokerCode),
}

/// Main error type for telemetry supervisor operations
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("network link lost")]
    LinkLost,

    #[error("broker handshake failed: {0}")]
    HandshakeFailure(BrokerCode),

    #[error("publish failed: {0}")]
    PublishFailure(BrokerCode),

    #[error("payload of {len} bytes exceeds ceiling of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("connect retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("configuration error: {0}")]
    Configuration(#[from] crate::config::ConfigError),
}

/// Result type for telemetry supervisor operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;
