//! Status reporting seam
//!
//! On the devkit this drives LEDs and an OLED; here it is a trait the
//! supervisor notifies on every composite-state transition. Reporters
//! are observational only and feed nothing back into the supervisor.

use crate::supervisor::{CompositeState, ConnectionState};
use tracing::{debug, info, warn};

/// Consumer of composite-state transitions.
pub trait StatusReporter: Send {
    fn transition(&mut self, from: CompositeState, to: CompositeState, state: &ConnectionState);
}

/// Reporter that renders transitions to the diagnostic log.
#[derive(Debug, Default)]
pub struct LogReporter;

impl StatusReporter for LogReporter {
    fn transition(&mut self, from: CompositeState, to: CompositeState, state: &ConnectionState) {
        match (from, to) {
            (CompositeState::Connecting, CompositeState::Connected) => {
                info!("broker session established");
            }
            (CompositeState::Connected, _) => {
                warn!(last_error = ?state.last_error, "broker session lost");
            }
            (_, CompositeState::Connecting) => {
                debug!("starting broker connect attempt");
            }
            (_, CompositeState::Disconnected) => {
                warn!(last_error = ?state.last_error, "network link down");
            }
            (_, CompositeState::LinkOnly) => {
                info!("network link up, broker not connected");
            }
            _ => {
                info!(?from, ?to, "connection state changed");
            }
        }
    }
}

/// Reporter that discards transitions.
#[derive(Debug, Default)]
pub struct NullReporter;

impl StatusReporter for NullReporter {
    fn transition(&mut self, _from: CompositeState, _to: CompositeState, _state: &ConnectionState) {
    }
}
