//! rumqttc-backed implementation of the link layer
//!
//! Split the way the transport is split elsewhere in this codebase:
//! `options` holds the pure profile-to-options mapping and status-code
//! translation, `client` the impure I/O around the rumqttc event loop.

mod client;
mod options;

pub use client::{LinkSettings, RumqttcLink};
pub use options::{code_from_connack, code_from_connection_error, configure_link_options};
