//! Structured logging setup
//!
//! The diagnostic log is the only user-visible surface besides the
//! status reporter, so the format and level are environment-driven and
//! dependency noise is filtered out.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
