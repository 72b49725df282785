//! Testing utilities and mock implementations
//!
//! Scripted collaborators for exercising the supervisor and the
//! runtime loop without a network or a broker.

pub mod mocks;

pub use mocks::*;
