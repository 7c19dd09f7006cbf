// src/engine/mod.rs

//! Timed test-taking sessions.
//!
//! [`session::TestSession`] is the synchronous state machine, [`runtime::SessionHandle`]
//! drives it with timers and persistence, and [`registry::SessionRegistry`] holds the
//! live handles of a host.

pub mod error;
pub mod registry;
pub mod runtime;
pub mod scoring;
pub mod session;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use runtime::{SessionEvent, SessionHandle, SessionSettings};
pub use session::{SessionStart, TestSession, TickOutcome};
