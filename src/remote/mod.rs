//! Remote signing sessions.
//!
//! Bridges a signing requirement from a context without direct key access
//! (e.g. the desktop shell) to one that has it (the operator's browser
//! wallet), using a polling handshake over a short-lived session token
//! instead of a direct call/return.

pub mod broker;
pub mod poll;
pub mod session;

pub use broker::{BrokerResult, SessionError, SessionHandle, SigningBroker};
pub use poll::{await_result, PollPolicy};
pub use session::{
    SessionId, SessionPurpose, SessionSnapshot, SessionStatus, SigningResult, SigningSession,
};
