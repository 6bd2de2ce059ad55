//! BBSNS Governance - Threshold Governance & Remote-Signing Protocol
//!
//! The governance core of the BBSNS notarization platform. Coordinates human
//! approvers, remotely-held signing keys, and an on-chain multi-signature
//! contract to authorize sensitive administrative actions.
//!
//! Key principles:
//! - Off-chain quorum is authoritative; chain state is a mirror
//! - Every wait is bounded (session TTLs, capped polling)
//! - Exactly-once session authorization (atomic compare-and-set)
//! - Timelocked execution after on-chain quorum

pub mod auth;
pub mod chain;
pub mod crypto;
pub mod governance;
pub mod identity;
pub mod remote;
pub mod serialization;
pub mod service;
pub mod store;
pub mod time;
pub mod timelock;
