//! Cryptographic helpers: canonical vote messages, Ed25519 verification,
//! and session token generation.

pub mod token;
pub mod vote_message;

pub use token::session_token;
pub use vote_message::{canonical_vote_message, verify_signature, SignatureError};
