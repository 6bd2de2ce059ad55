//! Session token generation.
//!
//! Session identifiers double as bearer capabilities: anyone holding the
//! token can poll the session, and the secondary signing context proves its
//! involvement by presenting it. Tokens therefore come from the OS CSPRNG
//! and are long enough that guessing is infeasible.

use rand::rngs::OsRng;
use rand::RngCore;

/// Token length in raw bytes (hex-encoded to 64 characters).
const SESSION_TOKEN_BYTES: usize = 32;

/// Generate a fresh unguessable session token.
pub fn session_token() -> String {
    let mut buf = [0u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}
