//! Authenticated session object.
//!
//! The bearer token issued by a remote login lives in an explicit session
//! value passed through calls, never in ambient process-global state. It is
//! set exactly once at construction, cleared by `invalidate` (logout or a
//! definitive auth failure), and zeroized on drop.

use zeroize::Zeroizing;

/// A live authenticated session for one device.
pub struct AuthSession {
    token: Option<Zeroizing<String>>,
    device_id: String,
    issued_at: u64,
}

impl AuthSession {
    pub fn new(token: String, device_id: String, issued_at: u64) -> Self {
        Self {
            token: Some(Zeroizing::new(token)),
            device_id,
            issued_at,
        }
    }

    /// Bearer token for request authentication; `None` once invalidated.
    pub fn bearer(&self) -> Option<&str> {
        self.token.as_deref().map(|t| t.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.token.is_some()
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn issued_at(&self) -> u64 {
        self.issued_at
    }

    /// Drop the token material. Irreversible; a new login issues a new
    /// session.
    pub fn invalidate(&mut self) {
        self.token = None;
    }
}
