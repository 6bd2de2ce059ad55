//! Signing session data model.
//!
//! A session is the correlation token between a signing request initiated in
//! one context and its completion in another. Sessions are ephemeral: they
//! expire on a purpose-dependent TTL and are garbage-collected after a
//! retention window.

use crate::governance::types::Decision;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Login sessions are the shortest-lived: the user is actively waiting at a
/// login screen.
pub const LOGIN_SESSION_TTL_SECS: u64 = 300;
/// Vote signing sessions.
pub const VOTE_SESSION_TTL_SECS: u64 = 300;
/// Multi-sig confirmation sessions get the longest window; the signer may
/// need to review the queued transaction before confirming.
pub const MULTISIG_SESSION_TTL_SECS: u64 = 600;

/// Opaque session token (hex, from the OS CSPRNG).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the secondary context is being asked to sign, with the payload
/// needed to reconstruct the exact message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionPurpose {
    Login {
        device_id: String,
    },
    Vote {
        proposal_id: u64,
        decision: Decision,
    },
    MultisigConfirm {
        tx_index: u64,
        signer_version: u64,
    },
}

impl SessionPurpose {
    pub fn ttl(&self) -> Duration {
        let secs = match self {
            SessionPurpose::Login { .. } => LOGIN_SESSION_TTL_SECS,
            SessionPurpose::Vote { .. } => VOTE_SESSION_TTL_SECS,
            SessionPurpose::MultisigConfirm { .. } => MULTISIG_SESSION_TTL_SECS,
        };
        Duration::from_secs(secs)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SessionPurpose::Login { .. } => "login",
            SessionPurpose::Vote { .. } => "vote",
            SessionPurpose::MultisigConfirm { .. } => "multisig-confirm",
        }
    }
}

/// Session state machine.
///
/// ```text
/// pending -> authorized | expired | failed
/// ```
///
/// All three right-hand states are terminal; a session is authorized at most
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Authorized,
    Expired,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Authorized => "authorized",
            SessionStatus::Expired => "expired",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SessionStatus::Pending),
            "authorized" => Some(SessionStatus::Authorized),
            "expired" => Some(SessionStatus::Expired),
            "failed" => Some(SessionStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the secondary context hands back on authorization.
///
/// `signature` is hex-encoded. `signed_at_ms` carries the timestamp the
/// signer bound into a vote message (required to re-verify it). Login
/// sessions additionally carry the issued access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningResult {
    pub signature: String,
    #[serde(default)]
    pub signed_at_ms: Option<u64>,
    #[serde(default)]
    pub access_token: Option<String>,
}

/// A remote signing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningSession {
    pub session_id: SessionId,
    pub purpose: SessionPurpose,
    pub status: SessionStatus,
    pub created_at: u64,
    pub expires_at: u64,
    /// Populated only when `status == Authorized`.
    pub result: Option<SigningResult>,
    /// Populated only when `status == Failed`.
    pub failure: Option<String>,
}

impl SigningSession {
    /// New pending session with the purpose-dependent TTL.
    pub fn new(session_id: SessionId, purpose: SessionPurpose, now: u64) -> Self {
        let expires_at = now + purpose.ttl().as_secs();
        Self {
            session_id,
            purpose,
            status: SessionStatus::Pending,
            created_at: now,
            expires_at,
            result: None,
            failure: None,
        }
    }
}

/// Read-only view returned by status polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub result: Option<SigningResult>,
    pub failure: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_depends_on_purpose() {
        let login = SessionPurpose::Login {
            device_id: "desk-1".to_string(),
        };
        let confirm = SessionPurpose::MultisigConfirm {
            tx_index: 0,
            signer_version: 1,
        };
        assert_eq!(login.ttl(), Duration::from_secs(LOGIN_SESSION_TTL_SECS));
        assert_eq!(
            confirm.ttl(),
            Duration::from_secs(MULTISIG_SESSION_TTL_SECS)
        );
    }

    #[test]
    fn new_session_is_pending() {
        let session = SigningSession::new(
            SessionId("abc".to_string()),
            SessionPurpose::Vote {
                proposal_id: 7,
                decision: Decision::Approve,
            },
            1000,
        );
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.expires_at, 1000 + VOTE_SESSION_TTL_SECS);
        assert!(session.result.is_none());
    }

    #[test]
    fn status_terminality() {
        assert!(!SessionStatus::Pending.is_terminal());
        assert!(SessionStatus::Authorized.is_terminal());
        assert!(SessionStatus::Expired.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
    }
}
