//! Signing session broker.
//!
//! Owns the session state machine. The secondary context calls `authorize`
//! or `fail`; the initiating context polls `poll_status` (or uses
//! `poll::await_result`). Expiry is recorded lazily on the first observation
//! past the deadline, so an expired session is always visible as a terminal
//! status rather than silently dropped.

use crate::crypto::token::session_token;
use crate::remote::session::{
    SessionId, SessionPurpose, SessionSnapshot, SessionStatus, SigningResult, SigningSession,
};
use crate::store::{CompleteOutcome, SessionStore, StoreError};
use crate::time::Clock;
use std::sync::Arc;

/// Terminal sessions are kept this long past expiry for the initiating
/// context to observe the outcome, then garbage-collected.
pub const SESSION_RETENTION_SECS: u64 = 3600;

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, SessionError>;

/// Session errors.
///
/// `AlreadyTerminal` and `Expired` are deliberately distinct: the first
/// means someone else completed the session (or it already failed), the
/// second means the signer was too slow. The shell words them differently.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("signing session not found")]
    NotFound,

    #[error("signing session was already completed")]
    AlreadyTerminal,

    #[error("signing session expired")]
    Expired,

    #[error("signer rejected the request: {0}")]
    Rejected(String),

    #[error("timed out waiting for the remote signature after {attempts} polls")]
    Timeout { attempts: u32 },

    #[error("authorized session is missing its result")]
    MissingResult,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Handle returned to the initiating context.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHandle {
    pub session_id: SessionId,
    /// URL the caller opens in the external signing context.
    pub signing_url: String,
    pub expires_at: u64,
}

pub struct SigningBroker<S: SessionStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    base_url: String,
}

impl<S: SessionStore> SigningBroker<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, base_url: impl Into<String>) -> Self {
        Self {
            store,
            clock,
            base_url: base_url.into(),
        }
    }

    /// Open a pending session and hand back its token and signing URL.
    pub async fn init_session(&self, purpose: SessionPurpose) -> BrokerResult<SessionHandle> {
        let session_id = SessionId(session_token());
        let session = SigningSession::new(session_id.clone(), purpose, self.clock.now_unix());
        self.store.insert_session(&session).await?;

        tracing::debug!(
            session = %session_id,
            purpose = session.purpose.kind(),
            expires_at = session.expires_at,
            "signing session opened"
        );
        Ok(SessionHandle {
            signing_url: format!("{}/sign?session={}", self.base_url, session_id),
            session_id,
            expires_at: session.expires_at,
        })
    }

    /// Complete a session from the secondary context with a signature.
    ///
    /// Exactly one authorize (or fail) call succeeds per session; losers of
    /// the race get `AlreadyTerminal`, never a second success.
    pub async fn authorize(&self, id: &SessionId, result: SigningResult) -> BrokerResult<()> {
        self.complete(id, SessionStatus::Authorized, Some(result), None)
            .await
    }

    /// Record that the signer declined (wallet rejection, user cancel).
    pub async fn fail(&self, id: &SessionId, reason: &str) -> BrokerResult<()> {
        self.complete(id, SessionStatus::Failed, None, Some(reason.to_string()))
            .await
    }

    async fn complete(
        &self,
        id: &SessionId,
        status: SessionStatus,
        result: Option<SigningResult>,
        failure: Option<String>,
    ) -> BrokerResult<()> {
        let session = self.store.session(id).await?.ok_or(SessionError::NotFound)?;

        if session.status == SessionStatus::Pending && self.clock.now_unix() > session.expires_at {
            if self.store.expire_session(id).await? {
                return Err(SessionError::Expired);
            }
            // Lost the expiry race to a concurrent completion.
            return Err(SessionError::AlreadyTerminal);
        }

        match self.store.complete_session(id, status, result, failure).await? {
            CompleteOutcome::Completed => {
                tracing::debug!(session = %id, status = %status, "signing session completed");
                Ok(())
            }
            CompleteOutcome::NotPending => Err(SessionError::AlreadyTerminal),
            CompleteOutcome::Missing => Err(SessionError::NotFound),
        }
    }

    /// Read the session state. Lazily records expiry; otherwise side-effect
    /// free.
    pub async fn poll_status(&self, id: &SessionId) -> BrokerResult<SessionSnapshot> {
        let session = self.store.session(id).await?.ok_or(SessionError::NotFound)?;

        if session.status == SessionStatus::Pending && self.clock.now_unix() > session.expires_at {
            self.store.expire_session(id).await?;
            // Re-read: a concurrent authorize may have beaten the expiry.
            let session = self.store.session(id).await?.ok_or(SessionError::NotFound)?;
            return Ok(SessionSnapshot {
                status: session.status,
                result: session.result,
                failure: session.failure,
            });
        }

        Ok(SessionSnapshot {
            status: session.status,
            result: session.result,
            failure: session.failure,
        })
    }

    /// Full session record (the initiating context needs the purpose back).
    pub async fn session(&self, id: &SessionId) -> BrokerResult<SigningSession> {
        self.store.session(id).await?.ok_or(SessionError::NotFound)
    }

    /// Drop sessions past retention. Returns the number removed.
    pub async fn purge_expired(&self) -> BrokerResult<u64> {
        let cutoff = self.clock.now_unix().saturating_sub(SESSION_RETENTION_SECS);
        let removed = self.store.purge_sessions(cutoff).await?;
        if removed > 0 {
            tracing::debug!(removed, "purged stale signing sessions");
        }
        Ok(removed)
    }
}
