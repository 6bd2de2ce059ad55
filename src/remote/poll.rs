//! Caller-side polling loop.
//!
//! The initiating context cannot be pushed to, so it polls the session at a
//! fixed interval with a bounded attempt count. Every exit is explicit: a
//! terminal session status maps to success or a distinct error, and attempt
//! exhaustion surfaces as a timeout instead of polling forever.

use crate::remote::broker::{SessionError, SigningBroker};
use crate::remote::session::{SessionId, SessionPurpose, SessionStatus, SigningResult};
use crate::store::SessionStore;
use std::time::Duration;
use tokio::time::sleep;

/// Fixed interval between polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Attempt budget for login and vote sessions (~2 minutes).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;
/// Attempt budget for multi-sig confirmation sessions (~10 minutes, matching
/// their longer TTL).
pub const MULTISIG_MAX_ATTEMPTS: u32 = 300;

/// Polling parameters for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    /// Budget matched to the session purpose's TTL.
    pub fn for_purpose(purpose: &SessionPurpose) -> Self {
        let max_attempts = match purpose {
            SessionPurpose::MultisigConfirm { .. } => MULTISIG_MAX_ATTEMPTS,
            SessionPurpose::Login { .. } | SessionPurpose::Vote { .. } => DEFAULT_MAX_ATTEMPTS,
        };
        Self {
            interval: POLL_INTERVAL,
            max_attempts,
        }
    }
}

/// Poll until the session terminates or the attempt budget runs out.
///
/// Terminal mapping: `authorized` yields the signing result; `expired`,
/// `failed`, and budget exhaustion yield distinct errors so the shell can
/// word "too slow", "signer declined", and "gave up waiting" differently.
pub async fn await_result<S: SessionStore>(
    broker: &SigningBroker<S>,
    id: &SessionId,
    policy: PollPolicy,
) -> Result<SigningResult, SessionError> {
    for attempt in 0..policy.max_attempts {
        let snapshot = broker.poll_status(id).await?;
        match snapshot.status {
            SessionStatus::Authorized => {
                return snapshot.result.ok_or(SessionError::MissingResult);
            }
            SessionStatus::Expired => return Err(SessionError::Expired),
            SessionStatus::Failed => {
                let reason = snapshot
                    .failure
                    .unwrap_or_else(|| "signer declined".to_string());
                return Err(SessionError::Rejected(reason));
            }
            SessionStatus::Pending => {
                if attempt + 1 < policy.max_attempts {
                    sleep(policy.interval).await;
                }
            }
        }
    }
    Err(SessionError::Timeout {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::types::Decision;
    use crate::store::MemorySessionStore;
    use crate::time::ManualClock;
    use std::sync::Arc;

    fn broker() -> (Arc<SigningBroker<MemorySessionStore>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let broker = Arc::new(SigningBroker::new(
            Arc::new(MemorySessionStore::new()),
            clock.clone(),
            "https://sign.bbsns.example",
        ));
        (broker, clock)
    }

    fn fast_policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(5),
            max_attempts,
        }
    }

    fn purpose() -> SessionPurpose {
        SessionPurpose::Vote {
            proposal_id: 7,
            decision: Decision::Approve,
        }
    }

    #[test]
    fn policy_matches_purpose() {
        let vote = PollPolicy::for_purpose(&purpose());
        assert_eq!(vote.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(vote.interval, POLL_INTERVAL);

        let confirm = PollPolicy::for_purpose(&SessionPurpose::MultisigConfirm {
            tx_index: 0,
            signer_version: 1,
        });
        assert_eq!(confirm.max_attempts, MULTISIG_MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn returns_result_once_authorized() {
        let (broker, _clock) = broker();
        let handle = broker.init_session(purpose()).await.unwrap();

        let signer_broker = broker.clone();
        let session_id = handle.session_id.clone();
        let signer = tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            signer_broker
                .authorize(
                    &session_id,
                    SigningResult {
                        signature: "cafe".to_string(),
                        signed_at_ms: Some(123),
                        access_token: None,
                    },
                )
                .await
                .unwrap();
        });

        let result = await_result(&broker, &handle.session_id, fast_policy(200))
            .await
            .unwrap();
        assert_eq!(result.signature, "cafe");
        signer.await.unwrap();
    }

    #[tokio::test]
    async fn exhausted_attempts_time_out() {
        let (broker, _clock) = broker();
        let handle = broker.init_session(purpose()).await.unwrap();

        let err = await_result(&broker, &handle.session_id, fast_policy(3))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Timeout { attempts: 3 }));
    }

    #[tokio::test]
    async fn expiry_terminates_polling() {
        let (broker, clock) = broker();
        let handle = broker.init_session(purpose()).await.unwrap();

        clock.advance(3600);
        let err = await_result(&broker, &handle.session_id, fast_policy(50))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Expired));
    }

    #[tokio::test]
    async fn failure_reason_is_surfaced() {
        let (broker, _clock) = broker();
        let handle = broker.init_session(purpose()).await.unwrap();
        broker
            .fail(&handle.session_id, "hardware wallet unplugged")
            .await
            .unwrap();

        let err = await_result(&broker, &handle.session_id, fast_policy(5))
            .await
            .unwrap_err();
        match err {
            SessionError::Rejected(reason) => assert_eq!(reason, "hardware wallet unplugged"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
