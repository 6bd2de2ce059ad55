//! Governance facade.
//!
//! Composes the consensus engine, the signing broker, and the on-chain
//! bridge behind the operation set the dashboard shells consume. This is
//! the only layer that stitches a remote signing session back into the
//! operation it was opened for.

use crate::auth::AuthSession;
use crate::chain::bridge::{BridgeError, OnChainBridge};
use crate::chain::traits::{ChainClient, ChainError, MultiSigTransaction, SystemSettings, TxHash};
use crate::chain::typed_data::TypedData;
use crate::governance::directory::SignerDirectory;
use crate::governance::engine::{ConsensusEngine, EngineError, ThresholdSnapshot};
use crate::governance::types::{Decision, Proposal, ProposalDraft};
use crate::identity::{Address, SignerId};
use crate::remote::broker::{SessionError, SessionHandle, SigningBroker};
use crate::remote::poll::{await_result, PollPolicy};
use crate::remote::session::{SessionId, SessionPurpose, SessionSnapshot};
use crate::store::{ProposalStore, SessionStore, StoreError};
use crate::time::Clock;
use std::sync::Arc;
use std::time::Duration;

/// Cadence dashboard consumers poll `alert_count` at.
pub const ALERT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Result type for facade operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Facade errors; each wraps the originating subsystem's taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("chain error: {0}")]
    Chain(ChainError),

    #[error("malformed request: {0}")]
    Malformed(String),
}

/// Settings plus queued transactions, as one overview read.
#[derive(Debug, Clone, PartialEq)]
pub struct MultisigOverview {
    pub contract: Address,
    pub threshold: u32,
    pub timelock_delay_secs: u64,
    pub transactions: Vec<MultiSigTransaction>,
}

pub struct GovernanceService<P, S, C, D>
where
    P: ProposalStore,
    S: SessionStore,
    C: ChainClient,
    D: SignerDirectory,
{
    engine: ConsensusEngine<P, D>,
    broker: SigningBroker<S>,
    bridge: OnChainBridge<P, C>,
    chain: Arc<C>,
}

impl<P, S, C, D> GovernanceService<P, S, C, D>
where
    P: ProposalStore,
    S: SessionStore,
    C: ChainClient,
    D: SignerDirectory,
{
    pub fn new(
        proposals: Arc<P>,
        sessions: Arc<S>,
        chain: Arc<C>,
        directory: Arc<D>,
        clock: Arc<dyn Clock>,
        signing_base_url: impl Into<String>,
    ) -> Self {
        Self {
            engine: ConsensusEngine::new(proposals.clone(), directory, clock.clone()),
            broker: SigningBroker::new(sessions, clock.clone(), signing_base_url),
            bridge: OnChainBridge::new(proposals, chain.clone(), clock),
            chain,
        }
    }

    async fn settings(&self) -> ServiceResult<SystemSettings> {
        self.chain.settings().await.map_err(ServiceError::Chain)
    }

    // ---- proposals & votes -------------------------------------------------

    pub async fn proposals(&self) -> ServiceResult<Vec<Proposal>> {
        Ok(self.engine.proposals().await?)
    }

    pub async fn proposal(&self, id: u64) -> ServiceResult<Proposal> {
        Ok(self.engine.proposal(id).await?)
    }

    /// Create a proposal, snapshotting the current on-chain threshold.
    pub async fn create_proposal(&self, draft: ProposalDraft) -> ServiceResult<Proposal> {
        let settings = self.settings().await?;
        Ok(self
            .engine
            .create_proposal(
                draft,
                ThresholdSnapshot {
                    threshold: settings.threshold,
                },
            )
            .await?)
    }

    /// Cast a vote with a hex-encoded signature (the wire form).
    pub async fn vote(
        &self,
        proposal_id: u64,
        voter: &SignerId,
        decision: Decision,
        signature_hex: &str,
        timestamp_ms: u64,
    ) -> ServiceResult<Proposal> {
        let signature = hex::decode(signature_hex)
            .map_err(|_| ServiceError::Malformed("signature is not valid hex".into()))?;
        Ok(self
            .engine
            .cast_vote(proposal_id, voter, decision, &signature, timestamp_ms)
            .await?)
    }

    /// Active-proposal count for the dashboard badge (polled on
    /// [`ALERT_POLL_INTERVAL`]).
    pub async fn alert_count(&self) -> ServiceResult<u64> {
        Ok(self.engine.alert_count().await?)
    }

    /// Reject active proposals whose window closed short of threshold.
    pub async fn expire_stale(&self, now: u64) -> ServiceResult<u64> {
        Ok(self.engine.expire_stale(now).await?)
    }

    // ---- on-chain bridging -------------------------------------------------

    pub async fn prepare_on_chain(&self, proposal_id: u64) -> ServiceResult<TypedData> {
        let proposal = self.engine.proposal(proposal_id).await?;
        Ok(self.bridge.prepare_submission(&proposal).await?)
    }

    pub async fn submit_on_chain(
        &self,
        proposal_id: u64,
        signer: Address,
        signature_hex: &str,
    ) -> ServiceResult<u64> {
        let signature = hex::decode(signature_hex)
            .map_err(|_| ServiceError::Malformed("signature is not valid hex".into()))?;
        Ok(self
            .bridge
            .relay_submission(proposal_id, signer, signature)
            .await?)
    }

    pub async fn prepare_confirmation(&self, proposal_id: u64) -> ServiceResult<TypedData> {
        let proposal = self.engine.proposal(proposal_id).await?;
        let settings = self.settings().await?;
        Ok(self
            .bridge
            .prepare_confirmation(&proposal, settings.signer_version)
            .await?)
    }

    pub async fn confirm_on_chain(
        &self,
        tx_index: u64,
        signer: Address,
        signature_hex: &str,
    ) -> ServiceResult<()> {
        let signature = hex::decode(signature_hex)
            .map_err(|_| ServiceError::Malformed("signature is not valid hex".into()))?;
        let settings = self.settings().await?;
        Ok(self
            .bridge
            .relay_confirmation(tx_index, settings.signer_version, signer, signature)
            .await?)
    }

    pub async fn multisig_overview(&self) -> ServiceResult<MultisigOverview> {
        let settings = self.settings().await?;
        let transactions = self
            .chain
            .transactions()
            .await
            .map_err(ServiceError::Chain)?;
        Ok(MultisigOverview {
            contract: settings.verifying_contract,
            threshold: settings.threshold,
            timelock_delay_secs: settings.timelock_delay_secs,
            transactions,
        })
    }

    pub async fn execute(&self, tx_index: u64) -> ServiceResult<TxHash> {
        Ok(self.bridge.execute(tx_index).await?)
    }

    pub async fn revoke(&self, tx_index: u64, signer: &Address) -> ServiceResult<()> {
        Ok(self.bridge.revoke_confirmation(tx_index, signer).await?)
    }

    /// Refresh mirror fields and promote `passed -> executed` if the chain
    /// reports execution.
    pub async fn sync_proposal(&self, proposal_id: u64) -> ServiceResult<Proposal> {
        Ok(self.bridge.sync_proposal(proposal_id).await?)
    }

    pub async fn system_settings(&self) -> ServiceResult<SystemSettings> {
        self.settings().await
    }

    // ---- remote signing ----------------------------------------------------

    /// Open a remote signing session for a vote. The returned URL is opened
    /// in the context that holds the key.
    pub async fn remote_vote_session(
        &self,
        proposal_id: u64,
        decision: Decision,
    ) -> ServiceResult<SessionHandle> {
        // Surface NotFound/terminal states before the signer is bothered.
        let proposal = self.engine.proposal(proposal_id).await?;
        if proposal.status != crate::governance::types::ProposalStatus::Active {
            return Err(ServiceError::Engine(EngineError::AlreadyTerminal {
                id: proposal_id,
                status: proposal.status,
            }));
        }
        Ok(self
            .broker
            .init_session(SessionPurpose::Vote {
                proposal_id,
                decision,
            })
            .await?)
    }

    pub async fn remote_vote_status(&self, session_id: &SessionId) -> ServiceResult<SessionSnapshot> {
        Ok(self.broker.poll_status(session_id).await?)
    }

    /// Report the signer's rejection from the secondary context.
    pub async fn remote_reject(&self, session_id: &SessionId, reason: &str) -> ServiceResult<()> {
        Ok(self.broker.fail(session_id, reason).await?)
    }

    /// Authorize a session from the secondary context.
    pub async fn remote_authorize(
        &self,
        session_id: &SessionId,
        result: crate::remote::session::SigningResult,
    ) -> ServiceResult<()> {
        Ok(self.broker.authorize(session_id, result).await?)
    }

    /// Block (bounded) until the remote vote session completes, then cast
    /// the vote with the returned signature.
    pub async fn finish_remote_vote(
        &self,
        session_id: &SessionId,
        voter: &SignerId,
    ) -> ServiceResult<Proposal> {
        let session = self.broker.session(session_id).await?;
        let (proposal_id, decision) = match session.purpose {
            SessionPurpose::Vote {
                proposal_id,
                decision,
            } => (proposal_id, decision),
            _ => {
                return Err(ServiceError::Malformed(
                    "session was not opened for a vote".into(),
                ))
            }
        };

        let policy = PollPolicy::for_purpose(&session.purpose);
        let result = await_result(&self.broker, session_id, policy).await?;
        let signed_at = result
            .signed_at_ms
            .ok_or(ServiceError::Session(SessionError::MissingResult))?;
        self.vote(proposal_id, voter, decision, &result.signature, signed_at)
            .await
    }

    /// Open a remote signing session for an on-chain confirmation.
    pub async fn remote_confirm_session(&self, tx_index: u64) -> ServiceResult<SessionHandle> {
        let settings = self.settings().await?;
        Ok(self
            .broker
            .init_session(SessionPurpose::MultisigConfirm {
                tx_index,
                signer_version: settings.signer_version,
            })
            .await?)
    }

    /// Block (bounded) until the confirmation session completes, then relay
    /// the confirmation.
    pub async fn finish_remote_confirmation(
        &self,
        session_id: &SessionId,
        signer: Address,
    ) -> ServiceResult<()> {
        let session = self.broker.session(session_id).await?;
        let (tx_index, signer_version) = match session.purpose {
            SessionPurpose::MultisigConfirm {
                tx_index,
                signer_version,
            } => (tx_index, signer_version),
            _ => {
                return Err(ServiceError::Malformed(
                    "session was not opened for a confirmation".into(),
                ))
            }
        };

        let policy = PollPolicy::for_purpose(&session.purpose);
        let result = await_result(&self.broker, session_id, policy).await?;
        let signature = hex::decode(&result.signature)
            .map_err(|_| ServiceError::Malformed("signature is not valid hex".into()))?;
        Ok(self
            .bridge
            .relay_confirmation(tx_index, signer_version, signer, signature)
            .await?)
    }

    /// Open a remote login session for a device without key access.
    pub async fn remote_login_session(&self, device_id: &str) -> ServiceResult<SessionHandle> {
        Ok(self
            .broker
            .init_session(SessionPurpose::Login {
                device_id: device_id.to_string(),
            })
            .await?)
    }

    pub async fn remote_login_status(
        &self,
        session_id: &SessionId,
    ) -> ServiceResult<SessionSnapshot> {
        Ok(self.broker.poll_status(session_id).await?)
    }

    /// Block (bounded) until the login session completes and wrap the
    /// issued token in an [`AuthSession`].
    pub async fn finish_remote_login(&self, session_id: &SessionId) -> ServiceResult<AuthSession> {
        let session = self.broker.session(session_id).await?;
        let device_id = match session.purpose {
            SessionPurpose::Login { ref device_id } => device_id.clone(),
            _ => {
                return Err(ServiceError::Malformed(
                    "session was not opened for a login".into(),
                ))
            }
        };

        let policy = PollPolicy::for_purpose(&session.purpose);
        let result = await_result(&self.broker, session_id, policy).await?;
        let token = result
            .access_token
            .ok_or(ServiceError::Session(SessionError::MissingResult))?;
        Ok(AuthSession::new(token, device_id, session.created_at))
    }

    /// Garbage-collect sessions past retention.
    pub async fn purge_sessions(&self) -> ServiceResult<u64> {
        Ok(self.broker.purge_expired().await?)
    }
}
