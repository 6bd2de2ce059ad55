//! Consensus engine: proposal creation, vote casting, status transitions.
//!
//! All status mutation funnels through here (and through the bridge for the
//! passed -> executed hop); callers never write status fields directly. The
//! tally is recomputed from the full vote set on every accepted vote, so
//! replaying an accepted vote or reordering concurrent votes cannot change
//! the outcome.

use crate::crypto::vote_message::{canonical_vote_message, verify_signature};
use crate::governance::directory::{DirectoryError, SignerDirectory};
use crate::governance::types::{
    resolve_status, tally, Decision, Proposal, ProposalDraft, ProposalStatus, Vote,
};
use crate::identity::SignerId;
use crate::store::{ProposalStore, StoreError};
use crate::time::Clock;
use std::sync::Arc;

/// Proposal lifetimes are bounded: at least one hour, at most one week.
pub const MIN_DURATION_HOURS: u64 = 1;
pub const MAX_DURATION_HOURS: u64 = 168;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Bad input from the caller; not retryable as-is.
    #[error("invalid proposal: {0}")]
    Validation(String),

    #[error("proposal {0} not found")]
    NotFound(u64),

    #[error("signer {voter} is not eligible to vote on this proposal")]
    NotEligible { voter: String },

    #[error("proposal {0} has expired")]
    Expired(u64),

    #[error("proposal {id} is already {status}")]
    AlreadyTerminal { id: u64, status: ProposalStatus },

    #[error("vote signature verification failed")]
    InvalidSignature,

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Threshold snapshot source for new proposals.
///
/// A slim view of the on-chain system settings; the engine only needs the
/// quorum value (the bridge consumes the rest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdSnapshot {
    pub threshold: u32,
}

pub struct ConsensusEngine<P: ProposalStore, D: SignerDirectory> {
    store: Arc<P>,
    directory: Arc<D>,
    clock: Arc<dyn Clock>,
}

impl<P: ProposalStore, D: SignerDirectory> ConsensusEngine<P, D> {
    pub fn new(store: Arc<P>, directory: Arc<D>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            directory,
            clock,
        }
    }

    /// Create a proposal.
    ///
    /// The threshold is copied from the snapshot at creation time so a later
    /// settings change never retroactively alters an in-flight proposal.
    pub async fn create_proposal(
        &self,
        draft: ProposalDraft,
        snapshot: ThresholdSnapshot,
    ) -> EngineResult<Proposal> {
        if draft.target_id.trim().is_empty() {
            return Err(EngineError::Validation("target_id must not be empty".into()));
        }
        if draft.title.trim().is_empty() {
            return Err(EngineError::Validation("title must not be empty".into()));
        }
        if draft.kind.requires_numeric_target() && draft.target_id.parse::<u64>().is_err() {
            return Err(EngineError::Validation(format!(
                "{} requires an integer target, got '{}'",
                draft.kind.as_str(),
                draft.target_id
            )));
        }
        if !(MIN_DURATION_HOURS..=MAX_DURATION_HOURS).contains(&draft.duration_hours) {
            return Err(EngineError::Validation(format!(
                "duration must be between {}h and {}h, got {}h",
                MIN_DURATION_HOURS, MAX_DURATION_HOURS, draft.duration_hours
            )));
        }

        let now = self.clock.now_unix();
        let proposal = Proposal {
            id: 0, // assigned by the store
            kind: draft.kind,
            target_id: draft.target_id,
            title: draft.title,
            description: draft.description,
            proposer_id: draft.proposer_id,
            status: ProposalStatus::Active,
            threshold: snapshot.threshold,
            scope: draft.scope,
            created_at: now,
            expires_at: now + draft.duration_hours * 3600,
            on_chain_tx_index: None,
            on_chain_submission_time: None,
            on_chain_confirmations: 0,
            on_chain_executed: false,
        };

        let proposal = self.store.insert_proposal(proposal).await?;
        tracing::info!(
            proposal = proposal.id,
            kind = proposal.kind.as_str(),
            threshold = proposal.threshold,
            "proposal created"
        );
        Ok(proposal)
    }

    /// Cast (or replace) a vote and recompute the proposal status.
    ///
    /// The signature must verify over the canonical message binding
    /// `(proposal_id, decision, timestamp_ms)` against the voter's on-record
    /// address.
    pub async fn cast_vote(
        &self,
        proposal_id: u64,
        voter: &SignerId,
        decision: Decision,
        signature: &[u8],
        timestamp_ms: u64,
    ) -> EngineResult<Proposal> {
        let proposal = self
            .store
            .proposal(proposal_id)
            .await?
            .ok_or(EngineError::NotFound(proposal_id))?;

        if proposal.status != ProposalStatus::Active {
            return Err(EngineError::AlreadyTerminal {
                id: proposal_id,
                status: proposal.status,
            });
        }
        if self.clock.now_unix() > proposal.expires_at {
            return Err(EngineError::Expired(proposal_id));
        }

        let record = self
            .directory
            .lookup(voter)
            .await?
            .ok_or_else(|| EngineError::NotEligible {
                voter: voter.0.clone(),
            })?;
        if !record.in_scope(proposal.scope) {
            return Err(EngineError::NotEligible {
                voter: voter.0.clone(),
            });
        }

        let message = canonical_vote_message(proposal_id, decision, timestamp_ms);
        verify_signature(&record.address, message.as_bytes(), signature)
            .map_err(|_| EngineError::InvalidSignature)?;

        // An out-of-order re-vote (older timestamp than the recorded one)
        // must not overwrite the newer decision.
        let votes = self.store.votes(proposal_id).await?;
        if let Some(prior) = votes.iter().find(|v| &v.voter_id == voter) {
            if timestamp_ms < prior.cast_at_ms {
                return Err(EngineError::Validation(
                    "vote is older than the previously recorded vote".into(),
                ));
            }
        }

        self.store
            .upsert_vote(&Vote {
                proposal_id,
                voter_id: voter.clone(),
                decision,
                signature: signature.to_vec(),
                cast_at_ms: timestamp_ms,
            })
            .await?;

        let votes = self.store.votes(proposal_id).await?;
        let counts = tally(&votes);
        let eligible = self.directory.eligible_count(proposal.scope).await?;

        if let Some(next) = resolve_status(&counts, proposal.threshold, eligible) {
            let moved = self
                .store
                .transition_status(proposal_id, ProposalStatus::Active, next)
                .await?;
            if moved {
                tracing::info!(
                    proposal = proposal_id,
                    status = %next,
                    approvals = counts.approvals,
                    rejections = counts.rejections,
                    "proposal reached a terminal tally"
                );
            }
        }

        self.store
            .proposal(proposal_id)
            .await?
            .ok_or(EngineError::NotFound(proposal_id))
    }

    /// Reject active proposals whose voting window has closed short of
    /// threshold. Idempotent; already-terminal proposals are untouched.
    pub async fn expire_stale(&self, now: u64) -> EngineResult<u64> {
        sweep_expired(self.store.as_ref(), now).await
    }

    /// Record observed on-chain execution: `passed -> executed`.
    pub async fn mark_executed(&self, proposal_id: u64) -> EngineResult<Proposal> {
        let proposal = self
            .store
            .proposal(proposal_id)
            .await?
            .ok_or(EngineError::NotFound(proposal_id))?;

        match proposal.status {
            ProposalStatus::Passed => {
                self.store
                    .transition_status(proposal_id, ProposalStatus::Passed, ProposalStatus::Executed)
                    .await?;
                self.store
                    .proposal(proposal_id)
                    .await?
                    .ok_or(EngineError::NotFound(proposal_id))
            }
            ProposalStatus::Executed => Ok(proposal),
            ProposalStatus::Active => Err(EngineError::Validation(format!(
                "proposal {} has not passed",
                proposal_id
            ))),
            status @ ProposalStatus::Rejected => Err(EngineError::AlreadyTerminal {
                id: proposal_id,
                status,
            }),
        }
    }

    /// Number of active proposals (dashboard badge; consumers poll this on
    /// a 30-second cadence).
    pub async fn alert_count(&self) -> EngineResult<u64> {
        Ok(self
            .store
            .proposals_with_status(ProposalStatus::Active)
            .await?
            .len() as u64)
    }

    pub async fn proposal(&self, id: u64) -> EngineResult<Proposal> {
        self.store
            .proposal(id)
            .await?
            .ok_or(EngineError::NotFound(id))
    }

    pub async fn proposals(&self) -> EngineResult<Vec<Proposal>> {
        Ok(self.store.proposals().await?)
    }
}

/// Standalone expiry sweep, shared with the operator CLI.
pub async fn sweep_expired<P: ProposalStore>(store: &P, now: u64) -> EngineResult<u64> {
    let active = store.proposals_with_status(ProposalStatus::Active).await?;
    let mut rejected = 0u64;

    for proposal in active {
        if now <= proposal.expires_at {
            continue;
        }
        let counts = tally(&store.votes(proposal.id).await?);
        if counts.approvals >= proposal.threshold {
            // Reached threshold at the deadline boundary; leave it for the
            // normal vote path to settle.
            continue;
        }
        if store
            .transition_status(proposal.id, ProposalStatus::Active, ProposalStatus::Rejected)
            .await?
        {
            tracing::info!(proposal = proposal.id, "proposal expired without quorum");
            rejected += 1;
        }
    }
    Ok(rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::directory::StaticDirectory;
    use crate::governance::types::{ParticipationScope, ProposalKind};
    use crate::identity::{Address, SignerRecord};
    use crate::store::MemoryProposalStore;
    use crate::time::ManualClock;
    use ring::rand::SystemRandom;
    use ring::signature::{Ed25519KeyPair, KeyPair};

    struct Fixture {
        engine: ConsensusEngine<MemoryProposalStore, StaticDirectory>,
        clock: Arc<ManualClock>,
        keys: Vec<(SignerId, Ed25519KeyPair)>,
    }

    fn fixture(admins: usize) -> Fixture {
        let rng = SystemRandom::new();
        let mut keys = Vec::new();
        let mut records = Vec::new();
        for i in 0..admins {
            let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
            let keypair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
            let id = SignerId(format!("admin{}", i));
            records.push(SignerRecord {
                id: id.clone(),
                address: Address::from_bytes(keypair.public_key().as_ref()).unwrap(),
                admin: true,
                notary: false,
            });
            keys.push((id, keypair));
        }

        let clock = Arc::new(ManualClock::new(1_000_000));
        let engine = ConsensusEngine::new(
            Arc::new(MemoryProposalStore::new()),
            Arc::new(StaticDirectory::new(records)),
            clock.clone(),
        );
        Fixture {
            engine,
            clock,
            keys,
        }
    }

    fn draft() -> ProposalDraft {
        ProposalDraft {
            kind: ProposalKind::BanAccount,
            target_id: "user-9".to_string(),
            title: "Ban user-9".to_string(),
            description: "Repeated forged notarizations".to_string(),
            proposer_id: SignerId("admin0".to_string()),
            scope: ParticipationScope::Admin,
            duration_hours: 24,
        }
    }

    async fn vote(
        fixture: &Fixture,
        proposal_id: u64,
        signer: usize,
        decision: Decision,
        timestamp_ms: u64,
    ) -> EngineResult<Proposal> {
        let (id, keypair) = &fixture.keys[signer];
        let message = canonical_vote_message(proposal_id, decision, timestamp_ms);
        let sig = keypair.sign(message.as_bytes());
        fixture
            .engine
            .cast_vote(proposal_id, id, decision, sig.as_ref(), timestamp_ms)
            .await
    }

    #[tokio::test]
    async fn rejects_empty_title_and_target() {
        let f = fixture(2);
        let mut d = draft();
        d.title = "  ".to_string();
        assert!(matches!(
            f.engine
                .create_proposal(d, ThresholdSnapshot { threshold: 2 })
                .await,
            Err(EngineError::Validation(_))
        ));

        let mut d = draft();
        d.target_id = String::new();
        assert!(matches!(
            f.engine
                .create_proposal(d, ThresholdSnapshot { threshold: 2 })
                .await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn change_threshold_needs_numeric_target() {
        let f = fixture(2);
        let mut d = draft();
        d.kind = ProposalKind::ChangeThreshold;
        d.target_id = "three".to_string();
        assert!(matches!(
            f.engine
                .create_proposal(d, ThresholdSnapshot { threshold: 2 })
                .await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn two_approvals_pass_at_threshold_two() {
        let f = fixture(3);
        let p = f
            .engine
            .create_proposal(draft(), ThresholdSnapshot { threshold: 2 })
            .await
            .unwrap();

        let p1 = vote(&f, p.id, 0, Decision::Approve, 1).await.unwrap();
        assert_eq!(p1.status, ProposalStatus::Active);

        let p2 = vote(&f, p.id, 1, Decision::Approve, 2).await.unwrap();
        assert_eq!(p2.status, ProposalStatus::Passed);
    }

    #[tokio::test]
    async fn revote_replaces_not_duplicates() {
        let f = fixture(3);
        let p = f
            .engine
            .create_proposal(draft(), ThresholdSnapshot { threshold: 2 })
            .await
            .unwrap();

        vote(&f, p.id, 0, Decision::Approve, 1).await.unwrap();
        vote(&f, p.id, 0, Decision::Reject, 2).await.unwrap();
        // The replaced approval must not count: one more approval is not
        // enough to pass on its own.
        let after = vote(&f, p.id, 1, Decision::Approve, 3).await.unwrap();
        assert_eq!(after.status, ProposalStatus::Active);
    }

    #[tokio::test]
    async fn stale_revote_is_rejected() {
        let f = fixture(2);
        let p = f
            .engine
            .create_proposal(draft(), ThresholdSnapshot { threshold: 2 })
            .await
            .unwrap();

        vote(&f, p.id, 0, Decision::Approve, 100).await.unwrap();
        let err = vote(&f, p.id, 0, Decision::Reject, 50).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn majority_rejection_terminates_early() {
        // 3 admins, threshold 2: two rejections leave only one possible
        // approval.
        let f = fixture(3);
        let p = f
            .engine
            .create_proposal(draft(), ThresholdSnapshot { threshold: 2 })
            .await
            .unwrap();

        vote(&f, p.id, 0, Decision::Reject, 1).await.unwrap();
        let after = vote(&f, p.id, 1, Decision::Reject, 2).await.unwrap();
        assert_eq!(after.status, ProposalStatus::Rejected);

        // Terminal: a late approval is refused.
        let err = vote(&f, p.id, 2, Decision::Approve, 3).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyTerminal { .. }));
    }

    #[tokio::test]
    async fn outsider_cannot_vote() {
        let f = fixture(2);
        let p = f
            .engine
            .create_proposal(draft(), ThresholdSnapshot { threshold: 2 })
            .await
            .unwrap();

        let err = f
            .engine
            .cast_vote(
                p.id,
                &SignerId("mallory".to_string()),
                Decision::Approve,
                &[0u8; 64],
                1,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotEligible { .. }));
    }

    #[tokio::test]
    async fn bad_signature_is_refused() {
        let f = fixture(2);
        let p = f
            .engine
            .create_proposal(draft(), ThresholdSnapshot { threshold: 2 })
            .await
            .unwrap();

        // Signature over a different timestamp than the one submitted.
        let (id, keypair) = &f.keys[0];
        let message = canonical_vote_message(p.id, Decision::Approve, 999);
        let sig = keypair.sign(message.as_bytes());
        let err = f
            .engine
            .cast_vote(p.id, id, Decision::Approve, sig.as_ref(), 1000)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSignature));
    }

    #[tokio::test]
    async fn voting_after_expiry_fails() {
        let f = fixture(2);
        let p = f
            .engine
            .create_proposal(draft(), ThresholdSnapshot { threshold: 2 })
            .await
            .unwrap();

        f.clock.advance(25 * 3600);
        let err = vote(&f, p.id, 0, Decision::Approve, 1).await.unwrap_err();
        assert!(matches!(err, EngineError::Expired(_)));
    }

    #[tokio::test]
    async fn expiry_sweep_rejects_underfunded_proposals() {
        let f = fixture(2);
        let mut d = draft();
        d.duration_hours = 1;
        let p = f
            .engine
            .create_proposal(d, ThresholdSnapshot { threshold: 2 })
            .await
            .unwrap();

        vote(&f, p.id, 0, Decision::Approve, 1).await.unwrap();

        // Two hours later, only 1 of 2 required approvals.
        let later = f.clock.now_unix() + 2 * 3600;
        let swept = f.engine.expire_stale(later).await.unwrap();
        assert_eq!(swept, 1);
        let after = f.engine.proposal(p.id).await.unwrap();
        assert_eq!(after.status, ProposalStatus::Rejected);

        // Idempotent: a second sweep is a no-op.
        assert_eq!(f.engine.expire_stale(later).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mark_executed_requires_passed() {
        let f = fixture(2);
        let p = f
            .engine
            .create_proposal(draft(), ThresholdSnapshot { threshold: 2 })
            .await
            .unwrap();

        let err = f.engine.mark_executed(p.id).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        vote(&f, p.id, 0, Decision::Approve, 1).await.unwrap();
        vote(&f, p.id, 1, Decision::Approve, 2).await.unwrap();
        let executed = f.engine.mark_executed(p.id).await.unwrap();
        assert_eq!(executed.status, ProposalStatus::Executed);

        // Idempotent once executed.
        let again = f.engine.mark_executed(p.id).await.unwrap();
        assert_eq!(again.status, ProposalStatus::Executed);
    }

    #[tokio::test]
    async fn alert_count_tracks_active_proposals() {
        let f = fixture(3);
        assert_eq!(f.engine.alert_count().await.unwrap(), 0);

        let p = f
            .engine
            .create_proposal(draft(), ThresholdSnapshot { threshold: 2 })
            .await
            .unwrap();
        f.engine
            .create_proposal(draft(), ThresholdSnapshot { threshold: 2 })
            .await
            .unwrap();
        assert_eq!(f.engine.alert_count().await.unwrap(), 2);

        vote(&f, p.id, 0, Decision::Approve, 1).await.unwrap();
        vote(&f, p.id, 1, Decision::Approve, 2).await.unwrap();
        assert_eq!(f.engine.alert_count().await.unwrap(), 1);
    }
}
