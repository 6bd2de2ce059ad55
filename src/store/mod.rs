//! Durable stores for proposals, votes, and signing sessions.
//!
//! Pure data access, no policy: status transition rules live in the
//! consensus engine and the signing broker. The traits do expose *guarded*
//! writes (`transition_status`, `complete_session`) because the exclusivity
//! invariants require the conditional check and the write to be one atomic
//! operation against the store, not a read-then-write in the caller.

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryProposalStore, MemorySessionStore};
pub use sqlite::SqliteStore;

use crate::governance::types::{Proposal, ProposalStatus, Vote};
use crate::remote::session::{SessionId, SessionStatus, SigningResult, SigningSession};
use crate::serialization::SerializationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("stored blob is corrupt: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<SerializationError> for StoreError {
    fn from(e: SerializationError) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

/// Observed on-chain state mirrored onto a proposal row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMirror {
    pub submission_time: Option<u64>,
    pub confirmations: u32,
    pub executed: bool,
}

/// Outcome of an atomic session completion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompleteOutcome {
    /// This call won the pending -> terminal transition.
    Completed,
    /// The session exists but was already terminal.
    NotPending,
    /// No such session.
    Missing,
}

/// Durable record of proposals and their votes.
#[async_trait]
pub trait ProposalStore: Send + Sync {
    /// Persist a new proposal. The store assigns the id; the returned
    /// proposal carries it.
    async fn insert_proposal(&self, proposal: Proposal) -> StoreResult<Proposal>;

    async fn proposal(&self, id: u64) -> StoreResult<Option<Proposal>>;

    /// All proposals, newest first.
    async fn proposals(&self) -> StoreResult<Vec<Proposal>>;

    async fn proposals_with_status(&self, status: ProposalStatus) -> StoreResult<Vec<Proposal>>;

    /// Guarded status transition: succeeds (returns `true`) only if the
    /// current status equals `from`. This is what keeps transitions
    /// monotonic under concurrent writers.
    async fn transition_status(
        &self,
        id: u64,
        from: ProposalStatus,
        to: ProposalStatus,
    ) -> StoreResult<bool>;

    /// Record the multi-sig queue index once the proposal is bridged.
    async fn set_on_chain_index(&self, id: u64, tx_index: u64) -> StoreResult<()>;

    /// Refresh the mirrored on-chain fields.
    async fn update_chain_mirror(&self, id: u64, mirror: &ChainMirror) -> StoreResult<()>;

    /// Insert or replace the vote for `(vote.proposal_id, vote.voter_id)`.
    async fn upsert_vote(&self, vote: &Vote) -> StoreResult<()>;

    /// Current vote set for a proposal (one row per voter).
    async fn votes(&self, proposal_id: u64) -> StoreResult<Vec<Vote>>;
}

/// Ephemeral signing session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: &SigningSession) -> StoreResult<()>;

    async fn session(&self, id: &SessionId) -> StoreResult<Option<SigningSession>>;

    /// Atomic `pending -> terminal` transition. `status` must be
    /// `Authorized` or `Failed`; exactly one concurrent caller observes
    /// `Completed`.
    async fn complete_session(
        &self,
        id: &SessionId,
        status: SessionStatus,
        result: Option<SigningResult>,
        failure: Option<String>,
    ) -> StoreResult<CompleteOutcome>;

    /// Lazy `pending -> expired` transition; returns whether this call
    /// performed it.
    async fn expire_session(&self, id: &SessionId) -> StoreResult<bool>;

    /// Delete sessions whose expiry is older than `cutoff`. Returns the
    /// number removed.
    async fn purge_sessions(&self, cutoff: u64) -> StoreResult<u64>;
}
