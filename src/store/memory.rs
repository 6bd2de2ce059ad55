//! In-memory store implementations.
//!
//! Used by tests and single-process deployments that do not need the state
//! to survive a restart. Mutations hold a plain mutex for their full
//! duration, which gives the same atomicity the SQLite stores get from
//! conditional updates.

use super::{ChainMirror, CompleteOutcome, ProposalStore, SessionStore, StoreResult};
use crate::governance::types::{Proposal, ProposalStatus, Vote};
use crate::identity::SignerId;
use crate::remote::session::{SessionId, SessionStatus, SigningResult, SigningSession};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// In-memory proposal + vote store.
#[derive(Default)]
pub struct MemoryProposalStore {
    inner: Mutex<ProposalsInner>,
}

#[derive(Default)]
struct ProposalsInner {
    next_id: u64,
    proposals: BTreeMap<u64, Proposal>,
    // Per-proposal vote map keyed by voter id; BTreeMap keeps iteration
    // deterministic for tests.
    votes: HashMap<u64, BTreeMap<SignerId, Vote>>,
}

impl MemoryProposalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProposalStore for MemoryProposalStore {
    async fn insert_proposal(&self, mut proposal: Proposal) -> StoreResult<Proposal> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        proposal.id = inner.next_id;
        inner.proposals.insert(proposal.id, proposal.clone());
        Ok(proposal)
    }

    async fn proposal(&self, id: u64) -> StoreResult<Option<Proposal>> {
        Ok(self.inner.lock().unwrap().proposals.get(&id).cloned())
    }

    async fn proposals(&self) -> StoreResult<Vec<Proposal>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.proposals.values().rev().cloned().collect())
    }

    async fn proposals_with_status(&self, status: ProposalStatus) -> StoreResult<Vec<Proposal>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .proposals
            .values()
            .rev()
            .filter(|p| p.status == status)
            .cloned()
            .collect())
    }

    async fn transition_status(
        &self,
        id: u64,
        from: ProposalStatus,
        to: ProposalStatus,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.proposals.get_mut(&id) {
            Some(p) if p.status == from => {
                p.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_on_chain_index(&self, id: u64, tx_index: u64) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner.proposals.get_mut(&id) {
            p.on_chain_tx_index = Some(tx_index);
        }
        Ok(())
    }

    async fn update_chain_mirror(&self, id: u64, mirror: &ChainMirror) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(p) = inner.proposals.get_mut(&id) {
            p.on_chain_submission_time = mirror.submission_time;
            p.on_chain_confirmations = mirror.confirmations;
            p.on_chain_executed = mirror.executed;
        }
        Ok(())
    }

    async fn upsert_vote(&self, vote: &Vote) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .votes
            .entry(vote.proposal_id)
            .or_default()
            .insert(vote.voter_id.clone(), vote.clone());
        Ok(())
    }

    async fn votes(&self, proposal_id: u64) -> StoreResult<Vec<Vote>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .votes
            .get(&proposal_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// In-memory signing session store.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<HashMap<SessionId, SigningSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert_session(&self, session: &SigningSession) -> StoreResult<()> {
        self.inner
            .lock()
            .unwrap()
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn session(&self, id: &SessionId) -> StoreResult<Option<SigningSession>> {
        Ok(self.inner.lock().unwrap().get(id).cloned())
    }

    async fn complete_session(
        &self,
        id: &SessionId,
        status: SessionStatus,
        result: Option<SigningResult>,
        failure: Option<String>,
    ) -> StoreResult<CompleteOutcome> {
        let mut inner = self.inner.lock().unwrap();
        match inner.get_mut(id) {
            None => Ok(CompleteOutcome::Missing),
            Some(s) if s.status != SessionStatus::Pending => Ok(CompleteOutcome::NotPending),
            Some(s) => {
                s.status = status;
                s.result = result;
                s.failure = failure;
                Ok(CompleteOutcome::Completed)
            }
        }
    }

    async fn expire_session(&self, id: &SessionId) -> StoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.get_mut(id) {
            Some(s) if s.status == SessionStatus::Pending => {
                s.status = SessionStatus::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_sessions(&self, cutoff: u64) -> StoreResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.len();
        inner.retain(|_, s| s.expires_at >= cutoff);
        Ok((before - inner.len()) as u64)
    }
}
