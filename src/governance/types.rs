//! Governance data model: proposals, votes, and tallies.

use crate::identity::SignerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Administrative action a proposal authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalKind {
    AddSigner,
    RemoveSigner,
    ChangeThreshold,
    BanAccount,
    UnbanAccount,
    SystemUpgrade,
    Custom,
}

impl ProposalKind {
    /// Kinds whose target must parse as an integer parameter.
    pub fn requires_numeric_target(&self) -> bool {
        matches!(self, ProposalKind::ChangeThreshold)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalKind::AddSigner => "add_signer",
            ProposalKind::RemoveSigner => "remove_signer",
            ProposalKind::ChangeThreshold => "change_threshold",
            ProposalKind::BanAccount => "ban_account",
            ProposalKind::UnbanAccount => "unban_account",
            ProposalKind::SystemUpgrade => "system_upgrade",
            ProposalKind::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add_signer" => Some(ProposalKind::AddSigner),
            "remove_signer" => Some(ProposalKind::RemoveSigner),
            "change_threshold" => Some(ProposalKind::ChangeThreshold),
            "ban_account" => Some(ProposalKind::BanAccount),
            "unban_account" => Some(ProposalKind::UnbanAccount),
            "system_upgrade" => Some(ProposalKind::SystemUpgrade),
            "custom" => Some(ProposalKind::Custom),
            _ => None,
        }
    }
}

/// Proposal status state machine.
///
/// ```text
/// active --(approvals >= threshold)--------> passed
/// active --(threshold unreachable|expired)-> rejected
/// passed --(on-chain execution observed)---> executed
/// ```
///
/// `rejected` and `executed` are terminal; no transition ever returns a
/// proposal to `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Active,
    Passed,
    Rejected,
    Executed,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalStatus::Rejected | ProposalStatus::Executed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Active => "active",
            ProposalStatus::Passed => "passed",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Executed => "executed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ProposalStatus::Active),
            "passed" => Some(ProposalStatus::Passed),
            "rejected" => Some(ProposalStatus::Rejected),
            "executed" => Some(ProposalStatus::Executed),
            _ => None,
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which signer population may vote on a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationScope {
    Admin,
    Notary,
    All,
}

impl ParticipationScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipationScope::Admin => "admin",
            ParticipationScope::Notary => "notary",
            ParticipationScope::All => "all",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(ParticipationScope::Admin),
            "notary" => Some(ParticipationScope::Notary),
            "all" => Some(ParticipationScope::All),
            _ => None,
        }
    }
}

/// A voter's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(Decision::Approve),
            "reject" => Some(Decision::Reject),
            _ => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An off-chain record of a proposed administrative action awaiting
/// threshold approval.
///
/// `threshold` is snapshotted from system settings at creation so a later
/// threshold change never retroactively alters an in-flight proposal. The
/// `on_chain_*` fields mirror observed chain state and are never the source
/// of truth for off-chain status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub kind: ProposalKind,
    pub target_id: String,
    pub title: String,
    pub description: String,
    pub proposer_id: SignerId,
    pub status: ProposalStatus,
    pub threshold: u32,
    pub scope: ParticipationScope,
    pub created_at: u64,
    pub expires_at: u64,
    pub on_chain_tx_index: Option<u64>,
    pub on_chain_submission_time: Option<u64>,
    pub on_chain_confirmations: u32,
    pub on_chain_executed: bool,
}

/// Caller-supplied fields for a new proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub kind: ProposalKind,
    pub target_id: String,
    pub title: String,
    pub description: String,
    pub proposer_id: SignerId,
    pub scope: ParticipationScope,
    pub duration_hours: u64,
}

/// One signer's vote on one proposal.
///
/// `(proposal_id, voter_id)` is the composite key: re-voting while the
/// proposal is active replaces the prior vote, it never duplicates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub proposal_id: u64,
    pub voter_id: SignerId,
    pub decision: Decision,
    pub signature: Vec<u8>,
    pub cast_at_ms: u64,
}

/// Vote counts for a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub approvals: u32,
    pub rejections: u32,
}

/// Count decisions over the current vote set.
///
/// The input is one vote per voter (the store enforces the composite key),
/// so the result is a total, order-independent function of the set.
pub fn tally(votes: &[Vote]) -> Tally {
    let mut t = Tally::default();
    for vote in votes {
        match vote.decision {
            Decision::Approve => t.approvals += 1,
            Decision::Reject => t.rejections += 1,
        }
    }
    t
}

/// Terminal status implied by a tally, if any.
///
/// - `approvals >= threshold` passes the proposal.
/// - Once `rejections > eligible - threshold` the threshold can no longer be
///   reached even if every remaining eligible signer approves, so the
///   proposal is rejected early.
pub fn resolve_status(tally: &Tally, threshold: u32, eligible: u32) -> Option<ProposalStatus> {
    if tally.approvals >= threshold {
        return Some(ProposalStatus::Passed);
    }
    if tally.rejections > eligible.saturating_sub(threshold) {
        return Some(ProposalStatus::Rejected);
    }
    None
}
