//! Property-based tests for vote tallying and the timelock gate.
//!
//! Properties:
//! - Tallying: the final status is a function of the final (voter -> decision)
//!   map only, never of arrival order
//! - Replacement: one vote per voter survives, replays are idempotent
//! - Timelock: remaining delay is never negative and hits zero exactly at
//!   the deadline

use super::types::{resolve_status, tally, Decision, ProposalStatus, Vote};
use crate::identity::SignerId;
use crate::timelock;
use proptest::prelude::*;
use std::collections::BTreeMap;

/// One incoming vote event: (voter index, approve?, timestamp).
type VoteEvent = (u8, bool, u64);

/// Apply vote events with the engine's upsert rule: a vote replaces the
/// voter's prior vote unless its timestamp is older (stale votes are
/// dropped).
fn apply_events(events: &[VoteEvent]) -> Vec<Vote> {
    let mut per_voter: BTreeMap<u8, Vote> = BTreeMap::new();
    for &(voter, approve, ts) in events {
        let stale = per_voter
            .get(&voter)
            .map(|prior| ts < prior.cast_at_ms)
            .unwrap_or(false);
        if stale {
            continue;
        }
        per_voter.insert(
            voter,
            Vote {
                proposal_id: 1,
                voter_id: SignerId(format!("signer-{}", voter)),
                decision: if approve {
                    Decision::Approve
                } else {
                    Decision::Reject
                },
                signature: Vec::new(),
                cast_at_ms: ts,
            },
        );
    }
    per_voter.into_values().collect()
}

/// Vote event sequences with globally unique timestamps (the engine never
/// accepts two votes with the same timestamp from one voter; uniqueness
/// keeps the expected outcome well-defined under reordering).
fn event_sequences() -> impl Strategy<Value = Vec<VoteEvent>> {
    prop::collection::vec((0u8..6, any::<bool>(), 0u64..1000), 0..40).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (voter, approve, ts))| (voter, approve, ts * 64 + i as u64))
            .collect()
    })
}

proptest! {
    /// Property: arrival order does not matter
    /// Applying the same events forwards and backwards yields the same
    /// tally and the same resolved status.
    #[test]
    fn tally_is_order_independent(
        events in event_sequences(),
        threshold in 1u32..6,
        eligible in 1u32..10,
    ) {
        let forward = apply_events(&events);
        let mut reversed_events = events.clone();
        reversed_events.reverse();
        let backward = apply_events(&reversed_events);

        prop_assert_eq!(tally(&forward), tally(&backward));
        prop_assert_eq!(
            resolve_status(&tally(&forward), threshold, eligible),
            resolve_status(&tally(&backward), threshold, eligible)
        );
    }

    /// Property: replaying accepted events never double-counts
    #[test]
    fn replay_is_idempotent(events in event_sequences()) {
        let once = apply_events(&events);

        let mut doubled = events.clone();
        doubled.extend_from_slice(&events);
        let twice = apply_events(&doubled);

        prop_assert_eq!(tally(&once), tally(&twice));
    }

    /// Property: one vote per voter
    #[test]
    fn at_most_one_vote_per_voter(events in event_sequences()) {
        let votes = apply_events(&events);
        let mut voters: Vec<&SignerId> = votes.iter().map(|v| &v.voter_id).collect();
        let before = voters.len();
        voters.dedup();
        prop_assert_eq!(voters.len(), before);
    }

    /// Property: reaching threshold always passes, and a passed tally can
    /// never also satisfy the rejection rule's outcome
    #[test]
    fn threshold_reached_implies_passed(
        events in event_sequences(),
        threshold in 1u32..6,
    ) {
        let votes = apply_events(&events);
        let counts = tally(&votes);
        // Population large enough that rejection cannot pre-empt.
        let eligible = counts.approvals + counts.rejections + threshold;

        if counts.approvals >= threshold {
            prop_assert_eq!(
                resolve_status(&counts, threshold, eligible),
                Some(ProposalStatus::Passed)
            );
        }
    }

    /// Property: remaining delay is never negative and zero past deadline
    #[test]
    fn timelock_remaining_is_clamped(
        submission in 0u64..1_000_000,
        delay in 0u64..1_000_000,
        offset in 0u64..2_000_000,
    ) {
        let now = submission + offset;
        let remaining = timelock::remaining(submission, delay, now);

        prop_assert!(remaining <= delay);
        if offset >= delay {
            prop_assert_eq!(remaining, 0);
            prop_assert!(!timelock::is_locked(submission, delay, now, false));
        } else {
            prop_assert_eq!(remaining, delay - offset);
        }
    }
}
