//! Integration tests for the on-chain bridge.
//!
//! Exercises the timelock/quorum gates with explicit timestamps, the
//! relay-failure contract (status never mutated by a failed relay), and
//! mirror synchronization.

use async_trait::async_trait;
use bbsns_governance::chain::{
    BridgeError, ChainClient, ChainError, ChainResult, MockMultiSig, MultiSigTransaction,
    OnChainBridge, SignedConfirmation, SignedSubmission, SystemSettings, TxHash, TypedData,
    TypedDomain,
};
use bbsns_governance::governance::{ParticipationScope, Proposal, ProposalKind, ProposalStatus};
use bbsns_governance::identity::{Address, SignerId};
use bbsns_governance::store::{MemoryProposalStore, ProposalStore};
use bbsns_governance::time::ManualClock;
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use std::sync::Arc;

fn settings_for(signers: &[Address], threshold: u32, delay: u64) -> SystemSettings {
    SystemSettings {
        threshold,
        signers: signers.to_vec(),
        timelock_delay_secs: delay,
        signer_version: 1,
        chain_id: 1337,
        verifying_contract: Address::from_bytes(&[0xcc; 32]).unwrap(),
        domain_version: "1".to_string(),
    }
}

fn keypairs(count: usize) -> Vec<(Ed25519KeyPair, Address)> {
    let rng = SystemRandom::new();
    (0..count)
        .map(|_| {
            let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
            let keypair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
            let address = Address::from_bytes(keypair.public_key().as_ref()).unwrap();
            (keypair, address)
        })
        .collect()
}

fn passed_proposal() -> Proposal {
    Proposal {
        id: 0,
        kind: ProposalKind::BanAccount,
        target_id: "user-9".to_string(),
        title: "Ban user-9".to_string(),
        description: "bridge test".to_string(),
        proposer_id: SignerId("admin0".to_string()),
        status: ProposalStatus::Passed,
        threshold: 2,
        scope: ParticipationScope::Admin,
        created_at: 500,
        expires_at: 90_000,
        on_chain_tx_index: None,
        on_chain_submission_time: None,
        on_chain_confirmations: 0,
        on_chain_executed: false,
    }
}

/// Submit the stored proposal through the bridge and confirm it with the
/// given signers. Returns the queue index.
async fn submit_and_confirm(
    bridge: &OnChainBridge<MemoryProposalStore, MockMultiSig>,
    chain: &MockMultiSig,
    proposal: &Proposal,
    signers: &[(Ed25519KeyPair, Address)],
    confirmers: usize,
) -> u64 {
    let payload = bridge.prepare_submission(proposal).await.unwrap();
    let (keypair, address) = &signers[0];
    let signature = keypair.sign(&payload.digest()).as_ref().to_vec();
    let tx_index = bridge
        .relay_submission(proposal.id, *address, signature)
        .await
        .unwrap();

    let settings = chain.settings().await.unwrap();
    for (keypair, address) in &signers[..confirmers] {
        let payload = TypedData::confirmation(
            TypedDomain::from_settings(&settings),
            tx_index,
            settings.signer_version,
        );
        let signature = keypair.sign(&payload.digest()).as_ref().to_vec();
        bridge
            .relay_confirmation(tx_index, settings.signer_version, *address, signature)
            .await
            .unwrap();
    }
    tx_index
}

#[tokio::test]
async fn timelock_gate_with_explicit_timestamps() {
    // Submission lands at t=1000 with a 3600s delay; execution at t=1500
    // must fail with 3100s remaining, and succeed at t=4700.
    let signers = keypairs(3);
    let addresses: Vec<Address> = signers.iter().map(|(_, a)| *a).collect();
    let clock = Arc::new(ManualClock::new(1000));
    let store = Arc::new(MemoryProposalStore::new());
    let chain = Arc::new(MockMultiSig::new(
        settings_for(&addresses, 2, 3600),
        clock.clone(),
    ));
    let bridge = OnChainBridge::new(store.clone(), chain.clone(), clock.clone());

    let proposal = store.insert_proposal(passed_proposal()).await.unwrap();
    let tx_index = submit_and_confirm(&bridge, &chain, &proposal, &signers, 2).await;

    clock.set(1500);
    match bridge.execute(tx_index).await.unwrap_err() {
        BridgeError::TimelockActive { remaining } => assert_eq!(remaining, 3100),
        other => panic!("expected timelock error, got {other}"),
    }

    clock.set(4700);
    let hash = bridge.execute(tx_index).await.unwrap();
    assert!(hash.0.starts_with("0x"));

    // Executing twice is refused.
    assert!(matches!(
        bridge.execute(tx_index).await.unwrap_err(),
        BridgeError::AlreadyExecuted
    ));
}

#[tokio::test]
async fn quorum_checked_against_fresh_chain_state() {
    let signers = keypairs(3);
    let addresses: Vec<Address> = signers.iter().map(|(_, a)| *a).collect();
    let clock = Arc::new(ManualClock::new(1000));
    let store = Arc::new(MemoryProposalStore::new());
    let chain = Arc::new(MockMultiSig::new(
        settings_for(&addresses, 2, 0),
        clock.clone(),
    ));
    let bridge = OnChainBridge::new(store.clone(), chain.clone(), clock.clone());

    let proposal = store.insert_proposal(passed_proposal()).await.unwrap();
    let tx_index = submit_and_confirm(&bridge, &chain, &proposal, &signers, 1).await;

    match bridge.execute(tx_index).await.unwrap_err() {
        BridgeError::QuorumNotMet {
            confirmations,
            threshold,
        } => {
            assert_eq!(confirmations, 1);
            assert_eq!(threshold, 2);
        }
        other => panic!("expected quorum error, got {other}"),
    }

    // A revoked confirmation also shows up on the next refresh.
    let mirror = bridge.refresh_mirror(tx_index).await.unwrap();
    assert_eq!(mirror.num_confirmations, 1);
    bridge
        .revoke_confirmation(tx_index, &addresses[0])
        .await
        .unwrap();
    let mirror = bridge.refresh_mirror(tx_index).await.unwrap();
    assert_eq!(mirror.num_confirmations, 0);

    // Revoking without a prior confirmation is its own error.
    assert!(matches!(
        bridge
            .revoke_confirmation(tx_index, &addresses[2])
            .await
            .unwrap_err(),
        BridgeError::NotConfirmed
    ));
}

#[tokio::test]
async fn sync_proposal_mirrors_and_promotes() {
    let signers = keypairs(3);
    let addresses: Vec<Address> = signers.iter().map(|(_, a)| *a).collect();
    let clock = Arc::new(ManualClock::new(1000));
    let store = Arc::new(MemoryProposalStore::new());
    let chain = Arc::new(MockMultiSig::new(
        settings_for(&addresses, 2, 0),
        clock.clone(),
    ));
    let bridge = OnChainBridge::new(store.clone(), chain.clone(), clock.clone());

    let proposal = store.insert_proposal(passed_proposal()).await.unwrap();
    let tx_index = submit_and_confirm(&bridge, &chain, &proposal, &signers, 2).await;

    // Before execution: mirror fields update, status stays passed.
    let synced = bridge.sync_proposal(proposal.id).await.unwrap();
    assert_eq!(synced.status, ProposalStatus::Passed);
    assert_eq!(synced.on_chain_confirmations, 2);
    assert_eq!(synced.on_chain_submission_time, Some(1000));
    assert!(!synced.on_chain_executed);

    bridge.execute(tx_index).await.unwrap();
    let synced = bridge.sync_proposal(proposal.id).await.unwrap();
    assert_eq!(synced.status, ProposalStatus::Executed);
    assert!(synced.on_chain_executed);
}

/// Chain client whose relay calls always fail at the transport layer.
struct UnreachableChain {
    settings: SystemSettings,
}

#[async_trait]
impl ChainClient for UnreachableChain {
    async fn settings(&self) -> ChainResult<SystemSettings> {
        Ok(self.settings.clone())
    }

    async fn submit_transaction(&self, _submission: &SignedSubmission) -> ChainResult<u64> {
        Err(ChainError::Transport("connection refused".to_string()))
    }

    async fn confirm_transaction(&self, _confirmation: &SignedConfirmation) -> ChainResult<()> {
        Err(ChainError::Transport("connection refused".to_string()))
    }

    async fn revoke_confirmation(&self, _tx_index: u64, _signer: &Address) -> ChainResult<()> {
        Err(ChainError::Transport("connection refused".to_string()))
    }

    async fn execute_transaction(&self, _tx_index: u64) -> ChainResult<TxHash> {
        Err(ChainError::Transport("connection refused".to_string()))
    }

    async fn transaction(&self, _tx_index: u64) -> ChainResult<MultiSigTransaction> {
        Err(ChainError::Transport("connection refused".to_string()))
    }

    async fn transactions(&self) -> ChainResult<Vec<MultiSigTransaction>> {
        Err(ChainError::Transport("connection refused".to_string()))
    }
}

#[tokio::test]
async fn failed_relay_never_mutates_proposal_state() {
    let signers = keypairs(2);
    let addresses: Vec<Address> = signers.iter().map(|(_, a)| *a).collect();
    let clock = Arc::new(ManualClock::new(1000));
    let store = Arc::new(MemoryProposalStore::new());
    let chain = Arc::new(UnreachableChain {
        settings: settings_for(&addresses, 2, 3600),
    });
    let bridge = OnChainBridge::new(store.clone(), chain, clock);

    let proposal = store.insert_proposal(passed_proposal()).await.unwrap();
    let payload = bridge.prepare_submission(&proposal).await.unwrap();
    let signature = signers[0].0.sign(&payload.digest()).as_ref().to_vec();

    let err = bridge
        .relay_submission(proposal.id, addresses[0], signature)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Relay(ChainError::Transport(_))));

    // The off-chain record is untouched: still passed, still unsubmitted.
    let after = store.proposal(proposal.id).await.unwrap().unwrap();
    assert_eq!(after.status, ProposalStatus::Passed);
    assert_eq!(after.on_chain_tx_index, None);
}

#[tokio::test]
async fn unsubmitted_proposal_cannot_sync_or_confirm() {
    let signers = keypairs(2);
    let addresses: Vec<Address> = signers.iter().map(|(_, a)| *a).collect();
    let clock = Arc::new(ManualClock::new(1000));
    let store = Arc::new(MemoryProposalStore::new());
    let chain = Arc::new(MockMultiSig::new(
        settings_for(&addresses, 2, 0),
        clock.clone(),
    ));
    let bridge = OnChainBridge::new(store.clone(), chain, clock);

    let proposal = store.insert_proposal(passed_proposal()).await.unwrap();

    assert!(matches!(
        bridge.sync_proposal(proposal.id).await.unwrap_err(),
        BridgeError::NotSubmitted(_)
    ));
    assert!(matches!(
        bridge.prepare_confirmation(&proposal, 1).await.unwrap_err(),
        BridgeError::NotSubmitted(_)
    ));
}
