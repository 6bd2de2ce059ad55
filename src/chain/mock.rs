//! In-process multi-sig contract for tests and local development.
//!
//! Enforces the same rules the deployed contract does: submitter and
//! confirmers must be in the signer set, signatures must verify over the
//! typed-data digest, confirmation signatures must bind the current signer
//! set version, and execution requires threshold confirmations plus an
//! elapsed timelock.

use crate::chain::traits::{
    ChainClient, ChainError, ChainResult, MultiSigTransaction, SignedConfirmation,
    SignedSubmission, SystemSettings, TxHash,
};
use crate::chain::typed_data::{TypedData, TypedDomain};
use crate::crypto::verify_signature;
use crate::identity::Address;
use crate::timelock;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};

pub struct MockMultiSig {
    inner: Mutex<Inner>,
    clock: Arc<dyn crate::time::Clock>,
}

struct Inner {
    settings: SystemSettings,
    transactions: Vec<TxRecord>,
}

struct TxRecord {
    to: Address,
    value: u64,
    data: Vec<u8>,
    submission_time: u64,
    executed: bool,
    confirmations: Vec<Address>,
}

impl MockMultiSig {
    pub fn new(settings: SystemSettings, clock: Arc<dyn crate::time::Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                settings,
                transactions: Vec::new(),
            }),
            clock,
        }
    }

    /// Simulate a signer-set change: bumps the version so confirmation
    /// signatures bound to the old set stop verifying.
    pub fn bump_signer_version(&self) {
        self.inner.lock().unwrap().settings.signer_version += 1;
    }

    fn mirror(record: &TxRecord, index: u64) -> MultiSigTransaction {
        MultiSigTransaction {
            index,
            to: record.to,
            value: record.value,
            data: record.data.clone(),
            submission_time: record.submission_time,
            num_confirmations: record.confirmations.len() as u32,
            executed: record.executed,
            confirmations: record.confirmations.clone(),
        }
    }
}

#[async_trait]
impl ChainClient for MockMultiSig {
    async fn settings(&self) -> ChainResult<SystemSettings> {
        Ok(self.inner.lock().unwrap().settings.clone())
    }

    async fn submit_transaction(&self, submission: &SignedSubmission) -> ChainResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.settings.signers.contains(&submission.signer) {
            return Err(ChainError::NotASigner);
        }

        let payload = TypedData::submission(
            TypedDomain::from_settings(&inner.settings),
            &submission.to,
            submission.value,
            &submission.data,
        );
        verify_signature(&submission.signer, &payload.digest(), &submission.signature)
            .map_err(|_| ChainError::BadSignature)?;

        let index = inner.transactions.len() as u64;
        inner.transactions.push(TxRecord {
            to: submission.to,
            value: submission.value,
            data: submission.data.clone(),
            submission_time: self.clock.now_unix(),
            executed: false,
            confirmations: Vec::new(),
        });
        Ok(index)
    }

    async fn confirm_transaction(&self, confirmation: &SignedConfirmation) -> ChainResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.settings.signers.contains(&confirmation.signer) {
            return Err(ChainError::NotASigner);
        }
        if confirmation.signer_version != inner.settings.signer_version {
            return Err(ChainError::StaleSignerVersion {
                got: confirmation.signer_version,
                current: inner.settings.signer_version,
            });
        }

        let payload = TypedData::confirmation(
            TypedDomain::from_settings(&inner.settings),
            confirmation.tx_index,
            confirmation.signer_version,
        );
        verify_signature(
            &confirmation.signer,
            &payload.digest(),
            &confirmation.signature,
        )
        .map_err(|_| ChainError::BadSignature)?;

        let record = inner
            .transactions
            .get_mut(confirmation.tx_index as usize)
            .ok_or(ChainError::UnknownTransaction(confirmation.tx_index))?;
        if record.executed {
            return Err(ChainError::AlreadyExecuted);
        }
        if record.confirmations.contains(&confirmation.signer) {
            return Err(ChainError::AlreadyConfirmed);
        }
        record.confirmations.push(confirmation.signer);
        Ok(())
    }

    async fn revoke_confirmation(&self, tx_index: u64, signer: &Address) -> ChainResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .transactions
            .get_mut(tx_index as usize)
            .ok_or(ChainError::UnknownTransaction(tx_index))?;
        if record.executed {
            return Err(ChainError::AlreadyExecuted);
        }
        let position = record
            .confirmations
            .iter()
            .position(|c| c == signer)
            .ok_or(ChainError::NotConfirmed)?;
        record.confirmations.remove(position);
        Ok(())
    }

    async fn execute_transaction(&self, tx_index: u64) -> ChainResult<TxHash> {
        let now = self.clock.now_unix();
        let mut inner = self.inner.lock().unwrap();
        let threshold = inner.settings.threshold;
        let delay = inner.settings.timelock_delay_secs;

        let record = inner
            .transactions
            .get_mut(tx_index as usize)
            .ok_or(ChainError::UnknownTransaction(tx_index))?;
        if record.executed {
            return Err(ChainError::AlreadyExecuted);
        }
        if (record.confirmations.len() as u32) < threshold {
            return Err(ChainError::InsufficientConfirmations);
        }
        if timelock::is_locked(record.submission_time, delay, now, record.executed) {
            return Err(ChainError::TimelockActive);
        }

        record.executed = true;
        let mut hasher = Sha256::new();
        hasher.update(tx_index.to_be_bytes());
        hasher.update(record.submission_time.to_be_bytes());
        hasher.update(now.to_be_bytes());
        Ok(TxHash(format!("0x{}", hex::encode(hasher.finalize()))))
    }

    async fn transaction(&self, tx_index: u64) -> ChainResult<MultiSigTransaction> {
        let inner = self.inner.lock().unwrap();
        inner
            .transactions
            .get(tx_index as usize)
            .map(|r| Self::mirror(r, tx_index))
            .ok_or(ChainError::UnknownTransaction(tx_index))
    }

    async fn transactions(&self) -> ChainResult<Vec<MultiSigTransaction>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .transactions
            .iter()
            .enumerate()
            .map(|(i, r)| Self::mirror(r, i as u64))
            .collect())
    }
}
