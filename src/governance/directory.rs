//! Signer directory abstraction.
//!
//! Resolves voter identities to their on-record signing addresses and roles,
//! and reports how many signers are eligible for a given participation
//! scope. The eligible count feeds the early-rejection rule, so it must
//! reflect the same population that eligibility checks use.

use crate::governance::types::ParticipationScope;
use crate::identity::{SignerId, SignerRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Directory errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory lookup failed: {0}")]
    Lookup(String),
}

/// Source of signer records.
#[async_trait]
pub trait SignerDirectory: Send + Sync {
    /// Resolve a signer by account id. `None` means unknown.
    async fn lookup(&self, id: &SignerId) -> DirectoryResult<Option<SignerRecord>>;

    /// Number of signers eligible to vote under `scope`.
    async fn eligible_count(&self, scope: ParticipationScope) -> DirectoryResult<u32>;
}

/// Fixed in-memory directory, built once from configuration or the on-chain
/// signer set.
pub struct StaticDirectory {
    records: HashMap<SignerId, SignerRecord>,
}

impl StaticDirectory {
    pub fn new(records: Vec<SignerRecord>) -> Self {
        let records = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self { records }
    }
}

#[async_trait]
impl SignerDirectory for StaticDirectory {
    async fn lookup(&self, id: &SignerId) -> DirectoryResult<Option<SignerRecord>> {
        Ok(self.records.get(id).cloned())
    }

    async fn eligible_count(&self, scope: ParticipationScope) -> DirectoryResult<u32> {
        Ok(self.records.values().filter(|r| r.in_scope(scope)).count() as u32)
    }
}
