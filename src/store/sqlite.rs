//! SQLite-backed store (governance.db).
//!
//! One database file holds proposals, votes, and signing sessions. The
//! session exclusivity invariant is enforced by conditional updates
//! (`... WHERE status = 'pending'`) so that exactly one concurrent writer
//! observes a row change; the same pattern guards proposal status
//! transitions.
//!
//! Enum columns are stored as their canonical strings; session purposes and
//! results are CBOR blobs (schema evolution without column churn).

use super::{
    ChainMirror, CompleteOutcome, ProposalStore, SessionStore, StoreError, StoreResult,
};
use crate::governance::types::{
    Decision, ParticipationScope, Proposal, ProposalKind, ProposalStatus, Vote,
};
use crate::identity::SignerId;
use crate::remote::session::{SessionId, SessionStatus, SigningResult, SigningSession};
use crate::serialization::{from_cbor, to_cbor};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;

/// SQLite store implementing both `ProposalStore` and `SessionStore`.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) and migrate the database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS proposals (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 kind TEXT NOT NULL,
                 target_id TEXT NOT NULL,
                 title TEXT NOT NULL,
                 description TEXT NOT NULL,
                 proposer_id TEXT NOT NULL,
                 status TEXT NOT NULL,
                 threshold INTEGER NOT NULL,
                 scope TEXT NOT NULL,
                 created_at INTEGER NOT NULL,
                 expires_at INTEGER NOT NULL,
                 on_chain_tx_index INTEGER,
                 on_chain_submission_time INTEGER,
                 on_chain_confirmations INTEGER NOT NULL DEFAULT 0,
                 on_chain_executed INTEGER NOT NULL DEFAULT 0
             )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS votes (
                 proposal_id INTEGER NOT NULL,
                 voter_id TEXT NOT NULL,
                 decision TEXT NOT NULL,
                 signature BLOB NOT NULL,
                 cast_at_ms INTEGER NOT NULL,
                 PRIMARY KEY (proposal_id, voter_id)
             )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS signing_sessions (
                 session_id TEXT PRIMARY KEY,
                 purpose BLOB NOT NULL,
                 status TEXT NOT NULL,
                 created_at INTEGER NOT NULL,
                 expires_at INTEGER NOT NULL,
                 result BLOB,
                 failure TEXT
             )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_proposal(row: &SqliteRow) -> StoreResult<Proposal> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let scope: String = row.try_get("scope")?;

    Ok(Proposal {
        id: row.try_get::<i64, _>("id")? as u64,
        kind: ProposalKind::parse(&kind)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown proposal kind '{}'", kind)))?,
        target_id: row.try_get("target_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        proposer_id: SignerId(row.try_get("proposer_id")?),
        status: ProposalStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown status '{}'", status)))?,
        threshold: row.try_get::<i64, _>("threshold")? as u32,
        scope: ParticipationScope::parse(&scope)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown scope '{}'", scope)))?,
        created_at: row.try_get::<i64, _>("created_at")? as u64,
        expires_at: row.try_get::<i64, _>("expires_at")? as u64,
        on_chain_tx_index: row
            .try_get::<Option<i64>, _>("on_chain_tx_index")?
            .map(|v| v as u64),
        on_chain_submission_time: row
            .try_get::<Option<i64>, _>("on_chain_submission_time")?
            .map(|v| v as u64),
        on_chain_confirmations: row.try_get::<i64, _>("on_chain_confirmations")? as u32,
        on_chain_executed: row.try_get::<i64, _>("on_chain_executed")? != 0,
    })
}

fn row_to_vote(row: &SqliteRow) -> StoreResult<Vote> {
    let decision: String = row.try_get("decision")?;
    Ok(Vote {
        proposal_id: row.try_get::<i64, _>("proposal_id")? as u64,
        voter_id: SignerId(row.try_get("voter_id")?),
        decision: Decision::parse(&decision)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown decision '{}'", decision)))?,
        signature: row.try_get("signature")?,
        cast_at_ms: row.try_get::<i64, _>("cast_at_ms")? as u64,
    })
}

fn row_to_session(row: &SqliteRow) -> StoreResult<SigningSession> {
    let status: String = row.try_get("status")?;
    let purpose: Vec<u8> = row.try_get("purpose")?;
    let result: Option<Vec<u8>> = row.try_get("result")?;

    Ok(SigningSession {
        session_id: SessionId(row.try_get("session_id")?),
        purpose: from_cbor(&purpose)?,
        status: SessionStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown session status '{}'", status)))?,
        created_at: row.try_get::<i64, _>("created_at")? as u64,
        expires_at: row.try_get::<i64, _>("expires_at")? as u64,
        result: match result {
            Some(bytes) => Some(from_cbor(&bytes)?),
            None => None,
        },
        failure: row.try_get("failure")?,
    })
}

#[async_trait]
impl ProposalStore for SqliteStore {
    async fn insert_proposal(&self, mut proposal: Proposal) -> StoreResult<Proposal> {
        let result = sqlx::query(
            "INSERT INTO proposals (kind, target_id, title, description, proposer_id,
                 status, threshold, scope, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(proposal.kind.as_str())
        .bind(&proposal.target_id)
        .bind(&proposal.title)
        .bind(&proposal.description)
        .bind(&proposal.proposer_id.0)
        .bind(proposal.status.as_str())
        .bind(proposal.threshold as i64)
        .bind(proposal.scope.as_str())
        .bind(proposal.created_at as i64)
        .bind(proposal.expires_at as i64)
        .execute(&self.pool)
        .await?;

        proposal.id = result.last_insert_rowid() as u64;
        Ok(proposal)
    }

    async fn proposal(&self, id: u64) -> StoreResult<Option<Proposal>> {
        let row = sqlx::query("SELECT * FROM proposals WHERE id = ?")
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_proposal).transpose()
    }

    async fn proposals(&self) -> StoreResult<Vec<Proposal>> {
        let rows = sqlx::query("SELECT * FROM proposals ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_proposal).collect()
    }

    async fn proposals_with_status(&self, status: ProposalStatus) -> StoreResult<Vec<Proposal>> {
        let rows = sqlx::query("SELECT * FROM proposals WHERE status = ? ORDER BY id DESC")
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_proposal).collect()
    }

    async fn transition_status(
        &self,
        id: u64,
        from: ProposalStatus,
        to: ProposalStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE proposals SET status = ? WHERE id = ? AND status = ?")
            .bind(to.as_str())
            .bind(id as i64)
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_on_chain_index(&self, id: u64, tx_index: u64) -> StoreResult<()> {
        sqlx::query("UPDATE proposals SET on_chain_tx_index = ? WHERE id = ?")
            .bind(tx_index as i64)
            .bind(id as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_chain_mirror(&self, id: u64, mirror: &ChainMirror) -> StoreResult<()> {
        sqlx::query(
            "UPDATE proposals SET on_chain_submission_time = ?,
                 on_chain_confirmations = ?, on_chain_executed = ?
             WHERE id = ?",
        )
        .bind(mirror.submission_time.map(|v| v as i64))
        .bind(mirror.confirmations as i64)
        .bind(mirror.executed as i64)
        .bind(id as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_vote(&self, vote: &Vote) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO votes (proposal_id, voter_id, decision, signature, cast_at_ms)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (proposal_id, voter_id) DO UPDATE SET
                 decision = excluded.decision,
                 signature = excluded.signature,
                 cast_at_ms = excluded.cast_at_ms",
        )
        .bind(vote.proposal_id as i64)
        .bind(&vote.voter_id.0)
        .bind(vote.decision.as_str())
        .bind(&vote.signature)
        .bind(vote.cast_at_ms as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn votes(&self, proposal_id: u64) -> StoreResult<Vec<Vote>> {
        let rows = sqlx::query("SELECT * FROM votes WHERE proposal_id = ? ORDER BY voter_id")
            .bind(proposal_id as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_vote).collect()
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn insert_session(&self, session: &SigningSession) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO signing_sessions
                 (session_id, purpose, status, created_at, expires_at, result, failure)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.session_id.0)
        .bind(to_cbor(&session.purpose)?)
        .bind(session.status.as_str())
        .bind(session.created_at as i64)
        .bind(session.expires_at as i64)
        .bind(match &session.result {
            Some(r) => Some(to_cbor(r)?),
            None => None,
        })
        .bind(&session.failure)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn session(&self, id: &SessionId) -> StoreResult<Option<SigningSession>> {
        let row = sqlx::query("SELECT * FROM signing_sessions WHERE session_id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_session).transpose()
    }

    async fn complete_session(
        &self,
        id: &SessionId,
        status: SessionStatus,
        result: Option<SigningResult>,
        failure: Option<String>,
    ) -> StoreResult<CompleteOutcome> {
        // Conditional update: only one concurrent caller can move the row
        // out of 'pending'.
        let updated = sqlx::query(
            "UPDATE signing_sessions SET status = ?, result = ?, failure = ?
             WHERE session_id = ? AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(match &result {
            Some(r) => Some(to_cbor(r)?),
            None => None,
        })
        .bind(&failure)
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 1 {
            return Ok(CompleteOutcome::Completed);
        }
        match self.session(id).await? {
            Some(_) => Ok(CompleteOutcome::NotPending),
            None => Ok(CompleteOutcome::Missing),
        }
    }

    async fn expire_session(&self, id: &SessionId) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE signing_sessions SET status = 'expired'
             WHERE session_id = ? AND status = 'pending'",
        )
        .bind(&id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn purge_sessions(&self, cutoff: u64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM signing_sessions WHERE expires_at < ?")
            .bind(cutoff as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
