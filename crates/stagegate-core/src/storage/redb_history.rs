//! # redb-backed Review History
//!
//! A disk-backed review history using the redb embedded database, providing:
//! - ACID transactions (a round and its decision counter change together)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! ## Layout
//!
//! Keys are tuples so that one submission's rounds, and one round's decisions,
//! form contiguous ranges. Workflow stages are stored as their stable code.

use crate::history::{
    EditorialDecisionReader, HistoryCounts, HistoryWriter, ReviewRoundReader,
    validate_decision_capacity, validate_new_round,
};
use crate::{EditorialDecision, ReviewRound, StageGateError, SubmissionId, WorkflowStage};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
};
use std::path::Path;

/// Table for rounds: (submission, stage code, round) -> number of decisions
const ROUNDS: TableDefinition<(u64, u8, u32), u32> = TableDefinition::new("review_rounds");

/// Table for decisions: (submission, stage code, round, sequence) -> postcard EditorialDecision
const DECISIONS: TableDefinition<(u64, u8, u32, u32), &[u8]> =
    TableDefinition::new("editorial_decisions");

type RoundKey = (u64, u8, u32);

fn io_err(e: impl std::fmt::Display) -> StageGateError {
    StageGateError::IoError(e.to_string())
}

fn round_key(round: &ReviewRound) -> RoundKey {
    (round.submission_id.0, round.stage.code(), round.round)
}

/// Highest round number stored for submission + stage.
fn latest_round_number<T>(
    table: &T,
    submission: SubmissionId,
    stage: WorkflowStage,
) -> Result<Option<u32>, StageGateError>
where
    T: ReadableTable<RoundKey, u32>,
{
    let code = stage.code();
    let mut range = table
        .range((submission.0, code, 0u32)..=(submission.0, code, u32::MAX))
        .map_err(io_err)?;
    match range.next_back() {
        Some(entry) => {
            let (key, _) = entry.map_err(io_err)?;
            Ok(Some(key.value().2))
        }
        None => Ok(None),
    }
}

/// A disk-backed review history using redb.
pub struct RedbHistory {
    db: Database,
}

impl std::fmt::Debug for RedbHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbHistory").finish_non_exhaustive()
    }
}

impl RedbHistory {
    /// Open or create a history database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StageGateError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(ROUNDS).map_err(io_err)?;
            let _ = write_txn.open_table(DECISIONS).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }
}

impl ReviewRoundReader for RedbHistory {
    fn latest_review_round(
        &self,
        submission: SubmissionId,
        stage: WorkflowStage,
    ) -> Result<Option<ReviewRound>, StageGateError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(ROUNDS).map_err(io_err)?;
        Ok(latest_round_number(&table, submission, stage)?
            .map(|round| ReviewRound::new(submission, stage, round)))
    }
}

impl EditorialDecisionReader for RedbHistory {
    fn decisions_for_round(
        &self,
        submission: SubmissionId,
        stage: WorkflowStage,
        round: u32,
    ) -> Result<Vec<EditorialDecision>, StageGateError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(DECISIONS).map_err(io_err)?;
        let code = stage.code();

        let mut decisions = Vec::new();
        for entry in table
            .range((submission.0, code, round, 0u32)..=(submission.0, code, round, u32::MAX))
            .map_err(io_err)?
        {
            let (_, bytes) = entry.map_err(io_err)?;
            let decision: EditorialDecision = postcard::from_bytes(bytes.value())
                .map_err(|e| StageGateError::SerializationError(e.to_string()))?;
            decisions.push(decision);
        }
        Ok(decisions)
    }
}

impl HistoryWriter for RedbHistory {
    fn record_round(&mut self, round: ReviewRound) -> Result<(), StageGateError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut rounds = write_txn.open_table(ROUNDS).map_err(io_err)?;
            let latest = latest_round_number(&rounds, round.submission_id, round.stage)?
                .map(|number| ReviewRound::new(round.submission_id, round.stage, number));
            validate_new_round(latest.as_ref(), &round)?;
            rounds.insert(round_key(&round), 0u32).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn record_decision(
        &mut self,
        round: ReviewRound,
        decision: EditorialDecision,
    ) -> Result<(), StageGateError> {
        let key = round_key(&round);
        let bytes = postcard::to_allocvec(&decision)
            .map_err(|e| StageGateError::SerializationError(e.to_string()))?;

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut rounds = write_txn.open_table(ROUNDS).map_err(io_err)?;
            let existing = rounds
                .get(key)
                .map_err(io_err)?
                .map(|guard| guard.value())
                .ok_or(StageGateError::RoundNotFound {
                    submission: round.submission_id,
                    stage: round.stage,
                    round: round.round,
                })?;
            validate_decision_capacity(existing as usize)?;

            let mut decisions = write_txn.open_table(DECISIONS).map_err(io_err)?;
            decisions
                .insert((key.0, key.1, key.2, existing), bytes.as_slice())
                .map_err(io_err)?;
            rounds
                .insert(key, existing.saturating_add(1))
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn counts(&self) -> Result<HistoryCounts, StageGateError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let rounds = read_txn.open_table(ROUNDS).map_err(io_err)?;
        let decisions = read_txn.open_table(DECISIONS).map_err(io_err)?;
        Ok(HistoryCounts {
            rounds: rounds.len().map_err(io_err)?,
            decisions: decisions.len().map_err(io_err)?,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DecisionCode;
    use tempfile::TempDir;

    const SUB: SubmissionId = SubmissionId(42);

    fn open_temp() -> (RedbHistory, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let history = RedbHistory::open(dir.path().join("history.redb")).expect("open");
        (history, dir)
    }

    #[test]
    fn empty_database_has_no_rounds() {
        let (history, _dir) = open_temp();
        let latest = history
            .latest_review_round(SUB, WorkflowStage::ExternalReview)
            .expect("lookup");
        assert!(latest.is_none());
        assert_eq!(history.counts().expect("counts"), HistoryCounts::default());
    }

    #[test]
    fn rounds_and_decisions_round_trip() {
        let (mut history, _dir) = open_temp();
        let first = ReviewRound::new(SUB, WorkflowStage::ExternalReview, 1);
        let second = ReviewRound::new(SUB, WorkflowStage::ExternalReview, 2);
        history.record_round(first).expect("first");
        history.record_round(second).expect("second");
        history
            .record_decision(second, EditorialDecision::new(DecisionCode::PendingRevisions))
            .expect("decision");
        history
            .record_decision(second, EditorialDecision::new(DecisionCode::Accept))
            .expect("decision");

        let latest = history
            .latest_review_round(SUB, WorkflowStage::ExternalReview)
            .expect("lookup");
        assert_eq!(latest, Some(second));

        let codes: Vec<_> = history
            .decisions_for_round(SUB, WorkflowStage::ExternalReview, 2)
            .expect("decisions")
            .into_iter()
            .map(|d| d.decision)
            .collect();
        assert_eq!(
            codes,
            vec![DecisionCode::PendingRevisions, DecisionCode::Accept]
        );
        assert!(
            history
                .decisions_for_round(SUB, WorkflowStage::ExternalReview, 1)
                .expect("decisions")
                .is_empty()
        );
    }

    #[test]
    fn stages_do_not_mix() {
        let (mut history, _dir) = open_temp();
        history
            .record_round(ReviewRound::new(SUB, WorkflowStage::InternalReview, 3))
            .expect("internal");
        let external = history
            .latest_review_round(SUB, WorkflowStage::ExternalReview)
            .expect("lookup");
        assert!(external.is_none());
    }

    #[test]
    fn decision_without_round_rejected() {
        let (mut history, _dir) = open_temp();
        let result = history.record_decision(
            ReviewRound::new(SUB, WorkflowStage::ExternalReview, 1),
            EditorialDecision::new(DecisionCode::Accept),
        );
        assert!(matches!(result, Err(StageGateError::RoundNotFound { .. })));
        assert_eq!(history.counts().expect("counts").decisions, 0);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("history.redb");
        let round = ReviewRound::new(SUB, WorkflowStage::ExternalReview, 1);
        {
            let mut history = RedbHistory::open(&path).expect("open");
            history.record_round(round).expect("round");
            history
                .record_decision(round, EditorialDecision::new(DecisionCode::Resubmit))
                .expect("decision");
        }
        let history = RedbHistory::open(&path).expect("reopen");
        assert_eq!(
            history.counts().expect("counts"),
            HistoryCounts {
                rounds: 1,
                decisions: 1
            }
        );
    }
}
