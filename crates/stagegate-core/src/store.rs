//! # History Store
//!
//! A single handle over the review history backends.
//!
//! ## Storage Backends
//!
//! - `InMemory`: Uses [`MemoryHistory`] (fast, volatile)
//! - `Persistent`: Uses [`RedbHistory`] for disk-backed ACID storage
//!
//! The store implements both reader traits, so it can be handed to the
//! evaluator directly.

use crate::history::{
    EditorialDecisionReader, HistoryCounts, HistoryWriter, MemoryHistory, ReviewRoundReader,
};
use crate::storage::RedbHistory;
use crate::{EditorialDecision, ReviewRound, StageGateError, SubmissionId, WorkflowStage};
use std::path::Path;

/// Storage backend for a [`HistoryStore`].
#[derive(Debug)]
pub enum HistoryBackend {
    /// In-memory history (fast, volatile).
    InMemory(MemoryHistory),
    /// Disk-backed history using redb (ACID, persistent).
    Persistent(RedbHistory),
}

impl Default for HistoryBackend {
    fn default() -> Self {
        Self::InMemory(MemoryHistory::new())
    }
}

// NOTE: HistoryBackend does NOT implement Clone.
// RedbHistory (database handle) cannot be safely cloned.

/// Review history behind one of the supported backends.
#[derive(Debug, Default)]
pub struct HistoryStore {
    backend: HistoryBackend,
}

impl HistoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or create a redb database at the given path.
    pub fn open_redb(path: impl AsRef<Path>) -> Result<Self, StageGateError> {
        Ok(Self {
            backend: HistoryBackend::Persistent(RedbHistory::open(path)?),
        })
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, HistoryBackend::Persistent(_))
    }

    /// Backend name as used in configuration ("memory" or "redb").
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            HistoryBackend::InMemory(_) => "memory",
            HistoryBackend::Persistent(_) => "redb",
        }
    }

    fn writer(&mut self) -> &mut dyn HistoryWriter {
        match &mut self.backend {
            HistoryBackend::InMemory(history) => history,
            HistoryBackend::Persistent(redb) => redb,
        }
    }

    /// Open a new review round.
    pub fn record_round(&mut self, round: ReviewRound) -> Result<(), StageGateError> {
        self.writer().record_round(round)
    }

    /// Append a decision to an existing round.
    pub fn record_decision(
        &mut self,
        round: ReviewRound,
        decision: EditorialDecision,
    ) -> Result<(), StageGateError> {
        self.writer().record_decision(round, decision)
    }

    /// Number of rounds and decisions stored.
    pub fn counts(&self) -> Result<HistoryCounts, StageGateError> {
        match &self.backend {
            HistoryBackend::InMemory(history) => history.counts(),
            HistoryBackend::Persistent(redb) => redb.counts(),
        }
    }
}

impl ReviewRoundReader for HistoryStore {
    fn latest_review_round(
        &self,
        submission: SubmissionId,
        stage: WorkflowStage,
    ) -> Result<Option<ReviewRound>, StageGateError> {
        match &self.backend {
            HistoryBackend::InMemory(history) => history.latest_review_round(submission, stage),
            HistoryBackend::Persistent(redb) => redb.latest_review_round(submission, stage),
        }
    }
}

impl EditorialDecisionReader for HistoryStore {
    fn decisions_for_round(
        &self,
        submission: SubmissionId,
        stage: WorkflowStage,
        round: u32,
    ) -> Result<Vec<EditorialDecision>, StageGateError> {
        match &self.backend {
            HistoryBackend::InMemory(history) => {
                history.decisions_for_round(submission, stage, round)
            }
            HistoryBackend::Persistent(redb) => redb.decisions_for_round(submission, stage, round),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
