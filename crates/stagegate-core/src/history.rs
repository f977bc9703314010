//! # Review History
//!
//! The evaluator's read-only window onto review rounds and editorial decisions.
//!
//! - [`ReviewRoundReader`] and [`EditorialDecisionReader`] are the collaborator
//!   traits the evaluator consults. Any type implementing both is a
//!   [`ReviewHistory`].
//! - [`HistoryWriter`] is the write side used by the stores in this crate.
//! - [`MemoryHistory`] is the in-memory implementation.
//!
//! Empty results are normal ("not yet eligible"), not errors.

use crate::primitives::{MAX_DECISIONS_PER_ROUND, MAX_ROUND_NUMBER};
use crate::{EditorialDecision, ReviewRound, StageGateError, SubmissionId, WorkflowStage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// READER TRAITS
// =============================================================================

/// Looks up review rounds.
pub trait ReviewRoundReader: Send + Sync {
    /// The highest-numbered round for the submission at `stage`, if any.
    fn latest_review_round(
        &self,
        submission: SubmissionId,
        stage: WorkflowStage,
    ) -> Result<Option<ReviewRound>, StageGateError>;
}

/// Looks up editorial decisions.
pub trait EditorialDecisionReader: Send + Sync {
    /// Decisions recorded against one round, in recording order.
    fn decisions_for_round(
        &self,
        submission: SubmissionId,
        stage: WorkflowStage,
        round: u32,
    ) -> Result<Vec<EditorialDecision>, StageGateError>;
}

/// Both readers in one bound.
pub trait ReviewHistory: ReviewRoundReader + EditorialDecisionReader {}

impl<T: ReviewRoundReader + EditorialDecisionReader + ?Sized> ReviewHistory for T {}

// =============================================================================
// WRITER TRAIT
// =============================================================================

/// Totals held by a history store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryCounts {
    pub rounds: u64,
    pub decisions: u64,
}

/// Write side of a history store.
///
/// Implementations must enforce [`validate_new_round`] and reject decisions
/// for rounds they do not hold.
pub trait HistoryWriter {
    /// Open a new review round.
    fn record_round(&mut self, round: ReviewRound) -> Result<(), StageGateError>;

    /// Append a decision to an existing round.
    fn record_decision(
        &mut self,
        round: ReviewRound,
        decision: EditorialDecision,
    ) -> Result<(), StageGateError>;

    /// Number of rounds and decisions stored.
    fn counts(&self) -> Result<HistoryCounts, StageGateError>;
}

/// Check that `round` may follow `latest` for the same submission and stage.
///
/// Rounds exist only on review stages, are numbered from 1, and strictly increase.
pub fn validate_new_round(
    latest: Option<&ReviewRound>,
    round: &ReviewRound,
) -> Result<(), StageGateError> {
    if !round.stage.is_review() {
        return Err(StageGateError::InvalidRound(format!(
            "stage '{}' does not run review rounds",
            round.stage
        )));
    }
    if round.round == 0 || round.round > MAX_ROUND_NUMBER {
        return Err(StageGateError::InvalidRound(format!(
            "round number {} outside 1..={}",
            round.round, MAX_ROUND_NUMBER
        )));
    }
    if let Some(latest) = latest.filter(|latest| round.round <= latest.round) {
        return Err(StageGateError::InvalidRound(format!(
            "round {} does not follow existing round {}",
            round.round, latest.round
        )));
    }
    Ok(())
}

/// Check that one more decision fits into a round already holding `existing`.
pub fn validate_decision_capacity(existing: usize) -> Result<(), StageGateError> {
    if existing >= MAX_DECISIONS_PER_ROUND {
        return Err(StageGateError::InvalidRound(format!(
            "round already holds the maximum of {} decisions",
            MAX_DECISIONS_PER_ROUND
        )));
    }
    Ok(())
}

// =============================================================================
// IN-MEMORY HISTORY
// =============================================================================

/// BTreeMap-backed review history.
///
/// Every recorded round is a key, so a round with no decisions is still found
/// by [`ReviewRoundReader::latest_review_round`].
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    rounds: BTreeMap<ReviewRound, Vec<EditorialDecision>>,
}

impl MemoryHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn latest(&self, submission: SubmissionId, stage: WorkflowStage) -> Option<&ReviewRound> {
        let first = ReviewRound::new(submission, stage, 0);
        let last = ReviewRound::new(submission, stage, u32::MAX);
        self.rounds.range(first..=last).next_back().map(|(key, _)| key)
    }
}

impl ReviewRoundReader for MemoryHistory {
    fn latest_review_round(
        &self,
        submission: SubmissionId,
        stage: WorkflowStage,
    ) -> Result<Option<ReviewRound>, StageGateError> {
        Ok(self.latest(submission, stage).copied())
    }
}

impl EditorialDecisionReader for MemoryHistory {
    fn decisions_for_round(
        &self,
        submission: SubmissionId,
        stage: WorkflowStage,
        round: u32,
    ) -> Result<Vec<EditorialDecision>, StageGateError> {
        Ok(self
            .rounds
            .get(&ReviewRound::new(submission, stage, round))
            .cloned()
            .unwrap_or_default())
    }
}

impl HistoryWriter for MemoryHistory {
    fn record_round(&mut self, round: ReviewRound) -> Result<(), StageGateError> {
        validate_new_round(self.latest(round.submission_id, round.stage), &round)?;
        self.rounds.insert(round, Vec::new());
        Ok(())
    }

    fn record_decision(
        &mut self,
        round: ReviewRound,
        decision: EditorialDecision,
    ) -> Result<(), StageGateError> {
        let decisions =
            self.rounds
                .get_mut(&round)
                .ok_or(StageGateError::RoundNotFound {
                    submission: round.submission_id,
                    stage: round.stage,
                    round: round.round,
                })?;
        validate_decision_capacity(decisions.len())?;
        decisions.push(decision);
        Ok(())
    }

    fn counts(&self) -> Result<HistoryCounts, StageGateError> {
        Ok(HistoryCounts {
            rounds: self.rounds.len() as u64,
            decisions: self.rounds.values().map(|d| d.len() as u64).sum(),
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

    const SUB: SubmissionId = SubmissionId(7);

    #[test]
    fn latest_round_is_highest_number() {
        let mut history = MemoryHistory::new();
        history
            .record_round(ReviewRound::new(SUB, WorkflowStage::ExternalReview, 1))
            .expect("round 1");
        history
            .record_round(ReviewRound::new(SUB, WorkflowStage::ExternalReview, 2))
            .expect("round 2");
        history
            .record_round(ReviewRound::new(SUB, WorkflowStage::InternalReview, 5))
            .expect("internal");

        let latest = history
            .latest_review_round(SUB, WorkflowStage::ExternalReview)
            .expect("lookup");
        assert_eq!(latest.map(|r| r.round), Some(2));
    }

    #[test]
    fn no_round_for_other_submission() {
        let mut history = MemoryHistory::new();
        history
            .record_round(ReviewRound::new(SUB, WorkflowStage::ExternalReview, 1))
            .expect("round");
        let latest = history
            .latest_review_round(SubmissionId(8), WorkflowStage::ExternalReview)
            .expect("lookup");
        assert!(latest.is_none());
    }

    #[test]
    fn rounds_must_increase() {
        let mut history = MemoryHistory::new();
        history
            .record_round(ReviewRound::new(SUB, WorkflowStage::ExternalReview, 2))
            .expect("round 2");
        let result = history.record_round(ReviewRound::new(SUB, WorkflowStage::ExternalReview, 1));
        assert!(matches!(result, Err(StageGateError::InvalidRound(_))));
    }

    #[test]
    fn round_zero_and_non_review_stage_rejected() {
        let mut history = MemoryHistory::new();
        assert!(
            history
                .record_round(ReviewRound::new(SUB, WorkflowStage::ExternalReview, 0))
                .is_err()
        );
        assert!(
            history
                .record_round(ReviewRound::new(SUB, WorkflowStage::Editing, 1))
                .is_err()
        );
    }

    #[test]
    fn round_number_is_bounded() {
        let mut history = MemoryHistory::new();
        history
            .record_round(ReviewRound::new(SUB, WorkflowStage::ExternalReview, MAX_ROUND_NUMBER))
            .expect("last allowed round");

        let result = history.record_round(ReviewRound::new(
            SUB,
            WorkflowStage::InternalReview,
            MAX_ROUND_NUMBER + 1,
        ));
        assert!(matches!(result, Err(StageGateError::InvalidRound(_))));
        assert!(
            history
                .latest_review_round(SUB, WorkflowStage::InternalReview)
                .expect("lookup")
                .is_none()
        );
    }

    #[test]
    fn decision_needs_existing_round() {
        let mut history = MemoryHistory::new();
        let round = ReviewRound::new(SUB, WorkflowStage::InternalReview, 1);
        let result = history.record_decision(round, EditorialDecision::new(DecisionCode::Accept));
        assert!(matches!(result, Err(StageGateError::RoundNotFound { .. })));
    }

    #[test]
    fn decisions_keep_recording_order() {
        let mut history = MemoryHistory::new();
        let round = ReviewRound::new(SUB, WorkflowStage::InternalReview, 1);
        history.record_round(round).expect("round");
        history
            .record_decision(round, EditorialDecision::new(DecisionCode::Decline))
            .expect("decline");
        history
            .record_decision(round, EditorialDecision::new(DecisionCode::RevertDecline))
            .expect("revert");

        let decisions = history
            .decisions_for_round(SUB, WorkflowStage::InternalReview, 1)
            .expect("decisions");
        let codes: Vec<_> = decisions.iter().map(|d| d.decision).collect();
        assert_eq!(codes, vec![DecisionCode::Decline, DecisionCode::RevertDecline]);

        let counts = history.counts().expect("counts");
        assert_eq!(counts, HistoryCounts { rounds: 1, decisions: 2 });
    }
}
