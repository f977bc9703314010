//! # Stage File Access Evaluator
//!
//! Decides whether a subject may read or modify the files of one file stage of
//! a submission.
//!
//! ## Rules (first terminal rule wins)
//!
//! | # | Rule | Outcome |
//! |---|------|---------|
//! | 0 | No recognizable file stage | DENY `MissingFileStage` |
//! | 1 | No stage assignment on record | PERMIT iff global Manager, else DENY |
//! | 2 | Base mapping table grants the stage | PERMIT |
//! | 3 | Sole Author on Submission, MODIFY submission files, wizard incomplete | PERMIT |
//! | 4 | Sole Author on a review stage, MODIFY its revision files, latest round has a revision decision | PERMIT |
//! | 5 | Otherwise | DENY `StageNotAssignable` |
//!
//! Unmet carve-out conditions, missing rounds and rounds without decisions are
//! not errors. `Err` only carries faults raised by the injected readers.
//!
//! On every permit that computed the assignable set, the set (including the
//! requested stage) is published into the caller's [`EvaluationContext`].

use crate::context::EvaluationContext;
use crate::history::{EditorialDecisionReader, ReviewHistory, ReviewRoundReader};
use crate::mapping::FileStageMapping;
use crate::primitives::{
    BYPASS_ROLE, MSG_NO_FILE_STAGE, MSG_NO_STAGE_ASSIGNMENT, MSG_STAGE_NOT_ASSIGNABLE,
};
use crate::{
    AccessRequest, FileAction, FileStage, RoleId, StageAssignments, StageGateError, SubjectContext,
    Submission, WorkflowStage,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// DECISION
// =============================================================================

/// The rule that granted access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grant {
    /// Global manager without stage assignments.
    ManagerBypass,
    /// The mapping table grants the stage.
    BaseMapping,
    /// Author resuming an incomplete submission.
    AuthorSubmissionResume,
    /// Author answering a decision that invites revisions.
    AuthorRevision,
}

/// Why access was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    MissingFileStage,
    NoStageAssignment,
    StageNotAssignable,
}

impl DenyReason {
    /// Machine-readable message code for client-facing errors.
    #[must_use]
    pub fn message_code(&self) -> &'static str {
        match self {
            DenyReason::MissingFileStage => MSG_NO_FILE_STAGE,
            DenyReason::NoStageAssignment => MSG_NO_STAGE_ASSIGNMENT,
            DenyReason::StageNotAssignable => MSG_STAGE_NOT_ASSIGNABLE,
        }
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub permitted: bool,
    /// Present only on permits that computed the full assignable set.
    pub accessible_file_stages: Option<BTreeSet<FileStage>>,
    pub grant: Option<Grant>,
    pub denial: Option<DenyReason>,
}

impl Decision {
    fn permit(grant: Grant, accessible_file_stages: Option<BTreeSet<FileStage>>) -> Self {
        Self {
            permitted: true,
            accessible_file_stages,
            grant: Some(grant),
            denial: None,
        }
    }

    fn deny(reason: DenyReason) -> Self {
        Self {
            permitted: false,
            accessible_file_stages: None,
            grant: None,
            denial: Some(reason),
        }
    }

    /// Message code of the denial, if denied.
    #[must_use]
    pub fn message_code(&self) -> Option<&'static str> {
        self.denial.map(|reason| reason.message_code())
    }
}

// =============================================================================
// EVALUATOR
// =============================================================================

/// Stage file access evaluator over injected collaborators.
///
/// Holds shared references only; it is stateless across calls and may be used
/// from many threads at once.
pub struct Evaluator<'a> {
    mapping: &'a dyn FileStageMapping,
    rounds: &'a dyn ReviewRoundReader,
    decisions: &'a dyn EditorialDecisionReader,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator from separate collaborators.
    #[must_use]
    pub fn new(
        mapping: &'a dyn FileStageMapping,
        rounds: &'a dyn ReviewRoundReader,
        decisions: &'a dyn EditorialDecisionReader,
    ) -> Self {
        Self {
            mapping,
            rounds,
            decisions,
        }
    }

    /// Create an evaluator reading rounds and decisions from one history.
    #[must_use]
    pub fn with_history<H: ReviewHistory + 'a>(
        mapping: &'a dyn FileStageMapping,
        history: &'a H,
    ) -> Self {
        Self::new(mapping, history, history)
    }

    /// Decide `request` for `subject` on `submission`.
    pub fn evaluate(
        &self,
        request: &AccessRequest,
        subject: &SubjectContext,
        submission: &Submission,
        ctx: &mut EvaluationContext,
    ) -> Result<Decision, StageGateError> {
        let Some(file_stage) = request.file_stage else {
            return Ok(Decision::deny(DenyReason::MissingFileStage));
        };

        let assignments = &subject.stage_assignments;
        if assignments.is_empty() {
            return Ok(if subject.has_role(BYPASS_ROLE) {
                Decision::permit(Grant::ManagerBypass, None)
            } else {
                Decision::deny(DenyReason::NoStageAssignment)
            });
        }

        let mut assigned = self
            .mapping
            .assigned_file_stages(assignments, request.action);

        let grant = if assigned.contains(&file_stage) {
            Some(Grant::BaseMapping)
        } else if author_resumes_submission(file_stage, request.action, assignments, submission)
        {
            Some(Grant::AuthorSubmissionResume)
        } else if self.author_may_revise(file_stage, request.action, assignments, submission)? {
            Some(Grant::AuthorRevision)
        } else {
            None
        };

        match grant {
            Some(grant) => {
                assigned.insert(file_stage);
                ctx.publish(assigned.clone());
                Ok(Decision::permit(grant, Some(assigned)))
            }
            None => Ok(Decision::deny(DenyReason::StageNotAssignable)),
        }
    }

    /// Revision carve-out: the latest round of the matching review stage must
    /// carry a decision that invites revisions.
    fn author_may_revise(
        &self,
        file_stage: FileStage,
        action: FileAction,
        assignments: &StageAssignments,
        submission: &Submission,
    ) -> Result<bool, StageGateError> {
        if action != FileAction::Modify {
            return Ok(false);
        }
        let Some(review_stage) = file_stage.review_workflow_stage() else {
            return Ok(false);
        };
        // Unassigned review stage: carve-out does not apply.
        if !assignments.is_sole_role(review_stage, RoleId::Author) {
            return Ok(false);
        }
        let Some(round) = self
            .rounds
            .latest_review_round(submission.id, review_stage)?
        else {
            return Ok(false);
        };
        let decisions = self
            .decisions
            .decisions_for_round(submission.id, review_stage, round.round)?;
        Ok(decisions
            .iter()
            .any(|decision| decision.decision.invites_revisions()))
    }
}

/// Submission carve-out: a sole author keeps uploading while the wizard is open.
fn author_resumes_submission(
    file_stage: FileStage,
    action: FileAction,
    assignments: &StageAssignments,
    submission: &Submission,
) -> bool {
    file_stage == FileStage::Submission
        && action == FileAction::Modify
        && assignments.is_sole_role(WorkflowStage::Submission, RoleId::Author)
        && submission.is_incomplete()
}

// =============================================================================
// TESTS
// =============================================================================
