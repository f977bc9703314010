//! # Property-Based Tests
//!
//! Determinism and safety invariants of the evaluator, checked with proptest.

use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use stagegate_core::{
    AccessRequest, DecisionCode, DenyReason, EditorialDecision, EvaluationContext, Evaluator,
    FileAction, FileStage, MappingTable, MemoryHistory, ReviewRound, RoleId, StageAssignments,
    SubjectContext, Submission, SubmissionId, WorkflowStage,
    history::HistoryWriter,
};
use std::collections::BTreeSet;

const SUB: SubmissionId = SubmissionId(5);

// =============================================================================
// STRATEGIES
// =============================================================================

fn file_stage() -> impl Strategy<Value = FileStage> {
    prop::sample::select(FileStage::ALL.to_vec())
}

fn action() -> impl Strategy<Value = FileAction> {
    prop::sample::select(FileAction::ALL.to_vec())
}

fn role() -> impl Strategy<Value = RoleId> {
    prop::sample::select(RoleId::ALL.to_vec())
}

fn workflow_stage() -> impl Strategy<Value = WorkflowStage> {
    prop::sample::select(WorkflowStage::ALL.to_vec())
}

fn decision_code() -> impl Strategy<Value = DecisionCode> {
    prop::sample::select(DecisionCode::ALL.to_vec())
}

fn subject() -> impl Strategy<Value = SubjectContext> {
    (
        btree_set(role(), 0..3),
        vec((workflow_stage(), role()), 0..6),
    )
        .prop_map(|(roles, pairs)| {
            SubjectContext::new(roles, StageAssignments::from_pairs(pairs))
        })
}

/// History with one round per review stage and the given decisions on each.
fn history() -> impl Strategy<Value = MemoryHistory> {
    (vec(decision_code(), 0..4), vec(decision_code(), 0..4)).prop_map(|(internal, external)| {
        let mut history = MemoryHistory::new();
        for (stage, codes) in [
            (WorkflowStage::InternalReview, internal),
            (WorkflowStage::ExternalReview, external),
        ] {
            let round = ReviewRound::new(SUB, stage, 1);
            history.record_round(round).expect("round");
            for code in codes {
                history
                    .record_decision(round, EditorialDecision::new(code))
                    .expect("decision");
            }
        }
        history
    })
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// No file stage means DENY with the missing-stage reason, whoever asks.
    #[test]
    fn missing_stage_always_denied(
        subject in subject(),
        action in action(),
        progress in 0u32..4,
        history in history(),
    ) {
        let table = MappingTable::default();
        let evaluator = Evaluator::with_history(&table, &history);
        let mut ctx = EvaluationContext::new();
        let decision = evaluator
            .evaluate(&AccessRequest::from_raw(None, action), &subject, &Submission::new(SUB, progress), &mut ctx)
            .expect("evaluate");

        prop_assert!(!decision.permitted);
        prop_assert_eq!(decision.denial, Some(DenyReason::MissingFileStage));
    }

    /// With no assignments, the manager role alone decides.
    #[test]
    fn unassigned_decided_by_manager_role(
        roles in btree_set(role(), 0..4),
        stage in file_stage(),
        action in action(),
    ) {
        let table = MappingTable::default();
        let history = MemoryHistory::new();
        let evaluator = Evaluator::with_history(&table, &history);
        let subject = SubjectContext::new(roles.clone(), StageAssignments::new());
        let mut ctx = EvaluationContext::new();
        let decision = evaluator
            .evaluate(&AccessRequest::new(stage, action), &subject, &Submission::new(SUB, 0), &mut ctx)
            .expect("evaluate");

        prop_assert_eq!(decision.permitted, roles.contains(&RoleId::Manager));
    }

    /// Same inputs, same decision and same published set.
    #[test]
    fn evaluation_is_idempotent(
        subject in subject(),
        stage in file_stage(),
        action in action(),
        progress in 0u32..4,
        history in history(),
    ) {
        let table = MappingTable::default();
        let evaluator = Evaluator::with_history(&table, &history);
        let request = AccessRequest::new(stage, action);
        let submission = Submission::new(SUB, progress);

        let mut ctx1 = EvaluationContext::new();
        let mut ctx2 = EvaluationContext::new();
        let first = evaluator.evaluate(&request, &subject, &submission, &mut ctx1).expect("first");
        let second = evaluator.evaluate(&request, &subject, &submission, &mut ctx2).expect("second");

        prop_assert_eq!(first, second);
        prop_assert_eq!(ctx1, ctx2);
    }

    /// A published set lies in the file stage domain and contains the request.
    #[test]
    fn published_set_contains_request(
        subject in subject(),
        stage in file_stage(),
        action in action(),
        progress in 0u32..4,
        history in history(),
    ) {
        let table = MappingTable::default();
        let evaluator = Evaluator::with_history(&table, &history);
        let mut ctx = EvaluationContext::new();
        let decision = evaluator
            .evaluate(&AccessRequest::new(stage, action), &subject, &Submission::new(SUB, progress), &mut ctx)
            .expect("evaluate");

        let domain: BTreeSet<FileStage> = FileStage::ALL.into_iter().collect();
        if let Some(stages) = &decision.accessible_file_stages {
            prop_assert!(stages.is_subset(&domain));
            prop_assert!(decision.permitted);
            prop_assert!(stages.contains(&stage));
            prop_assert_eq!(ctx.accessible_file_stages(), Some(stages));
        }
        if !decision.permitted {
            prop_assert!(ctx.accessible_file_stages().is_none());
        }
    }

    /// Reading never depends on review history or submission progress.
    #[test]
    fn read_ignores_history(
        subject in subject(),
        stage in file_stage(),
        progress in 0u32..4,
        history in history(),
    ) {
        let table = MappingTable::default();
        let empty = MemoryHistory::new();
        let request = AccessRequest::new(stage, FileAction::Read);

        let mut ctx_a = EvaluationContext::new();
        let mut ctx_b = EvaluationContext::new();
        let with_history = Evaluator::with_history(&table, &history)
            .evaluate(&request, &subject, &Submission::new(SUB, progress), &mut ctx_a)
            .expect("evaluate");
        let without_history = Evaluator::with_history(&table, &empty)
            .evaluate(&request, &subject, &Submission::new(SUB, 0), &mut ctx_b)
            .expect("evaluate");

        prop_assert_eq!(with_history.permitted, without_history.permitted);
    }
}
