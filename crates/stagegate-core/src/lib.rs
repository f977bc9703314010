//! # stagegate-core
//!
//! The stage file access policy engine for Stagegate - THE LOGIC.
//!
//! This crate decides whether a user may read or modify the files of a
//! submission at a given file stage, combining:
//! - the roles the user holds on each workflow stage,
//! - the base role/stage mapping table,
//! - the state of the submission and its review history.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Is pure and synchronous: NO async, NO network dependencies
//! - Never mutates anything but the caller's [`EvaluationContext`]
//! - Receives its collaborators explicitly (mapping table, round and decision readers)
//! - Uses closed enumerations for every identifier, so invalid ids cannot reach the policy

// =============================================================================
// MODULES
// =============================================================================

pub mod context;
pub mod evaluator;
pub mod history;
pub mod mapping;
pub mod primitives;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AccessRequest, DecisionCode, EditorialDecision, FileAction, FileStage, ReviewRound, RoleId,
    StageAssignments, StageGateError, SubjectContext, Submission, SubmissionId, WorkflowStage,
};

// =============================================================================
// RE-EXPORTS: Policy Engine
// =============================================================================

pub use context::EvaluationContext;
pub use evaluator::{Decision, DenyReason, Evaluator, Grant};
pub use mapping::{FileStageMapping, MappingRule, MappingTable};

// =============================================================================
// RE-EXPORTS: Review History
// =============================================================================

pub use history::{
    EditorialDecisionReader, HistoryCounts, HistoryWriter, MemoryHistory, ReviewHistory,
    ReviewRoundReader,
};
pub use storage::RedbHistory;
pub use store::{HistoryBackend, HistoryStore};
