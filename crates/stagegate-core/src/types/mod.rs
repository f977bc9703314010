//! # Core Type Definitions
//!
//! This module contains all core types for the Stagegate policy engine:
//! - Closed identifier enumerations (`RoleId`, `WorkflowStage`, `FileStage`, `DecisionCode`)
//! - The requested operation (`FileAction`, `AccessRequest`)
//! - Read-only views of host state (`Submission`, `ReviewRound`, `EditorialDecision`)
//! - Subject data supplied by the caller (`StageAssignments`, `SubjectContext`)
//! - Error types (`StageGateError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Have a stable snake_case wire name shared by serde, `FromStr` and `Display`
//! - Cannot represent an identifier outside their domain

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Resolve a wire name against a closed domain.
fn parse_closed<T: Copy>(
    all: &[T],
    name_of: fn(&T) -> &'static str,
    kind: &'static str,
    raw: &str,
) -> Result<T, StageGateError> {
    let trimmed = raw.trim();
    all.iter()
        .copied()
        .find(|candidate| name_of(candidate) == trimmed)
        .ok_or_else(|| StageGateError::UnknownIdentifier {
            kind,
            value: trimmed.to_string(),
        })
}

// =============================================================================
// ROLES
// =============================================================================

/// A role a user may hold, globally or on a workflow stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleId {
    SiteAdmin,
    Manager,
    SubEditor,
    Assistant,
    Author,
    Reviewer,
    Reader,
}

impl RoleId {
    /// Every role, in declaration order.
    pub const ALL: [RoleId; 7] = [
        RoleId::SiteAdmin,
        RoleId::Manager,
        RoleId::SubEditor,
        RoleId::Assistant,
        RoleId::Author,
        RoleId::Reviewer,
        RoleId::Reader,
    ];

    /// Stable wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleId::SiteAdmin => "site_admin",
            RoleId::Manager => "manager",
            RoleId::SubEditor => "sub_editor",
            RoleId::Assistant => "assistant",
            RoleId::Author => "author",
            RoleId::Reviewer => "reviewer",
            RoleId::Reader => "reader",
        }
    }

    /// Roles that run the editorial side of a workflow stage.
    #[must_use]
    pub fn is_editorial(&self) -> bool {
        matches!(
            self,
            RoleId::SiteAdmin | RoleId::Manager | RoleId::SubEditor | RoleId::Assistant
        )
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleId {
    type Err = StageGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_closed(&Self::ALL, Self::as_str, "role", s)
    }
}

// =============================================================================
// WORKFLOW STAGES
// =============================================================================

/// A phase of the editorial process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Submission,
    InternalReview,
    ExternalReview,
    Editing,
    Production,
}

impl WorkflowStage {
    /// Every workflow stage, in workflow order.
    pub const ALL: [WorkflowStage; 5] = [
        WorkflowStage::Submission,
        WorkflowStage::InternalReview,
        WorkflowStage::ExternalReview,
        WorkflowStage::Editing,
        WorkflowStage::Production,
    ];

    /// Stable wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStage::Submission => "submission",
            WorkflowStage::InternalReview => "internal_review",
            WorkflowStage::ExternalReview => "external_review",
            WorkflowStage::Editing => "editing",
            WorkflowStage::Production => "production",
        }
    }

    /// Only review stages run review rounds.
    #[must_use]
    pub fn is_review(&self) -> bool {
        matches!(
            self,
            WorkflowStage::InternalReview | WorkflowStage::ExternalReview
        )
    }

    /// Compact storage code, stable across releases.
    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            WorkflowStage::Submission => 1,
            WorkflowStage::InternalReview => 2,
            WorkflowStage::ExternalReview => 3,
            WorkflowStage::Editing => 4,
            WorkflowStage::Production => 5,
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStage {
    type Err = StageGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_closed(&Self::ALL, Self::as_str, "workflow stage", s)
    }
}

// =============================================================================
// FILE STAGES
// =============================================================================

/// A class of submission files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStage {
    Submission,
    Note,
    ReviewFile,
    ReviewAttachment,
    Final,
    Copyedit,
    Proof,
    ProductionReady,
    Attachment,
    ReviewRevision,
    Dependent,
    Query,
    InternalReviewFile,
    InternalReviewRevision,
}

impl FileStage {
    /// The complete file stage domain.
    pub const ALL: [FileStage; 14] = [
        FileStage::Submission,
        FileStage::Note,
        FileStage::ReviewFile,
        FileStage::ReviewAttachment,
        FileStage::Final,
        FileStage::Copyedit,
        FileStage::Proof,
        FileStage::ProductionReady,
        FileStage::Attachment,
        FileStage::ReviewRevision,
        FileStage::Dependent,
        FileStage::Query,
        FileStage::InternalReviewFile,
        FileStage::InternalReviewRevision,
    ];

    /// Stable wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStage::Submission => "submission",
            FileStage::Note => "note",
            FileStage::ReviewFile => "review_file",
            FileStage::ReviewAttachment => "review_attachment",
            FileStage::Final => "final",
            FileStage::Copyedit => "copyedit",
            FileStage::Proof => "proof",
            FileStage::ProductionReady => "production_ready",
            FileStage::Attachment => "attachment",
            FileStage::ReviewRevision => "review_revision",
            FileStage::Dependent => "dependent",
            FileStage::Query => "query",
            FileStage::InternalReviewFile => "internal_review_file",
            FileStage::InternalReviewRevision => "internal_review_revision",
        }
    }

    /// The review workflow stage whose revisions this file stage holds.
    ///
    /// Only the two revision stages map to a review stage.
    #[must_use]
    pub fn review_workflow_stage(&self) -> Option<WorkflowStage> {
        match self {
            FileStage::InternalReviewRevision => Some(WorkflowStage::InternalReview),
            FileStage::ReviewRevision => Some(WorkflowStage::ExternalReview),
            _ => None,
        }
    }
}

impl fmt::Display for FileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStage {
    type Err = StageGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_closed(&Self::ALL, Self::as_str, "file stage", s)
    }
}

// =============================================================================
// FILE ACTION
// =============================================================================

/// What the subject wants to do with files of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Read,
    Modify,
}

impl FileAction {
    pub const ALL: [FileAction; 2] = [FileAction::Read, FileAction::Modify];

    /// Stable wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FileAction::Read => "read",
            FileAction::Modify => "modify",
        }
    }
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileAction {
    type Err = StageGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_closed(&Self::ALL, Self::as_str, "file action", s)
    }
}

// =============================================================================
// EDITORIAL DECISIONS
// =============================================================================

/// An outcome recorded by an editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionCode {
    Accept,
    ExternalReview,
    PendingRevisions,
    Resubmit,
    Decline,
    SendToProduction,
    InitialDecline,
    NewRound,
    RevertDecline,
    SkipReview,
    BackToSubmission,
    BackToReview,
}

impl DecisionCode {
    pub const ALL: [DecisionCode; 12] = [
        DecisionCode::Accept,
        DecisionCode::ExternalReview,
        DecisionCode::PendingRevisions,
        DecisionCode::Resubmit,
        DecisionCode::Decline,
        DecisionCode::SendToProduction,
        DecisionCode::InitialDecline,
        DecisionCode::NewRound,
        DecisionCode::RevertDecline,
        DecisionCode::SkipReview,
        DecisionCode::BackToSubmission,
        DecisionCode::BackToReview,
    ];

    /// Stable wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionCode::Accept => "accept",
            DecisionCode::ExternalReview => "external_review",
            DecisionCode::PendingRevisions => "pending_revisions",
            DecisionCode::Resubmit => "resubmit",
            DecisionCode::Decline => "decline",
            DecisionCode::SendToProduction => "send_to_production",
            DecisionCode::InitialDecline => "initial_decline",
            DecisionCode::NewRound => "new_round",
            DecisionCode::RevertDecline => "revert_decline",
            DecisionCode::SkipReview => "skip_review",
            DecisionCode::BackToSubmission => "back_to_submission",
            DecisionCode::BackToReview => "back_to_review",
        }
    }

    /// Whether this decision asks the author for revision files.
    #[must_use]
    pub fn invites_revisions(&self) -> bool {
        crate::primitives::REVISION_DECISIONS.contains(self)
    }
}

impl fmt::Display for DecisionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionCode {
    type Err = StageGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_closed(&Self::ALL, Self::as_str, "decision", s)
    }
}

// =============================================================================
// SUBMISSION & REVIEW HISTORY VIEWS
// =============================================================================

/// Unique identifier of a submission in the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub u64);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only view of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    /// Submission wizard progress marker. Zero once the wizard was completed.
    pub progress: u32,
}

impl Submission {
    #[must_use]
    pub const fn new(id: SubmissionId, progress: u32) -> Self {
        Self { id, progress }
    }

    /// True while the author is still working through the submission wizard.
    #[must_use]
    pub const fn is_incomplete(&self) -> bool {
        self.progress > 0
    }
}

/// One iteration of a review cycle. Rounds are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReviewRound {
    pub submission_id: SubmissionId,
    pub stage: WorkflowStage,
    pub round: u32,
}

impl ReviewRound {
    #[must_use]
    pub const fn new(submission_id: SubmissionId, stage: WorkflowStage, round: u32) -> Self {
        Self {
            submission_id,
            stage,
            round,
        }
    }
}

/// An outcome recorded against a review round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorialDecision {
    pub decision: DecisionCode,
}

impl EditorialDecision {
    #[must_use]
    pub const fn new(decision: DecisionCode) -> Self {
        Self { decision }
    }
}

// =============================================================================
// STAGE ASSIGNMENTS
// =============================================================================

/// The roles a subject holds on each workflow stage it is assigned to.
///
/// Stages with no roles are never stored, so every key is a stage the subject
/// actually participates in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<WorkflowStage, BTreeSet<RoleId>>",
    into = "BTreeMap<WorkflowStage, BTreeSet<RoleId>>"
)]
pub struct StageAssignments {
    stages: BTreeMap<WorkflowStage, BTreeSet<RoleId>>,
}

impl StageAssignments {
    /// No assignments on record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (stage, role) pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (WorkflowStage, RoleId)>) -> Self {
        let mut assignments = Self::new();
        for (stage, role) in pairs {
            assignments.assign(stage, role);
        }
        assignments
    }

    /// Record that the subject holds `role` on `stage`.
    pub fn assign(&mut self, stage: WorkflowStage, role: RoleId) {
        self.stages.entry(stage).or_default().insert(role);
    }

    /// Builder form of [`StageAssignments::assign`].
    #[must_use]
    pub fn with(mut self, stage: WorkflowStage, role: RoleId) -> Self {
        self.assign(stage, role);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Roles held on `stage`, if assigned.
    #[must_use]
    pub fn roles_at(&self, stage: WorkflowStage) -> Option<&BTreeSet<RoleId>> {
        self.stages.get(&stage)
    }

    /// Whether the subject holds at least one of `roles` on `stage`.
    #[must_use]
    pub fn holds_any(&self, stage: WorkflowStage, roles: &BTreeSet<RoleId>) -> bool {
        self.roles_at(stage)
            .is_some_and(|held| !held.is_disjoint(roles))
    }

    /// True when `role` is the one and only role held on `stage`.
    #[must_use]
    pub fn is_sole_role(&self, stage: WorkflowStage, role: RoleId) -> bool {
        self.roles_at(stage)
            .is_some_and(|held| held.len() == 1 && held.contains(&role))
    }
}

impl From<BTreeMap<WorkflowStage, BTreeSet<RoleId>>> for StageAssignments {
    fn from(mut stages: BTreeMap<WorkflowStage, BTreeSet<RoleId>>) -> Self {
        stages.retain(|_, roles| !roles.is_empty());
        Self { stages }
    }
}

impl From<StageAssignments> for BTreeMap<WorkflowStage, BTreeSet<RoleId>> {
    fn from(assignments: StageAssignments) -> Self {
        assignments.stages
    }
}

// =============================================================================
// SUBJECT & REQUEST
// =============================================================================

/// Who is asking: global roles plus per-stage assignments.
///
/// Supplied by the caller's authenticated context and trusted as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectContext {
    #[serde(default)]
    pub roles: BTreeSet<RoleId>,
    #[serde(default)]
    pub stage_assignments: StageAssignments,
}

impl SubjectContext {
    #[must_use]
    pub fn new(roles: BTreeSet<RoleId>, stage_assignments: StageAssignments) -> Self {
        Self {
            roles,
            stage_assignments,
        }
    }

    #[must_use]
    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }
}

/// The file operation being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    /// `None` when the caller supplied no (or no recognizable) file stage.
    pub file_stage: Option<FileStage>,
    pub action: FileAction,
}

impl AccessRequest {
    #[must_use]
    pub const fn new(file_stage: FileStage, action: FileAction) -> Self {
        Self {
            file_stage: Some(file_stage),
            action,
        }
    }

    /// Build from a raw wire value.
    ///
    /// Empty or unrecognized names yield a request without a file stage, which
    /// the evaluator denies.
    #[must_use]
    pub fn from_raw(file_stage: Option<&str>, action: FileAction) -> Self {
        Self {
            file_stage: file_stage.and_then(|raw| raw.parse().ok()),
            action,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Stagegate system.
///
/// Policy non-matches are never errors; they are denials. These variants cover
/// malformed input at the boundary and faults in injected collaborators.
#[derive(Debug, Error)]
pub enum StageGateError {
    /// A wire name does not belong to its closed domain.
    #[error("Unknown {kind}: '{value}'")]
    UnknownIdentifier { kind: &'static str, value: String },

    /// The mapping table is malformed.
    #[error("Invalid mapping table: {0}")]
    InvalidMapping(String),

    /// A review round cannot be recorded as requested.
    #[error("Invalid review round: {0}")]
    InvalidRound(String),

    /// The referenced review round does not exist.
    #[error("Review round not found: submission {submission} {stage} round {round}")]
    RoundNotFound {
        submission: SubmissionId,
        stage: WorkflowStage,
        round: u32,
    },

    /// Input exceeds one of the limits in [`crate::primitives`].
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_parse_back() {
        for stage in FileStage::ALL {
            assert_eq!(stage.as_str().parse::<FileStage>().ok(), Some(stage));
        }
        for role in RoleId::ALL {
            assert_eq!(role.to_string().parse::<RoleId>().ok(), Some(role));
        }
    }

    #[test]
    fn unknown_file_stage_is_rejected() {
        let result = "manuscript".parse::<FileStage>();
        assert!(matches!(
            result,
            Err(StageGateError::UnknownIdentifier {
                kind: "file stage",
                ..
            })
        ));
    }

    #[test]
    fn revision_stages_map_to_review_stages() {
        assert_eq!(
            FileStage::ReviewRevision.review_workflow_stage(),
            Some(WorkflowStage::ExternalReview)
        );
        assert_eq!(
            FileStage::InternalReviewRevision.review_workflow_stage(),
            Some(WorkflowStage::InternalReview)
        );
        assert_eq!(FileStage::ReviewFile.review_workflow_stage(), None);
    }

    #[test]
    fn workflow_stage_codes_are_distinct() {
        let codes: BTreeSet<u8> = WorkflowStage::ALL.iter().map(WorkflowStage::code).collect();
        assert_eq!(codes.len(), WorkflowStage::ALL.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn editorial_roles() {
        let editorial: Vec<_> = RoleId::ALL.into_iter().filter(RoleId::is_editorial).collect();
        assert_eq!(
            editorial,
            vec![
                RoleId::SiteAdmin,
                RoleId::Manager,
                RoleId::SubEditor,
                RoleId::Assistant
            ]
        );
    }

    #[test]
    fn sole_role_requires_exactly_one() {
        let only_author =
            StageAssignments::new().with(WorkflowStage::Submission, RoleId::Author);
        assert!(only_author.is_sole_role(WorkflowStage::Submission, RoleId::Author));

        let shared = only_author
            .clone()
            .with(WorkflowStage::Submission, RoleId::SubEditor);
        assert!(!shared.is_sole_role(WorkflowStage::Submission, RoleId::Author));
        assert!(!only_author.is_sole_role(WorkflowStage::Editing, RoleId::Author));
    }

    #[test]
    fn empty_role_sets_are_pruned() {
        let mut raw = BTreeMap::new();
        raw.insert(WorkflowStage::Editing, BTreeSet::new());
        let assignments = StageAssignments::from(raw);
        assert!(assignments.is_empty());
    }

    #[test]
    fn assignments_from_pairs_group_by_stage() {
        let assignments = StageAssignments::from_pairs([
            (WorkflowStage::Production, RoleId::Assistant),
            (WorkflowStage::Production, RoleId::Author),
            (WorkflowStage::Submission, RoleId::Author),
        ]);
        assert_eq!(
            assignments.roles_at(WorkflowStage::Production).map(BTreeSet::len),
            Some(2)
        );
        assert!(assignments.is_sole_role(WorkflowStage::Submission, RoleId::Author));
        assert!(assignments.roles_at(WorkflowStage::Editing).is_none());
    }

    #[test]
    fn raw_request_without_stage() {
        assert_eq!(
            AccessRequest::from_raw(None, FileAction::Read).file_stage,
            None
        );
        assert_eq!(
            AccessRequest::from_raw(Some(""), FileAction::Read).file_stage,
            None
        );
        assert_eq!(
            AccessRequest::from_raw(Some("copyedit"), FileAction::Modify).file_stage,
            Some(FileStage::Copyedit)
        );
    }

    #[test]
    fn submission_progress() {
        assert!(Submission::new(SubmissionId(1), 3).is_incomplete());
        assert!(!Submission::new(SubmissionId(1), 0).is_incomplete());
    }
}
