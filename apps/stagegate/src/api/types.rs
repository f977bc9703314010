//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Identifiers travel as their snake_case wire names. Parsing into the core's
//! closed enums happens here, at the boundary, so handlers only ever see typed
//! values.

use serde::{Deserialize, Serialize};
use stagegate_core::{
    AccessRequest, Decision, DecisionCode, DenyReason, EditorialDecision, FileAction, FileStage,
    Grant, HistoryCounts, ReviewRound, RoleId, StageAssignments, StageGateError, SubjectContext,
    Submission, SubmissionId, WorkflowStage, primitives::MAX_ROLES_PER_STAGE,
};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// History store status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub backend: String,
    pub rounds: u64,
    pub decisions: u64,
    pub mapping_rules: usize,
    pub error: Option<String>,
}

impl StatusResponse {
    #[must_use]
    pub fn new(backend: &str, counts: HistoryCounts, mapping_rules: usize) -> Self {
        Self {
            success: true,
            backend: backend.to_string(),
            rounds: counts.rounds,
            decisions: counts.decisions,
            mapping_rules,
            error: None,
        }
    }

    #[must_use]
    pub fn error(backend: &str, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            backend: backend.to_string(),
            rounds: 0,
            decisions: 0,
            mapping_rules: 0,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// WIRE PARSING
// =============================================================================

/// Parse wire-format stage assignments.
///
/// Unknown stage or role names are rejected, as are oversized role lists.
pub fn parse_assignments(
    raw: &BTreeMap<String, Vec<String>>,
) -> Result<StageAssignments, StageGateError> {
    let mut assignments = StageAssignments::new();
    for (stage, roles) in raw {
        let stage: WorkflowStage = stage.parse()?;
        if roles.len() > MAX_ROLES_PER_STAGE {
            return Err(StageGateError::LimitExceeded(format!(
                "{} roles at stage {} exceeds maximum {}",
                roles.len(),
                stage,
                MAX_ROLES_PER_STAGE
            )));
        }
        for role in roles {
            assignments.assign(stage, role.parse()?);
        }
    }
    Ok(assignments)
}

fn parse_roles(raw: &[String]) -> Result<BTreeSet<RoleId>, StageGateError> {
    if raw.len() > RoleId::ALL.len() {
        return Err(StageGateError::LimitExceeded(format!(
            "{} global roles exceeds maximum {}",
            raw.len(),
            RoleId::ALL.len()
        )));
    }
    raw.iter().map(|role| role.parse()).collect()
}

// =============================================================================
// EVALUATE REQUEST/RESPONSE
// =============================================================================

/// Access evaluation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub submission_id: u64,
    /// Submission wizard step; 0 once submission is complete.
    #[serde(default)]
    pub submission_progress: u32,
    /// File stage name; absent, empty or unknown means no file stage.
    #[serde(default)]
    pub file_stage: Option<String>,
    pub action: String,
    /// Global (context-level) roles.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Workflow stage name to role names.
    #[serde(default)]
    pub stage_assignments: BTreeMap<String, Vec<String>>,
}

impl EvaluateRequest {
    /// Convert to core inputs, validating identifiers.
    ///
    /// The file stage is deliberately not validated: an unknown name reaches the
    /// evaluator as a missing stage and is denied there.
    pub fn to_parts(&self) -> Result<(AccessRequest, SubjectContext, Submission), StageGateError> {
        let action: FileAction = self.action.parse()?;
        let subject = SubjectContext::new(
            parse_roles(&self.roles)?,
            parse_assignments(&self.stage_assignments)?,
        );
        Ok((
            AccessRequest::from_raw(self.file_stage.as_deref(), action),
            subject,
            Submission::new(SubmissionId(self.submission_id), self.submission_progress),
        ))
    }
}

/// Access evaluation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub success: bool,
    pub permitted: bool,
    pub grant: Option<Grant>,
    pub denial: Option<DenyReason>,
    pub message_code: Option<String>,
    pub accessible_file_stages: Option<Vec<FileStage>>,
    pub error: Option<String>,
}

impl EvaluateResponse {
    /// Create from an evaluator decision.
    #[must_use]
    pub fn from_decision(decision: &Decision) -> Self {
        Self {
            success: true,
            permitted: decision.permitted,
            grant: decision.grant,
            denial: decision.denial,
            message_code: decision.message_code().map(str::to_string),
            accessible_file_stages: decision
                .accessible_file_stages
                .as_ref()
                .map(|stages| stages.iter().copied().collect()),
            error: None,
        }
    }

    /// Create an error response. Errors never permit.
    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            permitted: false,
            grant: None,
            denial: None,
            message_code: None,
            accessible_file_stages: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// STAGES REQUEST/RESPONSE
// =============================================================================

/// Assignable file stages request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagesRequest {
    pub action: String,
    #[serde(default)]
    pub stage_assignments: BTreeMap<String, Vec<String>>,
}

impl StagesRequest {
    pub fn to_parts(&self) -> Result<(StageAssignments, FileAction), StageGateError> {
        Ok((
            parse_assignments(&self.stage_assignments)?,
            self.action.parse()?,
        ))
    }
}

/// Assignable file stages response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagesResponse {
    pub success: bool,
    pub file_stages: Vec<FileStage>,
    pub error: Option<String>,
}

impl StagesResponse {
    #[must_use]
    pub fn success(stages: &BTreeSet<FileStage>) -> Self {
        Self {
            success: true,
            file_stages: stages.iter().copied().collect(),
            error: None,
        }
    }

    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            file_stages: Vec::new(),
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// ROUND REQUESTS/RESPONSE
// =============================================================================

/// Review round as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundJson {
    pub submission_id: u64,
    pub stage: WorkflowStage,
    pub round: u32,
}

impl From<ReviewRound> for RoundJson {
    fn from(round: ReviewRound) -> Self {
        Self {
            submission_id: round.submission_id.0,
            stage: round.stage,
            round: round.round,
        }
    }
}

/// Record review round request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRequest {
    pub submission_id: u64,
    pub stage: String,
    pub round: u32,
}

impl RoundRequest {
    pub fn to_round(&self) -> Result<ReviewRound, StageGateError> {
        Ok(ReviewRound::new(
            SubmissionId(self.submission_id),
            self.stage.parse()?,
            self.round,
        ))
    }
}

/// Latest review round request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestRoundRequest {
    pub submission_id: u64,
    pub stage: String,
}

impl LatestRoundRequest {
    pub fn to_parts(&self) -> Result<(SubmissionId, WorkflowStage), StageGateError> {
        Ok((SubmissionId(self.submission_id), self.stage.parse()?))
    }
}

/// Review round response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResponse {
    pub success: bool,
    pub found: bool,
    pub round: Option<RoundJson>,
    pub error: Option<String>,
}

impl RoundResponse {
    #[must_use]
    pub fn with_round(round: ReviewRound) -> Self {
        Self {
            success: true,
            found: true,
            round: Some(round.into()),
            error: None,
        }
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self {
            success: true,
            found: false,
            round: None,
            error: None,
        }
    }

    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            found: false,
            round: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// DECISION REQUEST/RESPONSE
// =============================================================================

/// Record editorial decision request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub submission_id: u64,
    pub stage: String,
    pub round: u32,
    pub decision: String,
}

impl DecisionRequest {
    pub fn to_parts(&self) -> Result<(ReviewRound, EditorialDecision), StageGateError> {
        let code: DecisionCode = self.decision.parse()?;
        Ok((
            ReviewRound::new(
                SubmissionId(self.submission_id),
                self.stage.parse()?,
                self.round,
            ),
            EditorialDecision::new(code),
        ))
    }
}

/// Record editorial decision response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub success: bool,
    pub error: Option<String>,
}

impl DecisionResponse {
    #[must_use]
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
        }
    }
}
