//! # Policy Primitives
//!
//! Hardcoded constants of the Stagegate policy.
//!
//! These are compiled into the binary and are immutable at runtime. The
//! mapping table is data and lives in [`crate::mapping`]; the rules here are not.

use crate::{DecisionCode, RoleId};

/// Decisions after which an author may upload revision files for the round.
pub const REVISION_DECISIONS: [DecisionCode; 4] = [
    DecisionCode::Accept,
    DecisionCode::PendingRevisions,
    DecisionCode::NewRound,
    DecisionCode::Resubmit,
];

/// Global role that bypasses per-stage assignment checks.
pub const BYPASS_ROLE: RoleId = RoleId::Manager;

// =============================================================================
// MESSAGE CODES
// =============================================================================

/// Denial code when the request names no recognizable file stage.
pub const MSG_NO_FILE_STAGE: &str = "api.submissionFiles.400.noFileStageId";

/// Denial code when the subject has no stage assignment and is not a manager.
pub const MSG_NO_STAGE_ASSIGNMENT: &str = "user.authorization.accessibleWorkflowStage";

/// Denial code when the file stage is outside the subject's assignable set.
pub const MSG_STAGE_NOT_ASSIGNABLE: &str = "api.submissionFiles.403.unauthorizedFileStageId";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum number of decisions stored for a single review round.
///
/// Rounds with more decisions than this are rejected by the stores.
pub const MAX_DECISIONS_PER_ROUND: usize = 256;

/// Maximum review round number accepted by the stores.
pub const MAX_ROUND_NUMBER: u32 = 1000;

/// Maximum number of roles per stage accepted at the API boundary.
pub const MAX_ROLES_PER_STAGE: usize = RoleId::ALL.len();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_decisions_are_exactly_four() {
        assert_eq!(REVISION_DECISIONS.len(), 4);
        assert!(!REVISION_DECISIONS.contains(&DecisionCode::Decline));
        assert!(!REVISION_DECISIONS.contains(&DecisionCode::ExternalReview));
    }
}
