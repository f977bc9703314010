//! # Role/Stage Mapping Table
//!
//! Base grants: which file stages a subject may read or modify, given the
//! workflow stages it is assigned to and the roles it holds there.
//!
//! The table is policy data. [`MappingTable::default`] carries the standard
//! editorial table; deployments may replace it (the app loads it from TOML).
//! The evaluator only sees the [`FileStageMapping`] trait.

use crate::{FileAction, FileStage, RoleId, StageAssignments, StageGateError, WorkflowStage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// MAPPING TRAIT
// =============================================================================

/// Pure lookup from stage assignments to assignable file stages.
///
/// Implementors must be `Send + Sync` so one table can serve concurrent
/// evaluations.
pub trait FileStageMapping: Send + Sync {
    /// File stages the assignments grant for `action`.
    fn assigned_file_stages(
        &self,
        assignments: &StageAssignments,
        action: FileAction,
    ) -> BTreeSet<FileStage>;
}

// =============================================================================
// MAPPING RULE
// =============================================================================

/// One row of the table.
///
/// Applies when the subject is assigned to `workflow_stage` with at least one
/// of `roles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingRule {
    pub workflow_stage: WorkflowStage,
    pub roles: BTreeSet<RoleId>,
    #[serde(default)]
    pub read: BTreeSet<FileStage>,
    #[serde(default)]
    pub modify: BTreeSet<FileStage>,
}

impl MappingRule {
    /// Create a rule.
    pub fn new(
        workflow_stage: WorkflowStage,
        roles: impl IntoIterator<Item = RoleId>,
        read: impl IntoIterator<Item = FileStage>,
        modify: impl IntoIterator<Item = FileStage>,
    ) -> Self {
        Self {
            workflow_stage,
            roles: roles.into_iter().collect(),
            read: read.into_iter().collect(),
            modify: modify.into_iter().collect(),
        }
    }

    /// Grants of this rule for `action`.
    #[must_use]
    pub fn grants(&self, action: FileAction) -> &BTreeSet<FileStage> {
        match action {
            FileAction::Read => &self.read,
            FileAction::Modify => &self.modify,
        }
    }

    /// Whether the rule applies to the given assignments.
    #[must_use]
    pub fn applies_to(&self, assignments: &StageAssignments) -> bool {
        assignments.holds_any(self.workflow_stage, &self.roles)
    }
}

// =============================================================================
// MAPPING TABLE
// =============================================================================

/// Data-driven [`FileStageMapping`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingTable {
    #[serde(default)]
    rules: Vec<MappingRule>,
}

impl Default for MappingTable {
    fn default() -> Self {
        Self::editorial()
    }
}

impl MappingTable {
    /// A table that grants nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Build a table from rules, validating them.
    pub fn from_rules(rules: Vec<MappingRule>) -> Result<Self, StageGateError> {
        let table = Self { rules };
        table.validate()?;
        Ok(table)
    }

    /// The standard editorial table.
    ///
    /// Editorial roles read and modify the working files of every stage they
    /// are assigned to. Authors read the files addressed to them and modify
    /// nothing; their uploads go through the evaluator's carve-outs.
    #[must_use]
    pub fn editorial() -> Self {
        use FileStage as F;
        use WorkflowStage as W;

        let editorial: BTreeSet<RoleId> = RoleId::ALL
            .into_iter()
            .filter(RoleId::is_editorial)
            .collect();
        let author = [RoleId::Author];
        let none: [FileStage; 0] = [];

        let review_internal = [F::InternalReviewFile, F::InternalReviewRevision];
        let review_external = [F::ReviewFile, F::ReviewRevision, F::ReviewAttachment];
        let editing = [F::Final, F::Copyedit];
        let production = [F::ProductionReady, F::Proof];

        Self {
            rules: vec![
                MappingRule::new(W::Submission, editorial.clone(), [F::Submission], [F::Submission]),
                MappingRule::new(W::Submission, author, [F::Submission], none),
                MappingRule::new(W::InternalReview, editorial.clone(), review_internal, review_internal),
                MappingRule::new(W::InternalReview, author, [F::InternalReviewRevision], none),
                MappingRule::new(W::ExternalReview, editorial.clone(), review_external, review_external),
                MappingRule::new(W::ExternalReview, author, [F::ReviewRevision], none),
                MappingRule::new(W::Editing, editorial.clone(), editing, editing),
                MappingRule::new(W::Editing, author, [F::Copyedit], none),
                MappingRule::new(W::Production, editorial, production, production),
                MappingRule::new(W::Production, author, [F::Proof], none),
            ],
        }
    }

    /// Append a rule (builder form, unvalidated).
    #[must_use]
    pub fn with_rule(mut self, rule: MappingRule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Reject rules without roles and (stage, role) pairs claimed twice.
    pub fn validate(&self) -> Result<(), StageGateError> {
        let mut seen = BTreeSet::new();
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.roles.is_empty() {
                return Err(StageGateError::InvalidMapping(format!(
                    "rule {} for stage '{}' lists no roles",
                    index, rule.workflow_stage
                )));
            }
            for role in &rule.roles {
                if !seen.insert((rule.workflow_stage, *role)) {
                    return Err(StageGateError::InvalidMapping(format!(
                        "role '{}' is mapped twice on stage '{}'",
                        role, rule.workflow_stage
                    )));
                }
            }
        }
        Ok(())
    }
}

impl FileStageMapping for MappingTable {
    fn assigned_file_stages(
        &self,
        assignments: &StageAssignments,
        action: FileAction,
    ) -> BTreeSet<FileStage> {
        self.rules
            .iter()
            .filter(|rule| rule.applies_to(assignments))
            .flat_map(|rule| rule.grants(action).iter().copied())
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
