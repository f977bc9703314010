//! # Evaluation Context
//!
//! Caller-owned state shared by the authorization checks of one request.
//!
//! The evaluator publishes the full assignable file-stage set here when it
//! permits a request, so later listing and filtering in the same request can
//! reuse it instead of recomputing. Nothing else is ever written.
//!
//! Denials never write. A context reused across evaluations keeps the set of
//! the last permit, so `can_access` and `filter_by_stage` keep answering from
//! it after a later denial. Call [`EvaluationContext::clear`] between requests
//! that must not share it.

use crate::FileStage;
use std::collections::BTreeSet;

/// Per-request evaluation context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationContext {
    accessible_file_stages: Option<BTreeSet<FileStage>>,
}

impl EvaluationContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// File stages published by the last permitting evaluation, if any.
    #[must_use]
    pub fn accessible_file_stages(&self) -> Option<&BTreeSet<FileStage>> {
        self.accessible_file_stages.as_ref()
    }

    /// Store the assignable set. Called by the evaluator only.
    pub(crate) fn publish(&mut self, stages: BTreeSet<FileStage>) {
        self.accessible_file_stages = Some(stages);
    }

    /// Whether `stage` is in the published set. False when nothing was published.
    #[must_use]
    pub fn can_access(&self, stage: FileStage) -> bool {
        self.accessible_file_stages
            .as_ref()
            .is_some_and(|stages| stages.contains(&stage))
    }

    /// Keep only the items whose file stage is in the published set.
    ///
    /// Returns nothing when no set was published.
    pub fn filter_by_stage<T, F>(&self, items: impl IntoIterator<Item = T>, stage_of: F) -> Vec<T>
    where
        F: Fn(&T) -> FileStage,
    {
        items
            .into_iter()
            .filter(|item| self.can_access(stage_of(item)))
            .collect()
    }

    /// Forget the published set.
    pub fn clear(&mut self) {
        self.accessible_file_stages = None;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_grants_nothing() {
        let ctx = EvaluationContext::new();
        assert!(ctx.accessible_file_stages().is_none());
        assert!(!ctx.can_access(FileStage::Submission));
        let kept = ctx.filter_by_stage([FileStage::Submission], |stage| *stage);
        assert!(kept.is_empty());
    }

    #[test]
    fn filter_keeps_published_stages() {
        let mut ctx = EvaluationContext::new();
        ctx.publish([FileStage::Final, FileStage::Copyedit].into_iter().collect());

        let files = vec![
            ("chapter-1.docx", FileStage::Final),
            ("notes.txt", FileStage::Note),
            ("chapter-1-ce.docx", FileStage::Copyedit),
        ];
        let kept = ctx.filter_by_stage(files, |(_, stage)| *stage);
        let names: Vec<_> = kept.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["chapter-1.docx", "chapter-1-ce.docx"]);
    }

    #[test]
    fn clear_forgets() {
        let mut ctx = EvaluationContext::new();
        ctx.publish([FileStage::Proof].into_iter().collect());
        assert!(ctx.can_access(FileStage::Proof));
        ctx.clear();
        assert!(!ctx.can_access(FileStage::Proof));
    }
}
