use rr_core::types::{ChangeSet, FixSummary, ReviewSummary};

/// Everything [`crate::compose`] needs to build one role's prompt. Carries
/// no I/O of its own — every field is a value already produced elsewhere
/// (the Change-Set Provider, a prior iteration's parsed reply).
pub struct PromptContext<'a> {
    pub change_set: &'a ChangeSet,
    pub iteration: u32,
    pub max_iterations: u32,
    pub force_max_iterations: bool,
    pub custom_instructions: Option<&'a str>,
    /// This iteration's review, read by the fixer prompt. `None` for the
    /// reviewer's own prompt and for a standalone simplifier pass.
    pub review_summary: Option<&'a ReviewSummary>,
    /// The previous iteration's fix, read by the reviewer prompt so it can
    /// see what just changed. `None` on iteration 1.
    pub prev_fix_summary: Option<&'a FixSummary>,
}
