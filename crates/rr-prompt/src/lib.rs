//! Prompt Composer: turns a role and its context into the exact text sent
//! to an agent's stdin. No crate in the source workspace composes prompts this way —
//! this is new code, built as a pure function over plain data the way the
//! corpus prefers a free function to a trait object wherever dispatch is
//! static and the inputs are all already in hand.

mod context;
mod schema;

pub use context::PromptContext;

use rr_core::tokens::FramingTokens;
use rr_core::types::{ChangeSetMode, Role};

/// Render the prompt for `role` given `ctx`. Pure: no I/O, no globals, no
/// randomness — the same inputs always produce the same text.
pub fn compose(role: Role, ctx: &PromptContext) -> String {
    let tokens = FramingTokens::for_role(role);
    let mut out = String::new();

    out.push_str(&role_preamble(role));
    out.push_str("\n\n");
    out.push_str(&change_set_section(ctx));
    out.push_str("\n\n");

    match role {
        Role::Reviewer => out.push_str(&prior_fix_section(ctx)),
        Role::Fixer => out.push_str(&review_section(ctx)),
        Role::Simplifier => {}
    }

    out.push_str(&iteration_section(ctx));
    out.push_str("\n\n");
    out.push_str(&reply_contract_section(role, tokens));

    out
}

fn role_preamble(role: Role) -> String {
    match role {
        Role::Reviewer => {
            "You are the reviewer in an automated review/fix loop. Examine the change \
             set below and report findings worth fixing. Do not edit any files \
             yourself; you only report."
                .to_string()
        }
        Role::Fixer => {
            "You are the fixer in an automated review/fix loop. Apply fixes for the \
             findings the reviewer just reported, editing files directly. Do not \
             introduce unrelated changes."
                .to_string()
        }
        Role::Simplifier => {
            "You are the code simplifier, running once before the review loop begins. \
             Look for unnecessary complexity, dead code, and needless abstraction in \
             the change set below, and simplify it directly. There is no prior review \
             to reference; report your own findings as you fix them."
                .to_string()
        }
    }
}

fn change_set_section(ctx: &PromptContext) -> String {
    let mode_label = match ctx.change_set.mode {
        ChangeSetMode::Uncommitted => "uncommitted changes in the working tree",
        ChangeSetMode::Base => "the diff against the configured base branch",
        ChangeSetMode::Commit => "the diff introduced by a single commit",
        ChangeSetMode::Custom => "a custom change set with no diff text of its own",
    };
    let mut section = format!("## Change set ({mode_label})\n\n");
    if ctx.change_set.diff_text.is_empty() {
        section.push_str("(no diff text)\n");
    } else {
        section.push_str("```diff\n");
        section.push_str(&ctx.change_set.diff_text);
        if !ctx.change_set.diff_text.ends_with('\n') {
            section.push('\n');
        }
        section.push_str("```\n");
    }
    if let Some(custom) = ctx.custom_instructions {
        section.push_str("\n## Custom instructions\n\n");
        section.push_str(custom);
        section.push('\n');
    }
    section
}

fn review_section(ctx: &PromptContext) -> String {
    let mut section = String::from("## Review to fix\n\n");
    match ctx.review_summary {
        Some(review) => {
            section.push_str(&serde_json::to_string_pretty(review).unwrap_or_default());
            section.push('\n');
            section.push_str(
                "\nOnly reference finding ids that appear above, in either `fixes` or \
                 `skipped`.\n",
            );
        }
        None => section.push_str("(no review findings; nothing to fix this iteration)\n"),
    }
    section
}

fn prior_fix_section(ctx: &PromptContext) -> String {
    let mut section = String::from("## Previous iteration's fixes\n\n");
    match ctx.prev_fix_summary {
        Some(fix) => {
            section.push_str(&serde_json::to_string_pretty(fix).unwrap_or_default());
            section.push('\n');
        }
        None => section.push_str("(this is the first iteration; there is no prior fix)\n"),
    }
    section
}

fn iteration_section(ctx: &PromptContext) -> String {
    let mut section = format!(
        "## Iteration {} of {}\n",
        ctx.iteration, ctx.max_iterations
    );
    if ctx.force_max_iterations {
        section.push_str(
            "Iterations will continue to the configured maximum even if you set \
             `stop_iteration: true`; set it honestly regardless — it is still recorded.\n",
        );
    } else {
        section.push_str(
            "Set `stop_iteration: true` once and only once no further changes are \
             desirable; doing so ends the loop early.\n",
        );
    }
    section
}

fn reply_contract_section(role: Role, tokens: FramingTokens) -> String {
    let shape = match role {
        Role::Reviewer => schema::REVIEW_JSON_SHAPE,
        Role::Fixer => schema::FIX_JSON_SHAPE,
        Role::Simplifier => schema::SIMPLIFY_JSON_SHAPE,
    };
    format!(
        "## Reply format\n\n\
         Wrap your entire structured reply between {start} and {end}, with nothing \
         but the JSON object in between. Do not wrap it in a code fence. The JSON \
         must conform exactly to this shape:\n\n\
         {shape}\n",
        start = tokens.start,
        end = tokens.end,
        shape = shape,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_core::types::{ChangeSet, ChangeSetMode, Decision, Finding, Priority, ReviewSummary};

    fn change_set() -> ChangeSet {
        ChangeSet {
            mode: ChangeSetMode::Uncommitted,
            diff_text: "diff --git a/x b/x\n+added line\n".to_string(),
            rollback_anchor: None,
        }
    }

    fn base_ctx(change_set: &ChangeSet) -> PromptContext<'_> {
        PromptContext {
            change_set,
            iteration: 1,
            max_iterations: 5,
            force_max_iterations: false,
            custom_instructions: None,
            review_summary: None,
            prev_fix_summary: None,
        }
    }

    #[test]
    fn reviewer_prompt_contains_diff_and_framing_tokens() {
        let cs = change_set();
        let ctx = base_ctx(&cs);
        let prompt = compose(Role::Reviewer, &ctx);
        assert!(prompt.contains("added line"));
        assert!(prompt.contains("<<<RALPH_REVIEW_START>>>"));
        assert!(prompt.contains("<<<RALPH_REVIEW_END>>>"));
        assert!(prompt.contains("no prior fix"));
    }

    #[test]
    fn fixer_prompt_embeds_the_review_and_its_framing_tokens() {
        let cs = change_set();
        let review = ReviewSummary {
            decision: Decision::ApplySelectively,
            stop_iteration: false,
            findings: vec![Finding {
                id: 1,
                title: "missing bounds check".to_string(),
                priority: Priority::P1,
                file: "src/x.rs".to_string(),
                claim: "index may be out of range".to_string(),
                evidence: "line 42".to_string(),
                suggestion: "add a bounds check".to_string(),
            }],
        };
        let mut ctx = base_ctx(&cs);
        ctx.review_summary = Some(&review);
        let prompt = compose(Role::Fixer, &ctx);
        assert!(prompt.contains("missing bounds check"));
        assert!(prompt.contains("<<<RALPH_FIX_START>>>"));
        assert!(prompt.contains("Only reference finding ids"));
    }

    #[test]
    fn simplifier_prompt_has_no_review_or_prior_fix_section() {
        let cs = change_set();
        let ctx = base_ctx(&cs);
        let prompt = compose(Role::Simplifier, &ctx);
        assert!(!prompt.contains("## Review to fix"));
        assert!(!prompt.contains("## Previous iteration's fixes"));
        assert!(prompt.contains("<<<RALPH_SIMPLIFY_START>>>"));
    }

    #[test]
    fn force_max_iterations_is_disclosed_in_the_prompt() {
        let cs = change_set();
        let mut ctx = base_ctx(&cs);
        ctx.force_max_iterations = true;
        let prompt = compose(Role::Reviewer, &ctx);
        assert!(prompt.contains("continue to the configured maximum"));
    }

    #[test]
    fn custom_instructions_are_appended_when_present() {
        let cs = change_set();
        let mut ctx = base_ctx(&cs);
        ctx.custom_instructions = Some("pay special attention to error handling");
        let prompt = compose(Role::Reviewer, &ctx);
        assert!(prompt.contains("pay special attention to error handling"));
    }

    #[test]
    fn embedded_review_schema_is_itself_parseable_by_the_structured_output_parser() {
        let cs = change_set();
        let ctx = base_ctx(&cs);
        let prompt = compose(Role::Reviewer, &ctx);
        let tokens = FramingTokens::for_role(Role::Reviewer);
        let example = format!(
            "{}{{\"decision\":\"NO_CHANGES_NEEDED\",\"stop_iteration\":true,\"findings\":[]}}{}",
            tokens.start, tokens.end
        );
        let outcome = rr_parser::parse::<ReviewSummary>(None, &example, tokens).unwrap();
        assert_eq!(outcome.value.decision, Decision::NoChangesNeeded);
        // sanity: the prompt actually documents the same token pair used above.
        assert!(prompt.contains(tokens.start));
    }
}
