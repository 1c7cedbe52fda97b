//! The JSON shape descriptions embedded verbatim in composed prompts. Kept
//! in one place so the reviewer and fixer prompts stay in lockstep with the
//! fields [`rr_core::types`] and the Structured Output Parser actually
//! expect.

pub const REVIEW_JSON_SHAPE: &str = r#"{
  "decision": "NO_CHANGES_NEEDED" | "APPLY_SELECTIVELY" | "APPLY_MOST" | "APPLY_ALL",
  "stop_iteration": boolean,
  "findings": [
    {
      "id": integer (starting at 1, unique within this reply),
      "title": string,
      "priority": "p0" | "p1" | "p2" | "p3",
      "file": string,
      "claim": string,
      "evidence": string,
      "suggestion": string
    }
  ]
}"#;

pub const FIX_JSON_SHAPE: &str = r#"{
  "decision": "NO_CHANGES_NEEDED" | "APPLY_SELECTIVELY" | "APPLY_MOST" | "APPLY_ALL",
  "stop_iteration": boolean,
  "fixes": [
    {
      "id": integer (must match a finding id from the review above),
      "title": string,
      "priority": "p0" | "p1" | "p2" | "p3",
      "file": string,
      "claim": string,
      "evidence": string,
      "fix": string (what was changed and why)
    }
  ],
  "skipped": [
    {
      "id": integer (must match a finding id from the review above),
      "title": string,
      "priority": "p0" | "p1" | "p2" | "p3",
      "reason": string
    }
  ]
}"#;

pub const SIMPLIFY_JSON_SHAPE: &str = r#"{
  "decision": "NO_CHANGES_NEEDED" | "APPLY_SELECTIVELY" | "APPLY_MOST" | "APPLY_ALL",
  "stop_iteration": boolean,
  "fixes": [
    {
      "id": integer (any small positive integer, this pass has no prior findings to reference),
      "title": string,
      "priority": "p0" | "p1" | "p2" | "p3",
      "file": string,
      "claim": string,
      "evidence": string,
      "fix": string (what was simplified and why)
    }
  ],
  "skipped": []
}"#;
