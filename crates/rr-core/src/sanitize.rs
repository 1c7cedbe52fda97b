//! Path/branch sanitization shared by the Event Log and Lockfile components.
//!
//! Rule, verbatim from the filesystem-layout contract: replace any
//! non-`[A-Za-z0-9_-]` run with `-`; collapse runs of `-`; trim leading and
//! trailing `-`; lowercase.

/// Sanitize a single path or branch component.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_was_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c.to_ascii_lowercase());
            prev_was_dash = c == '-';
        } else if !prev_was_dash {
            out.push('-');
            prev_was_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

/// Sanitize a full project path for use as a directory name. The
/// degenerate root path sanitizes to the literal `unknown-project`.
pub fn sanitize_project_path(path: &str) -> String {
    let sanitized = sanitize(path);
    if sanitized.is_empty() {
        "unknown-project".to_string()
    } else {
        sanitized
    }
}

/// Sanitize and truncate to ≤20 chars, for project basenames used in
/// operator-visible session names.
pub fn sanitize_for_session_name(input: &str) -> String {
    let sanitized = sanitize_project_path(input);
    sanitized.chars().take(20).collect()
}
