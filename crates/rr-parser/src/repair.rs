//! Best-effort repair of near-miss JSON candidates, applied in order:
//! unwrap fence, normalize smart quotes, isolate the last balanced
//! object, strip trailing commas.

use crate::scan::balanced_objects_reverse;

fn unwrap_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(after_marker) = trimmed.strip_prefix("```json") else {
        return text.to_string();
    };
    let after_marker = after_marker.strip_prefix('\n').unwrap_or(after_marker);
    match after_marker.rfind("```") {
        Some(end) => after_marker[..end].trim().to_string(),
        None => after_marker.trim().to_string(),
    }
}

fn normalize_smart_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201c}' | '\u{201d}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect()
}

fn isolate_last_balanced_object(text: &str) -> String {
    match balanced_objects_reverse(text).into_iter().next() {
        Some(span) => span,
        None => text.to_string(),
    }
}

fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escape = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
            continue;
        }
        if c == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                i += 1;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Apply the full repair pipeline to a single candidate string.
pub fn repair_candidate(text: &str) -> String {
    let unwrapped = unwrap_fence(text);
    let quoted = normalize_smart_quotes(&unwrapped);
    let isolated = isolate_last_balanced_object(&quoted);
    strip_trailing_commas(&isolated)
}
