//! String-state-machine scanners used to build the attempt ladder.

use rr_core::tokens::FramingTokens;

/// Extract text strictly between `tokens.start` and `tokens.end`, trimmed.
pub fn extract_framed(text: &str, tokens: FramingTokens) -> Option<String> {
    let start = text.find(tokens.start)? + tokens.start.len();
    let rest = &text[start..];
    let end = rest.find(tokens.end)?;
    Some(rest[..end].trim().to_string())
}

/// Extract the first ```json fenced block, trimmed.
pub fn extract_first_fenced_json(text: &str) -> Option<String> {
    let marker = "```json";
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim().to_string())
}

/// Find every maximal top-level brace-balanced `{...}` substring, tracking
/// string/escape state so braces inside string literals are ignored.
/// Returned in reverse order of occurrence (rightmost first).
pub fn balanced_objects_reverse(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans = Vec::new();
    let mut depth: i32 = 0;
    let mut start: Option<usize> = None;
    let mut in_string = false;
    let mut escape = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start.take() {
                            let span: String = chars[s..=i].iter().collect();
                            spans.push(span);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    spans.reverse();
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKENS: FramingTokens = FramingTokens {
        start: "<<<S>>>",
        end: "<<<E>>>",
    };

    #[test]
    fn extract_framed_returns_inner_text() {
        let text = "prefix<<<S>>>{\"a\":1}<<<E>>>suffix";
        assert_eq!(extract_framed(text, TOKENS).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn extract_framed_none_when_missing() {
        assert!(extract_framed("nothing here", TOKENS).is_none());
    }

    #[test]
    fn extract_fenced_json_ignores_braces_in_prose() {
        let text = "look at {this} then\n```json\n{\"a\":1}\n```\ndone";
        assert_eq!(extract_first_fenced_json(text).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn balanced_objects_reverse_finds_multiple_top_level_objects() {
        let text = "{\"a\":1} noise {\"b\":{\"c\":2}}";
        let spans = balanced_objects_reverse(text);
        assert_eq!(spans, vec!["{\"b\":{\"c\":2}}", "{\"a\":1}"]);
    }

    #[test]
    fn balanced_objects_ignores_braces_in_strings() {
        let text = "{\"a\":\"}weird{\"}";
        let spans = balanced_objects_reverse(text);
        assert_eq!(spans, vec!["{\"a\":\"}weird{\"}"]);
    }
}
