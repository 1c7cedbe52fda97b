//! Structured Output Parser: extracts and validates framed JSON payloads
//! from agent stdout, repairing common deviations.
//!
//! Follows `csa-session`'s `return_packet.rs` philosophy of never
//! hard-failing on a malformed reply — always attempt a fallback ladder and
//! report provenance — adapted from that module's TOML-section shape to
//! a JSON-framed-payload shape with its own five-attempt ladder.

mod repair;
mod scan;

use serde::de::DeserializeOwned;

use rr_core::tokens::FramingTokens;

pub use repair::repair_candidate;
pub use scan::extract_framed;

/// Where a successfully parsed value came from in the attempt ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    FramedExtracted,
    FramedRaw,
    LegacyFenced,
    LegacyDirect,
    LegacyBalanced,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::FramedExtracted => "framed-extracted",
            Source::FramedRaw => "framed-raw",
            Source::LegacyFenced => "legacy-fenced",
            Source::LegacyDirect => "legacy-direct",
            Source::LegacyBalanced => "legacy-balanced",
        }
    }
}

/// A successfully parsed, schema-valid structured reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome<T> {
    pub value: T,
    pub source: Source,
    pub used_repair: bool,
}

/// A schema-level guard applied after strict JSON parsing succeeds.
/// `ReviewSummary`/`FixSummary` implement this to reject structurally valid
/// JSON that nonetheless fails domain rules (duplicate finding ids, etc).
pub trait SchemaGuard {
    fn schema_ok(&self) -> bool {
        true
    }
}

impl SchemaGuard for rr_core::ReviewSummary {
    fn schema_ok(&self) -> bool {
        self.has_well_formed_ids()
    }
}

impl SchemaGuard for rr_core::FixSummary {
    fn schema_ok(&self) -> bool {
        true
    }
}

/// Strip BOM and zero-width characters, canonicalize line endings, trim.
fn normalize(input: &str) -> String {
    let without_bom = input.strip_prefix('\u{feff}').unwrap_or(input);
    let cleaned: String = without_bom
        .chars()
        .filter(|c| !matches!(c, '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{2060}'))
        .collect();
    cleaned.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

/// Parse `(extractedText, rawOutput)` against `T`, trying the attempt ladder
/// in order and returning the first schema-valid result.
pub fn parse<T>(
    extracted: Option<&str>,
    raw: &str,
    tokens: FramingTokens,
) -> Result<ParseOutcome<T>, String>
where
    T: DeserializeOwned + SchemaGuard,
{
    let extracted_norm = extracted.map(normalize);
    let raw_norm = normalize(raw);

    let mut attempts: Vec<(Source, String)> = Vec::new();

    if let Some(text) = &extracted_norm {
        if let Some(framed) = scan::extract_framed(text, tokens) {
            attempts.push((Source::FramedExtracted, framed));
        }
    }
    if let Some(framed) = scan::extract_framed(&raw_norm, tokens) {
        attempts.push((Source::FramedRaw, framed));
    }

    for text in extracted_norm.iter().chain(std::iter::once(&raw_norm)) {
        if let Some(fenced) = scan::extract_first_fenced_json(text) {
            attempts.push((Source::LegacyFenced, fenced));
        }
    }

    for text in extracted_norm.iter().chain(std::iter::once(&raw_norm)) {
        attempts.push((Source::LegacyDirect, text.clone()));
    }

    for text in extracted_norm.iter().chain(std::iter::once(&raw_norm)) {
        for candidate in scan::balanced_objects_reverse(text) {
            attempts.push((Source::LegacyBalanced, candidate));
        }
    }

    if attempts.is_empty() {
        return Err("no output candidates available".to_string());
    }

    for (source, candidate) in &attempts {
        if let Some(value) = try_strict::<T>(candidate) {
            return Ok(ParseOutcome {
                value,
                source: *source,
                used_repair: false,
            });
        }
        let repaired = repair::repair_candidate(candidate);
        if repaired != *candidate {
            if let Some(value) = try_strict::<T>(&repaired) {
                return Ok(ParseOutcome {
                    value,
                    source: *source,
                    used_repair: true,
                });
            }
        }
    }

    Err("no structured output candidate matched the required schema".to_string())
}

fn try_strict<T>(candidate: &str) -> Option<T>
where
    T: DeserializeOwned + SchemaGuard,
{
    let value: T = serde_json::from_str(candidate).ok()?;
    if value.schema_ok() {
        Some(value)
    } else {
        None
    }
}
