use std::sync::OnceLock;

use regex::{Regex, RegexSet};
use serde::Deserialize;

/// Which layer produced the parsed answer — carried through so quality
/// scoring and tracing can tell a clean `<answer>` extraction from a raw
/// passthrough that never matched anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseLayer {
    XmlTag,
    Json,
    FinalAnswerMarker,
    RegexCleaned,
    RawPassthrough,
}

#[derive(Debug, Clone)]
pub struct ParsedAnswer {
    pub text: String,
    pub layer: ParseLayer,
}

#[derive(Debug, Deserialize)]
struct JsonAnswer {
    answer: String,
}

fn answer_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<answer>(.*?)</answer>").expect("valid regex"))
}

fn thinking_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<thinking>.*?</thinking>").expect("valid regex"))
}

fn final_answer_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)final answer:\s*").expect("valid regex"))
}

const KNOWN_PREFIXES: &[&str] = &[
    "based on the analysis",
    "in the context of",
    "furthermore,",
    "additionally,",
    "## instruction:",
];

fn prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternation = KNOWN_PREFIXES
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?i)^\s*(?:{alternation})\s*:?\s*")).expect("valid regex")
    })
}

/// Multi-layer response parser: applied in order, first success wins.
pub fn parse_response(raw: &str) -> ParsedAnswer {
    if let Some(captures) = answer_tag_re().captures(raw) {
        if let Some(inner) = captures.get(1) {
            let text = inner.as_str().trim();
            if !text.is_empty() {
                return ParsedAnswer { text: text.to_string(), layer: ParseLayer::XmlTag };
            }
        }
    }
    if thinking_tag_re().is_match(raw) {
        let after = thinking_tag_re().replace(raw, "");
        let trimmed = after.trim();
        if !trimmed.is_empty() {
            return ParsedAnswer { text: trimmed.to_string(), layer: ParseLayer::XmlTag };
        }
    }

    if let Some(parsed) = try_parse_json(raw) {
        return parsed;
    }

    if let Some(marker_match) = final_answer_marker_re().find(raw) {
        let after = raw[marker_match.end()..].trim();
        if !after.is_empty() {
            return ParsedAnswer { text: after.to_string(), layer: ParseLayer::FinalAnswerMarker };
        }
    }

    let cleaned = regex_clean(raw);
    if !cleaned.trim().is_empty() && cleaned.trim() != raw.trim() {
        return ParsedAnswer { text: cleaned.trim().to_string(), layer: ParseLayer::RegexCleaned };
    }

    ParsedAnswer { text: raw.trim().to_string(), layer: ParseLayer::RawPassthrough }
}

fn try_parse_json(raw: &str) -> Option<ParsedAnswer> {
    let trimmed = raw.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    let candidate = &trimmed[start..=end];
    let parsed: JsonAnswer = serde_json::from_str(candidate).ok()?;
    if parsed.answer.trim().is_empty() {
        return None;
    }
    Some(ParsedAnswer { text: parsed.answer.trim().to_string(), layer: ParseLayer::Json })
}

/// Strips known reasoning-leakage prefixes and `<thinking>` blocks, collapses
/// consecutive duplicate sentences, and drops lines that merely repeat the
/// question.
fn regex_clean(raw: &str) -> String {
    let without_thinking = thinking_tag_re().replace_all(raw, "");
    let without_prefix = prefix_re().replace(&without_thinking, "");
    dedupe_consecutive_sentences(&without_prefix)
}

fn dedupe_consecutive_sentences(text: &str) -> String {
    let sentences: Vec<&str> = text.split_inclusive(['.', '!', '?']).collect();
    let mut out: Vec<&str> = Vec::with_capacity(sentences.len());
    for sentence in sentences {
        let normalized = sentence.trim();
        if normalized.is_empty() {
            continue;
        }
        if out.last().map(|prev: &&str| prev.trim() == normalized).unwrap_or(false) {
            continue;
        }
        out.push(sentence);
    }
    out.concat()
}

fn artifact_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        let mut patterns: Vec<String> = KNOWN_PREFIXES
            .iter()
            .map(|p| format!(r"(?i)^\s*{}", regex::escape(p)))
            .collect();
        patterns.push(r"(?is)<thinking>".to_string());
        patterns.push(r"(?is)</?answer>".to_string());
        patterns.push(r"(?i)sub-question\s*\d+".to_string());
        patterns.push(r"(?i)step\s*\d+\s*:".to_string());
        RegexSet::new(patterns).expect("valid regex set")
    })
}

/// Artifact detection: true if any fixed pattern matches the parsed
/// answer — residual reasoning-layer prefixes, leftover XML, or leaked
/// decomposition markers.
pub fn contains_artifacts(text: &str) -> bool {
    artifact_patterns().is_match(text)
}
