use crate::parser::{contains_artifacts, ParseLayer, ParsedAnswer};

const MIN_ANSWER_LENGTH: usize = 20;

/// Layers the parser only reaches when the first three (XML tag, JSON,
/// final-answer marker) all failed to find a clean answer — reaching them
/// at all is itself evidence the raw response carried reasoning artifacts.
fn layer_implies_artifact(layer: ParseLayer) -> bool {
    matches!(layer, ParseLayer::RegexCleaned | ParseLayer::RawPassthrough)
}

/// Penalty-based quality score over a parsed answer: start at 1.0 and
/// subtract fixed penalties for each defect found, floored implicitly at 0
/// by the empty-answer short circuit.
pub fn score(parsed: &ParsedAnswer, question: &str) -> f32 {
    let trimmed = parsed.text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let mut score = 1.0_f32;

    if layer_implies_artifact(parsed.layer) || contains_artifacts(trimmed) {
        score -= 0.4;
    }
    if trimmed.chars().count() < MIN_ANSWER_LENGTH {
        score -= 0.3;
    }
    if has_duplicate_sentence(trimmed) {
        score -= 0.2;
    }
    if !question.trim().is_empty() && trimmed.to_lowercase().contains(&question.trim().to_lowercase()) {
        score -= 0.1;
    }

    score.max(0.0)
}

fn has_duplicate_sentence(text: &str) -> bool {
    let mut seen = std::collections::HashSet::new();
    for sentence in text.split(['.', '!', '?']) {
        let normalized = sentence.trim().to_lowercase();
        if normalized.is_empty() {
            continue;
        }
        if !seen.insert(normalized) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_response;

    #[test]
    fn empty_answer_scores_zero() {
        assert_eq!(score(&parse_response("   "), "what is x?"), 0.0);
    }

    #[test]
    fn clean_long_answer_scores_full_marks() {
        let raw = "<answer>IBM's total revenue in fiscal year 2022 was $60.5 billion, up 6 percent year over year.</answer>";
        assert_eq!(score(&parse_response(raw), "What was IBM's revenue?"), 1.0);
    }

    #[test]
    fn short_answer_is_penalized() {
        let parsed = parse_response("<answer>Yes.</answer>");
        assert!((score(&parsed, "Is it true?") - 0.7).abs() < 1e-6);
    }

    #[test]
    fn answer_requiring_regex_cleanup_is_penalized_as_an_artifact() {
        let raw = "Based on the analysis: $73.6B";
        let parsed = parse_response(raw);
        assert_eq!(parsed.layer, ParseLayer::RegexCleaned);
        let got = score(&parsed, "What was the revenue?");
        assert!((got - 0.3).abs() < 1e-6, "got {got}");
    }

    #[test]
    fn question_echo_inside_clean_answer_is_penalized() {
        let question = "What was the revenue?";
        let raw = "<answer>What was the revenue? It was high enough to matter.</answer>";
        let parsed = parse_response(raw);
        let got = score(&parsed, question);
        assert!((got - 0.9).abs() < 1e-6, "got {got}");
    }

    #[test]
    fn duplicate_sentence_is_penalized() {
        let raw = "<answer>The sky is blue today. The sky is blue today.</answer>";
        let parsed = parse_response(raw);
        assert!((score(&parsed, "What color is the sky?") - 0.8).abs() < 1e-6);
    }
}
