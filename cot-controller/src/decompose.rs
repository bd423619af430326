/// Heuristic complexity classifier: short, single-clause questions skip
/// decomposition entirely rather than paying for a DECOMPOSE round trip that
/// would almost certainly return the question unchanged.
const COMPLEXITY_MARKERS: &[&str] = &["compare", "difference between", " and ", " versus ", " vs "];

pub fn classify_simple(question: &str) -> bool {
    let lowered = question.to_lowercase();
    let question_marks = lowered.matches('?').count();
    let word_count = lowered.split_whitespace().count();
    let has_marker = COMPLEXITY_MARKERS.iter().any(|marker| lowered.contains(marker));
    question_marks <= 1 && word_count <= 15 && !has_marker
}

/// Parses the DECOMPOSE response into an ordered list of sub-questions.
/// Tries a JSON array of strings first (the decomposition template asks for
/// one), then falls back to splitting numbered or bulleted lines.
pub fn decompose_questions(raw: &str) -> Vec<String> {
    if let Some(list) = try_parse_json_array(raw) {
        return list;
    }
    parse_line_list(raw)
}

fn try_parse_json_array(raw: &str) -> Option<Vec<String>> {
    let trimmed = raw.trim();
    let start = trimmed.find('[')?;
    let end = trimmed.rfind(']')?;
    if end <= start {
        return None;
    }
    let candidate = &trimmed[start..=end];
    let parsed: Vec<String> = serde_json::from_str(candidate).ok()?;
    let cleaned: Vec<String> = parsed.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn parse_line_list(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            let stripped = trimmed
                .trim_start_matches(|c: char| c.is_ascii_digit())
                .trim_start_matches('.')
                .trim_start_matches(')')
                .trim_start_matches('-')
                .trim_start_matches('*')
                .trim();
            if stripped.is_empty() {
                None
            } else {
                Some(stripped.to_string())
            }
        })
        .collect()
}
