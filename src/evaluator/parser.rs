// src/evaluator/parser.rs — Parse LLM relevance judgments into structured results

use crate::core::types::{EvaluationResult, PatentRecord, Verdict};
use crate::util::normalize_patent_id;

/// Parse an evaluator reply.
///
/// Expected format:
/// ```text
/// VERDICT: MET | NOT_MET
/// SCORE: 0.75
/// RELEVANT: JP2021123456A, US10123456B2
/// RATIONALE: free text, may continue on following lines
/// ```
///
/// Relevant identifiers not present in `batch` are dropped. A missing verdict
/// is derived from the score and `threshold`.
pub fn parse_evaluation(response: &str, batch: &[PatentRecord], threshold: f32) -> EvaluationResult {
    let mut verdict: Option<Verdict> = None;
    let mut score: Option<f32> = None;
    let mut relevant_ids: Vec<String> = Vec::new();
    let mut rationale = String::new();

    let mut section = Section::None;

    for line in response.lines() {
        let trimmed = line.trim().trim_start_matches(['*', '#']).trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(rest) = strip_label(trimmed, "VERDICT") {
            verdict = parse_verdict(rest);
            section = Section::None;
            continue;
        }
        if let Some(rest) = strip_label(trimmed, "SCORE") {
            score = parse_score(rest);
            section = Section::None;
            continue;
        }
        if let Some(rest) = strip_label(trimmed, "RELEVANT") {
            collect_ids(rest, batch, &mut relevant_ids);
            section = Section::Relevant;
            continue;
        }
        if let Some(rest) = strip_label(trimmed, "RATIONALE") {
            push_text(&mut rationale, rest);
            section = Section::Rationale;
            continue;
        }

        match section {
            Section::Relevant => collect_ids(trimmed.trim_start_matches('-'), batch, &mut relevant_ids),
            Section::Rationale => push_text(&mut rationale, trimmed),
            Section::None => {}
        }
    }

    let verdict = verdict.unwrap_or(match score {
        Some(s) if s >= threshold => Verdict::Met,
        _ => Verdict::NotMet,
    });
    let score = score.unwrap_or(match verdict {
        Verdict::Met => 1.0,
        Verdict::NotMet => 0.0,
    });
    if rationale.is_empty() {
        rationale = response.trim().to_string();
    }

    EvaluationResult {
        verdict,
        score,
        rationale,
        relevant_ids,
    }
}

enum Section {
    None,
    Relevant,
    Rationale,
}

/// Match "LABEL:" case-insensitively and return the text after the colon.
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    let rest = line[label.len()..].trim_start_matches('*').trim_start();
    rest.strip_prefix(':')
        .map(|r| r.trim().trim_matches('*').trim())
}

pub(crate) fn parse_verdict(s: &str) -> Option<Verdict> {
    let key: String = s
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    match key.as_str() {
        "MET" | "YES" | "SATISFIED" | "TRUE" => Some(Verdict::Met),
        "NOTMET" | "NO" | "UNSATISFIED" | "NOTSATISFIED" | "FALSE" => Some(Verdict::NotMet),
        _ => None,
    }
}

/// Accepts "0.8" or "8/10". Out-of-range values are rejected.
pub(crate) fn parse_score(s: &str) -> Option<f32> {
    let s = s.trim();
    let value = if let Some((num, den)) = s.split_once('/') {
        let num: f32 = num.trim().parse().ok()?;
        let den: f32 = den.trim().parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        num / den
    } else {
        s.split_whitespace().next()?.parse().ok()?
    };

    (0.0..=1.0).contains(&value).then_some(value)
}

fn collect_ids(text: &str, batch: &[PatentRecord], out: &mut Vec<String>) {
    for token in text.split(|c: char| c == ',' || c == ';' || c.is_whitespace()) {
        let id = normalize_patent_id(token);
        if id.is_empty() || out.contains(&id) {
            continue;
        }
        if batch.iter().any(|r| r.id == id) {
            out.push(id);
        }
    }
}

fn push_text(buf: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !buf.is_empty() {
        buf.push(' ');
    }
    buf.push_str(text);
}
