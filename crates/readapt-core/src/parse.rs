//! Parsing of free-form LLM output into typed collaborator results.
//!
//! Models wrap answers in markdown fences, add chatter around JSON, or ignore
//! the requested format entirely. Every parser here is lenient and returns
//! `None` (or an empty list) instead of an error when nothing usable is found.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::model::Rating;
use crate::traits::Grade;

lazy_static! {
    static ref RE_FIRST_NUMBER: Regex = Regex::new(r"[-+]?\d*\.?\d+").unwrap();
    static ref RE_JSON_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
    static ref RE_LIST_MARKER: Regex = Regex::new(r"^\s*(?:[-*•]|\d+[.)]|\d+\s)\s*").unwrap();
}

/// Remove markdown code fences around a model response.
///
/// Returns the contents of the first fenced block if one exists (including an
/// unclosed, truncated block), otherwise the trimmed response.
pub fn strip_code_fences(output: &str) -> String {
    let mut in_block = false;
    let mut block = Vec::new();

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            if in_block {
                return block.join("\n").trim().to_string();
            }
            in_block = true;
            continue;
        }
        if in_block {
            block.push(line);
        }
    }

    if in_block && !block.is_empty() {
        return block.join("\n").trim().to_string();
    }

    output.trim().trim_matches('`').trim().to_string()
}

/// Parse a `{"review": ..., "rating": ...}` grading response.
///
/// Falls back to the first `{...}` span when the response has surrounding text.
/// A response with a review but no numeric rating yields `rating: None`.
pub fn parse_grade(output: &str) -> Option<Grade> {
    let text = strip_code_fences(output);
    let value = serde_json::from_str::<Value>(&text).ok().or_else(|| {
        RE_JSON_OBJECT
            .find(&text)
            .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok())
    })?;

    let review = value.get("review")?.as_str()?.trim().to_string();
    let rating = value
        .get("rating")
        .and_then(Value::as_f64)
        .and_then(Rating::from_f64);

    Some(Grade { review, rating })
}

/// Parse a bare numeric difficulty score.
pub fn parse_difficulty(output: &str) -> Option<f64> {
    let text = strip_code_fences(output);
    if let Ok(Value::Number(n)) = serde_json::from_str::<Value>(&text) {
        return n.as_f64();
    }
    RE_FIRST_NUMBER
        .find(&text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Parse a list of questions.
///
/// Accepts a JSON array of strings; otherwise splits lines and strips list
/// numbering or bullets.
pub fn parse_questions(output: &str) -> Vec<String> {
    let text = strip_code_fences(output);
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&text) {
        return items
            .iter()
            .filter_map(Value::as_str)
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
    }

    text.lines()
        .map(|line| RE_LIST_MARKER.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_json() {
        let input = "```json\n{\"rating\": 10}\n```";
        assert_eq!(strip_code_fences(input), "{\"rating\": 10}");
    }

    #[test]
    fn strips_unclosed_fence() {
        let input = "```\n[\"a\", \"b\"]";
        assert_eq!(strip_code_fences(input), "[\"a\", \"b\"]");
    }

    #[test]
    fn leaves_plain_text() {
        assert_eq!(strip_code_fences("  1040  "), "1040");
    }

    #[test]
    fn grade_plain_json() {
        let grade = parse_grade(r#"{"review": "Good grasp of Kirchhoff.", "rating": 150}"#).unwrap();
        assert_eq!(grade.review, "Good grasp of Kirchhoff.");
        assert_eq!(grade.rating.unwrap().value(), 150);
    }

    #[test]
    fn grade_clamps_rating() {
        let grade = parse_grade(r#"{"review": "Excellent", "rating": 999}"#).unwrap();
        assert_eq!(grade.rating.unwrap().value(), 200);
    }

    #[test]
    fn grade_embedded_in_chatter() {
        let input = "Sure! Here you go:\n{\"review\": \"Partly right\", \"rating\": -35.5}\nHope that helps.";
        let grade = parse_grade(input).unwrap();
        assert_eq!(grade.rating.unwrap().value(), -35);
    }

    #[test]
    fn grade_without_numeric_rating_is_unrated() {
        let grade = parse_grade(r#"{"review": "Unclear", "rating": "high"}"#).unwrap();
        assert!(grade.rating.is_none());
    }

    #[test]
    fn grade_garbage_is_none() {
        assert!(parse_grade("I cannot grade this.").is_none());
        assert!(parse_grade(r#"{"rating": 20}"#).is_none());
    }

    #[test]
    fn difficulty_json_and_fallback() {
        assert_eq!(parse_difficulty("1040"), Some(1040.0));
        assert_eq!(parse_difficulty("```\n850.5\n```"), Some(850.5));
        assert_eq!(parse_difficulty("Score: 920L"), Some(920.0));
        assert_eq!(parse_difficulty("no idea"), None);
    }

    #[test]
    fn questions_json_array() {
        let questions = parse_questions(r#"["What is a voltage divider?", "Why two resistors?"]"#);
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[1], "Why two resistors?");
    }

    #[test]
    fn questions_numbered_lines() {
        let input = "1. What is a voltage divider?\n\n2) Why use two resistors?\n- What sets the ratio?";
        let questions = parse_questions(input);
        assert_eq!(
            questions,
            vec![
                "What is a voltage divider?",
                "Why use two resistors?",
                "What sets the ratio?"
            ]
        );
    }
}
