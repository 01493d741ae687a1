//! Validation and auto-grading of submitted answers.

use std::collections::BTreeSet;

use crate::db::models::Question;
use crate::db::types::QuestionType;

/// Outcome written next to a stored answer. Essays stay ungraded until an
/// administrator assigns a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Grading {
    pub(crate) point: Option<f64>,
    pub(crate) is_correct: Option<bool>,
}

impl Grading {
    pub(crate) const PENDING: Self = Self { point: None, is_correct: None };
}

/// Splits an answer into comparable tokens: comma separated, trimmed,
/// lowercased, empties dropped. Order and duplicates do not matter.
pub(crate) fn normalize_tokens(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn option_keys(question: &Question) -> BTreeSet<String> {
    question.options.0.iter().map(|option| option.key.trim().to_lowercase()).collect()
}

fn split_pair(token: &str) -> Option<(&str, &str)> {
    let (key, value) = token.split_once(':')?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Checks a submitted answer against the question it targets.
pub(crate) fn validate_answer(
    question: &Question,
    declared_type: QuestionType,
    answer: &str,
) -> Result<(), String> {
    if declared_type != question.question_type {
        return Err(format!(
            "Answer type '{}' does not match question type '{}'",
            declared_type.as_str(),
            question.question_type.as_str()
        ));
    }

    if question.question_type == QuestionType::Essay {
        if answer.trim().is_empty() {
            return Err("Answer must not be empty".to_string());
        }
        return Ok(());
    }

    let tokens = normalize_tokens(answer);
    if tokens.is_empty() {
        return Err("Answer must not be empty".to_string());
    }
    if question.question_type.is_single_choice() && tokens.len() != 1 {
        return Err("Exactly one option must be selected".to_string());
    }

    let keys = option_keys(question);
    if question.question_type.is_paired() {
        let mut seen = BTreeSet::new();
        for token in &tokens {
            let (key, _) = split_pair(token)
                .ok_or_else(|| format!("Token '{token}' must have the form key:value"))?;
            if !keys.is_empty() && !keys.contains(key) {
                return Err(format!("Unknown option '{key}'"));
            }
            if !seen.insert(key.to_string()) {
                return Err(format!("Option '{key}' is answered more than once"));
            }
        }
        return Ok(());
    }

    if keys.is_empty() {
        if question.question_type == QuestionType::TrueFalse {
            let token = tokens.iter().next().map(String::as_str).unwrap_or_default();
            if token != "true" && token != "false" {
                return Err("Answer must be 'true' or 'false'".to_string());
            }
        }
        return Ok(());
    }

    match tokens.iter().find(|token| !keys.contains(*token)) {
        Some(unknown) => Err(format!("Unknown option '{unknown}'")),
        None => Ok(()),
    }
}

/// Compares a validated answer with the key. Only complete set equality earns
/// the point; there is no partial credit.
pub(crate) fn grade(question: &Question, answer: &str) -> Grading {
    if !question.question_type.is_auto_gradable() {
        return Grading::PENDING;
    }

    let expected = question.correct_answer.as_deref().map(normalize_tokens).unwrap_or_default();
    let correct = !expected.is_empty()
        && canonical(question, normalize_tokens(answer)) == canonical(question, expected);
    Grading {
        point: Some(if correct { question.total_point } else { 0.0 }),
        is_correct: Some(correct),
    }
}

// Paired tokens compare with whitespace around the separator removed.
fn canonical(question: &Question, tokens: BTreeSet<String>) -> BTreeSet<String> {
    if !question.question_type.is_paired() {
        return tokens;
    }
    tokens
        .into_iter()
        .map(|token| match split_pair(&token) {
            Some((key, value)) => format!("{key}:{value}"),
            None => token.clone(),
        })
        .collect()
}
