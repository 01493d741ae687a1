//! Category and session grades, and the pass gate.

use std::collections::HashMap;

use crate::db::models::{Category, ParticipantAnswer, Question, Test};
use crate::db::types::{QuestionType, ScoringMode};

const IRT_THETA_MIN: f64 = -4.0;
const IRT_THETA_MAX: f64 = 4.0;
const IRT_SCALE_MEAN: f64 = 500.0;
const IRT_SCALE_SD: f64 = 100.0;
const IRT_MAX_ITERATIONS: usize = 50;
const IRT_TOLERANCE: f64 = 1e-6;

/// One question as seen by the scorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ItemOutcome {
    pub(crate) question_type: QuestionType,
    pub(crate) answered: bool,
    pub(crate) point: Option<f64>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) difficulty: f64,
}

impl ItemOutcome {
    pub(crate) fn from_ledger(question: &Question, answer: Option<&ParticipantAnswer>) -> Self {
        let answered = answer.is_some_and(|answer| answer.user_answer.is_some());
        Self {
            question_type: question.question_type,
            answered,
            point: answer.and_then(|answer| answer.point).filter(|_| answered),
            is_correct: answer.and_then(|answer| answer.is_correct).filter(|_| answered),
            difficulty: question.irt_difficulty,
        }
    }

    /// An answered essay nobody has graded yet.
    fn is_pending(&self) -> bool {
        self.answered && self.question_type == QuestionType::Essay && self.point.is_none()
    }
}

pub(crate) fn category_grade(mode: ScoringMode, items: &[ItemOutcome]) -> f64 {
    match mode {
        ScoringMode::Point => items.iter().filter_map(|item| item.point).sum(),
        ScoringMode::Irt => {
            let responses: Vec<(f64, bool)> = items
                .iter()
                .filter(|item| !item.is_pending())
                .map(|item| (item.difficulty, item.is_correct.unwrap_or(false)))
                .collect();
            if responses.is_empty() {
                return IRT_SCALE_MEAN;
            }
            IRT_SCALE_MEAN + IRT_SCALE_SD * rasch_ability(&responses)
        }
    }
}

/// Maximum-likelihood ability under the one-parameter logistic model,
/// solved with Newton-Raphson and clamped to the reporting range.
pub(crate) fn rasch_ability(responses: &[(f64, bool)]) -> f64 {
    let mut theta = 0.0_f64;
    for _ in 0..IRT_MAX_ITERATIONS {
        let (gradient, information) =
            responses.iter().fold((0.0, 0.0), |(gradient, information), (difficulty, correct)| {
                let p = 1.0 / (1.0 + (-(theta - difficulty)).exp());
                let observed = if *correct { 1.0 } else { 0.0 };
                (gradient + (observed - p), information + p * (1.0 - p))
            });
        if information <= f64::EPSILON {
            break;
        }
        let next = (theta + gradient / information).clamp(IRT_THETA_MIN, IRT_THETA_MAX);
        let converged = (next - theta).abs() < IRT_TOLERANCE;
        theta = next;
        if converged {
            break;
        }
    }
    theta
}

/// Point mode totals the category grades; IRT mode reports their mean.
pub(crate) fn session_grade(mode: ScoringMode, category_grades: &[f64]) -> f64 {
    match mode {
        ScoringMode::Point => category_grades.iter().sum(),
        ScoringMode::Irt => {
            if category_grades.is_empty() {
                return 0.0;
            }
            category_grades.iter().sum::<f64>() / category_grades.len() as f64
        }
    }
}

/// `None` while any answered essay still waits for a grade.
pub(crate) fn pass_status(grade: f64, pass_grade: f64, pending_essays: bool) -> Option<bool> {
    if pending_essays {
        return None;
    }
    Some(grade >= pass_grade)
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SessionScore {
    /// Grade per test category id, in test order.
    pub(crate) category_grades: Vec<(String, f64)>,
    pub(crate) grade: f64,
    pub(crate) is_passed: Option<bool>,
}

impl SessionScore {
    pub(crate) fn grade_for(&self, category_id: &str) -> f64 {
        self.category_grades
            .iter()
            .find(|(id, _)| id == category_id)
            .map(|(_, grade)| *grade)
            .unwrap_or(0.0)
    }
}

/// Scores a whole session from its answer ledger. `entered` lists the
/// categories the participant opened. The rest score zero in point mode; in
/// IRT mode their questions count as answered incorrectly.
pub(crate) fn score_session(
    test: &Test,
    categories: &[Category],
    entered: &[&str],
    questions: &[Question],
    answers: &[ParticipantAnswer],
) -> SessionScore {
    let by_question: HashMap<&str, &ParticipantAnswer> =
        answers.iter().map(|answer| (answer.question_id.as_str(), answer)).collect();

    let mut pending = false;
    let mut category_grades = Vec::with_capacity(categories.len());
    for category in categories {
        let items: Vec<ItemOutcome> = questions
            .iter()
            .filter(|question| question.category_id == category.id)
            .map(|question| {
                ItemOutcome::from_ledger(question, by_question.get(question.id.as_str()).copied())
            })
            .collect();
        pending |= items.iter().any(ItemOutcome::is_pending);

        let grade = match test.scoring_mode {
            ScoringMode::Point if !entered.contains(&category.id.as_str()) => 0.0,
            mode => category_grade(mode, &items),
        };
        category_grades.push((category.id.clone(), grade));
    }

    let grades: Vec<f64> = category_grades.iter().map(|(_, grade)| *grade).collect();
    let grade = session_grade(test.scoring_mode, &grades);
    SessionScore { category_grades, grade, is_passed: pass_status(grade, test.pass_grade, pending) }
}
