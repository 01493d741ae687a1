//! Arrangement of a category's questions into display units.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::db::models::{ParticipantAnswer, Question, QuestionGroup};

#[derive(Debug, Clone)]
pub(crate) struct QuestionSlot {
    pub(crate) question: Question,
    pub(crate) answer: Option<ParticipantAnswer>,
}

/// A stimulus group, or a single ungrouped question.
#[derive(Debug, Clone)]
pub(crate) struct QuestionUnit {
    pub(crate) group: Option<QuestionGroup>,
    pub(crate) questions: Vec<QuestionSlot>,
}

impl QuestionUnit {
    fn order_key(&self) -> (i32, String) {
        match (&self.group, self.questions.first()) {
            (Some(group), _) => (group.order_index, group.id.clone()),
            (None, Some(slot)) => (slot.question.order_index, slot.question.id.clone()),
            (None, None) => (i32::MAX, String::new()),
        }
    }
}

/// Builds display units in configured order. With `shuffle_seed`, units are
/// permuted deterministically; questions inside a group keep their order.
pub(crate) fn arrange(
    groups: Vec<QuestionGroup>,
    questions: Vec<Question>,
    answers: &[ParticipantAnswer],
    shuffle_seed: Option<u64>,
) -> Vec<QuestionUnit> {
    let by_question: HashMap<&str, &ParticipantAnswer> =
        answers.iter().map(|answer| (answer.question_id.as_str(), answer)).collect();

    let mut grouped: HashMap<String, Vec<QuestionSlot>> = HashMap::new();
    let mut units = Vec::new();
    for question in questions {
        let answer = by_question.get(question.id.as_str()).map(|answer| (*answer).clone());
        let slot = QuestionSlot { question, answer };
        match slot.question.group_id.clone() {
            Some(group_id) if groups.iter().any(|group| group.id == group_id) => {
                grouped.entry(group_id).or_default().push(slot);
            }
            _ => units.push(QuestionUnit { group: None, questions: vec![slot] }),
        }
    }

    for group in groups {
        if let Some(mut questions) = grouped.remove(&group.id) {
            questions.sort_by(|a, b| {
                (a.question.order_index, &a.question.id).cmp(&(b.question.order_index, &b.question.id))
            });
            units.push(QuestionUnit { group: Some(group), questions });
        }
    }

    units.sort_by_key(QuestionUnit::order_key);
    if let Some(seed) = shuffle_seed {
        units.shuffle(&mut StdRng::seed_from_u64(seed));
    }
    units
}

/// Per-category seed so each category gets its own permutation.
pub(crate) fn category_seed(session_seed: i64, category_order: i32) -> u64 {
    (session_seed as u64).wrapping_add(category_order as u64)
}
