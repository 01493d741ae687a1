//! In-memory model builders for unit tests of the pure engine modules.

use sqlx::types::Json;
use time::{Date, Month, PrimitiveDateTime, Time};

use crate::db::models::{
    Category, ParticipantAnswer, ParticipantCategory, ParticipantTest, Question, QuestionOption,
    Test,
};
use crate::db::types::{QuestionType, ScoringMode, TimerType};

pub(crate) fn t0() -> PrimitiveDateTime {
    let date = Date::from_calendar_date(2026, Month::March, 2).expect("date");
    PrimitiveDateTime::new(date, Time::from_hms(9, 0, 0).expect("time"))
}

pub(crate) fn test(timer_type: TimerType) -> Test {
    Test {
        id: "test-1".to_string(),
        title: "Tryout".to_string(),
        timer_type,
        total_time: None,
        scoring_mode: ScoringMode::Point,
        pass_grade: 0.0,
        is_shuffle: false,
        max_attempts: None,
        is_result_released: true,
        created_at: t0(),
        updated_at: t0(),
    }
}

pub(crate) fn category(test: &Test, id: &str, order_index: i32, total_time: Option<i32>) -> Category {
    Category {
        id: id.to_string(),
        test_id: test.id.clone(),
        name: format!("Category {order_index}"),
        order_index,
        total_time,
    }
}

pub(crate) fn session(test: &Test) -> ParticipantTest {
    ParticipantTest {
        id: "pt-1".to_string(),
        test_id: test.id.clone(),
        user_id: "user-1".to_string(),
        attempt_number: 1,
        grade: 0.0,
        start_date: None,
        end_date: None,
        is_started: false,
        is_passed: None,
        end_reason: None,
        shuffle_seed: 7,
        created_at: t0(),
        updated_at: t0(),
    }
}

pub(crate) fn entered(
    session: &ParticipantTest,
    category: &Category,
    start: PrimitiveDateTime,
) -> ParticipantCategory {
    ParticipantCategory {
        id: format!("pc-{}", category.id),
        participant_test_id: session.id.clone(),
        category_id: category.id.clone(),
        category_order: category.order_index,
        grade: 0.0,
        start_date: Some(start),
        end_date: None,
    }
}

pub(crate) fn choice_question(
    id: &str,
    category_id: &str,
    keys: &[&str],
    correct: &str,
    total_point: f64,
) -> Question {
    let options = keys
        .iter()
        .map(|key| QuestionOption { key: key.to_string(), text: format!("Option {key}") })
        .collect();
    Question {
        id: id.to_string(),
        category_id: category_id.to_string(),
        group_id: None,
        order_index: 0,
        prompt: format!("Question {id}"),
        question_type: QuestionType::MultipleChoice,
        options: Json(options),
        correct_answer: Some(correct.to_string()),
        total_point,
        irt_difficulty: 0.0,
        explanation: None,
    }
}

pub(crate) fn answer(question_id: &str, text: &str) -> ParticipantAnswer {
    ParticipantAnswer {
        id: format!("pa-{question_id}"),
        participant_test_id: "pt-1".to_string(),
        question_id: question_id.to_string(),
        user_answer: Some(text.to_string()),
        point: None,
        is_correct: None,
        is_flagged: false,
        created_at: t0(),
        updated_at: t0(),
    }
}
