use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    PrimitiveDateTime, Time,
};
use validator::Validate;

use crate::api::pagination::{default_page, default_per_page};
use crate::core::time::{format_primitive, to_primitive_utc};
use crate::db::models::{ParticipantCategory, ParticipantTest, QuestionGroup, QuestionOption, Test};
use crate::db::types::{EndReason, QuestionType, ScoringMode, TimerType};
use crate::services::tryout::{
    CategoryResult, CategoryView, LedgerEntry, QuestionSlot, QuestionUnit, SessionResult,
};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GenerateRequest {
    #[validate(length(min = 1, max = 64, message = "test_id must not be empty"))]
    pub(crate) test_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SaveAnswerRequest {
    #[validate(length(min = 1, max = 64, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(rename = "type")]
    pub(crate) question_type: QuestionType,
    #[validate(length(max = 20000, message = "answer is too long"))]
    pub(crate) answer: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ResetAnswerRequest {
    #[validate(length(min = 1, max = 64, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct FlagQuestionRequest {
    #[validate(length(min = 1, max = 64, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(default = "default_flagged")]
    pub(crate) is_flagged: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EndSessionRequest {
    #[serde(default)]
    pub(crate) reason: Option<EndReason>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GradeEssayRequest {
    #[validate(length(min = 1, max = 64, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[validate(range(min = 0.0, message = "point must be non-negative"))]
    pub(crate) point: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    pub(crate) user_id: Option<String>,
    pub(crate) test_id: Option<String>,
    pub(crate) is_ongoing: Option<bool>,
    pub(crate) is_completed: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_range_start")]
    pub(crate) start_date: Option<PrimitiveDateTime>,
    #[serde(default, deserialize_with = "deserialize_range_end")]
    pub(crate) end_date: Option<PrimitiveDateTime>,
    pub(crate) order_by_grade: Option<GradeOrderParam>,
    #[serde(default = "default_page")]
    pub(crate) page: i64,
    #[serde(default = "default_per_page")]
    pub(crate) per_page: i64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum GradeOrderParam {
    Asc,
    Desc,
}

#[derive(Debug, Serialize)]
pub(crate) struct ParticipantTestResponse {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) user_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) grade: f64,
    pub(crate) start_date: Option<String>,
    pub(crate) end_date: Option<String>,
    pub(crate) is_started: bool,
    pub(crate) is_passed: Option<bool>,
    pub(crate) end_reason: Option<EndReason>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl From<ParticipantTest> for ParticipantTestResponse {
    fn from(session: ParticipantTest) -> Self {
        Self {
            id: session.id,
            test_id: session.test_id,
            user_id: session.user_id,
            attempt_number: session.attempt_number,
            grade: session.grade,
            start_date: session.start_date.map(format_primitive),
            end_date: session.end_date.map(format_primitive),
            is_started: session.is_started,
            is_passed: session.is_passed,
            end_reason: session.end_reason,
            created_at: format_primitive(session.created_at),
            updated_at: format_primitive(session.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ParticipantCategoryResponse {
    pub(crate) id: String,
    pub(crate) participant_test_id: String,
    pub(crate) category_id: String,
    pub(crate) category_order: i32,
    pub(crate) grade: f64,
    pub(crate) start_date: Option<String>,
    pub(crate) end_date: Option<String>,
}

impl From<ParticipantCategory> for ParticipantCategoryResponse {
    fn from(entry: ParticipantCategory) -> Self {
        Self {
            id: entry.id,
            participant_test_id: entry.participant_test_id,
            category_id: entry.category_id,
            category_order: entry.category_order,
            grade: entry.grade,
            start_date: entry.start_date.map(format_primitive),
            end_date: entry.end_date.map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TestSummary {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) timer_type: TimerType,
    pub(crate) total_time: Option<i32>,
    pub(crate) scoring_mode: ScoringMode,
    pub(crate) pass_grade: f64,
    pub(crate) is_shuffle: bool,
    pub(crate) max_attempts: Option<i32>,
    pub(crate) is_result_released: bool,
}

impl From<Test> for TestSummary {
    fn from(test: Test) -> Self {
        Self {
            id: test.id,
            title: test.title,
            timer_type: test.timer_type,
            total_time: test.total_time,
            scoring_mode: test.scoring_mode,
            pass_grade: test.pass_grade,
            is_shuffle: test.is_shuffle,
            max_attempts: test.max_attempts,
            is_result_released: test.is_result_released,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ActiveCategoryResponse {
    pub(crate) id: String,
    pub(crate) participant_category_id: String,
    pub(crate) name: String,
    pub(crate) order_index: i32,
    pub(crate) total_time: Option<i64>,
    pub(crate) remaining_seconds: Option<i64>,
    pub(crate) is_expired: bool,
    pub(crate) start_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) prompt: String,
    #[serde(rename = "type")]
    pub(crate) question_type: QuestionType,
    pub(crate) options: Vec<QuestionOption>,
    pub(crate) total_point: f64,
    pub(crate) answer: Option<LedgerEntry>,
}

impl From<QuestionSlot> for QuestionResponse {
    fn from(slot: QuestionSlot) -> Self {
        Self {
            id: slot.question.id,
            prompt: slot.question.prompt,
            question_type: slot.question.question_type,
            options: slot.question.options.0,
            total_point: slot.question.total_point,
            answer: slot.answer.map(LedgerEntry::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionGroupResponse {
    pub(crate) id: Option<String>,
    pub(crate) stimulus: Option<String>,
    pub(crate) questions: Vec<QuestionResponse>,
}

impl From<QuestionUnit> for QuestionGroupResponse {
    fn from(unit: QuestionUnit) -> Self {
        let (id, stimulus) = match unit.group {
            Some(QuestionGroup { id, stimulus, .. }) => (Some(id), stimulus),
            None => (None, None),
        };
        Self { id, stimulus, questions: unit.questions.into_iter().map(Into::into).collect() }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ContinueResponse {
    pub(crate) participant_test: ParticipantTestResponse,
    pub(crate) test: TestSummary,
    pub(crate) category: ActiveCategoryResponse,
    pub(crate) questions: Vec<QuestionGroupResponse>,
}

impl From<CategoryView> for ContinueResponse {
    fn from(view: CategoryView) -> Self {
        let category = ActiveCategoryResponse {
            id: view.category.id,
            participant_category_id: view.entry.id,
            name: view.category.name,
            order_index: view.category.order_index,
            total_time: view.timer.total_time,
            remaining_seconds: view.timer.remaining_seconds,
            is_expired: view.timer.is_expired,
            start_date: view.entry.start_date.map(format_primitive),
        };
        Self {
            participant_test: view.session.into(),
            test: view.test.into(),
            category,
            questions: view.units.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum EndCategoryResponse {
    Next { next_category: Box<ContinueResponse> },
    Completed(ParticipantTestResponse),
}

#[derive(Debug, Serialize)]
pub(crate) struct CategoryResultResponse {
    pub(crate) category_id: String,
    pub(crate) name: String,
    pub(crate) order_index: i32,
    pub(crate) grade: Option<f64>,
    pub(crate) start_date: Option<String>,
    pub(crate) end_date: Option<String>,
}

impl From<CategoryResult> for CategoryResultResponse {
    fn from(result: CategoryResult) -> Self {
        Self {
            category_id: result.category.id,
            name: result.category.name,
            order_index: result.category.order_index,
            grade: result.entry.as_ref().map(|entry| entry.grade),
            start_date: result.entry.as_ref().and_then(|entry| entry.start_date).map(format_primitive),
            end_date: result.entry.as_ref().and_then(|entry| entry.end_date).map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ReviewItemResponse {
    pub(crate) question_id: String,
    pub(crate) category_id: String,
    pub(crate) prompt: String,
    #[serde(rename = "type")]
    pub(crate) question_type: QuestionType,
    pub(crate) options: Vec<QuestionOption>,
    pub(crate) total_point: f64,
    pub(crate) correct_answer: Option<String>,
    pub(crate) explanation: Option<String>,
    pub(crate) user_answer: Option<String>,
    pub(crate) point: Option<f64>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) is_flagged: bool,
}

impl From<QuestionSlot> for ReviewItemResponse {
    fn from(slot: QuestionSlot) -> Self {
        let answer = slot.answer;
        Self {
            question_id: slot.question.id,
            category_id: slot.question.category_id,
            prompt: slot.question.prompt,
            question_type: slot.question.question_type,
            options: slot.question.options.0,
            total_point: slot.question.total_point,
            correct_answer: slot.question.correct_answer,
            explanation: slot.question.explanation,
            user_answer: answer.as_ref().and_then(|answer| answer.user_answer.clone()),
            point: answer.as_ref().and_then(|answer| answer.point),
            is_correct: answer.as_ref().and_then(|answer| answer.is_correct),
            is_flagged: answer.as_ref().is_some_and(|answer| answer.is_flagged),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultResponse {
    pub(crate) participant_test: ParticipantTestResponse,
    pub(crate) test: TestSummary,
    pub(crate) categories: Vec<CategoryResultResponse>,
    pub(crate) review: Option<Vec<ReviewItemResponse>>,
}

impl From<SessionResult> for ResultResponse {
    fn from(result: SessionResult) -> Self {
        Self {
            participant_test: result.session.into(),
            test: result.test.into(),
            categories: result.categories.into_iter().map(Into::into).collect(),
            review: result.review.map(|items| items.into_iter().map(Into::into).collect()),
        }
    }
}

fn default_flagged() -> bool {
    true
}

fn parse_range_bound(raw: &str, end_of_day: bool) -> Option<PrimitiveDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(to_primitive_utc(value));
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value);
    }
    let date = Date::parse(raw, &format_description!("[year]-[month]-[day]")).ok()?;
    let time = if end_of_day { Time::from_hms(23, 59, 59).ok()? } else { Time::MIDNIGHT };
    Some(PrimitiveDateTime::new(date, time))
}

fn deserialize_range_bound<'de, D>(
    deserializer: D,
    end_of_day: bool,
) -> Result<Option<PrimitiveDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse_range_bound(value, end_of_day)
            .ok_or_else(|| D::Error::custom(format!("invalid date: {value}")))
            .map(Some),
        None => Ok(None),
    }
}

fn deserialize_range_start<'de, D>(deserializer: D) -> Result<Option<PrimitiveDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserialize_range_bound(deserializer, false)
}

fn deserialize_range_end<'de, D>(deserializer: D) -> Result<Option<PrimitiveDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserialize_range_bound(deserializer, true)
}
