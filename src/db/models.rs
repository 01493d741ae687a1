use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{EndReason, QuestionType, ScoringMode, TimerType};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Test {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) timer_type: TimerType,
    /// Seconds; used as the shared budget in per_test mode.
    pub(crate) total_time: Option<i32>,
    pub(crate) scoring_mode: ScoringMode,
    pub(crate) pass_grade: f64,
    pub(crate) is_shuffle: bool,
    pub(crate) max_attempts: Option<i32>,
    pub(crate) is_result_released: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Category {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) name: String,
    pub(crate) order_index: i32,
    /// Seconds; used in per_category mode.
    pub(crate) total_time: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuestionGroup {
    pub(crate) id: String,
    pub(crate) category_id: String,
    pub(crate) order_index: i32,
    pub(crate) stimulus: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct QuestionOption {
    pub(crate) key: String,
    #[serde(default)]
    pub(crate) text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) category_id: String,
    pub(crate) group_id: Option<String>,
    pub(crate) order_index: i32,
    pub(crate) prompt: String,
    pub(crate) question_type: QuestionType,
    pub(crate) options: Json<Vec<QuestionOption>>,
    pub(crate) correct_answer: Option<String>,
    pub(crate) total_point: f64,
    pub(crate) irt_difficulty: f64,
    pub(crate) explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ParticipantTest {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) user_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) grade: f64,
    pub(crate) start_date: Option<PrimitiveDateTime>,
    pub(crate) end_date: Option<PrimitiveDateTime>,
    pub(crate) is_started: bool,
    pub(crate) is_passed: Option<bool>,
    pub(crate) end_reason: Option<EndReason>,
    pub(crate) shuffle_seed: i64,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl ParticipantTest {
    pub(crate) fn is_ended(&self) -> bool {
        self.end_date.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ParticipantCategory {
    pub(crate) id: String,
    pub(crate) participant_test_id: String,
    pub(crate) category_id: String,
    pub(crate) category_order: i32,
    pub(crate) grade: f64,
    pub(crate) start_date: Option<PrimitiveDateTime>,
    pub(crate) end_date: Option<PrimitiveDateTime>,
}

impl ParticipantCategory {
    pub(crate) fn is_active(&self) -> bool {
        self.start_date.is_some() && self.end_date.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ParticipantAnswer {
    pub(crate) id: String,
    pub(crate) participant_test_id: String,
    pub(crate) question_id: String,
    pub(crate) user_answer: Option<String>,
    pub(crate) point: Option<f64>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) is_flagged: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}
