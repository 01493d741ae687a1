use time::PrimitiveDateTime;

use crate::db::models::ParticipantAnswer;

pub(crate) const COLUMNS: &str = "\
    id, participant_test_id, question_id, user_answer, point, is_correct, is_flagged, \
    created_at, updated_at";

pub(crate) struct UpsertAnswer<'a> {
    pub(crate) id: &'a str,
    pub(crate) participant_test_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) user_answer: &'a str,
    pub(crate) point: Option<f64>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) async fn list_by_session(
    executor: impl sqlx::PgExecutor<'_>,
    participant_test_id: &str,
) -> Result<Vec<ParticipantAnswer>, sqlx::Error> {
    sqlx::query_as::<_, ParticipantAnswer>(&format!(
        "SELECT {COLUMNS} FROM participant_answers WHERE participant_test_id = $1"
    ))
    .bind(participant_test_id)
    .fetch_all(executor)
    .await
}

/// Writes the answer and its grading; the flag is left as it was.
pub(crate) async fn upsert_answer(
    executor: impl sqlx::PgExecutor<'_>,
    params: UpsertAnswer<'_>,
) -> Result<ParticipantAnswer, sqlx::Error> {
    sqlx::query_as::<_, ParticipantAnswer>(&format!(
        "INSERT INTO participant_answers (
            id, participant_test_id, question_id, user_answer, point, is_correct, is_flagged,
            created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7, $7)
        ON CONFLICT (participant_test_id, question_id) DO UPDATE
        SET user_answer = EXCLUDED.user_answer,
            point = EXCLUDED.point,
            is_correct = EXCLUDED.is_correct,
            updated_at = EXCLUDED.updated_at
        RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.participant_test_id)
    .bind(params.question_id)
    .bind(params.user_answer)
    .bind(params.point)
    .bind(params.is_correct)
    .bind(params.now)
    .fetch_one(executor)
    .await
}

/// Clears answer and grading of an existing row. `None` when nothing was saved.
pub(crate) async fn clear_answer(
    executor: impl sqlx::PgExecutor<'_>,
    participant_test_id: &str,
    question_id: &str,
    now: PrimitiveDateTime,
) -> Result<Option<ParticipantAnswer>, sqlx::Error> {
    sqlx::query_as::<_, ParticipantAnswer>(&format!(
        "UPDATE participant_answers \
         SET user_answer = NULL, point = NULL, is_correct = NULL, updated_at = $3 \
         WHERE participant_test_id = $1 AND question_id = $2 \
         RETURNING {COLUMNS}"
    ))
    .bind(participant_test_id)
    .bind(question_id)
    .bind(now)
    .fetch_optional(executor)
    .await
}

/// Sets the review flag, creating an unanswered placeholder row if needed.
pub(crate) async fn set_flag(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    participant_test_id: &str,
    question_id: &str,
    is_flagged: bool,
    now: PrimitiveDateTime,
) -> Result<ParticipantAnswer, sqlx::Error> {
    sqlx::query_as::<_, ParticipantAnswer>(&format!(
        "INSERT INTO participant_answers (
            id, participant_test_id, question_id, is_flagged, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $5)
        ON CONFLICT (participant_test_id, question_id) DO UPDATE
        SET is_flagged = EXCLUDED.is_flagged, updated_at = EXCLUDED.updated_at
        RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(participant_test_id)
    .bind(question_id)
    .bind(is_flagged)
    .bind(now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn set_grade(
    executor: impl sqlx::PgExecutor<'_>,
    participant_test_id: &str,
    question_id: &str,
    point: f64,
    is_correct: bool,
    now: PrimitiveDateTime,
) -> Result<Option<ParticipantAnswer>, sqlx::Error> {
    sqlx::query_as::<_, ParticipantAnswer>(&format!(
        "UPDATE participant_answers SET point = $3, is_correct = $4, updated_at = $5 \
         WHERE participant_test_id = $1 AND question_id = $2 AND user_answer IS NOT NULL \
         RETURNING {COLUMNS}"
    ))
    .bind(participant_test_id)
    .bind(question_id)
    .bind(point)
    .bind(is_correct)
    .bind(now)
    .fetch_optional(executor)
    .await
}
