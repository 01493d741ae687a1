use time::PrimitiveDateTime;

use crate::db::models::ParticipantCategory;

pub(crate) const COLUMNS: &str =
    "id, participant_test_id, category_id, category_order, grade, start_date, end_date";

pub(crate) struct ActivateCategory<'a> {
    pub(crate) id: &'a str,
    pub(crate) participant_test_id: &'a str,
    pub(crate) category_id: &'a str,
    pub(crate) category_order: i32,
    pub(crate) started_at: PrimitiveDateTime,
}

pub(crate) async fn list_by_session(
    executor: impl sqlx::PgExecutor<'_>,
    participant_test_id: &str,
) -> Result<Vec<ParticipantCategory>, sqlx::Error> {
    sqlx::query_as::<_, ParticipantCategory>(&format!(
        "SELECT {COLUMNS} FROM participant_question_categories \
         WHERE participant_test_id = $1 ORDER BY category_order, id"
    ))
    .bind(participant_test_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn activate(
    executor: impl sqlx::PgExecutor<'_>,
    params: ActivateCategory<'_>,
) -> Result<ParticipantCategory, sqlx::Error> {
    sqlx::query_as::<_, ParticipantCategory>(&format!(
        "INSERT INTO participant_question_categories (
            id, participant_test_id, category_id, category_order, grade, start_date
        ) VALUES ($1, $2, $3, $4, 0, $5)
        RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.participant_test_id)
    .bind(params.category_id)
    .bind(params.category_order)
    .bind(params.started_at)
    .fetch_one(executor)
    .await
}

/// Closes an active entry. Returns `None` when it was not active.
pub(crate) async fn end(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    grade: f64,
    ended_at: PrimitiveDateTime,
) -> Result<Option<ParticipantCategory>, sqlx::Error> {
    sqlx::query_as::<_, ParticipantCategory>(&format!(
        "UPDATE participant_question_categories SET grade = $2, end_date = $3 \
         WHERE id = $1 AND start_date IS NOT NULL AND end_date IS NULL \
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(grade)
    .bind(ended_at)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn update_grade(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    grade: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE participant_question_categories SET grade = $2 WHERE id = $1")
        .bind(id)
        .bind(grade)
        .execute(executor)
        .await?;
    Ok(())
}
