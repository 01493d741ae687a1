//! Read access to test configuration. Rows are authored elsewhere.

use crate::db::models::{Category, Question, QuestionGroup, Test};

pub(crate) const TEST_COLUMNS: &str = "\
    id, title, timer_type, total_time, scoring_mode, pass_grade, is_shuffle, \
    max_attempts, is_result_released, created_at, updated_at";

pub(crate) const CATEGORY_COLUMNS: &str = "id, test_id, name, order_index, total_time";

pub(crate) const GROUP_COLUMNS: &str = "id, category_id, order_index, stimulus";

pub(crate) const QUESTION_COLUMNS: &str = "\
    id, category_id, group_id, order_index, prompt, question_type, options, \
    correct_answer, total_point, irt_difficulty, explanation";

pub(crate) async fn find_test(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Test>, sqlx::Error> {
    sqlx::query_as::<_, Test>(&format!("SELECT {TEST_COLUMNS} FROM tests WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list_categories(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE test_id = $1 ORDER BY order_index, id"
    ))
    .bind(test_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_groups(
    executor: impl sqlx::PgExecutor<'_>,
    category_id: &str,
) -> Result<Vec<QuestionGroup>, sqlx::Error> {
    sqlx::query_as::<_, QuestionGroup>(&format!(
        "SELECT {GROUP_COLUMNS} FROM question_groups WHERE category_id = $1 ORDER BY order_index, id"
    ))
    .bind(category_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn find_question(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list_questions_by_category(
    executor: impl sqlx::PgExecutor<'_>,
    category_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE category_id = $1 ORDER BY order_index, id"
    ))
    .bind(category_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_questions_by_test(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(
        "SELECT q.id, q.category_id, q.group_id, q.order_index, q.prompt, q.question_type, \
                q.options, q.correct_answer, q.total_point, q.irt_difficulty, q.explanation \
         FROM questions q \
         JOIN categories c ON c.id = q.category_id \
         WHERE c.test_id = $1 \
         ORDER BY c.order_index, q.order_index, q.id",
    )
    .bind(test_id)
    .fetch_all(executor)
    .await
}
