use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use time::PrimitiveDateTime;
use uuid::Uuid;

use super::{load_snapshot, Actor, SessionSnapshot, TryoutError};
use crate::core::metrics;
use crate::db::models::{ParticipantAnswer, Question};
use crate::db::types::QuestionType;
use crate::repositories;
use crate::repositories::participant_answers::UpsertAnswer;
use crate::services::answer_ledger;
use crate::services::category_timer::TimerStatus;
use crate::services::scoring;

/// One ledger row as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct LedgerEntry {
    pub(crate) question_id: String,
    pub(crate) user_answer: Option<String>,
    pub(crate) point: Option<f64>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) is_flagged: bool,
}

impl LedgerEntry {
    fn unanswered(question_id: &str) -> Self {
        Self {
            question_id: question_id.to_string(),
            user_answer: None,
            point: None,
            is_correct: None,
            is_flagged: false,
        }
    }
}

impl From<ParticipantAnswer> for LedgerEntry {
    fn from(answer: ParticipantAnswer) -> Self {
        Self {
            question_id: answer.question_id,
            user_answer: answer.user_answer,
            point: answer.point,
            is_correct: answer.is_correct,
            is_flagged: answer.is_flagged,
        }
    }
}

/// Locks the session and checks that `question_id` may be written right now.
async fn writable_question(
    conn: &mut PgConnection,
    actor: Actor<'_>,
    participant_test_id: &str,
    question_id: &str,
    now: PrimitiveDateTime,
) -> Result<(SessionSnapshot, Question), TryoutError> {
    let snapshot = load_snapshot(&mut *conn, participant_test_id, true).await?;
    actor.ensure_owner(&snapshot.session)?;

    if snapshot.session.is_ended() {
        return Err(TryoutError::InvalidState("Session has already ended".to_string()));
    }

    let question = repositories::catalog::find_question(&mut *conn, question_id)
        .await?
        .filter(|question| snapshot.view().category(&question.category_id).is_some())
        .ok_or_else(|| TryoutError::NotFound("Question not found".to_string()))?;

    let view = snapshot.view();
    let entry = view.ensure_answerable(&question.category_id)?;
    let category = view
        .category(&question.category_id)
        .ok_or_else(|| TryoutError::NotFound("Category not found".to_string()))?;
    let timer = TimerStatus::evaluate(&snapshot.test, category, &snapshot.session, entry, now);
    if timer.is_expired {
        return Err(TryoutError::InvalidState("Time limit has been exceeded".to_string()));
    }

    Ok((snapshot, question))
}

pub(crate) async fn save_answer(
    pool: &PgPool,
    actor: Actor<'_>,
    participant_test_id: &str,
    question_id: &str,
    declared_type: QuestionType,
    answer: &str,
    now: PrimitiveDateTime,
) -> Result<LedgerEntry, TryoutError> {
    let mut tx = pool.begin().await?;
    let (snapshot, question) =
        writable_question(&mut tx, actor, participant_test_id, question_id, now).await?;

    answer_ledger::validate_answer(&question, declared_type, answer)
        .map_err(TryoutError::Validation)?;
    let grading = answer_ledger::grade(&question, answer);

    let id = Uuid::new_v4().to_string();
    let stored = repositories::participant_answers::upsert_answer(
        &mut *tx,
        UpsertAnswer {
            id: &id,
            participant_test_id: &snapshot.session.id,
            question_id: &question.id,
            user_answer: answer.trim(),
            point: grading.point,
            is_correct: grading.is_correct,
            now,
        },
    )
    .await?;

    tx.commit().await?;

    metrics::answer_written("save");
    tracing::debug!(
        participant_test_id = %snapshot.session.id,
        question_id = %question.id,
        question_type = question.question_type.as_str(),
        is_correct = ?grading.is_correct,
        "Answer saved"
    );

    Ok(stored.into())
}

/// Clears a saved answer. A question that was never saved is left untouched.
pub(crate) async fn reset_answer(
    pool: &PgPool,
    actor: Actor<'_>,
    participant_test_id: &str,
    question_id: &str,
    now: PrimitiveDateTime,
) -> Result<LedgerEntry, TryoutError> {
    let mut tx = pool.begin().await?;
    let (snapshot, question) =
        writable_question(&mut tx, actor, participant_test_id, question_id, now).await?;

    let cleared = repositories::participant_answers::clear_answer(
        &mut *tx,
        &snapshot.session.id,
        &question.id,
        now,
    )
    .await?;
    tx.commit().await?;

    metrics::answer_written("reset");
    Ok(cleared.map(LedgerEntry::from).unwrap_or_else(|| LedgerEntry::unanswered(&question.id)))
}

pub(crate) async fn flag_question(
    pool: &PgPool,
    actor: Actor<'_>,
    participant_test_id: &str,
    question_id: &str,
    is_flagged: bool,
    now: PrimitiveDateTime,
) -> Result<LedgerEntry, TryoutError> {
    let mut tx = pool.begin().await?;
    let (snapshot, question) =
        writable_question(&mut tx, actor, participant_test_id, question_id, now).await?;

    let id = Uuid::new_v4().to_string();
    let stored = repositories::participant_answers::set_flag(
        &mut *tx,
        &id,
        &snapshot.session.id,
        &question.id,
        is_flagged,
        now,
    )
    .await?;
    tx.commit().await?;

    metrics::answer_written("flag");
    Ok(stored.into())
}

/// Assigns a manual grade to an answered essay and re-scores ended sessions.
pub(crate) async fn grade_essay(
    pool: &PgPool,
    participant_test_id: &str,
    question_id: &str,
    point: f64,
    now: PrimitiveDateTime,
) -> Result<LedgerEntry, TryoutError> {
    let mut tx = pool.begin().await?;
    let snapshot = load_snapshot(&mut tx, participant_test_id, true).await?;

    let question = repositories::catalog::find_question(&mut *tx, question_id)
        .await?
        .filter(|question| snapshot.view().category(&question.category_id).is_some())
        .ok_or_else(|| TryoutError::NotFound("Question not found".to_string()))?;
    if question.question_type != QuestionType::Essay {
        return Err(TryoutError::Validation("Only essay answers can be graded manually".to_string()));
    }
    if !point.is_finite() || point < 0.0 || point > question.total_point {
        return Err(TryoutError::Validation(format!(
            "Point must be between 0 and {}",
            question.total_point
        )));
    }

    let graded = repositories::participant_answers::set_grade(
        &mut *tx,
        &snapshot.session.id,
        &question.id,
        point,
        point > 0.0,
        now,
    )
    .await?
    .ok_or_else(|| TryoutError::InvalidState("Essay has not been answered".to_string()))?;

    if snapshot.session.is_ended() {
        rescore(&mut tx, &snapshot, now).await?;
    }
    tx.commit().await?;

    tracing::info!(
        participant_test_id = %snapshot.session.id,
        question_id = %question.id,
        point,
        rescored = snapshot.session.is_ended(),
        "Essay graded"
    );

    Ok(graded.into())
}

async fn rescore(
    conn: &mut PgConnection,
    snapshot: &SessionSnapshot,
    now: PrimitiveDateTime,
) -> Result<(), TryoutError> {
    let questions =
        repositories::catalog::list_questions_by_test(&mut *conn, &snapshot.test.id).await?;
    let answers =
        repositories::participant_answers::list_by_session(&mut *conn, &snapshot.session.id).await?;
    let score = scoring::score_session(
        &snapshot.test,
        &snapshot.categories,
        &snapshot.entered_ids(),
        &questions,
        &answers,
    );

    for entry in &snapshot.entered {
        repositories::participant_categories::update_grade(
            &mut *conn,
            &entry.id,
            score.grade_for(&entry.category_id),
        )
        .await?;
    }
    repositories::participant_tests::update_score(
        &mut *conn,
        &snapshot.session.id,
        score.grade,
        score.is_passed,
        now,
    )
    .await?;
    Ok(())
}
