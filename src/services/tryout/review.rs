use serde::Serialize;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use super::{load_snapshot, Actor, QuestionSlot, TryoutError};
use crate::db::models::{Category, ParticipantCategory, ParticipantTest, Test};
use crate::repositories;
use crate::repositories::participant_tests::HistoryFilter;
use crate::services::category_timer::TimerStatus;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TimerReport {
    #[serde(flatten)]
    pub(crate) status: TimerStatus,
    pub(crate) category_id: Option<String>,
    pub(crate) is_session_ended: bool,
}

pub(crate) async fn timer_status(
    pool: &PgPool,
    actor: Actor<'_>,
    participant_test_id: &str,
    now: PrimitiveDateTime,
) -> Result<TimerReport, TryoutError> {
    let mut conn = pool.acquire().await?;
    let snapshot = load_snapshot(&mut conn, participant_test_id, false).await?;
    actor.ensure_owner_or_privileged(&snapshot.session)?;

    let view = snapshot.view();
    if snapshot.session.is_ended() {
        // A finished session has no running clock.
        let mut status = TimerStatus::between_categories(&snapshot.test, &snapshot.session, now);
        status.remaining_seconds = None;
        status.is_expired = false;
        return Ok(TimerReport { status, category_id: None, is_session_ended: true });
    }

    let report = match view.active().and_then(|entry| Some((entry, view.category(&entry.category_id)?))) {
        Some((entry, category)) => TimerReport {
            status: TimerStatus::evaluate(&snapshot.test, category, &snapshot.session, entry, now),
            category_id: Some(category.id.clone()),
            is_session_ended: false,
        },
        None => TimerReport {
            status: TimerStatus::between_categories(&snapshot.test, &snapshot.session, now),
            category_id: None,
            is_session_ended: false,
        },
    };
    Ok(report)
}

#[derive(Debug, Clone)]
pub(crate) struct CategoryResult {
    pub(crate) category: Category,
    pub(crate) entry: Option<ParticipantCategory>,
}

#[derive(Debug, Clone)]
pub(crate) struct SessionResult {
    pub(crate) session: ParticipantTest,
    pub(crate) test: Test,
    pub(crate) categories: Vec<CategoryResult>,
    /// Per-question review; present once the session ended and results are
    /// released (always for administrators).
    pub(crate) review: Option<Vec<QuestionSlot>>,
}

pub(crate) async fn result(
    pool: &PgPool,
    actor: Actor<'_>,
    participant_test_id: &str,
) -> Result<SessionResult, TryoutError> {
    let mut conn = pool.acquire().await?;
    let snapshot = load_snapshot(&mut conn, participant_test_id, false).await?;
    actor.ensure_owner_or_privileged(&snapshot.session)?;

    let reveal = snapshot.session.is_ended()
        && (snapshot.test.is_result_released || matches!(actor, Actor::Admin(_)));
    let review = if reveal {
        let questions =
            repositories::catalog::list_questions_by_test(&mut *conn, &snapshot.test.id).await?;
        let answers =
            repositories::participant_answers::list_by_session(&mut *conn, &snapshot.session.id)
                .await?;
        Some(
            questions
                .into_iter()
                .map(|question| {
                    let answer =
                        answers.iter().find(|answer| answer.question_id == question.id).cloned();
                    QuestionSlot { question, answer }
                })
                .collect(),
        )
    } else {
        None
    };

    let categories = snapshot
        .categories
        .iter()
        .map(|category| CategoryResult {
            category: category.clone(),
            entry: snapshot.entered.iter().find(|entry| entry.category_id == category.id).cloned(),
        })
        .collect();

    Ok(SessionResult { session: snapshot.session, test: snapshot.test, categories, review })
}

/// Paginated attempt history. Participants only ever see their own attempts.
pub(crate) async fn history(
    pool: &PgPool,
    actor: Actor<'_>,
    mut filter: HistoryFilter,
    skip: i64,
    limit: i64,
) -> Result<(Vec<ParticipantTest>, i64), TryoutError> {
    match actor {
        Actor::Participant(user_id) => filter.user_id = Some(user_id.to_string()),
        Actor::Admin(_) | Actor::System => {}
    }

    let items = repositories::participant_tests::list_history(pool, &filter, skip, limit).await?;
    let total = repositories::participant_tests::count_history(pool, &filter).await?;
    Ok((items, total))
}
