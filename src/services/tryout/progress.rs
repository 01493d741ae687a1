use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use super::{category_view, load_snapshot, Actor, CategoryView, TryoutError};
use crate::core::metrics;
use crate::db::models::{ParticipantCategory, ParticipantTest};
use crate::db::types::EndReason;
use crate::repositories;
use crate::repositories::participant_categories::ActivateCategory;
use crate::repositories::participant_tests::FinalizeParticipantTest;
use crate::services::scoring;
use crate::services::session_machine::{ContinuePlan, EndSessionPlan};

#[derive(Debug, Clone)]
pub(crate) enum EndCategoryOutcome {
    Next(Box<CategoryView>),
    /// The last category was closed; the session waits for end-session.
    Completed(ParticipantTest),
}

/// Resumes the open category or activates the next one in order.
pub(crate) async fn continue_session(
    pool: &PgPool,
    actor: Actor<'_>,
    participant_test_id: &str,
    requested_category: Option<&str>,
    now: PrimitiveDateTime,
) -> Result<CategoryView, TryoutError> {
    let mut tx = pool.begin().await?;
    let mut snapshot = load_snapshot(&mut tx, participant_test_id, true).await?;
    actor.ensure_owner(&snapshot.session)?;

    let plan = snapshot.view().plan_continue(requested_category)?;
    let entry = match plan {
        ContinuePlan::Resume(entry) => entry.clone(),
        ContinuePlan::Activate(category) => {
            let (category_id, category_order) = (category.id.clone(), category.order_index);
            if !snapshot.session.is_started || snapshot.session.start_date.is_none() {
                snapshot.session = repositories::participant_tests::mark_started(
                    &mut *tx,
                    &snapshot.session.id,
                    now,
                )
                .await?;
            }
            let entry =
                activate(&mut tx, &snapshot.session, &category_id, category_order, now).await?;
            snapshot.entered.push(entry.clone());
            entry
        }
    };

    let view = category_view(&mut tx, &snapshot, entry, now).await?;
    tx.commit().await?;
    Ok(view)
}

async fn activate(
    conn: &mut sqlx::PgConnection,
    session: &ParticipantTest,
    category_id: &str,
    category_order: i32,
    now: PrimitiveDateTime,
) -> Result<ParticipantCategory, TryoutError> {
    let id = Uuid::new_v4().to_string();
    let entry = repositories::participant_categories::activate(
        &mut *conn,
        ActivateCategory {
            id: &id,
            participant_test_id: &session.id,
            category_id,
            category_order,
            started_at: now,
        },
    )
    .await?;

    tracing::info!(
        participant_test_id = %session.id,
        category_id,
        category_order,
        "Tryout category activated"
    );
    Ok(entry)
}

pub(crate) async fn active_category(
    pool: &PgPool,
    actor: Actor<'_>,
    participant_test_id: &str,
) -> Result<Option<ParticipantCategory>, TryoutError> {
    let mut conn = pool.acquire().await?;
    let snapshot = load_snapshot(&mut conn, participant_test_id, false).await?;
    actor.ensure_owner_or_privileged(&snapshot.session)?;

    if snapshot.session.is_ended() {
        return Ok(None);
    }
    Ok(snapshot.view().active().cloned())
}

/// Closes the active category with its grade and opens the next one, if any.
pub(crate) async fn end_category(
    pool: &PgPool,
    actor: Actor<'_>,
    participant_test_id: &str,
    category_id: &str,
    now: PrimitiveDateTime,
) -> Result<EndCategoryOutcome, TryoutError> {
    let mut tx = pool.begin().await?;
    let mut snapshot = load_snapshot(&mut tx, participant_test_id, true).await?;
    actor.ensure_owner(&snapshot.session)?;

    let plan = snapshot.view().plan_end_category(category_id)?;
    let ending_id = plan.ending.id.clone();
    let next = plan.next.map(|category| (category.id.clone(), category.order_index));

    let questions = repositories::catalog::list_questions_by_category(&mut *tx, category_id).await?;
    let answers =
        repositories::participant_answers::list_by_session(&mut *tx, &snapshot.session.id).await?;
    let items: Vec<scoring::ItemOutcome> = questions
        .iter()
        .map(|question| {
            let answer = answers.iter().find(|answer| answer.question_id == question.id);
            scoring::ItemOutcome::from_ledger(question, answer)
        })
        .collect();
    let grade = scoring::category_grade(snapshot.test.scoring_mode, &items);

    let ended = repositories::participant_categories::end(&mut *tx, &ending_id, grade, now)
        .await?
        .ok_or_else(|| TryoutError::InvalidState("Category is not active".to_string()))?;
    if let Some(slot) = snapshot.entered.iter_mut().find(|entry| entry.id == ended.id) {
        *slot = ended;
    }

    metrics::category_ended(next.is_some());
    tracing::info!(
        participant_test_id = %snapshot.session.id,
        category_id,
        grade,
        has_next = next.is_some(),
        "Tryout category ended"
    );

    let outcome = match next {
        Some((next_id, next_order)) => {
            let entry = activate(&mut tx, &snapshot.session, &next_id, next_order, now).await?;
            snapshot.entered.push(entry.clone());
            EndCategoryOutcome::Next(Box::new(category_view(&mut tx, &snapshot, entry, now).await?))
        }
        None => EndCategoryOutcome::Completed(snapshot.session.clone()),
    };

    tx.commit().await?;
    Ok(outcome)
}

/// Finalizes the session. Calling it on an ended session returns the stored
/// row without writing anything.
pub(crate) async fn end_session(
    pool: &PgPool,
    actor: Actor<'_>,
    participant_test_id: &str,
    reason: EndReason,
    now: PrimitiveDateTime,
) -> Result<ParticipantTest, TryoutError> {
    if reason == EndReason::Abandoned && actor != Actor::System {
        return Err(TryoutError::Validation(
            "End reason 'abandoned' is reserved for the expiry reaper".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    let snapshot = load_snapshot(&mut tx, participant_test_id, true).await?;
    actor.ensure_owner_or_privileged(&snapshot.session)?;

    let plan = snapshot.view().plan_end_session();
    let force_end = match plan {
        EndSessionPlan::AlreadyEnded => {
            tx.commit().await?;
            return Ok(snapshot.session);
        }
        EndSessionPlan::Finalize { force_end } => force_end.map(|entry| entry.id.clone()),
    };

    let questions =
        repositories::catalog::list_questions_by_test(&mut *tx, &snapshot.test.id).await?;
    let answers =
        repositories::participant_answers::list_by_session(&mut *tx, &snapshot.session.id).await?;
    let score = scoring::score_session(
        &snapshot.test,
        &snapshot.categories,
        &snapshot.entered_ids(),
        &questions,
        &answers,
    );

    for entry in &snapshot.entered {
        let grade = score.grade_for(&entry.category_id);
        if force_end.as_deref() == Some(entry.id.as_str()) {
            repositories::participant_categories::end(&mut *tx, &entry.id, grade, now).await?;
        } else if entry.grade != grade {
            repositories::participant_categories::update_grade(&mut *tx, &entry.id, grade).await?;
        }
    }

    let session = repositories::participant_tests::finalize(
        &mut *tx,
        FinalizeParticipantTest {
            id: &snapshot.session.id,
            grade: score.grade,
            is_passed: score.is_passed,
            end_reason: reason,
            ended_at: now,
        },
    )
    .await?
    .ok_or_else(|| TryoutError::InvalidState("Session has already ended".to_string()))?;

    tx.commit().await?;

    metrics::session_finalized(reason.as_str());
    tracing::info!(
        participant_test_id = %session.id,
        user_id = %session.user_id,
        reason = reason.as_str(),
        grade = session.grade,
        is_passed = ?session.is_passed,
        force_ended_category = force_end.is_some(),
        "Tryout session ended"
    );

    Ok(session)
}
