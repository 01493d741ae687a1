//! Session lifecycle orchestration over PostgreSQL.
//!
//! Every mutating operation runs in one transaction that row-locks the
//! `participant_tests` row first, so requests for the same session are applied
//! one at a time and each sees the effects of the previous one.

mod answers;
mod error;
mod layout;
mod progress;
mod review;
mod start;

use sqlx::PgConnection;
use time::PrimitiveDateTime;

use crate::db::models::{Category, ParticipantCategory, ParticipantTest, Test};
use crate::repositories;
use crate::services::category_timer::TimerStatus;
use crate::services::session_machine::SessionView;

pub(crate) use answers::{flag_question, grade_essay, reset_answer, save_answer, LedgerEntry};
pub(crate) use error::TryoutError;
pub(crate) use layout::{QuestionSlot, QuestionUnit};
pub(crate) use progress::{
    active_category, continue_session, end_category, end_session, EndCategoryOutcome,
};
pub(crate) use review::{history, result, timer_status, CategoryResult, SessionResult, TimerReport};
pub(crate) use start::generate;

/// Who is calling into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Actor<'a> {
    Participant(&'a str),
    Admin(&'a str),
    /// Background jobs such as the expiry reaper.
    System,
}

impl Actor<'_> {
    fn owns(&self, session: &ParticipantTest) -> bool {
        match self {
            Actor::Participant(user_id) | Actor::Admin(user_id) => *user_id == session.user_id,
            Actor::System => false,
        }
    }

    fn is_privileged(&self) -> bool {
        matches!(self, Actor::Admin(_) | Actor::System)
    }

    pub(crate) fn ensure_owner(&self, session: &ParticipantTest) -> Result<(), TryoutError> {
        if self.owns(session) {
            Ok(())
        } else {
            Err(TryoutError::Forbidden("Only the session owner can perform this action"))
        }
    }

    pub(crate) fn ensure_owner_or_privileged(
        &self,
        session: &ParticipantTest,
    ) -> Result<(), TryoutError> {
        if self.owns(session) || self.is_privileged() {
            Ok(())
        } else {
            Err(TryoutError::Forbidden("Not enough permissions for this session"))
        }
    }
}

/// A session together with its test configuration and category entries.
#[derive(Debug, Clone)]
pub(crate) struct SessionSnapshot {
    pub(crate) session: ParticipantTest,
    pub(crate) test: Test,
    pub(crate) categories: Vec<Category>,
    pub(crate) entered: Vec<ParticipantCategory>,
}

impl SessionSnapshot {
    pub(crate) fn view(&self) -> SessionView<'_> {
        SessionView::new(&self.session, &self.categories, &self.entered)
    }

    fn entered_ids(&self) -> Vec<&str> {
        self.entered.iter().map(|entry| entry.category_id.as_str()).collect()
    }
}

/// The payload returned whenever a category is opened or resumed.
#[derive(Debug, Clone)]
pub(crate) struct CategoryView {
    pub(crate) test: Test,
    pub(crate) session: ParticipantTest,
    pub(crate) category: Category,
    pub(crate) entry: ParticipantCategory,
    pub(crate) timer: TimerStatus,
    pub(crate) units: Vec<QuestionUnit>,
}

async fn load_snapshot(
    conn: &mut PgConnection,
    participant_test_id: &str,
    lock: bool,
) -> Result<SessionSnapshot, TryoutError> {
    let session = if lock {
        repositories::participant_tests::lock_by_id(&mut *conn, participant_test_id).await?
    } else {
        repositories::participant_tests::find_by_id(&mut *conn, participant_test_id).await?
    }
    .ok_or_else(|| TryoutError::NotFound("Session not found".to_string()))?;

    let test = repositories::catalog::find_test(&mut *conn, &session.test_id)
        .await?
        .ok_or_else(|| TryoutError::NotFound("Test not found".to_string()))?;
    let categories = repositories::catalog::list_categories(&mut *conn, &test.id).await?;
    let entered =
        repositories::participant_categories::list_by_session(&mut *conn, &session.id).await?;

    Ok(SessionSnapshot { session, test, categories, entered })
}

async fn category_view(
    conn: &mut PgConnection,
    snapshot: &SessionSnapshot,
    entry: ParticipantCategory,
    now: PrimitiveDateTime,
) -> Result<CategoryView, TryoutError> {
    let category = snapshot
        .view()
        .category(&entry.category_id)
        .cloned()
        .ok_or_else(|| TryoutError::NotFound("Category not found".to_string()))?;

    let groups = repositories::catalog::list_groups(&mut *conn, &category.id).await?;
    let questions = repositories::catalog::list_questions_by_category(&mut *conn, &category.id).await?;
    let answers =
        repositories::participant_answers::list_by_session(&mut *conn, &snapshot.session.id).await?;

    let seed = snapshot
        .test
        .is_shuffle
        .then(|| layout::category_seed(snapshot.session.shuffle_seed, category.order_index));
    let units = layout::arrange(groups, questions, &answers, seed);
    let timer = TimerStatus::evaluate(&snapshot.test, &category, &snapshot.session, &entry, now);

    Ok(CategoryView {
        test: snapshot.test.clone(),
        session: snapshot.session.clone(),
        category,
        entry,
        timer,
        units,
    })
}
