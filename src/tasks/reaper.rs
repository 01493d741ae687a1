use anyhow::{Context, Result};
use time::PrimitiveDateTime;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::{EndReason, TimerType};
use crate::repositories;
use crate::repositories::participant_tests::OngoingSession;
use crate::services::category_timer::{self, TimerConfig};
use crate::services::tryout::{self, Actor};

const REAPER_BATCH_SIZE: i64 = 500;

/// Whether an ongoing session has been out of time long enough to be closed
/// on the participant's behalf.
pub(crate) fn should_reap(
    session: &OngoingSession,
    now: PrimitiveDateTime,
    expiry_grace_seconds: i64,
    abandon_after_seconds: i64,
) -> bool {
    let (total_time, anchor, tolerance) = match session.timer_type {
        TimerType::PerTest => (
            session.test_total_time,
            session.start_date.or(session.category_start_date),
            expiry_grace_seconds,
        ),
        TimerType::PerCategory => {
            (session.category_total_time, session.category_start_date, abandon_after_seconds)
        }
    };
    let Some(anchor) = anchor else {
        return false;
    };

    let config = TimerConfig { timer_type: session.timer_type, total_time: total_time.map(i64::from) };
    match category_timer::remaining(config, anchor, now) {
        Some(remaining) => remaining < -tolerance,
        None => false,
    }
}

pub(crate) async fn close_abandoned_sessions(state: &AppState) -> Result<u64> {
    let now = primitive_now_utc();
    let tryout_settings = state.settings().tryout();
    let sessions = repositories::participant_tests::list_reapable(
        state.db(),
        now,
        tryout_settings.expiry_grace_seconds,
        tryout_settings.abandon_after_seconds,
        REAPER_BATCH_SIZE,
    )
    .await
    .context("Failed to fetch expired sessions")?;

    let mut closed = 0;
    for session in sessions {
        if !should_reap(
            &session,
            now,
            tryout_settings.expiry_grace_seconds,
            tryout_settings.abandon_after_seconds,
        ) {
            continue;
        }

        match tryout::end_session(state.db(), Actor::System, &session.id, EndReason::Abandoned, now)
            .await
        {
            Ok(ended) => {
                tracing::info!(
                    participant_test_id = %ended.id,
                    user_id = %session.user_id,
                    timer_type = ?session.timer_type,
                    "Closed abandoned session"
                );
                closed += 1;
            }
            Err(err) => tracing::error!(
                participant_test_id = %session.id,
                error = %err,
                "Failed to close abandoned session"
            ),
        }
    }

    if closed > 0 {
        tracing::info!(closed_sessions = closed, "Reaped abandoned sessions");
    }
    metrics::sessions_reaped(closed);

    Ok(closed)
}
