//! Remaining-time computation for the active time scope of a session.
//!
//! Everything here is pure: the same inputs give the same answer whether the
//! caller is a polling client, a mutating request or the expiry reaper.

use serde::Serialize;
use time::PrimitiveDateTime;

use crate::core::time::seconds_between;
use crate::db::models::{Category, ParticipantCategory, ParticipantTest, Test};
use crate::db::types::TimerType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimerConfig {
    pub(crate) timer_type: TimerType,
    /// Budget in seconds; `None` or `Some(0)` means untimed.
    pub(crate) total_time: Option<i64>,
}

impl TimerConfig {
    /// Picks the budget that governs `category`: its own in per_category mode,
    /// the test-wide one in per_test mode.
    pub(crate) fn for_category(test: &Test, category: &Category) -> Self {
        let total_time = match test.timer_type {
            TimerType::PerCategory => category.total_time,
            TimerType::PerTest => test.total_time,
        };
        Self { timer_type: test.timer_type, total_time: total_time.map(i64::from) }
    }

    pub(crate) fn budget(&self) -> Option<i64> {
        self.total_time.filter(|seconds| *seconds > 0)
    }
}

/// Seconds left in the budget that started at `start_date`, possibly negative.
/// `None` when the scope is untimed.
pub(crate) fn remaining(
    config: TimerConfig,
    start_date: PrimitiveDateTime,
    now: PrimitiveDateTime,
) -> Option<i64> {
    let budget = config.budget()?;
    let elapsed = seconds_between(start_date, now).max(0);
    Some(budget - elapsed)
}

pub(crate) fn is_expired(remaining: Option<i64>) -> bool {
    matches!(remaining, Some(seconds) if seconds <= 0)
}

/// The instant the governing budget started counting.
pub(crate) fn anchor(
    timer_type: TimerType,
    session: &ParticipantTest,
    category: &ParticipantCategory,
) -> Option<PrimitiveDateTime> {
    match timer_type {
        TimerType::PerCategory => category.start_date,
        TimerType::PerTest => session.start_date.or(category.start_date),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct TimerStatus {
    pub(crate) timer_type: TimerType,
    pub(crate) total_time: Option<i64>,
    pub(crate) remaining_seconds: Option<i64>,
    pub(crate) is_expired: bool,
}

impl TimerStatus {
    pub(crate) fn evaluate(
        test: &Test,
        category: &Category,
        session: &ParticipantTest,
        participant_category: &ParticipantCategory,
        now: PrimitiveDateTime,
    ) -> Self {
        let config = TimerConfig::for_category(test, category);
        let remaining_seconds = anchor(test.timer_type, session, participant_category)
            .and_then(|start| remaining(config, start, now));
        Self {
            timer_type: config.timer_type,
            total_time: config.budget(),
            remaining_seconds,
            is_expired: is_expired(remaining_seconds),
        }
    }

    /// Status of a session with no open category. Only the per_test budget can
    /// be running in that case.
    pub(crate) fn between_categories(
        test: &Test,
        session: &ParticipantTest,
        now: PrimitiveDateTime,
    ) -> Self {
        let config = TimerConfig { timer_type: test.timer_type, total_time: None };
        let config = match test.timer_type {
            TimerType::PerTest => TimerConfig { total_time: test.total_time.map(i64::from), ..config },
            TimerType::PerCategory => config,
        };
        let remaining_seconds = match test.timer_type {
            TimerType::PerTest => session.start_date.and_then(|start| remaining(config, start, now)),
            TimerType::PerCategory => None,
        };
        Self {
            timer_type: test.timer_type,
            total_time: config.budget(),
            remaining_seconds,
            is_expired: is_expired(remaining_seconds),
        }
    }
}
