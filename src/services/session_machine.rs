//! Category progression rules for one participant session.
//!
//! [`SessionView`] is a read-only snapshot taken while the session row is
//! locked; the planning methods decide what a request may do without touching
//! the database.

use crate::db::models::{Category, ParticipantCategory, ParticipantTest};
use crate::services::tryout::TryoutError;

#[derive(Debug, Clone, Copy)]
pub(crate) enum SessionState<'a> {
    NotStarted,
    CategoryActive(&'a ParticipantCategory),
    /// Between categories; holds the most recently ended entry.
    CategoryEnded(&'a ParticipantCategory),
    SessionEnded,
}

#[derive(Debug)]
pub(crate) enum ContinuePlan<'a> {
    /// The requested category is already open; hand it back unchanged.
    Resume(&'a ParticipantCategory),
    /// Open this test category as the next entry.
    Activate(&'a Category),
}

#[derive(Debug)]
pub(crate) struct EndCategoryPlan<'a> {
    pub(crate) ending: &'a ParticipantCategory,
    pub(crate) next: Option<&'a Category>,
}

#[derive(Debug)]
pub(crate) enum EndSessionPlan<'a> {
    AlreadyEnded,
    Finalize { force_end: Option<&'a ParticipantCategory> },
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionView<'a> {
    pub(crate) session: &'a ParticipantTest,
    /// Test categories sorted by `order_index`.
    pub(crate) categories: &'a [Category],
    pub(crate) entered: &'a [ParticipantCategory],
}

impl<'a> SessionView<'a> {
    pub(crate) fn new(
        session: &'a ParticipantTest,
        categories: &'a [Category],
        entered: &'a [ParticipantCategory],
    ) -> Self {
        Self { session, categories, entered }
    }

    pub(crate) fn state(&self) -> SessionState<'a> {
        if self.session.is_ended() {
            return SessionState::SessionEnded;
        }
        if let Some(active) = self.active() {
            return SessionState::CategoryActive(active);
        }
        match self.entered.iter().max_by_key(|entry| entry.category_order) {
            Some(last) => SessionState::CategoryEnded(last),
            None => SessionState::NotStarted,
        }
    }

    pub(crate) fn active(&self) -> Option<&'a ParticipantCategory> {
        self.entered.iter().find(|entry| entry.is_active())
    }

    fn entry_for(&self, category_id: &str) -> Option<&'a ParticipantCategory> {
        self.entered.iter().find(|entry| entry.category_id == category_id)
    }

    pub(crate) fn category(&self, category_id: &str) -> Option<&'a Category> {
        self.categories.iter().find(|category| category.id == category_id)
    }

    /// Lowest-ordered test category that has no entry yet.
    pub(crate) fn next_unstarted(&self) -> Option<&'a Category> {
        self.categories.iter().find(|category| self.entry_for(&category.id).is_none())
    }

    pub(crate) fn plan_continue(
        &self,
        requested: Option<&str>,
    ) -> Result<ContinuePlan<'a>, TryoutError> {
        let state = self.state();
        if matches!(state, SessionState::SessionEnded) {
            return Err(TryoutError::InvalidState("Session has already ended".to_string()));
        }

        if let Some(category_id) = requested {
            if self.category(category_id).is_none() {
                return Err(TryoutError::NotFound("Category not found".to_string()));
            }
        }

        if let SessionState::CategoryActive(active) = state {
            return match requested {
                Some(category_id) if category_id != active.category_id => {
                    Err(TryoutError::InvalidTransition(
                        "Another category is still active; end it first".to_string(),
                    ))
                }
                _ => Ok(ContinuePlan::Resume(active)),
            };
        }

        let next = self.next_unstarted().ok_or_else(|| {
            TryoutError::InvalidState("All categories have ended; end the session".to_string())
        })?;

        match requested {
            Some(category_id) if self.entry_for(category_id).is_some() => {
                Err(TryoutError::InvalidTransition("Category has already ended".to_string()))
            }
            Some(category_id) if category_id != next.id => Err(TryoutError::InvalidTransition(
                "Categories must be taken in order".to_string(),
            )),
            _ => Ok(ContinuePlan::Activate(next)),
        }
    }

    pub(crate) fn plan_end_category(
        &self,
        category_id: &str,
    ) -> Result<EndCategoryPlan<'a>, TryoutError> {
        if self.session.is_ended() {
            return Err(TryoutError::InvalidState("Session has already ended".to_string()));
        }
        if self.category(category_id).is_none() {
            return Err(TryoutError::NotFound("Category not found".to_string()));
        }

        let ending = self
            .active()
            .filter(|active| active.category_id == category_id)
            .ok_or_else(|| TryoutError::InvalidState("Category is not active".to_string()))?;

        let next = self
            .categories
            .iter()
            .filter(|category| category.id != ending.category_id)
            .find(|category| self.entry_for(&category.id).is_none());

        Ok(EndCategoryPlan { ending, next })
    }

    pub(crate) fn plan_end_session(&self) -> EndSessionPlan<'a> {
        if self.session.is_ended() {
            return EndSessionPlan::AlreadyEnded;
        }
        EndSessionPlan::Finalize { force_end: self.active() }
    }

    /// The open entry for `category_id`, or the reason answers are refused.
    pub(crate) fn ensure_answerable(
        &self,
        category_id: &str,
    ) -> Result<&'a ParticipantCategory, TryoutError> {
        if self.session.is_ended() {
            return Err(TryoutError::InvalidState("Session has already ended".to_string()));
        }
        self.active()
            .filter(|active| active.category_id == category_id)
            .ok_or_else(|| {
                TryoutError::InvalidState("Question does not belong to the active category".to_string())
            })
    }
}
