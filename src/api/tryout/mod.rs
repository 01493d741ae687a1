mod handlers;

use axum::{routing::get, routing::post, routing::put, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(handlers::generate))
        .route("/continue/:id", put(handlers::continue_session))
        .route("/continue/:id/:category_id", put(handlers::continue_category))
        .route("/active-category/:id", get(handlers::active_category))
        .route("/save-answer/:id", put(handlers::save_answer))
        .route("/reset-answer/:id", put(handlers::reset_answer))
        .route("/flag-question/:id", put(handlers::flag_question))
        .route("/end-category/:id/:category_id", put(handlers::end_category))
        .route("/end-session/:id", put(handlers::end_session))
        .route("/history-test", get(handlers::history))
        .route("/timer/:id", get(handlers::timer))
        .route("/result/:id", get(handlers::result))
        .route("/grade-essay/:id", put(handlers::grade_essay))
}

#[cfg(test)]
mod tests;
