use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentUser};
use crate::api::pagination::{PageRequest, PaginatedResponse};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::EndReason;
use crate::repositories::participant_tests::{GradeOrder, HistoryFilter};
use crate::schemas::tryout::{
    ContinueResponse, EndCategoryResponse, EndSessionRequest, FlagQuestionRequest,
    GenerateRequest, GradeEssayRequest, GradeOrderParam, HistoryQuery, ParticipantCategoryResponse,
    ParticipantTestResponse, ResetAnswerRequest, ResultResponse, SaveAnswerRequest,
};
use crate::schemas::Envelope;
use crate::services::tryout::{self, EndCategoryOutcome, LedgerEntry, TimerReport};

const ANSWER_RATE_WINDOW_SECONDS: u64 = 60;

pub(super) async fn generate(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<Envelope<ParticipantTestResponse>>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let session =
        tryout::generate(state.db(), &user.id, payload.test_id.trim(), primitive_now_utc()).await?;

    Ok((StatusCode::CREATED, Json(Envelope::created(session.into()))))
}

pub(super) async fn continue_session(
    Path(participant_test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<ContinueResponse>>, ApiError> {
    let view = tryout::continue_session(
        state.db(),
        user.actor(),
        &participant_test_id,
        None,
        primitive_now_utc(),
    )
    .await?;

    Ok(Json(Envelope::ok(view.into())))
}

pub(super) async fn continue_category(
    Path((participant_test_id, category_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<ContinueResponse>>, ApiError> {
    let view = tryout::continue_session(
        state.db(),
        user.actor(),
        &participant_test_id,
        Some(&category_id),
        primitive_now_utc(),
    )
    .await?;

    Ok(Json(Envelope::ok(view.into())))
}

pub(super) async fn active_category(
    Path(participant_test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Option<ParticipantCategoryResponse>>>, ApiError> {
    let entry = tryout::active_category(state.db(), user.actor(), &participant_test_id).await?;
    Ok(Json(Envelope::ok(entry.map(Into::into))))
}

pub(super) async fn save_answer(
    Path(participant_test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<Json<Envelope<LedgerEntry>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let rate_key = answer_rate_key(&user.id, &participant_test_id);
    let limit = state.settings().tryout().answer_rate_limit_per_minute;
    let allowed = state
        .redis()
        .rate_limit(&rate_key, limit, ANSWER_RATE_WINDOW_SECONDS)
        .await
        .unwrap_or(true);
    if !allowed {
        return Err(ApiError::TooManyRequests("Answer rate limit exceeded"));
    }

    let entry = tryout::save_answer(
        state.db(),
        user.actor(),
        &participant_test_id,
        payload.question_id.trim(),
        payload.question_type,
        &payload.answer,
        primitive_now_utc(),
    )
    .await?;

    Ok(Json(Envelope::ok(entry)))
}

/// Budget is per caller and session, so nobody can drain another
/// participant's allowance.
fn answer_rate_key(user_id: &str, participant_test_id: &str) -> String {
    format!("tryout:answers:{user_id}:{participant_test_id}")
}

pub(super) async fn reset_answer(
    Path(participant_test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ResetAnswerRequest>,
) -> Result<Json<Envelope<LedgerEntry>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let entry = tryout::reset_answer(
        state.db(),
        user.actor(),
        &participant_test_id,
        payload.question_id.trim(),
        primitive_now_utc(),
    )
    .await?;

    Ok(Json(Envelope::ok(entry)))
}

pub(super) async fn flag_question(
    Path(participant_test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<FlagQuestionRequest>,
) -> Result<Json<Envelope<LedgerEntry>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let entry = tryout::flag_question(
        state.db(),
        user.actor(),
        &participant_test_id,
        payload.question_id.trim(),
        payload.is_flagged,
        primitive_now_utc(),
    )
    .await?;

    Ok(Json(Envelope::ok(entry)))
}

pub(super) async fn end_category(
    Path((participant_test_id, category_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<EndCategoryResponse>>, ApiError> {
    let outcome = tryout::end_category(
        state.db(),
        user.actor(),
        &participant_test_id,
        &category_id,
        primitive_now_utc(),
    )
    .await?;

    let response = match outcome {
        EndCategoryOutcome::Next(view) => {
            EndCategoryResponse::Next { next_category: Box::new((*view).into()) }
        }
        EndCategoryOutcome::Completed(session) => EndCategoryResponse::Completed(session.into()),
    };
    Ok(Json(Envelope::ok(response)))
}

pub(super) async fn end_session(
    Path(participant_test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    payload: Option<Json<EndSessionRequest>>,
) -> Result<Json<Envelope<ParticipantTestResponse>>, ApiError> {
    let reason = payload
        .map(|Json(payload)| payload)
        .unwrap_or_default()
        .reason
        .unwrap_or(EndReason::Submitted);

    let session = tryout::end_session(
        state.db(),
        user.actor(),
        &participant_test_id,
        reason,
        primitive_now_utc(),
    )
    .await?;

    Ok(Json(Envelope::ok(session.into())))
}

pub(super) async fn history(
    Query(query): Query<HistoryQuery>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<PaginatedResponse<ParticipantTestResponse>>>, ApiError> {
    let page = PageRequest::new(query.page, query.per_page, state.settings().tryout().max_page_size);
    let filter = HistoryFilter {
        user_id: query.user_id,
        test_id: query.test_id,
        is_ongoing: query.is_ongoing,
        is_completed: query.is_completed,
        start_date_from: query.start_date,
        start_date_to: query.end_date,
        order_by_grade: query.order_by_grade.map(|order| match order {
            GradeOrderParam::Asc => GradeOrder::Asc,
            GradeOrderParam::Desc => GradeOrder::Desc,
        }),
    };

    let (items, total) =
        tryout::history(state.db(), user.actor(), filter, page.offset(), page.per_page).await?;
    let data = items.into_iter().map(Into::into).collect();

    Ok(Json(Envelope::ok(PaginatedResponse::new(data, total, page))))
}

pub(super) async fn timer(
    Path(participant_test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<TimerReport>>, ApiError> {
    let report =
        tryout::timer_status(state.db(), user.actor(), &participant_test_id, primitive_now_utc())
            .await?;
    Ok(Json(Envelope::ok(report)))
}

pub(super) async fn result(
    Path(participant_test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<ResultResponse>>, ApiError> {
    let result = tryout::result(state.db(), user.actor(), &participant_test_id).await?;
    Ok(Json(Envelope::ok(result.into())))
}

pub(super) async fn grade_essay(
    Path(participant_test_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<GradeEssayRequest>,
) -> Result<Json<Envelope<LedgerEntry>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let entry = tryout::grade_essay(
        state.db(),
        &participant_test_id,
        payload.question_id.trim(),
        payload.point,
        primitive_now_utc(),
    )
    .await?;

    tracing::info!(
        admin_id = %admin.id,
        participant_test_id = %participant_test_id,
        "Essay grade recorded"
    );
    Ok(Json(Envelope::ok(entry)))
}
