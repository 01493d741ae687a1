use rand::Rng;
use sqlx::PgPool;
use time::PrimitiveDateTime;
use uuid::Uuid;

use super::TryoutError;
use crate::core::metrics;
use crate::db::models::ParticipantTest;
use crate::repositories;
use crate::repositories::participant_tests::CreateParticipantTest;

/// Creates a new attempt in the not-started state.
pub(crate) async fn generate(
    pool: &PgPool,
    user_id: &str,
    test_id: &str,
    now: PrimitiveDateTime,
) -> Result<ParticipantTest, TryoutError> {
    let mut tx = pool.begin().await?;

    let test = repositories::catalog::find_test(&mut *tx, test_id)
        .await?
        .ok_or_else(|| TryoutError::NotFound("Test not found".to_string()))?;
    let categories = repositories::catalog::list_categories(&mut *tx, &test.id).await?;
    if categories.is_empty() {
        return Err(TryoutError::InvalidState("Test has no categories".to_string()));
    }

    repositories::participant_tests::acquire_attempt_lock(&mut *tx, user_id, &test.id).await?;

    if let Some(ongoing) =
        repositories::participant_tests::find_ongoing(&mut *tx, user_id, &test.id).await?
    {
        return Err(TryoutError::AlreadyOngoing { participant_test_id: ongoing.id });
    }

    let attempts = repositories::participant_tests::count_attempts(&mut *tx, user_id, &test.id).await?;
    // Zero behaves like an unset limit.
    if let Some(max_attempts) = test.max_attempts.filter(|max| *max > 0) {
        if attempts >= i64::from(max_attempts) {
            return Err(TryoutError::AttemptLimitExceeded { max_attempts });
        }
    }

    let id = Uuid::new_v4().to_string();
    let shuffle_seed: i64 = rand::thread_rng().gen_range(0..i64::MAX);
    let session = repositories::participant_tests::create(
        &mut *tx,
        CreateParticipantTest {
            id: &id,
            test_id: &test.id,
            user_id,
            attempt_number: i32::try_from(attempts + 1).unwrap_or(i32::MAX),
            shuffle_seed,
            created_at: now,
        },
    )
    .await?;

    tx.commit().await?;

    metrics::session_generated();
    tracing::info!(
        participant_test_id = %session.id,
        user_id,
        test_id = %session.test_id,
        attempt_number = session.attempt_number,
        "Tryout session generated"
    );

    Ok(session)
}
