use sqlx::SqlitePool;

use crate::{
    access_log,
    auth::{token_digest, Session},
    error::ApiResult,
};

/// End the session; later calls with its token fail with an invalid session
#[tracing::instrument(skip(pool, session), fields(user = %session.user_id))]
pub async fn handle(pool: &SqlitePool, session: &Session) -> ApiResult<()> {
    sqlx::query("DELETE FROM sessions WHERE token_digest = ?")
        .bind(token_digest(&session.token))
        .execute(pool)
        .await?;
    access_log::record(&session.user_id, "logout", &[]);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{auth::load_session, error::ApiError, features::shared::test_helpers::TestContext};

    #[tokio::test]
    async fn test_logout_invalidates_token() {
        let ctx = TestContext::new().await;
        let session = ctx.admin().await;
        handle(&ctx.pool, &session).await.unwrap();

        let mut conn = ctx.pool.acquire().await.unwrap();
        let err = load_session(&mut conn, &session.token).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidSession));
    }
}
