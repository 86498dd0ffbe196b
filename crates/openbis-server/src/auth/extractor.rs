//! Request extractor resolving the bearer token into a [`Session`]

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{load_session, Session};
use crate::{error::ApiError, features::AppState};

/// The authenticated caller of a route
#[derive(Debug, Clone)]
pub struct Caller {
    pub session: Session,
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or(ApiError::InvalidSession)?;

        let mut conn = state.db.acquire().await?;
        let session = load_session(&mut conn, token).await?;
        tracing::debug!(user_id = %session.user_id, "Resolved session");

        Ok(Caller { session })
    }
}
