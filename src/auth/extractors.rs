use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use crate::{
    auth::jwt::JwtKeys,
    error::ApiError,
    rbac::Principal,
    state::AppState,
    users::repo,
};

/// Verifies the session cookie and reloads the full account. Role is read
/// from the store, not the token, so demotions take effect immediately.
pub struct CurrentUser(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(&state.config.session_cookie)
            .map(|c| c.value().to_string())
            .ok_or_else(|| ApiError::Unauthenticated("Not authorized, no token".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(&token).map_err(|_| {
            warn!("invalid or expired session token");
            ApiError::Unauthenticated("Not authorized, token failed".into())
        })?;

        let principal = repo::fetch_principal(&state.db, claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthenticated("User not found".into()))?;

        Ok(CurrentUser(principal))
    }
}
