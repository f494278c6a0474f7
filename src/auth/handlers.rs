use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            ForgotPasswordRequest, LoginRequest, LoginResponse, RegisterScholarRequest,
            RegisterSuperAdminRequest, ResetPasswordRequest, SessionUser,
        },
        extractors::CurrentUser,
        jwt::JwtKeys,
        otp::generate_otp,
        password::{hash_password, verify_password},
    },
    config::AppConfig,
    error::ApiError,
    rbac::{require_role, Role},
    state::AppState,
    users::repo::{self, NewScholar, Placement, ScholarAccount},
};

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn session_cookie(config: &AppConfig, token: String) -> Cookie<'static> {
    Cookie::build((config.session_cookie.clone(), token))
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(TimeDuration::days(config.jwt.ttl_days))
        .build()
}

fn clear_session_cookie(config: &AppConfig) -> Cookie<'static> {
    Cookie::build((config.session_cookie.clone(), ""))
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(TimeDuration::ZERO)
        .build()
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation(
            "Please provide all required fields".into(),
        ));
    }

    // Exact-match lookup; unknown email and bad password are reported
    // identically.
    let user = repo::find_credentials_by_email(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&payload.password, &user.password)? {
        warn!(user_id = %user.id, "login failed: password mismatch");
        return Err(ApiError::InvalidCredentials);
    }

    let role = Role::from_id(user.role_id)
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("unknown role id {}", user.role_id)))?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;
    let jar = jar.add(session_cookie(&state.config, token));

    info!(user_id = %user.id, "user logged in");
    Ok((
        jar,
        Json(LoginResponse {
            user: SessionUser {
                id: user.id,
                name: user.name,
                email: user.email,
                role,
            },
        }),
    ))
}

#[instrument(skip(state, jar))]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    let jar = jar.add(clear_session_cookie(&state.config));
    (jar, Json(json!({ "message": "Logged out successfully" })))
}

#[instrument(skip_all)]
pub async fn me(CurrentUser(principal): CurrentUser) -> Json<SessionUser> {
    Json(SessionUser {
        id: principal.id,
        name: principal.name,
        email: principal.email,
        role: principal.role,
    })
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::Validation("Email is required".into()));
    }

    let otp = generate_otp();
    let expires_at = OffsetDateTime::now_utc() + TimeDuration::minutes(state.config.otp_ttl_minutes);

    // Overwrites any prior OTP pair; only one code is active per user.
    let name = repo::set_otp(&state.db, &email, &otp, expires_at)
        .await?
        .ok_or_else(|| ApiError::NotFound("Email not found".into()))?;

    state.mailer.send_otp(&email, &name, &otp).await?;

    info!(%email, "password reset OTP stored");
    Ok(Json(json!({ "message": "OTP sent to email" })))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.otp.is_empty() || payload.new_password.is_empty() {
        return Err(ApiError::Validation(
            "Please provide all required fields".into(),
        ));
    }

    let hash = hash_password(&payload.new_password)?;

    // One atomic statement matches email + OTP + expiry and clears the OTP
    // pair alongside the new hash; a code is usable exactly once.
    let role_id = repo::reset_password_with_otp(&state.db, &email, &payload.otp, &hash)
        .await?
        .ok_or_else(|| ApiError::Validation("Invalid OTP or OTP expired".into()))?;

    let role = Role::from_id(role_id)
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("unknown role id {role_id}")))?;

    info!(%email, "password reset completed");
    Ok(Json(json!({
        "message": "Password reset successful",
        "role": role.as_str(),
    })))
}

#[instrument(skip(state, payload))]
pub async fn register_scholar(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Json(payload): Json<RegisterScholarRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_role(&principal, &[Role::Admin, Role::SuperAdmin])?;

    if payload.name.is_empty()
        || payload.email.is_empty()
        || payload.password.is_empty()
        || payload.student_id.is_empty()
        || payload.coordinator_placement.is_empty()
    {
        return Err(ApiError::Validation(
            "Please provide all required fields".into(),
        ));
    }
    if !is_valid_email(&payload.email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }
    if repo::email_taken(&state.db, &payload.email, None).await? {
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let placement_id = Placement::resolve(&state.db, &payload.coordinator_placement)
        .await?
        .ok_or_else(|| ApiError::Validation("Invalid placement".into()))?;

    let password_hash = hash_password(&payload.password)?;
    let scholar = ScholarAccount::create(
        &state.db,
        &NewScholar {
            name: payload.name,
            email: payload.email,
            password_hash,
            student_id: payload.student_id,
            course: payload.course,
            year_level: payload.year_level,
            designation: payload.designation,
            committed_day: payload.committed_day,
            committed_time: payload.committed_time,
            required_stewardship_hours: payload.required_stewardship_hours,
            counterpart: payload.counterpart,
            coordinator: payload.coordinator,
            placement_id,
        },
    )
    .await?;

    info!(scholar_id = %scholar.id, created_by = %principal.id, "scholar account created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Scholar account created successfully",
            "scholar": scholar,
        })),
    ))
}

#[instrument(skip(state, payload))]
pub async fn register_super_admin(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Json(payload): Json<RegisterSuperAdminRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    // Uniformly gated: only an existing super-admin may mint accounts here.
    require_role(&principal, &[Role::SuperAdmin])?;

    if payload.name.is_empty() || payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation(
            "Please provide all required fields".into(),
        ));
    }
    if !is_valid_email(&payload.email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }

    let role = Role::from_name(&payload.role)
        .ok_or_else(|| ApiError::Validation("Invalid role".into()))?;

    if repo::email_taken(&state.db, &payload.email, None).await? {
        return Err(ApiError::Conflict(
            "User with this email already exists".into(),
        ));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = repo::create_user(
        &state.db,
        &payload.name,
        &payload.email,
        &password_hash,
        role,
    )
    .await?;

    let mut label = role.as_str().to_string();
    if let Some(first) = label.get_mut(0..1) {
        first.make_ascii_uppercase();
    }

    info!(user_id = %user.id, created_by = %principal.id, role = role.as_str(), "account created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("{label} account created successfully"),
            "user": user,
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_cookie_is_locked_down() {
        let state = AppState::fake();
        let cookie = session_cookie(&state.config, "abc.def.ghi".into());
        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(TimeDuration::days(30)));
    }

    #[tokio::test]
    async fn clear_cookie_expires_immediately() {
        let state = AppState::fake();
        let cookie = clear_session_cookie(&state.config);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(TimeDuration::ZERO));
        assert_eq!(cookie.http_only(), Some(true));
    }

    #[test]
    fn email_regex_matches_reasonable_addresses() {
        assert!(is_valid_email("admin@test.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@test.com"));
        assert!(!is_valid_email("missing@tld"));
    }
}
