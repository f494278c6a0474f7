use serde::{Deserialize, Serialize};
use sqlx::types::Decimal;
use uuid::Uuid;

use crate::rbac::Role;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public projection of a session user; password never appears here.
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: SessionUser,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

/// Request body for scholar provisioning.
#[derive(Debug, Deserialize)]
pub struct RegisterScholarRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub student_id: String,
    pub course: Option<String>,
    pub year_level: Option<String>,
    pub designation: Option<String>,
    pub committed_day: Option<String>,
    pub committed_time: Option<String>,
    pub required_stewardship_hours: Option<i32>,
    pub counterpart: Option<Decimal>,
    pub coordinator: Option<String>,
    pub coordinator_placement: String,
}

/// Request body for super-admin provisioning (no profile extension).
#[derive(Debug, Deserialize)]
pub struct RegisterSuperAdminRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}
