use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{
        extractors::CurrentUser,
        password::{hash_password, verify_password},
    },
    error::ApiError,
    rbac::{
        ensure_can_manage, ensure_can_view, ensure_can_change_role, ensure_not_self_delete,
        require_role, Role,
    },
    state::AppState,
    users::dto::{
        ChangePasswordRequest, ChangeRoleRequest, CreateAdminRequest, StatsResponse,
        UpdateAdminRequest, UpdateUserRequest,
    },
    users::repo::{self, AdminAccount, NewAdmin, Placement, ScholarAccount, UserAccount},
};

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<Vec<UserAccount>>, ApiError> {
    require_role(&principal, &[Role::Admin, Role::SuperAdmin])?;
    // Admins see only the base scholar role.
    let only = (principal.role == Role::Admin).then_some(Role::Scholar);
    let users = UserAccount::list(&state.db, only).await?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn stats(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<StatsResponse>, ApiError> {
    require_role(&principal, &[Role::SuperAdmin])?;
    let (total_scholars, total_admins, total_super_admins) =
        repo::count_by_role(&state.db).await?;
    Ok(Json(StatsResponse {
        total_scholars,
        total_admins,
        total_super_admins,
    }))
}

#[instrument(skip(state))]
pub async fn scholar_accounts(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<Vec<ScholarAccount>>, ApiError> {
    require_role(&principal, &[Role::Admin, Role::SuperAdmin])?;
    Ok(Json(ScholarAccount::list(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn admin_accounts(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<Vec<AdminAccount>>, ApiError> {
    require_role(&principal, &[Role::SuperAdmin])?;
    Ok(Json(AdminAccount::list(&state.db, Role::Admin).await?))
}

#[instrument(skip(state))]
pub async fn super_admin_accounts(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<Vec<AdminAccount>>, ApiError> {
    require_role(&principal, &[Role::SuperAdmin])?;
    Ok(Json(AdminAccount::list(&state.db, Role::SuperAdmin).await?))
}

#[instrument(skip(state))]
pub async fn admin_placements(
    State(state): State<AppState>,
    CurrentUser(_principal): CurrentUser,
) -> Result<Json<Vec<Placement>>, ApiError> {
    Ok(Json(Placement::list(&state.db).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_admin(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Json(payload): Json<CreateAdminRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_role(&principal, &[Role::SuperAdmin])?;

    if payload.name.is_empty()
        || payload.email.is_empty()
        || payload.password.is_empty()
        || payload.coordinator_placement.is_empty()
    {
        return Err(ApiError::Validation(
            "Please provide all required fields".into(),
        ));
    }
    if payload.password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }

    let role = match Role::from_name(&payload.role) {
        Some(Role::Admin) => Role::Admin,
        Some(Role::SuperAdmin) => Role::SuperAdmin,
        _ => {
            return Err(ApiError::Validation(
                "Invalid role. Must be 'admin' or 'super-admin'".into(),
            ))
        }
    };

    if repo::email_taken(&state.db, &payload.email, None).await? {
        return Err(ApiError::Conflict(
            "User with this email already exists".into(),
        ));
    }

    let placement_id = Placement::resolve(&state.db, &payload.coordinator_placement)
        .await?
        .ok_or_else(|| ApiError::Validation("Invalid placement".into()))?;

    let password_hash = hash_password(&payload.password)?;
    let user = AdminAccount::create(
        &state.db,
        &NewAdmin {
            name: payload.name,
            email: payload.email,
            password_hash,
            role,
            placement_id,
        },
    )
    .await?;

    let mut label = role.as_str().to_string();
    if let Some(first) = label.get_mut(0..1) {
        first.make_ascii_uppercase();
    }

    info!(user_id = %user.id, created_by = %principal.id, role = role.as_str(), "admin account created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("{label} account created successfully"),
            "user": user,
        })),
    ))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserAccount>, ApiError> {
    ensure_can_view(&state.db, &principal, id).await?;
    let user = UserAccount::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserAccount>, ApiError> {
    ensure_can_manage(&state.db, &principal, id).await?;

    if payload.name.is_empty() || payload.email.is_empty() {
        return Err(ApiError::Validation("Name and email are required".into()));
    }
    if repo::email_taken(&state.db, &payload.email, Some(id)).await? {
        return Err(ApiError::Conflict("Email already in use".into()));
    }

    let user = UserAccount::update(&state.db, id, &payload.name, &payload.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn update_admin(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAdminRequest>,
) -> Result<Json<Value>, ApiError> {
    require_role(&principal, &[Role::SuperAdmin])?;

    if payload.name.is_empty() || payload.email.is_empty() {
        return Err(ApiError::Validation("Name and email are required".into()));
    }
    if repo::email_taken(&state.db, &payload.email, Some(id)).await? {
        return Err(ApiError::Conflict("Email already in use".into()));
    }

    let placement_id = Placement::resolve(&state.db, &payload.coordinator_placement)
        .await?
        .ok_or_else(|| ApiError::NotFound("Placement not found".into()))?;

    let updated =
        AdminAccount::update(&state.db, id, &payload.name, &payload.email, placement_id).await?;
    if !updated {
        return Err(ApiError::NotFound("User not found".into()));
    }

    info!(user_id = %id, updated_by = %principal.id, "admin account updated");
    Ok(Json(json!({ "message": "Admin updated successfully" })))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    ensure_can_manage(&state.db, &principal, id).await?;

    if payload.new_password.is_empty() {
        return Err(ApiError::Validation("New password is required".into()));
    }
    if payload.new_password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }

    // Changing your own password requires proving you know the current one.
    if id == principal.id {
        let current = payload
            .current_password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::Validation("Current password is required".into()))?;
        let stored = repo::get_password_hash(&state.db, id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
        if !verify_password(current, &stored)? {
            return Err(ApiError::Validation("Current password is incorrect".into()));
        }
    }

    let hash = hash_password(&payload.new_password)?;
    repo::set_password(&state.db, id, &hash).await?;

    info!(user_id = %id, changed_by = %principal.id, "password updated");
    Ok(Json(json!({ "message": "Password updated successfully" })))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_role(&principal, &[Role::Admin, Role::SuperAdmin])?;
    // Self-deletion is rejected before the management gate would allow it.
    ensure_not_self_delete(&principal, id)?;
    ensure_can_manage(&state.db, &principal, id).await?;

    if !repo::delete_user(&state.db, id).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }

    info!(user_id = %id, deleted_by = %principal.id, "user deleted");
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

#[instrument(skip(state, payload))]
pub async fn change_role(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeRoleRequest>,
) -> Result<Json<UserAccount>, ApiError> {
    ensure_can_change_role(&principal, id)?;

    let role = Role::from_id(payload.role_id).ok_or_else(|| {
        ApiError::Validation("Invalid role. Must be 1 (user), 2 (admin), or 3 (super-admin)".into())
    })?;

    let user = UserAccount::set_role(&state.db, id, role)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = %id, changed_by = %principal.id, role = role.as_str(), "role changed");
    Ok(Json(user))
}
