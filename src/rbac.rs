use serde::{Serialize, Serializer};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;

/// Closed set of roles. The base role keeps its historical database name
/// "user" even though the UI calls it a scholar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Scholar,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn id(self) -> i32 {
        match self {
            Role::Scholar => 1,
            Role::Admin => 2,
            Role::SuperAdmin => 3,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Role::Scholar),
            2 => Some(Role::Admin),
            3 => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Scholar => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super-admin",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "user" => Some(Role::Scholar),
            "admin" => Some(Role::Admin),
            "super-admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The authenticated identity attached to a request after token
/// verification. Always freshly loaded from the store, never taken from
/// the token payload.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Target of an ownership/management check.
#[derive(Debug, Clone, Copy)]
pub struct Target {
    pub id: Uuid,
    pub role: Role,
}

pub fn require_role(principal: &Principal, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&principal.role) {
        return Ok(());
    }
    let wanted = allowed
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(" or ");
    Err(ApiError::Forbidden(format!(
        "Access denied. Required role: {wanted}"
    )))
}

/// Strict linear hierarchy: super-admin manages anyone, admin manages only
/// scholars, a scholar manages only themself.
pub fn can_manage(principal: &Principal, target: &Target) -> Result<(), ApiError> {
    match principal.role {
        Role::SuperAdmin => Ok(()),
        Role::Admin => {
            if target.role == Role::Scholar {
                Ok(())
            } else {
                Err(ApiError::Forbidden(
                    "Admins can only manage regular users, not other admins or super-admins"
                        .into(),
                ))
            }
        }
        Role::Scholar => {
            if target.id == principal.id {
                Ok(())
            } else {
                Err(ApiError::Forbidden(
                    "Users can only manage their own account".into(),
                ))
            }
        }
    }
}

pub fn can_view(principal: &Principal, target: &Target) -> Result<(), ApiError> {
    match principal.role {
        Role::SuperAdmin => Ok(()),
        Role::Admin => {
            if target.role == Role::Scholar {
                Ok(())
            } else {
                Err(ApiError::Forbidden(
                    "Admins can only view regular users".into(),
                ))
            }
        }
        Role::Scholar => {
            if target.id == principal.id {
                Ok(())
            } else {
                Err(ApiError::Forbidden(
                    "Users can only view their own account".into(),
                ))
            }
        }
    }
}

/// Role mutation is reserved to super-admins, and nobody may change their
/// own role.
pub fn ensure_can_change_role(principal: &Principal, target_id: Uuid) -> Result<(), ApiError> {
    if principal.role != Role::SuperAdmin {
        return Err(ApiError::Forbidden(
            "Only super-admins can change user roles".into(),
        ));
    }
    if principal.id == target_id {
        return Err(ApiError::Validation(
            "You cannot change your own role".into(),
        ));
    }
    Ok(())
}

/// Self-deletion is rejected for every role, before any management check.
pub fn ensure_not_self_delete(principal: &Principal, target_id: Uuid) -> Result<(), ApiError> {
    if principal.id == target_id {
        return Err(ApiError::Validation(
            "You cannot delete your own account".into(),
        ));
    }
    Ok(())
}

/// Missing targets surface as NotFound before any role comparison happens.
async fn fetch_target(db: &PgPool, target_id: Uuid) -> Result<Target, ApiError> {
    let row = sqlx::query_as::<_, (Uuid, i32)>("SELECT id, role_id FROM users WHERE id = $1")
        .bind(target_id)
        .fetch_optional(db)
        .await?;
    let (id, role_id) = row.ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    let role = Role::from_id(role_id)
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("unknown role id {role_id}")))?;
    Ok(Target { id, role })
}

pub async fn ensure_can_manage(
    db: &PgPool,
    principal: &Principal,
    target_id: Uuid,
) -> Result<Target, ApiError> {
    let target = fetch_target(db, target_id).await?;
    can_manage(principal, &target)?;
    Ok(target)
}

pub async fn ensure_can_view(
    db: &PgPool,
    principal: &Principal,
    target_id: Uuid,
) -> Result<Target, ApiError> {
    let target = fetch_target(db, target_id).await?;
    can_view(principal, &target)?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn principal(role: Role) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            name: "Test".into(),
            email: "test@example.com".into(),
            role,
        }
    }

    fn target(role: Role) -> Target {
        Target {
            id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn role_ids_round_trip() {
        for role in [Role::Scholar, Role::Admin, Role::SuperAdmin] {
            assert_eq!(Role::from_id(role.id()), Some(role));
            assert_eq!(Role::from_name(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_id(0), None);
        assert_eq!(Role::from_name("owner"), None);
    }

    #[test]
    fn role_serializes_as_name() {
        assert_eq!(serde_json::to_string(&Role::Scholar).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::SuperAdmin).unwrap(),
            "\"super-admin\""
        );
    }

    #[test]
    fn require_role_accepts_members_only() {
        let admin = principal(Role::Admin);
        assert!(require_role(&admin, &[Role::Admin, Role::SuperAdmin]).is_ok());
        let scholar = principal(Role::Scholar);
        let err = require_role(&scholar, &[Role::Admin, Role::SuperAdmin]).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn super_admin_manages_everyone() {
        let sa = principal(Role::SuperAdmin);
        for role in [Role::Scholar, Role::Admin, Role::SuperAdmin] {
            assert!(can_manage(&sa, &target(role)).is_ok());
            assert!(can_view(&sa, &target(role)).is_ok());
        }
    }

    #[test]
    fn admin_manages_scholars_only() {
        let admin = principal(Role::Admin);
        assert!(can_manage(&admin, &target(Role::Scholar)).is_ok());
        for role in [Role::Admin, Role::SuperAdmin] {
            let err = can_manage(&admin, &target(role)).unwrap_err();
            assert_eq!(err.status(), StatusCode::FORBIDDEN);
            let err = can_view(&admin, &target(role)).unwrap_err();
            assert_eq!(err.status(), StatusCode::FORBIDDEN);
        }
    }

    #[test]
    fn scholar_manages_self_only() {
        let scholar = principal(Role::Scholar);
        let own = Target {
            id: scholar.id,
            role: Role::Scholar,
        };
        assert!(can_manage(&scholar, &own).is_ok());
        assert!(can_view(&scholar, &own).is_ok());
        let err = can_manage(&scholar, &target(Role::Scholar)).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn role_change_reserved_to_super_admin() {
        let admin = principal(Role::Admin);
        let err = ensure_can_change_role(&admin, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let sa = principal(Role::SuperAdmin);
        assert!(ensure_can_change_role(&sa, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn self_role_change_rejected_even_for_super_admin() {
        let sa = principal(Role::SuperAdmin);
        let err = ensure_can_change_role(&sa, sa.id).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn self_delete_rejected_for_every_role() {
        for role in [Role::Scholar, Role::Admin, Role::SuperAdmin] {
            let p = principal(role);
            let err = ensure_not_self_delete(&p, p.id).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
            assert!(ensure_not_self_delete(&p, Uuid::new_v4()).is_ok());
        }
    }
}
