use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(rename = "currentPassword")]
    pub current_password: Option<String>,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateAdminRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub coordinator_placement: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAdminRequest {
    pub name: String,
    pub email: String,
    pub coordinator_placement: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(rename = "totalScholars")]
    pub total_scholars: i64,
    #[serde(rename = "totalAdmins")]
    pub total_admins: i64,
    #[serde(rename = "totalSuperAdmins")]
    pub total_super_admins: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_serialize_with_dashboard_names() {
        let stats = StatsResponse {
            total_scholars: 12,
            total_admins: 3,
            total_super_admins: 1,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalScholars"], 12);
        assert_eq!(json["totalAdmins"], 3);
        assert_eq!(json["totalSuperAdmins"], 1);
    }

    #[test]
    fn change_password_accepts_client_field_names() {
        let req: ChangePasswordRequest = serde_json::from_str(
            r#"{"currentPassword":"old-pass","newPassword":"new-pass"}"#,
        )
        .unwrap();
        assert_eq!(req.current_password.as_deref(), Some("old-pass"));
        assert_eq!(req.new_password, "new-pass");

        let req: ChangePasswordRequest =
            serde_json::from_str(r#"{"newPassword":"new-pass"}"#).unwrap();
        assert!(req.current_password.is_none());
    }
}
