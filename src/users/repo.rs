use serde::Serialize;
use sqlx::{types::Decimal, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::rbac::{Principal, Role};

/// Public account projection joined with the role name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Full credential row used by login; never serialized outward.
#[derive(Debug, Clone, FromRow)]
pub struct CredentialRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role_id: i32,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ScholarAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
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

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdminAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub coordinator_placement: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Placement {
    pub placement_id: i32,
    pub coordinator_placement: String,
    pub description: Option<String>,
}

pub struct NewScholar {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub student_id: String,
    pub course: Option<String>,
    pub year_level: Option<String>,
    pub designation: Option<String>,
    pub committed_day: Option<String>,
    pub committed_time: Option<String>,
    pub required_stewardship_hours: Option<i32>,
    pub counterpart: Option<Decimal>,
    pub coordinator: Option<String>,
    pub placement_id: i32,
}

pub struct NewAdmin {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub placement_id: i32,
}

const USER_ACCOUNT_RETURNING: &str = r#"
    RETURNING id, name, email,
              (SELECT name FROM roles WHERE roles.id = users.role_id) AS role,
              created_at
"#;

impl UserAccount {
    pub async fn get(db: &PgPool, id: Uuid) -> anyhow::Result<Option<UserAccount>> {
        let row = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT u.id, u.name, u.email, r.name AS role, u.created_at
            FROM users u
            LEFT JOIN roles r ON u.role_id = r.id
            WHERE u.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// List accounts, optionally restricted to a single role (admins only
    /// see the base scholar role).
    pub async fn list(db: &PgPool, only: Option<Role>) -> anyhow::Result<Vec<UserAccount>> {
        let rows = match only {
            Some(role) => {
                sqlx::query_as::<_, UserAccount>(
                    r#"
                    SELECT u.id, u.name, u.email, r.name AS role, u.created_at
                    FROM users u
                    LEFT JOIN roles r ON u.role_id = r.id
                    WHERE u.role_id = $1
                    ORDER BY u.created_at DESC
                    "#,
                )
                .bind(role.id())
                .fetch_all(db)
                .await?
            }
            None => {
                sqlx::query_as::<_, UserAccount>(
                    r#"
                    SELECT u.id, u.name, u.email, r.name AS role, u.created_at
                    FROM users u
                    LEFT JOIN roles r ON u.role_id = r.id
                    ORDER BY u.created_at DESC
                    "#,
                )
                .fetch_all(db)
                .await?
            }
        };
        Ok(rows)
    }

    pub async fn update(
        db: &PgPool,
        id: Uuid,
        name: &str,
        email: &str,
    ) -> anyhow::Result<Option<UserAccount>> {
        let sql = format!(
            "UPDATE users SET name = $1, email = $2, updated_at = now() WHERE id = $3 {USER_ACCOUNT_RETURNING}"
        );
        let row = sqlx::query_as::<_, UserAccount>(&sql)
            .bind(name)
            .bind(email)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    pub async fn set_role(
        db: &PgPool,
        id: Uuid,
        role: Role,
    ) -> anyhow::Result<Option<UserAccount>> {
        let sql = format!(
            "UPDATE users SET role_id = $1, updated_at = now() WHERE id = $2 {USER_ACCOUNT_RETURNING}"
        );
        let row = sqlx::query_as::<_, UserAccount>(&sql)
            .bind(role.id())
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }
}

impl ScholarAccount {
    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<ScholarAccount>> {
        let rows = sqlx::query_as::<_, ScholarAccount>(
            r#"
            SELECT u.id, u.name, u.email, u.created_at,
                   sp.student_id, sp.course, sp.year_level, sp.designation,
                   sp.committed_day, sp.committed_time,
                   sp.required_stewardship_hours, sp.counterpart, sp.coordinator,
                   ar.name AS coordinator_placement
            FROM users u
            JOIN scholar_profiles sp ON sp.user_id = u.id
            JOIN admins_role ar ON ar.id = sp.placement_id
            WHERE u.role_id = $1
            ORDER BY u.created_at DESC
            "#,
        )
        .bind(Role::Scholar.id())
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// User row and scholar profile land in one transaction; any failure
    /// rolls both back so no orphan user row exists.
    pub async fn create(db: &PgPool, new: &NewScholar) -> anyhow::Result<ScholarAccount> {
        let mut tx = db.begin().await?;

        let user_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO users (name, email, password, role_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(Role::Scholar.id())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO scholar_profiles
                (user_id, student_id, course, year_level, designation,
                 committed_day, committed_time, required_stewardship_hours,
                 counterpart, coordinator, placement_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user_id)
        .bind(&new.student_id)
        .bind(&new.course)
        .bind(&new.year_level)
        .bind(&new.designation)
        .bind(&new.committed_day)
        .bind(&new.committed_time)
        .bind(new.required_stewardship_hours)
        .bind(new.counterpart)
        .bind(&new.coordinator)
        .bind(new.placement_id)
        .execute(&mut *tx)
        .await?;

        let account = sqlx::query_as::<_, ScholarAccount>(
            r#"
            SELECT u.id, u.name, u.email, u.created_at,
                   sp.student_id, sp.course, sp.year_level, sp.designation,
                   sp.committed_day, sp.committed_time,
                   sp.required_stewardship_hours, sp.counterpart, sp.coordinator,
                   ar.name AS coordinator_placement
            FROM users u
            JOIN scholar_profiles sp ON sp.user_id = u.id
            JOIN admins_role ar ON ar.id = sp.placement_id
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(account)
    }
}

impl AdminAccount {
    pub async fn list(db: &PgPool, role: Role) -> anyhow::Result<Vec<AdminAccount>> {
        let rows = sqlx::query_as::<_, AdminAccount>(
            r#"
            SELECT u.id, u.name, u.email, r.name AS role, u.created_at,
                   ar.name AS coordinator_placement
            FROM users u
            LEFT JOIN roles r ON u.role_id = r.id
            LEFT JOIN admin_profiles ap ON ap.user_id = u.id
            LEFT JOIN admins_role ar ON ar.id = ap.placement_id
            WHERE u.role_id = $1
            ORDER BY u.created_at DESC
            "#,
        )
        .bind(role.id())
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Same transactional shape as scholar creation: user row plus
    /// admin profile commit together or not at all.
    pub async fn create(db: &PgPool, new: &NewAdmin) -> anyhow::Result<UserAccount> {
        let mut tx = db.begin().await?;

        let user_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO users (name, email, password, role_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role.id())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO admin_profiles (user_id, placement_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(new.placement_id)
            .execute(&mut *tx)
            .await?;

        let account = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT u.id, u.name, u.email, r.name AS role, u.created_at
            FROM users u
            LEFT JOIN roles r ON u.role_id = r.id
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(account)
    }

    /// Two-statement update of the user row and the profile's placement;
    /// commits together or rolls back together. Returns false when the
    /// user row does not exist.
    pub async fn update(
        db: &PgPool,
        id: Uuid,
        name: &str,
        email: &str,
        placement_id: i32,
    ) -> anyhow::Result<bool> {
        let mut tx = db.begin().await?;

        let updated = sqlx::query(
            "UPDATE users SET name = $1, email = $2, updated_at = now() WHERE id = $3",
        )
        .bind(name)
        .bind(email)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE admin_profiles SET placement_id = $1 WHERE user_id = $2")
            .bind(placement_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}

impl Placement {
    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Placement>> {
        let rows = sqlx::query_as::<_, Placement>(
            r#"
            SELECT id AS placement_id, name AS coordinator_placement, description
            FROM admins_role
            ORDER BY name
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Resolve a placement display name to its id.
    pub async fn resolve(db: &PgPool, name: &str) -> anyhow::Result<Option<i32>> {
        let id = sqlx::query_scalar::<_, i32>("SELECT id FROM admins_role WHERE name = $1")
            .bind(name)
            .fetch_optional(db)
            .await?;
        Ok(id)
    }
}

pub async fn fetch_principal(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Principal>> {
    let row = sqlx::query_as::<_, (Uuid, String, String, i32)>(
        "SELECT id, name, email, role_id FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    match row {
        Some((id, name, email, role_id)) => {
            let role = Role::from_id(role_id)
                .ok_or_else(|| anyhow::anyhow!("unknown role id {role_id}"))?;
            Ok(Some(Principal {
                id,
                name,
                email,
                role,
            }))
        }
        None => Ok(None),
    }
}

/// Exact-match lookup used by login.
pub async fn find_credentials_by_email(
    db: &PgPool,
    email: &str,
) -> anyhow::Result<Option<CredentialRow>> {
    let row = sqlx::query_as::<_, CredentialRow>(
        "SELECT id, name, email, password, role_id FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Case-insensitive duplicate pre-check. The unique index on LOWER(email)
/// stays the authoritative guard against concurrent creations.
pub async fn email_taken(
    db: &PgPool,
    email: &str,
    exclude: Option<Uuid>,
) -> anyhow::Result<bool> {
    let taken = match exclude {
        Some(id) => {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND id != $2)",
            )
            .bind(email)
            .bind(id)
            .fetch_one(db)
            .await?
        }
        None => {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))",
            )
            .bind(email)
            .fetch_one(db)
            .await?
        }
    };
    Ok(taken)
}

pub async fn create_user(
    db: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> anyhow::Result<UserAccount> {
    let sql = format!(
        "INSERT INTO users (name, email, password, role_id) VALUES ($1, $2, $3, $4) {USER_ACCOUNT_RETURNING}"
    );
    let account = sqlx::query_as::<_, UserAccount>(&sql)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role.id())
        .fetch_one(db)
        .await?;
    Ok(account)
}

pub async fn get_password_hash(db: &PgPool, id: Uuid) -> anyhow::Result<Option<String>> {
    let hash = sqlx::query_scalar::<_, String>("SELECT password FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(hash)
}

pub async fn set_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE users SET password = $1, updated_at = now() WHERE id = $2")
        .bind(password_hash)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn delete_user(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

/// Store a fresh OTP pair, overwriting any prior one. Returns the matched
/// user's name, or None when no account has that email.
pub async fn set_otp(
    db: &PgPool,
    email: &str,
    otp: &str,
    expires_at: OffsetDateTime,
) -> anyhow::Result<Option<String>> {
    let name = sqlx::query_scalar::<_, String>(
        r#"
        UPDATE users
        SET otp_code = $1, otp_expires_at = $2, updated_at = now()
        WHERE LOWER(email) = $3
        RETURNING name
        "#,
    )
    .bind(otp)
    .bind(expires_at)
    .bind(email)
    .fetch_optional(db)
    .await?;
    Ok(name)
}

/// Single atomic statement: the email, OTP and expiry must all match at
/// once, and the OTP pair is cleared in the same write that stores the new
/// password hash. Returns the user's role id on success.
pub async fn reset_password_with_otp(
    db: &PgPool,
    email: &str,
    otp: &str,
    password_hash: &str,
) -> anyhow::Result<Option<i32>> {
    let role_id = sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE users
        SET password = $1, otp_code = NULL, otp_expires_at = NULL, updated_at = now()
        WHERE LOWER(email) = $2
          AND otp_code = $3
          AND otp_expires_at > now()
        RETURNING role_id
        "#,
    )
    .bind(password_hash)
    .bind(email)
    .bind(otp)
    .fetch_optional(db)
    .await?;
    Ok(role_id)
}

/// Account counts per role for the super-admin dashboard.
pub async fn count_by_role(db: &PgPool) -> anyhow::Result<(i64, i64, i64)> {
    let counts = sqlx::query_as::<_, (i64, i64, i64)>(
        r#"
        SELECT COUNT(*) FILTER (WHERE role_id = 1),
               COUNT(*) FILTER (WHERE role_id = 2),
               COUNT(*) FILTER (WHERE role_id = 3)
        FROM users
        "#,
    )
    .fetch_one(db)
    .await?;
    Ok(counts)
}
