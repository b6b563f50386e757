use crate::errors::AppError;
use crate::models::local_now;
use crate::roles::{permission_summary, role_for, Permissions, RoleTemplate, PERMISSION_COLUMNS};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub active: bool,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub permissions: Permissions,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A user as listed on the management page, with its derived role.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    pub role: RoleTemplate,
    pub permission_summary: Vec<&'static str>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            role: role_for(&user.permissions),
            permission_summary: permission_summary(&user.permissions),
            user,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    #[serde(default)]
    pub email: String,
    #[serde(flatten)]
    pub permissions: Permissions,
}

impl CreateUser {
    pub fn validate(&self) -> Result<String, AppError> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::bad_request("Valid email is required"));
        }
        if !self.permissions.any() {
            return Err(AppError::bad_request("At least one permission must be enabled"));
        }
        Ok(email.to_lowercase())
    }
}

/// Partial update: `active` and any known permission flag. Other keys are
/// ignored.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUser {
    pub active: Option<bool>,
    #[serde(flatten)]
    pub flags: HashMap<String, Value>,
}

impl UpdateUser {
    fn assignments(&self) -> Vec<(&'static str, bool)> {
        let mut assignments: Vec<(&'static str, bool)> = PERMISSION_COLUMNS
            .into_iter()
            .filter_map(|column| {
                self.flags
                    .get(column)
                    .and_then(Value::as_bool)
                    .map(|enabled| (column, enabled))
            })
            .collect();
        if let Some(active) = self.active {
            assignments.push(("active", active));
        }
        assignments
    }
}

impl User {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC, id DESC")
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(pool: &SqlitePool, data: &CreateUser) -> Result<Self, AppError> {
        let email = data.validate()?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?1")
            .bind(&email)
            .fetch_optional(pool)
            .await?;
        if exists.is_some() {
            return Err(AppError::conflict("User with this email already exists"));
        }

        let sql = format!(
            "INSERT INTO users (email, active, created_at, updated_at, {}) VALUES (?, 1, ?, ?, {}) RETURNING *",
            PERMISSION_COLUMNS.join(", "),
            vec!["?"; PERMISSION_COLUMNS.len()].join(", ")
        );
        let now = local_now();
        let mut query = sqlx::query_as::<_, User>(&sql).bind(&email).bind(now).bind(now);
        for flag in data.permissions.flags() {
            query = query.bind(flag);
        }
        Ok(query.fetch_one(pool).await?)
    }

    pub async fn update(pool: &SqlitePool, id: i64, data: &UpdateUser) -> Result<Self, AppError> {
        let assignments = data.assignments();
        if assignments.is_empty() {
            return Err(AppError::bad_request("No valid updates provided"));
        }

        let set = assignments
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE users SET {set}, updated_at = ? WHERE id = ? RETURNING *");
        let mut query = sqlx::query_as::<_, User>(&sql);
        for (_, value) in &assignments {
            query = query.bind(*value);
        }

        query
            .bind(local_now())
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }
}
