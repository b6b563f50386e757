use crate::extract::Actor;
use crate::models::local_now;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use strum_macros::{AsRefStr, Display};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

/// One change to record; `changes` holds the request payload or a diff.
#[derive(Debug, Clone)]
pub struct AuditEntry<'a> {
    pub action: AuditAction,
    pub table: &'a str,
    pub record_id: Option<i64>,
    pub client_name: Option<&'a str>,
    pub changes: Option<Value>,
}

impl<'a> AuditEntry<'a> {
    pub fn new(action: AuditAction, table: &'a str, record_id: i64) -> Self {
        Self {
            action,
            table,
            record_id: Some(record_id),
            client_name: None,
            changes: None,
        }
    }

    pub fn client(mut self, client_name: &'a str) -> Self {
        self.client_name = Some(client_name);
        self
    }

    pub fn changes(mut self, changes: impl Serialize) -> Self {
        self.changes = serde_json::to_value(changes).ok();
        self
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: i64,
    pub user_email: String,
    pub action: String,
    pub table_name: String,
    pub record_id: Option<String>,
    pub client_name: Option<String>,
    pub ip_address: Option<String>,
    pub changes: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub table: Option<String>,
    pub action: Option<String>,
    pub limit: Option<i64>,
}

/// Writes an audit row. A failed write is logged and otherwise ignored so
/// the change it describes still goes through.
pub async fn record(pool: &SqlitePool, actor: &Actor, entry: AuditEntry<'_>) {
    let changes = entry.changes.as_ref().map(Value::to_string);
    let result = sqlx::query(
        r#"
        INSERT INTO audit_logs (user_email, action, table_name, record_id, client_name, ip_address, changes, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&actor.email)
    .bind(entry.action.as_ref())
    .bind(entry.table)
    .bind(entry.record_id.map(|id| id.to_string()))
    .bind(entry.client_name)
    .bind(actor.ip.as_deref())
    .bind(changes)
    .bind(local_now())
    .execute(pool)
    .await;

    if let Err(err) = result {
        warn!(
            "failed to write audit log for {} {} {:?}: {err}",
            entry.action, entry.table, entry.record_id
        );
    }
}

pub async fn list(pool: &SqlitePool, query: &AuditQuery) -> Result<Vec<AuditLog>, sqlx::Error> {
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    sqlx::query_as::<_, AuditLog>(
        r#"
        SELECT id, user_email, action, table_name, record_id, client_name, ip_address, changes, created_at
        FROM audit_logs
        WHERE (?1 IS NULL OR table_name = ?1)
          AND (?2 IS NULL OR action = UPPER(?2))
        ORDER BY id DESC
        LIMIT ?3
        "#,
    )
    .bind(crate::extract::non_empty(&query.table))
    .bind(crate::extract::non_empty(&query.action))
    .bind(limit)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use serde_json::json;

    #[tokio::test]
    async fn records_and_filters_entries() {
        let pool = test_pool().await;
        let actor = Actor {
            email: "lead@outreach.org".to_string(),
            ip: Some("10.1.1.1".to_string()),
        };

        record(
            &pool,
            &actor,
            AuditEntry::new(AuditAction::Create, "goals", 7)
                .client("Alex Rivera")
                .changes(json!({ "goal_text": "Find housing" })),
        )
        .await;
        record(&pool, &Actor::system(), AuditEntry::new(AuditAction::Delete, "inventory", 3)).await;

        let all = list(&pool, &AuditQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].action, "DELETE");
        assert_eq!(all[0].user_email, "system");

        let goals = list(
            &pool,
            &AuditQuery {
                table: Some("goals".to_string()),
                action: Some("create".to_string()),
                limit: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].record_id.as_deref(), Some("7"));
        assert_eq!(goals[0].client_name.as_deref(), Some("Alex Rivera"));
        assert_eq!(goals[0].ip_address.as_deref(), Some("10.1.1.1"));
        assert!(goals[0].changes.as_deref().unwrap().contains("Find housing"));
    }
}
