use crate::models::contact::Contact;
use crate::models::contains_pattern;
use crate::services::{sum_columns, ServiceCounters};
use crate::stats::{build_services, ServiceImpact};
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

const HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub contact_count: i64,
    pub last_visit: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RecordCounts {
    pub contacts: i64,
    pub cm_goals: i64,
    pub ot_goals: i64,
    pub cm_checkins: i64,
    pub ot_checkins: i64,
}

/// Everything the client master record shows on first load.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub client: Client,
    pub counts: RecordCounts,
    pub service_summary: Vec<ServiceImpact>,
    pub contact_history: Vec<Contact>,
}

impl Client {
    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE name = ?1")
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    pub async fn search(pool: &SqlitePool, search: Option<&str>) -> Result<Vec<ClientSummary>, sqlx::Error> {
        sqlx::query_as::<_, ClientSummary>(
            r#"
            SELECT c.id, c.name, c.category,
                   COUNT(k.id) AS contact_count,
                   MAX(k.contact_date) AS last_visit
            FROM clients c
            LEFT JOIN contacts k ON k.client_name = c.name
            WHERE ?1 IS NULL OR LOWER(c.name) LIKE ?1 ESCAPE '\'
            GROUP BY c.id
            ORDER BY c.name
            "#,
        )
        .bind(search.map(contains_pattern))
        .fetch_all(pool)
        .await
    }

    pub async fn record(pool: &SqlitePool, name: &str) -> Result<Option<ClientRecord>, sqlx::Error> {
        let Some(client) = Self::find_by_name(pool, name).await? else {
            return Ok(None);
        };

        let counts = sqlx::query_as::<_, RecordCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM contacts WHERE client_name = ?1) AS contacts,
                (SELECT COUNT(*) FROM goals WHERE client_name = ?1) AS cm_goals,
                (SELECT COUNT(*) FROM ot_goals WHERE client_name = ?1) AS ot_goals,
                (SELECT COUNT(*) FROM checkins WHERE client_name = ?1) AS cm_checkins,
                (SELECT COUNT(*) FROM ot_checkins WHERE client_name = ?1) AS ot_checkins
            "#,
        )
        .bind(&client.name)
        .fetch_one(pool)
        .await?;

        let sql = format!("SELECT {} FROM contacts WHERE client_name = ?1", sum_columns());
        let row = sqlx::query(&sql).bind(&client.name).fetch_one(pool).await?;
        let service_summary = build_services(&ServiceCounters::from_row(&row)?);

        let contact_history = Contact::find_by_client(pool, &client.name, HISTORY_LIMIT).await?;

        Ok(Some(ClientRecord {
            client,
            counts,
            service_summary,
            contact_history,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::models::contact::{insert_contact, NewContact};
    use crate::services::{Counts, ServiceCategory};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn record_composes_counts_and_services() {
        let pool = test_pool().await;
        sqlx::query("INSERT INTO clients (name) VALUES ('Alex Rivera'), ('Bea Moss')")
            .execute(&pool)
            .await
            .unwrap();

        let at = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap().and_hms_opt(9, 30, 0).unwrap();
        let mut counters = ServiceCounters::default();
        counters.add(ServiceCategory::Housing, Counts { requested: 1, provided: 1 });
        insert_contact(&pool, &NewContact::visit(at, "Alex Rivera", "Dana", counters))
            .await
            .unwrap();
        sqlx::query("INSERT INTO goals (client_name, goal_text) VALUES ('Alex Rivera', 'Get ID')")
            .execute(&pool)
            .await
            .unwrap();

        let record = Client::record(&pool, "Alex Rivera").await.unwrap().unwrap();
        assert_eq!(record.counts.contacts, 1);
        assert_eq!(record.counts.cm_goals, 1);
        assert_eq!(record.counts.ot_goals, 0);
        assert_eq!(record.service_summary.len(), 1);
        assert_eq!(record.service_summary[0].name, "Housing");
        assert_eq!(record.service_summary[0].completion_rate, 100.0);
        assert_eq!(record.contact_history.len(), 1);

        assert!(Client::record(&pool, "Nobody").await.unwrap().is_none());

        let found = Client::search(&pool, Some("riv")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].contact_count, 1);
        assert_eq!(found[0].last_visit, Some(at));
        assert_eq!(Client::search(&pool, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let pool = test_pool().await;
        sqlx::query("INSERT INTO clients (name) VALUES ('Alex Rivera'), ('Jo_Ann Lee'), ('100% Sure')")
            .execute(&pool)
            .await
            .unwrap();

        let underscore = Client::search(&pool, Some("_")).await.unwrap();
        assert_eq!(underscore.len(), 1);
        assert_eq!(underscore[0].name, "Jo_Ann Lee");

        let percent = Client::search(&pool, Some("%")).await.unwrap();
        assert_eq!(percent.len(), 1);
        assert_eq!(percent[0].name, "100% Sure");
    }
}
