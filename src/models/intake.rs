use crate::errors::AppError;
use crate::models::client::Client;
use crate::models::local_now;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{types::Json, FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct IntakeForm {
    pub id: i64,
    pub client_id: i64,
    pub form_data: Json<Map<String, Value>>,
    pub section_completion: Json<Map<String, Value>>,
    pub completion_percentage: i64,
    pub is_completed: bool,
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeSubmission {
    pub client_id: Option<i64>,
    #[serde(default)]
    pub form_data: Map<String, Value>,
    #[serde(default)]
    pub section_completion: Map<String, Value>,
    #[serde(default)]
    pub overall_completion: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeQuery {
    pub client_id: Option<i64>,
}

impl IntakeSubmission {
    /// Checks the few fields with a fixed format; everything else in the
    /// form is free text.
    pub fn validate(&self, current_year: i32) -> Result<i64, AppError> {
        let client_id = self
            .client_id
            .ok_or_else(|| AppError::bad_request("Client ID is required"))?;

        if !(0..=100).contains(&self.overall_completion) {
            return Err(AppError::invalid_field(
                "overallCompletion",
                self.overall_completion,
                "overallCompletion must be between 0 and 100",
            ));
        }

        if let Some(email) = self.form_data.get("email").and_then(Value::as_str) {
            let email = email.trim();
            if !email.is_empty() && !email.contains('@') {
                return Err(AppError::invalid_field("email", email, "Valid email is required"));
            }
        }

        if let Some(raw) = self.form_data.get("birthYear").filter(|value| !is_blank(value)) {
            let year = match raw {
                Value::Number(number) => number.as_i64(),
                Value::String(text) => text.trim().parse::<i64>().ok(),
                _ => None,
            };
            match year {
                Some(year) if (1900..=i64::from(current_year)).contains(&year) => {}
                _ => {
                    return Err(AppError::invalid_field(
                        "birthYear",
                        raw.clone(),
                        format!("birthYear must be between 1900 and {current_year}"),
                    ));
                }
            }
        }

        Ok(client_id)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

impl IntakeForm {
    pub async fn find_by_client(pool: &SqlitePool, client_id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, IntakeForm>("SELECT * FROM intake_forms WHERE client_id = ?1")
            .bind(client_id)
            .fetch_optional(pool)
            .await
    }

    /// One form per client; saving again overwrites it.
    pub async fn save(pool: &SqlitePool, data: &IntakeSubmission, current_year: i32) -> Result<Self, AppError> {
        let client_id = data.validate(current_year)?;
        if Client::find_by_id(pool, client_id).await?.is_none() {
            return Err(AppError::not_found("Client not found"));
        }

        let completed = data.overall_completion == 100;
        let form = sqlx::query_as::<_, IntakeForm>(
            r#"
            INSERT INTO intake_forms (client_id, form_data, section_completion, completion_percentage, is_completed,
                                      completed_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, CASE WHEN ?5 THEN ?6 ELSE NULL END, ?6, ?6)
            ON CONFLICT(client_id) DO UPDATE SET
                form_data = excluded.form_data,
                section_completion = excluded.section_completion,
                completion_percentage = excluded.completion_percentage,
                is_completed = excluded.is_completed,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(client_id)
        .bind(Json(&data.form_data))
        .bind(Json(&data.section_completion))
        .bind(data.overall_completion)
        .bind(completed)
        .bind(local_now())
        .fetch_one(pool)
        .await?;
        Ok(form)
    }
}
