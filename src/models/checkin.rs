use crate::errors::AppError;
use crate::extract::non_empty;
use crate::models::contact::Contact;
use crate::models::goal::{Goal, Track};
use crate::models::{local_now, required};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, EnumString, Display, Default)]
#[sqlx(type_name = "checkin_status")]
pub enum CheckinStatus {
    #[default]
    Draft,
    Completed,
}

impl CheckinStatus {
    /// `Draft -> Draft` (save draft) and `Draft -> Completed` are the only
    /// moves; a completed check-in is final.
    pub fn transition(self, next: CheckinStatus) -> Result<CheckinStatus, AppError> {
        match (self, next) {
            (CheckinStatus::Draft, _) => Ok(next),
            (CheckinStatus::Completed, _) => {
                Err(AppError::bad_request("Completed check-ins cannot be modified"))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Checkin {
    pub id: i64,
    pub contact_id: Option<i64>,
    pub client_name: String,
    pub client_uuid: Option<String>,
    pub provider_name: String,
    pub notes: Option<String>,
    pub checkin_type: Option<String>,
    pub service_type: Option<String>,
    pub status: CheckinStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckinWithGoals {
    #[serde(flatten)]
    pub checkin: Checkin,
    pub goals: Vec<Goal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateCheckin {
    pub contact_id: Option<i64>,
    pub client_name: Option<String>,
    pub client_uuid: Option<String>,
    pub provider_name: Option<String>,
    pub notes: Option<String>,
    pub checkin_type: Option<String>,
    pub service_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCheckin {
    pub notes: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckinQuery {
    pub contact_id: Option<i64>,
    pub client: Option<String>,
}

impl Checkin {
    pub async fn find_by_id(pool: &SqlitePool, track: Track, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT * FROM {} WHERE id = ?1", track.checkins_table());
        sqlx::query_as::<_, Checkin>(&sql).bind(id).fetch_optional(pool).await
    }

    pub async fn with_goals(self, pool: &SqlitePool, track: Track) -> Result<CheckinWithGoals, sqlx::Error> {
        let goals = Goal::find_by_checkin(pool, track, self.id).await?;
        Ok(CheckinWithGoals { checkin: self, goals })
    }

    pub async fn list(
        pool: &SqlitePool,
        track: Track,
        query: &CheckinQuery,
    ) -> Result<Vec<CheckinWithGoals>, sqlx::Error> {
        let sql = format!(
            "SELECT * FROM {} WHERE (?1 IS NULL OR contact_id = ?1) AND (?2 IS NULL OR client_name = ?2) \
             ORDER BY created_at DESC, id DESC",
            track.checkins_table()
        );
        let checkins = sqlx::query_as::<_, Checkin>(&sql)
            .bind(query.contact_id)
            .bind(non_empty(&query.client))
            .fetch_all(pool)
            .await?;

        let mut result = Vec::with_capacity(checkins.len());
        for checkin in checkins {
            result.push(checkin.with_goals(pool, track).await?);
        }
        Ok(result)
    }

    /// Opens a draft; the check-in dialog does this as soon as it is shown.
    pub async fn create(pool: &SqlitePool, track: Track, data: &CreateCheckin) -> Result<Self, AppError> {
        let client_name = required("client_name", &data.client_name)?;
        let provider_name = required("provider_name", &data.provider_name)?;
        if let Some(contact_id) = data.contact_id {
            if Contact::find_by_id(pool, contact_id).await?.is_none() {
                return Err(AppError::invalid_field("contact_id", contact_id, "Contact does not exist"));
            }
        }

        let sql = format!(
            "INSERT INTO {} (contact_id, client_name, client_uuid, provider_name, notes, checkin_type, service_type, \
             status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9) RETURNING *",
            track.checkins_table()
        );
        let checkin = sqlx::query_as::<_, Checkin>(&sql)
            .bind(data.contact_id)
            .bind(&client_name)
            .bind(non_empty(&data.client_uuid))
            .bind(&provider_name)
            .bind(non_empty(&data.notes))
            .bind(non_empty(&data.checkin_type))
            .bind(non_empty(&data.service_type))
            .bind(CheckinStatus::Draft)
            .bind(local_now())
            .fetch_one(pool)
            .await?;
        Ok(checkin)
    }

    pub async fn update(
        pool: &SqlitePool,
        track: Track,
        id: i64,
        data: &UpdateCheckin,
    ) -> Result<Self, AppError> {
        let requested = non_empty(&data.status)
            .map(|raw| {
                raw.parse::<CheckinStatus>().map_err(|_| {
                    AppError::invalid_field("status", raw, "Status must be one of: Draft, Completed")
                })
            })
            .transpose()?;
        if requested.is_none() && data.notes.is_none() {
            return Err(AppError::bad_request("No valid updates provided"));
        }

        let mut tx = pool.begin().await?;

        let select = format!("SELECT * FROM {} WHERE id = ?1", track.checkins_table());
        let current = sqlx::query_as::<_, Checkin>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Check-in not found"))?;
        let status = current.status.transition(requested.unwrap_or(current.status))?;

        let checkin = write_draft(&mut *tx, track, id, data.notes.as_deref(), status)
            .await?
            .ok_or_else(|| AppError::bad_request("Completed check-ins cannot be modified"))?;

        tx.commit().await?;
        Ok(checkin)
    }

    /// Discards a draft together with the goals attached to it.
    pub async fn delete(pool: &SqlitePool, track: Track, id: i64) -> Result<Self, AppError> {
        let mut tx = pool.begin().await?;

        let select = format!("SELECT * FROM {} WHERE id = ?1", track.checkins_table());
        let checkin = sqlx::query_as::<_, Checkin>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Check-in not found"))?;
        if checkin.status != CheckinStatus::Draft {
            return Err(AppError::bad_request("Only draft check-ins can be deleted"));
        }

        let goals = format!("DELETE FROM {} WHERE checkin_id = ?1", track.goals_table());
        sqlx::query(&goals).bind(id).execute(&mut *tx).await?;
        let delete = format!("DELETE FROM {} WHERE id = ?1 AND status = ?2", track.checkins_table());
        let deleted = sqlx::query(&delete)
            .bind(id)
            .bind(CheckinStatus::Draft)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::bad_request("Only draft check-ins can be deleted"));
        }

        tx.commit().await?;
        Ok(checkin)
    }
}

/// Updates the row only while it is still a draft; `None` once it has been
/// completed.
async fn write_draft<'e, E>(
    executor: E,
    track: Track,
    id: i64,
    notes: Option<&str>,
    status: CheckinStatus,
) -> Result<Option<Checkin>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "UPDATE {} SET notes = COALESCE(?1, notes), status = ?2, updated_at = ?3 \
         WHERE id = ?4 AND status = ?5 RETURNING *",
        track.checkins_table()
    );
    sqlx::query_as::<_, Checkin>(&sql)
        .bind(notes)
        .bind(status)
        .bind(local_now())
        .bind(id)
        .bind(CheckinStatus::Draft)
        .fetch_optional(executor)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::goal::CreateGoal;
    use crate::db::test_pool;

    fn draft(client: &str) -> CreateCheckin {
        CreateCheckin {
            client_name: Some(client.to_string()),
            provider_name: Some("Dana".to_string()),
            ..CreateCheckin::default()
        }
    }

    #[test]
    fn completed_is_terminal() {
        assert_eq!(
            CheckinStatus::Draft.transition(CheckinStatus::Completed).unwrap(),
            CheckinStatus::Completed
        );
        assert_eq!(CheckinStatus::Draft.transition(CheckinStatus::Draft).unwrap(), CheckinStatus::Draft);
        assert!(CheckinStatus::Completed.transition(CheckinStatus::Draft).is_err());
        assert!(CheckinStatus::Completed.transition(CheckinStatus::Completed).is_err());
    }

    #[tokio::test]
    async fn lifecycle_draft_to_completed() {
        let pool = test_pool().await;
        let checkin = Checkin::create(&pool, Track::Cm, &draft("Alex")).await.unwrap();
        assert_eq!(checkin.status, CheckinStatus::Draft);

        let saved = Checkin::update(
            &pool,
            Track::Cm,
            checkin.id,
            &UpdateCheckin {
                notes: Some("Talked about housing".to_string()),
                status: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(saved.status, CheckinStatus::Draft);

        let done = Checkin::update(
            &pool,
            Track::Cm,
            checkin.id,
            &UpdateCheckin {
                notes: None,
                status: Some("Completed".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(done.status, CheckinStatus::Completed);
        assert_eq!(done.notes.as_deref(), Some("Talked about housing"));

        let reopen = Checkin::update(
            &pool,
            Track::Cm,
            checkin.id,
            &UpdateCheckin {
                notes: None,
                status: Some("Draft".to_string()),
            },
        )
        .await;
        assert_eq!(reopen.unwrap_err().code, "VALIDATION_ERROR");

        let delete = Checkin::delete(&pool, Track::Cm, checkin.id).await;
        assert_eq!(delete.unwrap_err().message, "Only draft check-ins can be deleted");
    }

    #[tokio::test]
    async fn deleting_a_draft_removes_its_goals() {
        let pool = test_pool().await;
        let checkin = Checkin::create(&pool, Track::Ot, &draft("Alex")).await.unwrap();
        let goal = Goal::create(
            &pool,
            Track::Ot,
            &CreateGoal {
                client_name: Some("Alex".to_string()),
                goal_text: Some("Budget weekly groceries".to_string()),
                checkin_id: Some(checkin.id),
                ..CreateGoal::default()
            },
        )
        .await
        .unwrap();

        let listed = Checkin::list(
            &pool,
            Track::Ot,
            &CheckinQuery {
                client: Some("Alex".to_string()),
                contact_id: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].goals.len(), 1);

        Checkin::delete(&pool, Track::Ot, checkin.id).await.unwrap();
        assert!(Checkin::find_by_id(&pool, Track::Ot, checkin.id).await.unwrap().is_none());
        assert!(Goal::find_by_id(&pool, Track::Ot, goal.id).await.unwrap().is_none());
        assert!(Checkin::list(&pool, Track::Cm, &CheckinQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn completed_row_is_never_rewritten() {
        let pool = test_pool().await;
        let checkin = Checkin::create(&pool, Track::Cm, &draft("Alex")).await.unwrap();
        Checkin::update(
            &pool,
            Track::Cm,
            checkin.id,
            &UpdateCheckin {
                notes: Some("final".to_string()),
                status: Some("Completed".to_string()),
            },
        )
        .await
        .unwrap();

        // A write that read the row while it was still a draft.
        let stale = write_draft(&pool, Track::Cm, checkin.id, Some("late edit"), CheckinStatus::Draft)
            .await
            .unwrap();
        assert!(stale.is_none());

        let stored = Checkin::find_by_id(&pool, Track::Cm, checkin.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CheckinStatus::Completed);
        assert_eq!(stored.notes.as_deref(), Some("final"));
    }

    #[tokio::test]
    async fn unknown_contact_is_rejected() {
        let pool = test_pool().await;
        let mut data = draft("Alex");
        data.contact_id = Some(999);

        let err = Checkin::create(&pool, Track::Cm, &data).await.unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Contact does not exist");
    }

    #[tokio::test]
    async fn updates_need_a_field() {
        let pool = test_pool().await;
        let checkin = Checkin::create(&pool, Track::Cm, &draft("Alex")).await.unwrap();
        let err = Checkin::update(&pool, Track::Cm, checkin.id, &UpdateCheckin::default()).await;
        assert_eq!(err.unwrap_err().message, "No valid updates provided");

        let missing = Checkin::create(&pool, Track::Cm, &CreateCheckin::default()).await;
        assert_eq!(missing.unwrap_err().message, "client_name is required");
    }
}
