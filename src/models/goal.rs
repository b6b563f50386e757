use crate::errors::AppError;
use crate::extract::non_empty;
use crate::models::checkin::Checkin;
use crate::models::{local_now, optional_day, required};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};

const MAX_GOAL_TEXT: usize = 500;
const MAX_PROGRESS_NOTE: usize = 1000;

/// Case-management and occupational-therapy records share one shape and
/// live in parallel tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Track {
    #[strum(serialize = "CM")]
    Cm,
    #[strum(serialize = "OT")]
    Ot,
}

impl Track {
    pub fn goals_table(self) -> &'static str {
        match self {
            Track::Cm => "goals",
            Track::Ot => "ot_goals",
        }
    }

    pub fn progress_table(self) -> &'static str {
        match self {
            Track::Cm => "goal_progress",
            Track::Ot => "ot_goal_progress",
        }
    }

    pub fn checkins_table(self) -> &'static str {
        match self {
            Track::Cm => "checkins",
            Track::Ot => "ot_checkins",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, EnumString, Display, Default)]
#[sqlx(type_name = "goal_status")]
pub enum GoalStatus {
    #[default]
    #[sqlx(rename = "Not Started")]
    #[serde(rename = "Not Started")]
    #[strum(serialize = "Not Started")]
    NotStarted,
    #[sqlx(rename = "In Progress")]
    #[serde(rename = "In Progress")]
    #[strum(serialize = "In Progress")]
    InProgress,
    Completed,
    Deferred,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Goal {
    pub id: i64,
    pub client_name: String,
    pub client_uuid: Option<String>,
    pub goal_text: String,
    pub status: GoalStatus,
    pub target_date: Option<NaiveDate>,
    pub priority: i64,
    pub checkin_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GoalWithProgress {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub goal: Goal,
    pub latest_progress_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GoalProgress {
    pub id: i64,
    pub goal_id: i64,
    pub progress_note: Option<String>,
    pub previous_status: GoalStatus,
    pub new_status: GoalStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateGoal {
    pub client_name: Option<String>,
    pub client_uuid: Option<String>,
    pub goal_text: Option<String>,
    pub priority: Option<i64>,
    pub target_date: Option<String>,
    pub checkin_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateGoal {
    pub status: Option<String>,
    pub progress_note: Option<String>,
    pub goal_text: Option<String>,
    pub priority: Option<i64>,
    pub target_date: Option<String>,
}

struct ValidGoal {
    client_name: String,
    goal_text: String,
    priority: i64,
    target_date: Option<NaiveDate>,
}

impl CreateGoal {
    fn validate(&self) -> Result<ValidGoal, AppError> {
        let client_name = required("client_name", &self.client_name)?;
        let goal_text = required("goal_text", &self.goal_text)?;
        check_goal_text(&goal_text)?;
        let priority = self.priority.unwrap_or(1);
        check_priority(priority)?;
        Ok(ValidGoal {
            client_name,
            goal_text,
            priority,
            target_date: optional_day("target_date", &self.target_date)?,
        })
    }
}

fn check_goal_text(text: &str) -> Result<(), AppError> {
    let length = text.chars().count();
    if length > MAX_GOAL_TEXT {
        return Err(AppError::invalid_field(
            "goal_text",
            length,
            format!("goal_text must be at most {MAX_GOAL_TEXT} characters"),
        ));
    }
    Ok(())
}

fn check_priority(priority: i64) -> Result<(), AppError> {
    if !(1..=5).contains(&priority) {
        return Err(AppError::invalid_field(
            "priority",
            priority,
            "Priority must be between 1 and 5",
        ));
    }
    Ok(())
}

fn parse_status(raw: &str) -> Result<GoalStatus, AppError> {
    raw.trim().parse().map_err(|_| {
        AppError::invalid_field(
            "status",
            raw,
            "Status must be one of: Not Started, In Progress, Completed, Deferred",
        )
    })
}

impl Goal {
    pub async fn find_by_id(pool: &SqlitePool, track: Track, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT * FROM {} WHERE id = ?1", track.goals_table());
        sqlx::query_as::<_, Goal>(&sql).bind(id).fetch_optional(pool).await
    }

    /// Goals of a client, most urgent first, each with its latest note.
    pub async fn find_by_client(
        pool: &SqlitePool,
        track: Track,
        client_name: &str,
    ) -> Result<Vec<GoalWithProgress>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT g.*,
                   (SELECT p.progress_note FROM {progress} p
                    WHERE p.goal_id = g.id AND p.progress_note IS NOT NULL
                    ORDER BY p.id DESC LIMIT 1) AS latest_progress_note
            FROM {goals} g
            WHERE g.client_name = ?1
            ORDER BY g.priority ASC, g.created_at DESC, g.id DESC
            "#,
            progress = track.progress_table(),
            goals = track.goals_table(),
        );
        sqlx::query_as::<_, GoalWithProgress>(&sql)
            .bind(client_name)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_checkin(
        pool: &SqlitePool,
        track: Track,
        checkin_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT * FROM {} WHERE checkin_id = ?1 ORDER BY priority ASC, id ASC",
            track.goals_table()
        );
        sqlx::query_as::<_, Goal>(&sql).bind(checkin_id).fetch_all(pool).await
    }

    pub async fn create(pool: &SqlitePool, track: Track, data: &CreateGoal) -> Result<Self, AppError> {
        let valid = data.validate()?;
        if let Some(checkin_id) = data.checkin_id {
            if Checkin::find_by_id(pool, track, checkin_id).await?.is_none() {
                return Err(AppError::invalid_field("checkin_id", checkin_id, "Check-in does not exist"));
            }
        }
        let sql = format!(
            "INSERT INTO {} (client_name, client_uuid, goal_text, status, target_date, priority, checkin_id, \
             created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8) RETURNING *",
            track.goals_table()
        );
        let goal = sqlx::query_as::<_, Goal>(&sql)
            .bind(&valid.client_name)
            .bind(non_empty(&data.client_uuid))
            .bind(&valid.goal_text)
            .bind(GoalStatus::NotStarted)
            .bind(valid.target_date)
            .bind(valid.priority)
            .bind(data.checkin_id)
            .bind(local_now())
            .fetch_one(pool)
            .await?;
        Ok(goal)
    }

    /// Applies an edit. A status change or a note appends a progress entry
    /// in the same transaction.
    pub async fn update(
        pool: &SqlitePool,
        track: Track,
        id: i64,
        data: &UpdateGoal,
    ) -> Result<Self, AppError> {
        let status = data.status.as_deref().map(parse_status).transpose()?;
        let note = non_empty(&data.progress_note);
        if let Some(note) = note {
            let length = note.chars().count();
            if length > MAX_PROGRESS_NOTE {
                return Err(AppError::invalid_field(
                    "progress_note",
                    length,
                    format!("progress_note must be at most {MAX_PROGRESS_NOTE} characters"),
                ));
            }
        }
        let goal_text = non_empty(&data.goal_text);
        if let Some(text) = goal_text {
            check_goal_text(text)?;
        }
        if let Some(priority) = data.priority {
            check_priority(priority)?;
        }
        let target_date = optional_day("target_date", &data.target_date)?;

        if status.is_none() && note.is_none() && goal_text.is_none() && data.priority.is_none() && target_date.is_none() {
            return Err(AppError::bad_request("No valid updates provided"));
        }

        let mut tx = pool.begin().await?;
        let select = format!("SELECT * FROM {} WHERE id = ?1", track.goals_table());
        let current = sqlx::query_as::<_, Goal>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Goal not found"))?;

        let new_status = status.unwrap_or(current.status);
        let now = local_now();
        let update = format!(
            "UPDATE {} SET status = ?1, goal_text = COALESCE(?2, goal_text), priority = COALESCE(?3, priority), \
             target_date = COALESCE(?4, target_date), updated_at = ?5 WHERE id = ?6 RETURNING *",
            track.goals_table()
        );
        let goal = sqlx::query_as::<_, Goal>(&update)
            .bind(new_status)
            .bind(goal_text)
            .bind(data.priority)
            .bind(target_date)
            .bind(now)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        if new_status != current.status || note.is_some() {
            let insert = format!(
                "INSERT INTO {} (goal_id, progress_note, previous_status, new_status, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                track.progress_table()
            );
            sqlx::query(&insert)
                .bind(id)
                .bind(note)
                .bind(current.status)
                .bind(new_status)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(goal)
    }

    pub async fn delete(pool: &SqlitePool, track: Track, id: i64) -> Result<u64, sqlx::Error> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", track.goals_table());
        Ok(sqlx::query(&sql).bind(id).execute(pool).await?.rows_affected())
    }

    pub async fn progress(pool: &SqlitePool, track: Track, id: i64) -> Result<Vec<GoalProgress>, sqlx::Error> {
        let sql = format!(
            "SELECT * FROM {} WHERE goal_id = ?1 ORDER BY created_at DESC, id DESC",
            track.progress_table()
        );
        sqlx::query_as::<_, GoalProgress>(&sql).bind(id).fetch_all(pool).await
    }
}
