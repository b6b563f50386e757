use crate::errors::AppError;
use crate::extract::non_empty;
use crate::models::{local_now, parse_day, required};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, SqliteConnection, SqlitePool, Type};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub intersection: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notes: Option<String>,
    pub safety_concerns: Option<String>,
    pub is_active: bool,
    pub visit_count: i64,
    pub last_visited: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocationInput {
    pub name: Option<String>,
    pub intersection: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notes: Option<String>,
    pub safety_concerns: Option<String>,
    pub is_active: Option<bool>,
}

impl LocationInput {
    fn check_coordinates(&self) -> Result<(), AppError> {
        if let Some(latitude) = self.latitude.filter(|lat| !(-90.0..=90.0).contains(lat)) {
            return Err(AppError::invalid_field("latitude", latitude, "latitude must be between -90 and 90"));
        }
        if let Some(longitude) = self.longitude.filter(|lng| !(-180.0..=180.0).contains(lng)) {
            return Err(AppError::invalid_field(
                "longitude",
                longitude,
                "longitude must be between -180 and 180",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    #[serde(default)]
    pub all: bool,
}

impl Location {
    pub async fn find_all(pool: &SqlitePool, include_inactive: bool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Location>(
            "SELECT * FROM outreach_locations WHERE ?1 OR is_active = 1 ORDER BY visit_count DESC, name ASC",
        )
        .bind(include_inactive)
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, data: &LocationInput) -> Result<Self, AppError> {
        let name = required("name", &data.name)?;
        data.check_coordinates()?;
        let location = sqlx::query_as::<_, Location>(
            r#"
            INSERT INTO outreach_locations (name, intersection, address, latitude, longitude, notes, safety_concerns,
                                            created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(non_empty(&data.intersection))
        .bind(non_empty(&data.address))
        .bind(data.latitude)
        .bind(data.longitude)
        .bind(non_empty(&data.notes))
        .bind(non_empty(&data.safety_concerns))
        .bind(local_now())
        .fetch_one(pool)
        .await?;
        Ok(location)
    }

    /// `is_active` alone toggles the location; otherwise supplied details
    /// replace the stored ones.
    pub async fn update(pool: &SqlitePool, id: i64, data: &LocationInput) -> Result<Self, AppError> {
        let query = if let Some(active) = data.is_active {
            sqlx::query_as::<_, Location>(
                "UPDATE outreach_locations SET is_active = ?1, updated_at = ?2 WHERE id = ?3 RETURNING *",
            )
            .bind(active)
            .bind(local_now())
            .bind(id)
        } else {
            data.check_coordinates()?;
            sqlx::query_as::<_, Location>(
                r#"
                UPDATE outreach_locations
                SET name = COALESCE(?1, name),
                    intersection = COALESCE(?2, intersection),
                    address = COALESCE(?3, address),
                    latitude = COALESCE(?4, latitude),
                    longitude = COALESCE(?5, longitude),
                    notes = COALESCE(?6, notes),
                    safety_concerns = COALESCE(?7, safety_concerns),
                    updated_at = ?8
                WHERE id = ?9
                RETURNING *
                "#,
            )
            .bind(non_empty(&data.name))
            .bind(non_empty(&data.intersection))
            .bind(non_empty(&data.address))
            .bind(data.latitude)
            .bind(data.longitude)
            .bind(non_empty(&data.notes))
            .bind(non_empty(&data.safety_concerns))
            .bind(local_now())
            .bind(id)
        };

        query
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::not_found("Location not found"))
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
        Ok(sqlx::query("DELETE FROM outreach_locations WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?
            .rows_affected())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, EnumString, Display, Default)]
#[sqlx(type_name = "run_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Run {
    pub id: i64,
    pub run_date: NaiveDate,
    pub run_time: Option<String>,
    pub lead_staff: String,
    pub team_members: Json<Vec<String>>,
    pub planned_locations: Json<Vec<i64>>,
    pub actual_locations: Json<Vec<i64>>,
    pub safety_notes: Option<String>,
    pub status: RunStatus,
    pub total_contacts: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Run {
    /// Locations credited with a visit when the run completes.
    pub fn visited_locations(&self) -> &[i64] {
        if self.actual_locations.0.is_empty() {
            &self.planned_locations.0
        } else {
            &self.actual_locations.0
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RunInput {
    pub run_date: Option<String>,
    pub run_time: Option<String>,
    pub lead_staff: Option<String>,
    pub team_members: Option<Vec<String>>,
    pub planned_locations: Option<Vec<i64>>,
    pub actual_locations: Option<Vec<i64>>,
    pub safety_notes: Option<String>,
    pub status: Option<String>,
}

impl RunInput {
    fn run_time(&self) -> Result<Option<&str>, AppError> {
        match non_empty(&self.run_time) {
            Some(raw) if NaiveTime::parse_from_str(raw, "%H:%M").is_err() => {
                Err(AppError::invalid_field("run_time", raw, "run_time must be in HH:MM format"))
            }
            other => Ok(other),
        }
    }

    fn status(&self) -> Result<Option<RunStatus>, AppError> {
        non_empty(&self.status)
            .map(|raw| {
                raw.parse::<RunStatus>().map_err(|_| {
                    AppError::invalid_field(
                        "status",
                        raw,
                        "status must be one of: scheduled, in_progress, completed, cancelled",
                    )
                })
            })
            .transpose()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RunQuery {
    pub status: Option<String>,
}

impl Run {
    pub async fn find_all(pool: &SqlitePool, status: Option<&str>) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Run>(
            "SELECT * FROM outreach_runs WHERE ?1 IS NULL OR status = ?1 \
             ORDER BY run_date DESC, run_time DESC, id DESC",
        )
        .bind(status)
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, data: &RunInput) -> Result<Self, AppError> {
        let lead_staff = required("lead_staff", &data.lead_staff)?;
        let run_date = parse_day("run_date", &required("run_date", &data.run_date)?)?;
        let run_time = data.run_time()?;

        let run = sqlx::query_as::<_, Run>(
            r#"
            INSERT INTO outreach_runs (run_date, run_time, lead_staff, team_members, planned_locations, safety_notes, status,
                                       created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            RETURNING *
            "#,
        )
        .bind(run_date)
        .bind(run_time)
        .bind(lead_staff)
        .bind(Json(data.team_members.clone().unwrap_or_default()))
        .bind(Json(data.planned_locations.clone().unwrap_or_default()))
        .bind(non_empty(&data.safety_notes))
        .bind(RunStatus::Scheduled)
        .bind(local_now())
        .fetch_one(pool)
        .await?;
        Ok(run)
    }

    /// Partial update. Moving a run to `completed` credits a visit to each
    /// location it covered.
    pub async fn update(pool: &SqlitePool, id: i64, data: &RunInput, today: NaiveDate) -> Result<Self, AppError> {
        let status = data.status()?;
        let run_time = data.run_time()?;
        let run_date = non_empty(&data.run_date)
            .map(|raw| parse_day("run_date", raw))
            .transpose()?;

        let now = local_now();
        let mut tx = pool.begin().await?;
        let current = sqlx::query_as::<_, Run>("SELECT * FROM outreach_runs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Run not found"))?;

        let run = sqlx::query_as::<_, Run>(
            r#"
            UPDATE outreach_runs
            SET run_date = COALESCE(?1, run_date),
                run_time = COALESCE(?2, run_time),
                lead_staff = COALESCE(?3, lead_staff),
                team_members = COALESCE(?4, team_members),
                planned_locations = COALESCE(?5, planned_locations),
                actual_locations = COALESCE(?6, actual_locations),
                safety_notes = COALESCE(?7, safety_notes),
                status = COALESCE(?8, status),
                updated_at = ?9
            WHERE id = ?10
            RETURNING *
            "#,
        )
        .bind(run_date)
        .bind(run_time)
        .bind(non_empty(&data.lead_staff))
        .bind(data.team_members.as_ref().map(Json))
        .bind(data.planned_locations.as_ref().map(Json))
        .bind(data.actual_locations.as_ref().map(Json))
        .bind(non_empty(&data.safety_notes))
        .bind(status)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if run.status == RunStatus::Completed && current.status != RunStatus::Completed {
            for location_id in run.visited_locations() {
                sqlx::query(
                    "UPDATE outreach_locations SET visit_count = visit_count + 1, last_visited = ?1, \
                     updated_at = ?2 WHERE id = ?3",
                )
                .bind(today)
                .bind(now)
                .bind(location_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(run)
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
        Ok(sqlx::query("DELETE FROM outreach_runs WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?
            .rows_affected())
    }
}

/// A street encounter logged during an outreach run.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FieldContact {
    pub id: i64,
    pub run_id: Option<i64>,
    pub client_id: Option<i64>,
    pub location_id: Option<i64>,
    pub contact_date: NaiveDate,
    pub contact_time: NaiveTime,
    pub staff_member: String,
    pub services_provided: Json<Vec<String>>,
    pub supplies_given: Json<BTreeMap<String, i64>>,
    pub narcan_administered: bool,
    pub medical_concerns: Option<String>,
    pub housing_status: Option<String>,
    pub follow_up_needed: bool,
    pub follow_up_notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub client_name: String,
    pub location_name: Option<String>,
    pub run_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FieldContactInput {
    pub run_id: Option<i64>,
    pub client_id: Option<i64>,
    pub location_id: Option<i64>,
    pub staff_member: Option<String>,
    #[serde(default)]
    pub services_provided: Vec<String>,
    #[serde(default)]
    pub supplies_given: BTreeMap<String, i64>,
    #[serde(default)]
    pub narcan_administered: bool,
    pub medical_concerns: Option<String>,
    pub housing_status: Option<String>,
    #[serde(default)]
    pub follow_up_needed: bool,
    pub follow_up_notes: Option<String>,
    #[serde(default)]
    pub is_new_client: bool,
    pub new_client_first_name: Option<String>,
    pub new_client_last_name: Option<String>,
}

impl FieldContactInput {
    fn new_client_name(&self) -> Result<String, AppError> {
        let name = [&self.new_client_first_name, &self.new_client_last_name]
            .into_iter()
            .filter_map(non_empty)
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            return Err(AppError::bad_request("New client needs a first or last name"));
        }
        Ok(name)
    }

    fn services(&self) -> Vec<String> {
        self.services_provided
            .iter()
            .map(|service| service.trim())
            .filter(|service| !service.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn supplies(&self) -> Result<BTreeMap<String, i64>, AppError> {
        let mut supplies = BTreeMap::new();
        for (item, &quantity) in &self.supplies_given {
            if quantity < 0 {
                return Err(AppError::invalid_field(
                    "supplies_given",
                    quantity,
                    format!("Quantity for {item} cannot be negative"),
                ));
            }
            if quantity > 0 {
                supplies.insert(item.trim().to_string(), quantity);
            }
        }
        Ok(supplies)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FieldContactQuery {
    pub date: Option<String>,
    pub run_id: Option<i64>,
}

const FIELD_CONTACT_SELECT: &str = r#"
    SELECT oc.*,
           COALESCE(c.name, 'Unknown Client') AS client_name,
           l.name AS location_name,
           r.run_date AS run_date
    FROM outreach_contacts oc
    LEFT JOIN clients c ON c.id = oc.client_id
    LEFT JOIN outreach_locations l ON l.id = oc.location_id
    LEFT JOIN outreach_runs r ON r.id = oc.run_id
"#;

async fn row_exists(conn: &mut SqliteConnection, table: &str, id: i64) -> Result<bool, sqlx::Error> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)");
    sqlx::query_scalar::<_, bool>(&sql).bind(id).fetch_one(conn).await
}

impl FieldContact {
    pub async fn find_all(pool: &SqlitePool, query: &FieldContactQuery) -> Result<Vec<Self>, AppError> {
        let date = non_empty(&query.date)
            .map(|raw| parse_day("date", raw))
            .transpose()?;
        let sql = format!(
            "{FIELD_CONTACT_SELECT} WHERE (?1 IS NULL OR oc.contact_date = ?1) AND (?2 IS NULL OR oc.run_id = ?2) \
             ORDER BY oc.contact_date DESC, oc.contact_time DESC, oc.id DESC"
        );
        let contacts = sqlx::query_as::<_, FieldContact>(&sql)
            .bind(date)
            .bind(query.run_id)
            .fetch_all(pool)
            .await?;
        Ok(contacts)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("{FIELD_CONTACT_SELECT} WHERE oc.id = ?1");
        sqlx::query_as::<_, FieldContact>(&sql).bind(id).fetch_optional(pool).await
    }

    /// Logs an encounter at `now`. A new client is registered inline as a
    /// prospect, and the run's contact tally goes up by one.
    pub async fn create(pool: &SqlitePool, data: &FieldContactInput, now: NaiveDateTime) -> Result<Self, AppError> {
        let staff_member = required("staff_member", &data.staff_member)?;
        let supplies = data.supplies()?;
        let new_client = data.is_new_client.then(|| data.new_client_name()).transpose()?;

        let mut tx = pool.begin().await?;

        if let Some(run_id) = data.run_id {
            if !row_exists(&mut tx, "outreach_runs", run_id).await? {
                return Err(AppError::invalid_field("run_id", run_id, "Run does not exist"));
            }
        }
        if let Some(location_id) = data.location_id {
            if !row_exists(&mut tx, "outreach_locations", location_id).await? {
                return Err(AppError::invalid_field("location_id", location_id, "Location does not exist"));
            }
        }

        let client_id = match new_client {
            Some(name) => {
                let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM clients WHERE name = ?1")
                    .bind(&name)
                    .fetch_optional(&mut *tx)
                    .await?;
                match existing {
                    Some(id) => Some(id),
                    None => Some(
                        sqlx::query_scalar::<_, i64>(
                            "INSERT INTO clients (name, category, created_at, updated_at) \
                             VALUES (?1, 'Prospect', ?2, ?2) RETURNING id",
                        )
                        .bind(&name)
                        .bind(now)
                        .fetch_one(&mut *tx)
                        .await?,
                    ),
                }
            }
            None => {
                if let Some(client_id) = data.client_id {
                    if !row_exists(&mut tx, "clients", client_id).await? {
                        return Err(AppError::invalid_field("client_id", client_id, "Client does not exist"));
                    }
                }
                data.client_id
            }
        };

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO outreach_contacts (run_id, client_id, location_id, contact_date, contact_time, staff_member,
                                           services_provided, supplies_given, narcan_administered, medical_concerns,
                                           housing_status, follow_up_needed, follow_up_notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            RETURNING id
            "#,
        )
        .bind(data.run_id)
        .bind(client_id)
        .bind(data.location_id)
        .bind(now.date())
        .bind(now.time())
        .bind(staff_member)
        .bind(Json(data.services()))
        .bind(Json(supplies))
        .bind(data.narcan_administered)
        .bind(non_empty(&data.medical_concerns))
        .bind(non_empty(&data.housing_status))
        .bind(data.follow_up_needed)
        .bind(non_empty(&data.follow_up_notes))
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(run_id) = data.run_id {
            sqlx::query("UPDATE outreach_runs SET total_contacts = total_contacts + 1, updated_at = ?1 WHERE id = ?2")
                .bind(now)
                .bind(run_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::internal(sqlx::Error::RowNotFound))
    }

    /// Everyone who has led a run or logged a field contact.
    pub async fn staff(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT staff_member FROM outreach_contacts UNION SELECT lead_staff FROM outreach_runs ORDER BY 1",
        )
        .fetch_all(pool)
        .await
    }
}
