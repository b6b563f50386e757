use crate::errors::AppError;
use crate::extract::non_empty;
use crate::models::{contains_pattern, local_now, next_day, optional_day, parse_day, required};
use crate::services::{Counts, ProvidedService, ServiceCategory, ServiceCounters};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, types::Json, Executor, FromRow, Row, Sqlite, SqlitePool};
use std::collections::BTreeSet;

/// One client visit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: i64,
    pub contact_date: NaiveDateTime,
    pub provider_name: String,
    pub client_name: String,
    pub category: String,
    pub services_requested: Vec<String>,
    pub services_provided: Vec<ProvidedService>,
    pub comments: String,
    pub food_accessed: bool,
    pub counters: ServiceCounters,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl FromRow<'_, SqliteRow> for Contact {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let Json(services_requested) = row.try_get("services_requested")?;
        let Json(services_provided) = row.try_get("services_provided")?;
        Ok(Self {
            id: row.try_get("id")?,
            contact_date: row.try_get("contact_date")?,
            provider_name: row.try_get("provider_name")?,
            client_name: row.try_get("client_name")?,
            category: row.try_get("category")?,
            services_requested,
            services_provided,
            comments: row.try_get("comments")?,
            food_accessed: row.try_get("food_accessed")?,
            counters: ServiceCounters::from_row(row)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewContact {
    pub contact_date: NaiveDateTime,
    pub provider_name: String,
    pub client_name: String,
    pub category: String,
    pub services_requested: Vec<String>,
    pub services_provided: Vec<ProvidedService>,
    pub comments: String,
    pub food_accessed: bool,
    pub counters: ServiceCounters,
}

impl NewContact {
    pub fn visit(
        contact_date: NaiveDateTime,
        client_name: &str,
        provider_name: &str,
        counters: ServiceCounters,
    ) -> Self {
        Self {
            contact_date,
            provider_name: provider_name.to_string(),
            client_name: client_name.to_string(),
            category: "Prospect".to_string(),
            services_requested: Vec::new(),
            services_provided: Vec::new(),
            comments: String::new(),
            food_accessed: false,
            counters,
        }
    }
}

pub async fn insert_contact<'e, E>(executor: E, contact: &NewContact) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let counter_columns: Vec<String> = ServiceCategory::ALL
        .iter()
        .flat_map(|category| [category.requested_column(), category.provided_column()])
        .collect();
    let placeholders = vec!["?"; 10 + counter_columns.len()].join(", ");
    let now = local_now();
    let sql = format!(
        "INSERT INTO contacts (contact_date, provider_name, client_name, category, services_requested, \
         services_provided, comments, food_accessed, created_at, updated_at, {}) VALUES ({placeholders})",
        counter_columns.join(", ")
    );

    let mut query = sqlx::query(&sql)
        .bind(contact.contact_date)
        .bind(&contact.provider_name)
        .bind(&contact.client_name)
        .bind(&contact.category)
        .bind(Json(&contact.services_requested))
        .bind(Json(&contact.services_provided))
        .bind(&contact.comments)
        .bind(contact.food_accessed)
        .bind(now)
        .bind(now);
    for category in ServiceCategory::ALL {
        let counts = contact.counters.get(category);
        query = query.bind(counts.requested).bind(counts.provided);
    }

    Ok(query.execute(executor).await?.last_insert_rowid())
}

/// Contact-log filters. Blank values are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactQuery {
    pub client: Option<String>,
    pub provider: Option<String>,
    pub category: Option<String>,
    pub service: Option<String>,
    pub service_filter: Option<String>,
    pub date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct ContactPage {
    pub contacts: Vec<Contact>,
    pub pagination: Pagination,
}

/// WHERE clause assembled from fixed fragments; user input only ever
/// reaches the statement through `binds`.
#[derive(Debug, Default)]
struct ContactFilter {
    clauses: Vec<String>,
    binds: Vec<String>,
}

impl ContactFilter {
    fn from_query(query: &ContactQuery) -> Result<Self, AppError> {
        let mut filter = Self::default();

        if let Some(client) = non_empty(&query.client) {
            filter.push("LOWER(client_name) LIKE ? ESCAPE '\\'", contains_pattern(client));
        }
        if let Some(provider) = non_empty(&query.provider) {
            filter.push("LOWER(provider_name) LIKE ? ESCAPE '\\'", contains_pattern(provider));
        }
        if let Some(category) = non_empty(&query.category) {
            filter.push("category = ?", category);
        }

        let service = non_empty(&query.service).or(non_empty(&query.service_filter));
        if let Some(service) = service.filter(|service| !service.eq_ignore_ascii_case("all")) {
            let category = ServiceCategory::from_label(service)
                .ok_or_else(|| AppError::invalid_field("service", service, "Unknown service category"))?;
            filter.clauses.push(format!(
                "({} > 0 OR {} > 0)",
                category.requested_column(),
                category.provided_column()
            ));
        }

        let (start, end, end_field) = match optional_day("date", &query.date)? {
            Some(day) => (Some(day), Some(day), "date"),
            None => (
                optional_day("startDate", &query.start_date)?,
                optional_day("endDate", &query.end_date)?,
                "endDate",
            ),
        };
        if let Some(start) = start {
            filter.push("contact_date >= ?", start.format("%Y-%m-%d 00:00:00").to_string());
        }
        if let Some(end) = end {
            let next = next_day(end_field, end)?;
            filter.push("contact_date < ?", next.format("%Y-%m-%d 00:00:00").to_string());
        }

        Ok(filter)
    }

    fn push(&mut self, clause: &str, value: impl Into<String>) {
        self.clauses.push(clause.to_string());
        self.binds.push(value.into());
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinSubmission {
    pub client_name: Option<String>,
    pub provider_name: Option<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub accessed_food: bool,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicesUpdate {
    pub contact_id: Option<i64>,
    #[serde(default)]
    pub services_provided: Vec<ProvidedService>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ServicesUpdateResult {
    pub contact: Contact,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ServiceOption {
    pub key: &'static str,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct FilterOptions {
    pub providers: Vec<String>,
    pub categories: Vec<String>,
    pub services: Vec<ServiceOption>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateChange {
    #[serde(default)]
    pub contact_ids: Vec<i64>,
    pub new_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovedContact {
    pub id: i64,
    pub client_name: String,
    pub previous_date: NaiveDateTime,
    pub new_date: NaiveDateTime,
    pub days_ago: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateChangeResult {
    pub updated_contacts: Vec<MovedContact>,
    pub new_date: NaiveDate,
    pub days_ago: i64,
}

impl Contact {
    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = ?1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_client(
        pool: &SqlitePool,
        client_name: &str,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Contact>(
            "SELECT * FROM contacts WHERE client_name = ?1 ORDER BY contact_date DESC, id DESC LIMIT ?2",
        )
        .bind(client_name)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn search(pool: &SqlitePool, query: &ContactQuery) -> Result<ContactPage, AppError> {
        let filter = ContactFilter::from_query(query)?;
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| AppError::invalid_field("page", page, "Page is out of range"))?;
        let where_sql = filter.where_sql();

        let count_sql = format!("SELECT COUNT(*) FROM contacts{where_sql}");
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
        for value in &filter.binds {
            count = count.bind(value);
        }
        let total = count.fetch_one(pool).await?;

        let list_sql =
            format!("SELECT * FROM contacts{where_sql} ORDER BY contact_date DESC, id DESC LIMIT ? OFFSET ?");
        let mut list = sqlx::query_as::<_, Contact>(&list_sql);
        for value in &filter.binds {
            list = list.bind(value);
        }
        let contacts = list.bind(limit).bind(offset).fetch_all(pool).await?;

        Ok(ContactPage {
            contacts,
            pagination: Pagination {
                page,
                limit,
                total,
                total_pages: (total + limit - 1) / limit,
            },
        })
    }

    /// Records today's visit for a client. A client gets one visit per day;
    /// unknown clients are registered as prospects.
    pub async fn submit_checkin(
        pool: &SqlitePool,
        submission: &CheckinSubmission,
        now: NaiveDateTime,
    ) -> Result<Self, AppError> {
        let client_name = required("clientName", &submission.client_name)?;
        let provider_name = required("providerName", &submission.provider_name)?;

        let day_start = now.date().format("%Y-%m-%d 00:00:00").to_string();
        let day_end = next_day("contactDate", now.date())?.format("%Y-%m-%d 00:00:00").to_string();

        let mut tx = pool.begin().await?;

        let already: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM contacts WHERE client_name = ?1 AND contact_date >= ?2 AND contact_date < ?3",
        )
        .bind(&client_name)
        .bind(&day_start)
        .bind(&day_end)
        .fetch_one(&mut *tx)
        .await?;
        if already > 0 {
            return Err(AppError::conflict(format!("{client_name} has already checked in today")));
        }

        let category: Option<String> = sqlx::query_scalar("SELECT category FROM clients WHERE name = ?1")
            .bind(&client_name)
            .fetch_optional(&mut *tx)
            .await?;
        let category = match category {
            Some(category) => category,
            None => {
                sqlx::query(
                    "INSERT INTO clients (name, category, created_at, updated_at) VALUES (?1, 'Prospect', ?2, ?2)",
                )
                .bind(&client_name)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                "Prospect".to_string()
            }
        };

        let mut services_provided = Vec::new();
        let mut counters = ServiceCounters::from_lists(&submission.objectives, &[]);
        if submission.accessed_food && counters.get(ServiceCategory::Food).requested > 0 {
            counters.entry(ServiceCategory::Food).provided = 1;
            services_provided.push(ProvidedService {
                service: ServiceCategory::Food.to_string(),
                provider: Some(provider_name.clone()),
                completed_at: Some(now.format("%Y-%m-%d %H:%M:%S").to_string()),
            });
        }

        let contact = NewContact {
            contact_date: now,
            provider_name,
            client_name,
            category,
            services_requested: submission.objectives.clone(),
            services_provided,
            comments: submission.comments.clone().unwrap_or_default(),
            food_accessed: submission.accessed_food,
            counters,
        };
        let id = insert_contact(&mut *tx, &contact).await?;
        tx.commit().await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::internal(sqlx::Error::RowNotFound))
    }

    /// Replaces the provided-services list and recomputes the counters from
    /// the requested and provided lists.
    pub async fn update_services(
        pool: &SqlitePool,
        update: &ServicesUpdate,
    ) -> Result<ServicesUpdateResult, AppError> {
        let id = update
            .contact_id
            .ok_or_else(|| AppError::bad_request("contactId is required"))?;
        required("updatedBy", &update.updated_by)?;

        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::not_found("Contact not found"))?;

        let before = service_names(&existing.services_provided);
        let after = service_names(&update.services_provided);
        let added = after.difference(&before).cloned().collect();
        let removed = before.difference(&after).cloned().collect();

        let counters = ServiceCounters::from_lists(&existing.services_requested, &update.services_provided);
        let food_accessed = counters.get(ServiceCategory::Food).provided > 0;

        let assignments = ServiceCategory::ALL
            .iter()
            .flat_map(|category| [category.requested_column(), category.provided_column()])
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE contacts SET services_provided = ?, food_accessed = ?, {assignments}, \
             updated_at = ? WHERE id = ?"
        );
        let mut query = sqlx::query(&sql)
            .bind(Json(&update.services_provided))
            .bind(food_accessed);
        for category in ServiceCategory::ALL {
            let Counts { requested, provided } = counters.get(category);
            query = query.bind(requested).bind(provided);
        }
        query.bind(local_now()).bind(id).execute(pool).await?;

        let contact = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::not_found("Contact not found"))?;
        Ok(ServicesUpdateResult { contact, added, removed })
    }

    /// Moves contacts to another day, keeping each one's time of day. Unknown
    /// ids are skipped; a move that would give a client two visits on one
    /// day fails the whole batch.
    pub async fn change_date(
        pool: &SqlitePool,
        change: &DateChange,
        today: NaiveDate,
    ) -> Result<DateChangeResult, AppError> {
        if change.contact_ids.is_empty() {
            return Err(AppError::bad_request("contactIds must be a non-empty list"));
        }
        let new_date = parse_day("newDate", &required("newDate", &change.new_date)?)?;
        if new_date > today {
            return Err(AppError::invalid_field(
                "newDate",
                new_date.to_string(),
                "Cannot set a contact date in the future",
            ));
        }
        let day_start = new_date.format("%Y-%m-%d 00:00:00").to_string();
        let day_end = next_day("newDate", new_date)?.format("%Y-%m-%d 00:00:00").to_string();
        let days_ago = (today - new_date).num_days();
        let ids: BTreeSet<i64> = change.contact_ids.iter().copied().collect();

        let now = local_now();
        let mut tx = pool.begin().await?;
        let mut updated_contacts = Vec::new();
        for id in ids {
            let Some(contact) = sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
            else {
                continue;
            };

            let clash: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM contacts \
                 WHERE client_name = ?1 AND contact_date >= ?2 AND contact_date < ?3 AND id <> ?4",
            )
            .bind(&contact.client_name)
            .bind(&day_start)
            .bind(&day_end)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            if clash > 0 {
                return Err(AppError::conflict(format!(
                    "{} already has a contact on {new_date}",
                    contact.client_name
                )));
            }

            let moved_to = new_date.and_time(contact.contact_date.time());
            sqlx::query("UPDATE contacts SET contact_date = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(moved_to)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;

            updated_contacts.push(MovedContact {
                id,
                client_name: contact.client_name,
                previous_date: contact.contact_date,
                new_date: moved_to,
                days_ago,
            });
        }
        tx.commit().await?;

        Ok(DateChangeResult {
            updated_contacts,
            new_date,
            days_ago,
        })
    }

    pub async fn filter_options(pool: &SqlitePool) -> Result<FilterOptions, sqlx::Error> {
        let providers = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT provider_name FROM contacts WHERE provider_name <> '' ORDER BY provider_name",
        )
        .fetch_all(pool)
        .await?;
        let categories = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM contacts WHERE category <> '' ORDER BY category",
        )
        .fetch_all(pool)
        .await?;
        let services = ServiceCategory::ALL
            .into_iter()
            .map(|category| ServiceOption {
                key: category.key(),
                label: category.to_string(),
            })
            .collect();

        Ok(FilterOptions {
            providers,
            categories,
            services,
        })
    }
}

fn service_names(services: &[ProvidedService]) -> BTreeSet<String> {
    services.iter().map(|service| service.service.clone()).collect()
}
