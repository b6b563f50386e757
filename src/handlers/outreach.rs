use crate::audit::{self, AuditAction, AuditEntry};
use crate::errors::AppError;
use crate::extract::{non_empty, Actor, ApiJson, ApiPath, ApiQuery};
use crate::models::local_now;
use crate::models::outreach::{
    FieldContact, FieldContactInput, FieldContactQuery, Location, LocationInput, LocationQuery, Run, RunInput,
    RunQuery,
};
use crate::response::{ApiResponse, ApiResult, Created};
use crate::state::AppState;
use axum::extract::State;
use serde_json::{json, Value};
use tracing::info;

pub async fn list_locations(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LocationQuery>,
) -> ApiResult<Vec<Location>> {
    Ok(ApiResponse::success(Location::find_all(&state.db, query.all).await?))
}

pub async fn create_location(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<LocationInput>,
) -> Created<Location> {
    let location = Location::create(&state.db, &payload).await?;
    info!("created outreach location {} ({})", location.id, location.name);

    audit::record(
        &state.db,
        &actor,
        AuditEntry::new(AuditAction::Create, "outreach_locations", location.id).changes(&location),
    )
    .await;
    Ok(ApiResponse::created(location))
}

pub async fn update_location(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<LocationInput>,
) -> ApiResult<Location> {
    let location = Location::update(&state.db, id, &payload).await?;
    info!("updated outreach location {id}");

    audit::record(
        &state.db,
        &actor,
        AuditEntry::new(AuditAction::Update, "outreach_locations", id).changes(&location),
    )
    .await;
    Ok(ApiResponse::success(location))
}

pub async fn delete_location(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Value> {
    if Location::delete(&state.db, id).await? == 0 {
        return Err(AppError::not_found("Location not found"));
    }
    info!("deleted outreach location {id}");

    audit::record(&state.db, &actor, AuditEntry::new(AuditAction::Delete, "outreach_locations", id)).await;
    Ok(ApiResponse::with_message(json!({ "id": id }), "Location deleted"))
}

pub async fn list_runs(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RunQuery>,
) -> ApiResult<Vec<Run>> {
    Ok(ApiResponse::success(Run::find_all(&state.db, non_empty(&query.status)).await?))
}

pub async fn create_run(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<RunInput>,
) -> Created<Run> {
    let run = Run::create(&state.db, &payload).await?;
    info!("scheduled outreach run {} on {}", run.id, run.run_date);

    audit::record(&state.db, &actor, AuditEntry::new(AuditAction::Create, "outreach_runs", run.id).changes(&run)).await;
    Ok(ApiResponse::created(run))
}

pub async fn update_run(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<RunInput>,
) -> ApiResult<Run> {
    let run = Run::update(&state.db, id, &payload, local_now().date()).await?;
    info!("updated outreach run {id} ({})", run.status);

    audit::record(&state.db, &actor, AuditEntry::new(AuditAction::Update, "outreach_runs", id).changes(&run)).await;
    Ok(ApiResponse::success(run))
}

pub async fn delete_run(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Value> {
    if Run::delete(&state.db, id).await? == 0 {
        return Err(AppError::not_found("Run not found"));
    }
    info!("deleted outreach run {id}");

    audit::record(&state.db, &actor, AuditEntry::new(AuditAction::Delete, "outreach_runs", id)).await;
    Ok(ApiResponse::with_message(json!({ "id": id }), "Run deleted"))
}

pub async fn list_field_contacts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<FieldContactQuery>,
) -> ApiResult<Vec<FieldContact>> {
    Ok(ApiResponse::success(FieldContact::find_all(&state.db, &query).await?))
}

pub async fn todays_field_contacts(State(state): State<AppState>) -> ApiResult<Vec<FieldContact>> {
    let query = FieldContactQuery {
        date: Some(local_now().date().to_string()),
        ..FieldContactQuery::default()
    };
    Ok(ApiResponse::success(FieldContact::find_all(&state.db, &query).await?))
}

pub async fn create_field_contact(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<FieldContactInput>,
) -> Created<FieldContact> {
    let contact = FieldContact::create(&state.db, &payload, local_now()).await?;
    info!(
        "logged outreach contact {} with {} by {}",
        contact.id, contact.client_name, contact.staff_member
    );

    audit::record(
        &state.db,
        &actor,
        AuditEntry::new(AuditAction::Create, "outreach_contacts", contact.id)
            .client(&contact.client_name)
            .changes(&contact),
    )
    .await;
    Ok(ApiResponse::created(contact))
}

pub async fn list_staff(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    Ok(ApiResponse::success(FieldContact::staff(&state.db).await?))
}
