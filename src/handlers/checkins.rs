use crate::audit::{self, AuditAction, AuditEntry};
use crate::errors::AppError;
use crate::extract::{Actor, ApiJson, ApiPath, ApiQuery};
use crate::models::checkin::{Checkin, CheckinQuery, CheckinWithGoals, CreateCheckin, UpdateCheckin};
use crate::models::goal::Track;
use crate::response::{ApiResponse, ApiResult, Created};
use crate::state::AppState;
use axum::extract::State;
use axum::Extension;
use serde_json::{json, Value};
use tracing::info;

pub async fn list_checkins(
    State(state): State<AppState>,
    Extension(track): Extension<Track>,
    ApiQuery(query): ApiQuery<CheckinQuery>,
) -> ApiResult<Vec<CheckinWithGoals>> {
    Ok(ApiResponse::success(Checkin::list(&state.db, track, &query).await?))
}

pub async fn get_checkin(
    State(state): State<AppState>,
    Extension(track): Extension<Track>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<CheckinWithGoals> {
    let checkin = Checkin::find_by_id(&state.db, track, id)
        .await?
        .ok_or_else(|| AppError::not_found("Check-in not found"))?;
    Ok(ApiResponse::success(checkin.with_goals(&state.db, track).await?))
}

pub async fn create_checkin(
    State(state): State<AppState>,
    Extension(track): Extension<Track>,
    actor: Actor,
    ApiJson(payload): ApiJson<CreateCheckin>,
) -> Created<Checkin> {
    let checkin = Checkin::create(&state.db, track, &payload).await?;
    info!("opened {track} check-in {} for {}", checkin.id, checkin.client_name);

    audit::record(
        &state.db,
        &actor,
        AuditEntry::new(AuditAction::Create, track.checkins_table(), checkin.id)
            .client(&checkin.client_name)
            .changes(&checkin),
    )
    .await;
    Ok(ApiResponse::created(checkin))
}

pub async fn update_checkin(
    State(state): State<AppState>,
    Extension(track): Extension<Track>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdateCheckin>,
) -> ApiResult<Checkin> {
    let checkin = Checkin::update(&state.db, track, id, &payload).await?;
    info!("updated {track} check-in {id} ({})", checkin.status);

    audit::record(
        &state.db,
        &actor,
        AuditEntry::new(AuditAction::Update, track.checkins_table(), id)
            .client(&checkin.client_name)
            .changes(json!({ "status": checkin.status, "notes": payload.notes })),
    )
    .await;
    Ok(ApiResponse::success(checkin))
}

pub async fn delete_checkin(
    State(state): State<AppState>,
    Extension(track): Extension<Track>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Value> {
    let checkin = Checkin::delete(&state.db, track, id).await?;
    info!("deleted {track} draft check-in {id}");

    audit::record(
        &state.db,
        &actor,
        AuditEntry::new(AuditAction::Delete, track.checkins_table(), id)
            .client(&checkin.client_name)
            .changes(&checkin),
    )
    .await;
    Ok(ApiResponse::with_message(json!({ "id": id }), "Check-in deleted"))
}
