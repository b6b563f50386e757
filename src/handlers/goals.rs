use crate::audit::{self, AuditAction, AuditEntry};
use crate::errors::AppError;
use crate::extract::{non_empty, Actor, ApiJson, ApiPath, ApiQuery};
use crate::models::goal::{CreateGoal, Goal, GoalProgress, GoalWithProgress, Track, UpdateGoal};
use crate::response::{ApiResponse, ApiResult, Created};
use crate::state::AppState;
use axum::extract::State;
use axum::Extension;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct GoalQuery {
    pub client: Option<String>,
}

pub async fn list_goals(
    State(state): State<AppState>,
    Extension(track): Extension<Track>,
    ApiQuery(query): ApiQuery<GoalQuery>,
) -> ApiResult<Vec<GoalWithProgress>> {
    let client = non_empty(&query.client).ok_or_else(|| AppError::bad_request("client is required"))?;
    let goals = Goal::find_by_client(&state.db, track, client).await?;
    Ok(ApiResponse::success(goals))
}

pub async fn get_goal(
    State(state): State<AppState>,
    Extension(track): Extension<Track>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Goal> {
    let goal = Goal::find_by_id(&state.db, track, id)
        .await?
        .ok_or_else(|| AppError::not_found("Goal not found"))?;
    Ok(ApiResponse::success(goal))
}

pub async fn create_goal(
    State(state): State<AppState>,
    Extension(track): Extension<Track>,
    actor: Actor,
    ApiJson(payload): ApiJson<CreateGoal>,
) -> Created<Goal> {
    let goal = Goal::create(&state.db, track, &payload).await?;
    info!("created {track} goal {} for {}", goal.id, goal.client_name);

    audit::record(
        &state.db,
        &actor,
        AuditEntry::new(AuditAction::Create, track.goals_table(), goal.id)
            .client(&goal.client_name)
            .changes(&goal),
    )
    .await;
    Ok(ApiResponse::created(goal))
}

pub async fn update_goal(
    State(state): State<AppState>,
    Extension(track): Extension<Track>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdateGoal>,
) -> ApiResult<Goal> {
    let goal = Goal::update(&state.db, track, id, &payload).await?;
    info!("updated {track} goal {id} ({})", goal.status);

    audit::record(
        &state.db,
        &actor,
        AuditEntry::new(AuditAction::Update, track.goals_table(), id)
            .client(&goal.client_name)
            .changes(json!({
                "status": payload.status,
                "progress_note": payload.progress_note,
                "goal_text": payload.goal_text,
                "priority": payload.priority,
                "target_date": payload.target_date,
            })),
    )
    .await;
    Ok(ApiResponse::success(goal))
}

pub async fn delete_goal(
    State(state): State<AppState>,
    Extension(track): Extension<Track>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Value> {
    let goal = Goal::find_by_id(&state.db, track, id)
        .await?
        .ok_or_else(|| AppError::not_found("Goal not found"))?;
    Goal::delete(&state.db, track, id).await?;
    info!("deleted {track} goal {id}");

    audit::record(
        &state.db,
        &actor,
        AuditEntry::new(AuditAction::Delete, track.goals_table(), id)
            .client(&goal.client_name)
            .changes(&goal),
    )
    .await;
    Ok(ApiResponse::with_message(json!({ "id": id }), "Goal deleted"))
}

pub async fn goal_progress(
    State(state): State<AppState>,
    Extension(track): Extension<Track>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Vec<GoalProgress>> {
    if Goal::find_by_id(&state.db, track, id).await?.is_none() {
        return Err(AppError::not_found("Goal not found"));
    }
    Ok(ApiResponse::success(Goal::progress(&state.db, track, id).await?))
}
