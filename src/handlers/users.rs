use crate::audit::{self, AuditAction, AuditEntry};
use crate::errors::AppError;
use crate::extract::{Actor, ApiJson, ApiPath};
use crate::models::user::{CreateUser, UpdateUser, User, UserView};
use crate::response::{ApiResponse, ApiResult, Created};
use crate::roles::{role_definitions, RoleDefinition};
use crate::state::AppState;
use axum::extract::State;
use serde_json::json;
use tracing::info;

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<UserView>> {
    let users = User::find_all(&state.db).await?;
    Ok(ApiResponse::success(users.into_iter().map(UserView::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<CreateUser>,
) -> Created<UserView> {
    let user = User::create(&state.db, &payload).await?;
    info!("created user {} ({})", user.id, user.email);

    audit::record(
        &state.db,
        &actor,
        AuditEntry::new(AuditAction::Create, "users", user.id).changes(&user),
    )
    .await;
    Ok(ApiResponse::created(UserView::from(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdateUser>,
) -> ApiResult<UserView> {
    let before = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let user = User::update(&state.db, id, &payload).await?;
    info!("updated user {id}");

    audit::record(
        &state.db,
        &actor,
        AuditEntry::new(AuditAction::Update, "users", id).changes(json!({ "before": before, "after": user })),
    )
    .await;
    Ok(ApiResponse::success(UserView::from(user)))
}

pub async fn list_roles() -> ApiResult<Vec<RoleDefinition>> {
    Ok(ApiResponse::success(role_definitions()))
}
