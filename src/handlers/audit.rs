use crate::audit::{list, AuditLog, AuditQuery};
use crate::extract::ApiQuery;
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;
use axum::extract::State;

pub async fn list_logs(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AuditQuery>,
) -> ApiResult<Vec<AuditLog>> {
    Ok(ApiResponse::success(list(&state.db, &query).await?))
}
