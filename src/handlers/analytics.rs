use crate::extract::ApiQuery;
use crate::models::local_now;
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::stats::{overview_at, services_impact_at, ImpactQuery, Overview, ServicesImpact};
use axum::extract::State;

pub async fn services_impact(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ImpactQuery>,
) -> ApiResult<ServicesImpact> {
    let impact = services_impact_at(&state.db, &query, local_now()).await?;
    Ok(ApiResponse::success(impact))
}

pub async fn overview(State(state): State<AppState>) -> ApiResult<Overview> {
    let overview = overview_at(&state.db, local_now().date()).await?;
    Ok(ApiResponse::success(overview))
}
