use crate::errors::AppError;
use crate::extract::{non_empty, ApiPath, ApiQuery};
use crate::models::client::{Client, ClientRecord, ClientSummary};
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;
use axum::extract::State;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ClientSearch {
    pub search: Option<String>,
}

pub async fn list_clients(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ClientSearch>,
) -> ApiResult<Vec<ClientSummary>> {
    let clients = Client::search(&state.db, non_empty(&query.search)).await?;
    Ok(ApiResponse::success(clients))
}

pub async fn client_record(
    State(state): State<AppState>,
    ApiPath(name): ApiPath<String>,
) -> ApiResult<ClientRecord> {
    let record = Client::record(&state.db, name.trim())
        .await?
        .ok_or_else(|| AppError::not_found("Client not found"))?;
    Ok(ApiResponse::success(record))
}
