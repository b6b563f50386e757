use crate::audit::{self, AuditAction, AuditEntry};
use crate::errors::AppError;
use crate::extract::{Actor, ApiJson, ApiPath};
use crate::models::inventory::{Adjustment, AdjustInput, Alert, AlertUpdate, InventoryItem, ItemInput};
use crate::models::local_now;
use crate::response::{ApiResponse, ApiResult, Created};
use crate::state::AppState;
use axum::extract::State;
use serde_json::json;
use tracing::info;

const TABLE: &str = "inventory";

pub async fn list_items(State(state): State<AppState>) -> ApiResult<Vec<InventoryItem>> {
    Ok(ApiResponse::success(InventoryItem::find_active(&state.db).await?))
}

pub async fn get_item(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<InventoryItem> {
    let item = InventoryItem::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Item not found"))?;
    Ok(ApiResponse::success(item))
}

pub async fn create_item(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<ItemInput>,
) -> Created<InventoryItem> {
    let item = InventoryItem::create(&state.db, &payload, local_now().date()).await?;
    info!("created inventory item {} ({})", item.id, item.item_name);

    audit::record(&state.db, &actor, AuditEntry::new(AuditAction::Create, TABLE, item.id).changes(&item)).await;
    Ok(ApiResponse::created(item))
}

pub async fn update_item(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<ItemInput>,
) -> ApiResult<InventoryItem> {
    let item = InventoryItem::update(&state.db, id, &payload).await?;
    info!("updated inventory item {id}");

    audit::record(&state.db, &actor, AuditEntry::new(AuditAction::Update, TABLE, id).changes(&item)).await;
    Ok(ApiResponse::success(item))
}

pub async fn deactivate_item(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<InventoryItem> {
    let item = InventoryItem::deactivate(&state.db, id).await?;
    info!("deactivated inventory item {id}");

    audit::record(&state.db, &actor, AuditEntry::new(AuditAction::Delete, TABLE, id)).await;
    Ok(ApiResponse::with_message(item, "Item deactivated"))
}

pub async fn adjust_stock(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<AdjustInput>,
) -> ApiResult<InventoryItem> {
    let item = InventoryItem::adjust(&state.db, id, &payload, local_now().date()).await?;
    info!(
        "adjusted inventory item {id}: {} {} -> {}",
        payload.adjustment_type, payload.quantity, item.current_stock
    );

    audit::record(
        &state.db,
        &actor,
        AuditEntry::new(AuditAction::Update, TABLE, id).changes(json!({
            "adjustment_type": payload.adjustment_type,
            "quantity": payload.quantity,
            "new_stock": item.current_stock,
        })),
    )
    .await;
    Ok(ApiResponse::success(item))
}

pub async fn list_adjustments(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Vec<Adjustment>> {
    if InventoryItem::find_by_id(&state.db, id).await?.is_none() {
        return Err(AppError::not_found("Item not found"));
    }
    Ok(ApiResponse::success(InventoryItem::adjustments(&state.db, id).await?))
}

pub async fn list_alerts(State(state): State<AppState>) -> ApiResult<Vec<Alert>> {
    Ok(ApiResponse::success(Alert::find_all(&state.db).await?))
}

pub async fn update_alert(
    State(state): State<AppState>,
    actor: Actor,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<AlertUpdate>,
) -> ApiResult<Alert> {
    let alert = Alert::set_resolved(&state.db, id, payload.is_resolved).await?;
    info!("alert {id} resolved={}", alert.is_resolved);

    audit::record(
        &state.db,
        &actor,
        AuditEntry::new(AuditAction::Update, "inventory_alerts", id)
            .changes(json!({ "is_resolved": payload.is_resolved })),
    )
    .await;
    Ok(ApiResponse::success(alert))
}
