use crate::audit::{self, AuditAction, AuditEntry};
use crate::errors::AppError;
use crate::extract::{Actor, ApiJson, ApiQuery};
use crate::models::intake::{IntakeForm, IntakeQuery, IntakeSubmission};
use crate::models::local_now;
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;
use axum::extract::State;
use chrono::Datelike;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct FormEnvelope {
    pub form: Option<IntakeForm>,
}

pub async fn get_form(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IntakeQuery>,
) -> ApiResult<FormEnvelope> {
    let client_id = query
        .client_id
        .ok_or_else(|| AppError::bad_request("Client ID is required"))?;
    let form = IntakeForm::find_by_client(&state.db, client_id).await?;
    Ok(ApiResponse::success(FormEnvelope { form }))
}

pub async fn save_form(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<IntakeSubmission>,
) -> ApiResult<FormEnvelope> {
    let form = IntakeForm::save(&state.db, &payload, local_now().year()).await?;
    info!(
        "saved intake form {} for client {} ({}%)",
        form.id, form.client_id, form.completion_percentage
    );

    audit::record(
        &state.db,
        &actor,
        AuditEntry::new(AuditAction::Update, "intake_forms", form.id).changes(serde_json::json!({
            "client_id": form.client_id,
            "completion_percentage": form.completion_percentage,
            "is_completed": form.is_completed,
        })),
    )
    .await;
    Ok(ApiResponse::success(FormEnvelope { form: Some(form) }))
}
