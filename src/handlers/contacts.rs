use crate::audit::{self, AuditAction, AuditEntry};
use crate::errors::AppError;
use crate::extract::{Actor, ApiJson, ApiPath, ApiQuery};
use crate::models::contact::{
    CheckinSubmission, Contact, ContactPage, ContactQuery, DateChange, DateChangeResult, FilterOptions,
    ServicesUpdate, ServicesUpdateResult,
};
use crate::models::local_now;
use crate::response::{ApiResponse, ApiResult, Created};
use crate::state::AppState;
use axum::extract::State;
use serde_json::json;
use tracing::info;

pub async fn list_contacts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ContactQuery>,
) -> ApiResult<ContactPage> {
    Ok(ApiResponse::success(Contact::search(&state.db, &query).await?))
}

pub async fn get_contact(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<Contact> {
    let contact = Contact::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Contact not found"))?;
    Ok(ApiResponse::success(contact))
}

pub async fn submit_checkin(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<CheckinSubmission>,
) -> Created<Contact> {
    let contact = Contact::submit_checkin(&state.db, &payload, local_now()).await?;
    info!("client {} checked in (contact {})", contact.client_name, contact.id);

    audit::record(
        &state.db,
        &actor,
        AuditEntry::new(AuditAction::Create, "contacts", contact.id)
            .client(&contact.client_name)
            .changes(json!({
                "provider": contact.provider_name,
                "servicesRequested": contact.services_requested,
                "accessedFood": contact.food_accessed,
            })),
    )
    .await;
    Ok(ApiResponse::created(contact))
}

pub async fn update_services(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<ServicesUpdate>,
) -> ApiResult<ServicesUpdateResult> {
    let result = Contact::update_services(&state.db, &payload).await?;
    info!(
        "updated services on contact {} (+{} -{})",
        result.contact.id,
        result.added.len(),
        result.removed.len()
    );

    audit::record(
        &state.db,
        &actor,
        AuditEntry::new(AuditAction::Update, "contacts", result.contact.id)
            .client(&result.contact.client_name)
            .changes(json!({
                "updatedBy": payload.updated_by,
                "added": result.added,
                "removed": result.removed,
            })),
    )
    .await;
    Ok(ApiResponse::success(result))
}

pub async fn filter_options(State(state): State<AppState>) -> ApiResult<FilterOptions> {
    Ok(ApiResponse::success(Contact::filter_options(&state.db).await?))
}

pub async fn change_date(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(payload): ApiJson<DateChange>,
) -> ApiResult<DateChangeResult> {
    let result = Contact::change_date(&state.db, &payload, local_now().date()).await?;
    info!(
        "moved {} contact(s) to {}",
        result.updated_contacts.len(),
        result.new_date
    );

    for moved in &result.updated_contacts {
        audit::record(
            &state.db,
            &actor,
            AuditEntry::new(AuditAction::Update, "contacts", moved.id)
                .client(&moved.client_name)
                .changes(json!({
                    "contactDate": { "from": moved.previous_date, "to": moved.new_date },
                })),
        )
        .await;
    }
    let message = format!("Contact date updated for {} contact(s)", result.updated_contacts.len());
    Ok(ApiResponse::with_message(result, message))
}
