use crate::handlers::{
    analytics, audit, checkins, clients, contacts, goals, intake, inventory, outreach, pages, users,
};
use crate::models::goal::Track;
use crate::state::AppState;
use axum::{
    routing::{get, patch, post, put},
    Extension, Router,
};
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::dashboard))
        .route("/contact-log", get(pages::contact_log))
        .route("/admin/users", get(pages::users))
        .route("/api/analytics/services-impact", get(analytics::services_impact))
        .route("/api/analytics/overview", get(analytics::overview))
        .route("/api/admin/users", get(users::list_users).post(users::create_user))
        .route("/api/admin/users/:id", patch(users::update_user))
        .route("/api/admin/roles", get(users::list_roles))
        .route("/api/admin/audit-logs", get(audit::list_logs))
        .route("/api/contacts", get(contacts::list_contacts))
        .route("/api/contacts/:id", get(contacts::get_contact))
        .route("/api/checkin", post(contacts::submit_checkin))
        .route("/api/update-services", post(contacts::update_services))
        .route("/api/change-date", post(contacts::change_date))
        .route("/api/filters", get(contacts::filter_options))
        .route("/api/clients", get(clients::list_clients))
        .route("/api/clients/:name", get(clients::client_record))
        .nest("/api/goals", goal_routes(Track::Cm))
        .nest("/api/ot-goals", goal_routes(Track::Ot))
        .nest("/api/checkins", checkin_routes(Track::Cm))
        .nest("/api/ot-checkins", checkin_routes(Track::Ot))
        .nest("/api/outreach", outreach_routes())
        .route("/api/intake-forms", get(intake::get_form).post(intake::save_form))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn goal_routes(track: Track) -> Router<AppState> {
    Router::new()
        .route("/", get(goals::list_goals).post(goals::create_goal))
        .route(
            "/:id",
            get(goals::get_goal).put(goals::update_goal).delete(goals::delete_goal),
        )
        .route("/:id/progress", get(goals::goal_progress))
        .layer(Extension(track))
}

fn checkin_routes(track: Track) -> Router<AppState> {
    Router::new()
        .route("/", get(checkins::list_checkins).post(checkins::create_checkin))
        .route(
            "/:id",
            get(checkins::get_checkin)
                .put(checkins::update_checkin)
                .delete(checkins::delete_checkin),
        )
        .layer(Extension(track))
}

fn outreach_routes() -> Router<AppState> {
    Router::new()
        .route("/inventory", get(inventory::list_items).post(inventory::create_item))
        .route("/inventory/alerts", get(inventory::list_alerts))
        .route("/inventory/alerts/:id", put(inventory::update_alert))
        .route(
            "/inventory/:id",
            get(inventory::get_item)
                .put(inventory::update_item)
                .delete(inventory::deactivate_item),
        )
        .route("/inventory/:id/adjust", post(inventory::adjust_stock))
        .route("/inventory/:id/adjustments", get(inventory::list_adjustments))
        .route("/locations", get(outreach::list_locations).post(outreach::create_location))
        .route(
            "/locations/:id",
            put(outreach::update_location).delete(outreach::delete_location),
        )
        .route("/runs", get(outreach::list_runs).post(outreach::create_run))
        .route("/runs/:id", put(outreach::update_run).delete(outreach::delete_run))
        .route(
            "/contacts",
            get(outreach::list_field_contacts).post(outreach::create_field_contact),
        )
        .route("/contacts/today", get(outreach::todays_field_contacts))
        .route("/staff", get(outreach::list_staff))
}
