use crate::stats::Period;
use crate::ui::{render_contact_log, render_dashboard, render_users};
use axum::response::Html;

pub async fn dashboard() -> Html<String> {
    Html(render_dashboard(Period::ThisMonth))
}

pub async fn contact_log() -> Html<String> {
    Html(render_contact_log())
}

pub async fn users() -> Html<String> {
    Html(render_users())
}
